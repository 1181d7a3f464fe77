pub mod buffer;
pub mod message;
pub mod validation;

pub use buffer::{Frame, MAX_FRAME_LEN};
pub use message::*;
pub use validation::MessageValidator;

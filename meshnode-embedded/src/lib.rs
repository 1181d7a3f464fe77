#![no_std]

extern crate alloc;

pub mod config;
pub mod error;
pub mod mesh;
pub mod protocol;
pub mod status;
pub mod time;
pub mod transport;
pub mod types;
pub mod uplink;

pub use error::*;
pub use mesh::MeshManager;
pub use types::*;

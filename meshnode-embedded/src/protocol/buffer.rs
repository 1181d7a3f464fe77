use core::ops::Deref;

/// Largest frame the mesh puts on air (a data frame).
pub const MAX_FRAME_LEN: usize = 56;

/// Encoded frame held inline, so encoding never allocates and never fails.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    buffer: [u8; MAX_FRAME_LEN],
    len: usize,
}

impl Frame {
    pub(crate) fn zeroed(len: usize) -> Self {
        Self {
            buffer: [0; MAX_FRAME_LEN],
            len: len.min(MAX_FRAME_LEN),
        }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buffer[..self.len]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.len]
    }
}

impl Deref for Frame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl core::fmt::Debug for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Frame")
            .field("len", &self.len)
            .field("bytes", &self.as_bytes())
            .finish()
    }
}

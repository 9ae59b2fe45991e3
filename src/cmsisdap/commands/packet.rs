//! Fixed-layout little-endian packet buffers.

use scroll::{Pwrite, LE};

/// Report size used until the probe tells us otherwise.
pub const DEFAULT_PACKET_SIZE: usize = 64;

/// A reusable request or response buffer.
///
/// The buffer only ever grows. Bytes past what the current command writes
/// (or what the last response carried) are left over from earlier use and
/// must not be interpreted.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    data: Vec<u8>,
}

impl Default for Packet {
    fn default() -> Self {
        Self::with_size(DEFAULT_PACKET_SIZE)
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet").field("len", &self.data.len()).finish()
    }
}

impl Packet {
    pub fn with_size(size: usize) -> Self {
        Self { data: vec![0; size] }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Grows the buffer to at least `len` bytes.
    pub fn reserve_len(&mut self, len: usize) {
        if self.data.len() < len {
            self.data.resize(len, 0);
        }
    }

    /// Copies `bytes` to the start of the buffer, growing it if needed.
    /// Returns the number of bytes copied.
    pub fn load(&mut self, bytes: &[u8]) -> usize {
        self.reserve_len(bytes.len());
        self.data[..bytes.len()].copy_from_slice(bytes);
        bytes.len()
    }

    pub fn pack_u8(&mut self, offset: usize, value: u8) {
        self.reserve_len(offset + 1);
        self.data[offset] = value;
    }

    pub fn pack_u16(&mut self, offset: usize, value: u16) {
        self.reserve_len(offset + 2);
        // Cannot fail: the buffer was just grown to fit.
        let _ = self.data.pwrite_with(value, offset, LE);
    }

    pub fn pack_u32(&mut self, offset: usize, value: u32) {
        self.reserve_len(offset + 4);
        let _ = self.data.pwrite_with(value, offset, LE);
    }

    pub fn pack_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.reserve_len(offset + bytes.len());
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

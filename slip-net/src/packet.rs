//! Packet buffers.
//!
//! Each link task owns exactly one `PacketBuf`, sized MTU + 2, for its whole
//! lifetime. A `Packet` is a borrowed view of that buffer plus a length; it
//! is what the network stack reads from and writes replies into.

use slip_core::constants::buffer_capacity;

/// Fixed-capacity packet storage owned by one task.
#[derive(Debug)]
pub struct PacketBuf {
    data: Box<[u8]>,
}

impl PacketBuf {
    pub fn with_mtu(mtu: usize) -> Self {
        PacketBuf {
            data: vec![0u8; buffer_capacity(mtu)].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The whole buffer, for the decoder to fill.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// View the first `len` bytes as a packet.
    pub fn packet(&mut self, len: usize) -> Packet<'_> {
        let mut packet = Packet {
            buf: &mut self.data,
            len: 0,
        };
        packet.set_len(len);
        packet
    }
}

/// A packet living in a task-owned buffer.
#[derive(Debug)]
pub struct Packet<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> Packet<'a> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf[..self.len]
    }

    /// The full underlying buffer, regardless of the current length. A stack
    /// builds its output here and then calls [`Packet::set_len`].
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut *self.buf
    }

    /// Set the packet length, clamped to the buffer capacity.
    pub fn set_len(&mut self, len: usize) {
        if len > self.buf.len() {
            log::debug!("packet length {} clamped to capacity {}", len, self.buf.len());
        }
        self.len = len.min(self.buf.len());
    }

    /// Mark the packet as carrying nothing.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Replace the contents with `data`, truncating to capacity.
    /// Returns the number of bytes kept.
    pub fn fill(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.buf.len());
        self.buf[..n].copy_from_slice(&data[..n]);
        self.len = n;
        n
    }
}

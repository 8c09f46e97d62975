//! Blocking SLIP frame reader over any byte source.
//!
//! Wraps a [`Decoder`] around a `Read` so that `next_packet` suspends the
//! caller until a frame boundary arrives. Bytes are pulled from the source in
//! small chunks but handed to the decoder one at a time.

use std::io::{self, Read};

use slip_core::decoder::{Decoder, Step};

const READ_CHUNK: usize = 256;

/// Streaming frame reader.
pub struct FrameReader<R> {
    inner: R,
    name: String,
    decoder: Decoder,
    chunk: [u8; READ_CHUNK],
    pos: usize,
    filled: usize,
    violations: u64,
    dropped: u64,
    truncating: bool,
}

impl<R: Read> FrameReader<R> {
    /// `name` prefixes log messages.
    pub fn new(inner: R, name: impl Into<String>) -> Self {
        FrameReader {
            inner,
            name: name.into(),
            decoder: Decoder::new(),
            chunk: [0u8; READ_CHUNK],
            pos: 0,
            filled: 0,
            violations: 0,
            dropped: 0,
            truncating: false,
        }
    }

    /// Next raw byte from the source, blocking as needed.
    ///
    /// End of stream is reported as `UnexpectedEof`.
    pub fn read_byte(&mut self) -> io::Result<u8> {
        while self.pos == self.filled {
            match self.inner.read(&mut self.chunk) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "serial stream closed",
                    ))
                }
                Ok(n) => {
                    self.pos = 0;
                    self.filled = n;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        let byte = self.chunk[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Drop any partially assembled packet.
    pub fn restart(&mut self) {
        self.decoder.reset();
        self.truncating = false;
    }

    /// Run one byte through the decoder. Returns the packet length when a
    /// frame completes.
    pub fn feed(&mut self, byte: u8, buf: &mut [u8]) -> Option<usize> {
        match self.decoder.push(byte, buf) {
            Step::Pending => None,
            Step::Packet(len) => {
                log::debug!("[{}] received packet size {}", self.name, len);
                self.truncating = false;
                Some(len)
            }
            Step::Violation { byte, dropped } => {
                self.violations += 1;
                log::warn!("[{}] protocol violation: {:#04x} after ESC", self.name, byte);
                if dropped {
                    self.overflow(buf.len());
                }
                None
            }
            Step::Overflow => {
                self.overflow(buf.len());
                None
            }
        }
    }

    fn overflow(&mut self, capacity: usize) {
        self.dropped += 1;
        if !self.truncating {
            log::debug!("[{}] frame exceeds {} bytes, truncating", self.name, capacity);
            self.truncating = true;
        }
    }

    /// Block until the next complete packet has been decoded into `buf`.
    pub fn next_packet(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let byte = self.read_byte()?;
            if let Some(len) = self.feed(byte, buf) {
                return Ok(len);
            }
        }
    }

    /// Total invalid escape sequences seen.
    pub fn violations(&self) -> u64 {
        self.violations
    }

    /// Total decoded bytes dropped for lack of buffer space.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Turn the reader into an iterator of owned packets of at most
    /// `capacity` bytes. The iterator ends when the source does.
    pub fn packets(self, capacity: usize) -> Packets<R> {
        Packets {
            reader: self,
            buf: vec![0u8; capacity],
        }
    }
}

/// Iterator returned by [`FrameReader::packets`].
pub struct Packets<R> {
    reader: FrameReader<R>,
    buf: Vec<u8>,
}

impl<R: Read> Iterator for Packets<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.next_packet(&mut self.buf) {
            Ok(len) => Some(Ok(self.buf[..len].to_vec())),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => None,
            Err(e) => Some(Err(e)),
        }
    }
}

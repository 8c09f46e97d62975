//! SLIP frame decoder.
//!
//! A byte-at-a-time state machine that writes decoded bytes into a
//! caller-owned buffer. The buffer's length is the packet capacity; bytes
//! beyond it are dropped but the frame is still delimited normally, so an
//! oversized frame comes out truncated instead of corrupting the next one.
//!
//! Malformed escapes are tolerated: the byte following ESC is stored as-is
//! and decoding carries on.

use crate::constants::{END, ESC, ESC_END, ESC_ESC};

/// Escape state between two calls to [`Decoder::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Normal,
    Escaped,
}

/// Outcome of feeding one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing to report yet.
    Pending,
    /// A frame ended; the first `n` bytes of the buffer hold the packet.
    Packet(usize),
    /// ESC was followed by `byte`, which is not a valid escape code. The
    /// byte has been stored literally unless the buffer was full, in which
    /// case `dropped` is set.
    Violation { byte: u8, dropped: bool },
    /// The buffer was full and the decoded byte was dropped.
    Overflow,
}

/// Streaming SLIP decoder.
#[derive(Debug, Clone)]
pub struct Decoder {
    state: State,
    len: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub const fn new() -> Self {
        Decoder {
            state: State::Normal,
            len: 0,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Bytes assembled so far for the current packet.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Discard any partial packet and escape state.
    pub fn reset(&mut self) {
        self.state = State::Normal;
        self.len = 0;
    }

    /// Feed one byte, storing decoded data into `buf`.
    ///
    /// An END with nothing assembled is an idle marker and yields `Pending`.
    pub fn push(&mut self, byte: u8, buf: &mut [u8]) -> Step {
        match self.state {
            State::Normal => match byte {
                END => {
                    if self.len == 0 {
                        return Step::Pending;
                    }
                    let len = self.len;
                    self.len = 0;
                    Step::Packet(len)
                }
                ESC => {
                    self.state = State::Escaped;
                    Step::Pending
                }
                _ => self.store(byte, buf),
            },
            State::Escaped => {
                self.state = State::Normal;
                match byte {
                    ESC_END => self.store(END, buf),
                    ESC_ESC => self.store(ESC, buf),
                    other => Step::Violation {
                        byte: other,
                        dropped: self.store(other, buf) == Step::Overflow,
                    },
                }
            }
        }
    }

    /// Feed bytes from `input` until a packet completes or input runs out.
    ///
    /// Returns the number of input bytes consumed and the packet length if
    /// one completed. Violations are logged and overflowing bytes dropped;
    /// use [`Decoder::push`] to count them.
    pub fn decode(&mut self, input: &[u8], buf: &mut [u8]) -> (usize, Option<usize>) {
        for (i, &byte) in input.iter().enumerate() {
            match self.push(byte, buf) {
                Step::Packet(len) => return (i + 1, Some(len)),
                Step::Violation { byte, .. } => {
                    log::warn!("protocol violation: {:#04x} after ESC", byte)
                }
                Step::Pending | Step::Overflow => {}
            }
        }
        (input.len(), None)
    }

    fn store(&mut self, byte: u8, buf: &mut [u8]) -> Step {
        match buf.get_mut(self.len) {
            Some(slot) => {
                *slot = byte;
                self.len += 1;
                Step::Pending
            }
            None => Step::Overflow,
        }
    }
}

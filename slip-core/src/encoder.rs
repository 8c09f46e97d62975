//! SLIP frame encoder.
//!
//! Every frame is written as `END, escaped(packet), END`. The leading END
//! flushes whatever line noise the receiver has accumulated. Runs of ordinary
//! bytes are handed to the sink in one call; only END and ESC are split out
//! into their two-byte escape sequences.

use alloc::vec::Vec;
use core::convert::Infallible;

use crate::constants::{END, ESC, ESC_END, ESC_ESC};

/// Destination for encoded bytes.
pub trait Sink {
    type Error;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;
}

impl Sink for Vec<u8> {
    type Error = Infallible;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Infallible> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// Encode `packet` into `sink` as a single SLIP frame.
///
/// Returns the number of bytes written. A zero-length packet still produces
/// two END bytes, which the peer treats as an idle/resync marker.
pub fn encode_to<S: Sink + ?Sized>(packet: &[u8], sink: &mut S) -> Result<usize, S::Error> {
    sink.write_all(&[END])?;
    let mut written = 1;
    let mut run_start = 0;

    for (i, &byte) in packet.iter().enumerate() {
        let escaped = match byte {
            END => ESC_END,
            ESC => ESC_ESC,
            _ => continue,
        };
        if i > run_start {
            sink.write_all(&packet[run_start..i])?;
            written += i - run_start;
        }
        sink.write_all(&[ESC, escaped])?;
        written += 2;
        run_start = i + 1;
    }

    if run_start < packet.len() {
        sink.write_all(&packet[run_start..])?;
        written += packet.len() - run_start;
    }

    sink.write_all(&[END])?;
    Ok(written + 1)
}

/// Encode `packet` into a freshly allocated frame.
pub fn frame(packet: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(packet));
    match encode_to(packet, &mut out) {
        Ok(_) => out,
        Err(never) => match never {},
    }
}

/// Exact number of bytes `encode_to` will write for `packet`.
pub fn encoded_len(packet: &[u8]) -> usize {
    let specials = packet.iter().filter(|&&b| b == END || b == ESC).count();
    packet.len() + specials + 2
}

//! The gate: exclusive access to the network stack and the serial writer.
//!
//! Both live behind one mutex. Anything that calls into the stack or puts a
//! frame on the wire holds it, so frames from the two threads never
//! interleave and a reply produced while receiving goes out before the next
//! poll's output.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use slip_core::encoder::{encode_to, Sink};

use crate::link::{bump, Link};
use crate::packet::Packet;
use crate::stack::Transmit;

/// `std::io::Write` adapter for the frame encoder.
#[derive(Debug)]
pub struct IoSink<W> {
    inner: W,
}

impl<W: Write> IoSink<W> {
    pub fn new(inner: W) -> Self {
        IoSink { inner }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Sink for IoSink<W> {
    type Error = io::Error;

    /// `Write::write_all` already retries writes interrupted by a signal.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)
    }
}

pub(crate) struct Gate<S, W> {
    pub(crate) stack: S,
    pub(crate) wire: IoSink<W>,
}

pub(crate) type SharedGate<S, W> = Arc<Mutex<Gate<S, W>>>;

pub(crate) fn shared<S, W: Write>(stack: S, writer: W) -> SharedGate<S, W> {
    Arc::new(Mutex::new(Gate {
        stack,
        wire: IoSink::new(writer),
    }))
}

/// Encode one packet onto the wire. Caller holds the gate.
pub(crate) fn send_frame<W: Write>(
    link: &Link,
    wire: &mut IoSink<W>,
    data: &[u8],
) -> io::Result<()> {
    log::debug!("[{}] sending packet size {}", link.name(), data.len());
    let result = encode_to(data, wire).and_then(|n| wire.flush().map(|_| n));
    match result {
        Ok(n) => {
            bump(&link.stats().tx_packets, 1);
            bump(&link.stats().tx_bytes, n as u64);
            // Something went out, so more may be queued: poll again promptly
            link.set_nodelay();
            Ok(())
        }
        Err(e) => {
            bump(&link.stats().tx_errors, 1);
            log::warn!("[{}] serial write failed: {}", link.name(), e);
            Err(e)
        }
    }
}

/// The poll-driver callback: frames each packet the stack produces.
pub(crate) struct WireTransmit<'a, W> {
    pub(crate) link: &'a Link,
    pub(crate) wire: &'a mut IoSink<W>,
}

impl<W: Write> Transmit for WireTransmit<'_, W> {
    fn transmit(&mut self, packet: &Packet<'_>) -> io::Result<()> {
        if packet.is_empty() {
            return Ok(());
        }
        send_frame(self.link, self.wire, packet.as_slice())
    }
}

//! Receive thread: decodes frames and feeds them to the network stack.

use std::io::{self, Read, Write};
use std::sync::atomic::Ordering;
use std::thread;

use slip_core::constants::END;
use slip_core::ip::IpVersion;

use crate::gate::{send_frame, Gate, SharedGate};
use crate::link::{bump, lock, LinkHandle};
use crate::packet::PacketBuf;
use crate::reader::FrameReader;
use crate::stack::NetworkStack;

pub(crate) struct RxTask<R, S, W> {
    link: LinkHandle,
    reader: FrameReader<R>,
    buf: PacketBuf,
    gate: SharedGate<S, W>,
}

impl<R: Read, S: NetworkStack, W: Write> RxTask<R, S, W> {
    pub(crate) fn new(link: LinkHandle, reader: R, gate: SharedGate<S, W>) -> Self {
        let name = link.name().to_string();
        let buf = PacketBuf::with_mtu(link.mtu());
        RxTask {
            link,
            reader: FrameReader::new(reader, name),
            buf,
            gate,
        }
    }

    /// Receive forever. Returns only when the byte source ends.
    pub(crate) fn run(mut self) {
        loop {
            match self.receive() {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    log::warn!("[{}] serial port closed, receiver stopping", self.link.name());
                    return;
                }
                Err(e) => {
                    // The partial frame is lost; resync on the next END
                    log::warn!("[{}] serial read failed, retrying: {}", self.link.name(), e);
                    self.reader.restart();
                    thread::sleep(self.link.poll_interval());
                }
            }
        }
    }

    /// Wait for one packet and hand it to the stack.
    pub(crate) fn receive(&mut self) -> io::Result<()> {
        let len = self.next_frame()?;
        let stats = self.link.stats();
        stats.rx_violations.store(self.reader.violations(), Ordering::Relaxed);
        stats.rx_dropped.store(self.reader.dropped(), Ordering::Relaxed);
        self.dispatch(len);
        Ok(())
    }

    fn next_frame(&mut self) -> io::Result<usize> {
        let buf = self.buf.as_mut_slice();
        loop {
            let byte = self.reader.read_byte()?;

            // Input that arrives before the interface is up is ignored
            if !self.link.is_up() {
                continue;
            }

            // END may precede a packet as well as follow it. Anything else
            // means the leading END was lost: start assembling right here.
            self.reader.restart();
            if byte != END {
                // Only END can complete a frame, so this never yields one
                let _ = self.reader.feed(byte, buf);
            }
            return self.reader.next_packet(buf);
        }
    }

    fn dispatch(&mut self, len: usize) {
        let link = &self.link;
        let stats = link.stats();

        let mut guard = lock(&self.gate);
        let Gate { stack, wire } = &mut *guard;
        let mut packet = self.buf.packet(len);

        bump(&stats.rx_packets, 1);
        bump(&stats.rx_bytes, len as u64);

        match IpVersion::of(packet.as_slice()) {
            Some(IpVersion::V4) => {
                bump(&stats.rx_ipv4, 1);
                stack.ipv4_input(&mut packet);
            }
            Some(IpVersion::V6) => {
                bump(&stats.rx_ipv6, 1);
                stack.ipv6_input(&mut packet);
            }
            None => {
                bump(&stats.rx_errors, 1);
                log::debug!(
                    "[{}] dropping packet with unknown IP version (first byte {:#04x})",
                    link.name(),
                    packet.as_slice()[0]
                );
                return;
            }
        }

        // A reply left in the buffer goes out now, straight from the receive
        // buffer, while the gate is still held.
        if !packet.is_empty() {
            if let Err(e) = send_frame(link, wire, packet.as_slice()) {
                // Already counted in tx_errors and logged; the reply is lost
                log::debug!("[{}] inline reply dropped: {}", link.name(), e);
            }
        }
    }
}

//! Transmit thread: polls the network stack for output.

use std::io::Write;
use std::time::{Duration, Instant};

use slip_core::constants::TIMER_TICK_MS;

use crate::gate::{Gate, SharedGate, WireTransmit};
use crate::link::{lock, LinkHandle};
use crate::packet::PacketBuf;
use crate::stack::NetworkStack;

const TIMER_TICK: Duration = Duration::from_millis(TIMER_TICK_MS);

pub(crate) struct TxTask<S, W> {
    link: LinkHandle,
    buf: PacketBuf,
    gate: SharedGate<S, W>,
    /// Link time up to which timer polls have been delivered.
    timer_base: Instant,
}

impl<S: NetworkStack, W: Write> TxTask<S, W> {
    pub(crate) fn new(link: LinkHandle, gate: SharedGate<S, W>) -> Self {
        let buf = PacketBuf::with_mtu(link.mtu());
        TxTask {
            link,
            buf,
            gate,
            timer_base: Instant::now(),
        }
    }

    pub(crate) fn run(mut self) {
        loop {
            self.link.wait_for_poll();
            self.poll_once(Instant::now());
        }
    }

    /// One poll pass. Does nothing while the link is down.
    pub(crate) fn poll_once(&mut self, now: Instant) {
        if !self.link.is_up() {
            return;
        }

        let mut guard = lock(&self.gate);
        let Gate { stack, wire } = &mut *guard;
        let mut packet = self.buf.packet(0);
        let mut tx = WireTransmit {
            link: &self.link,
            wire,
        };

        let elapsed = now.saturating_duration_since(self.timer_base);
        let ticks = elapsed.as_millis() / TIMER_TICK.as_millis();
        let half_seconds = ticks.min(u32::MAX as u128) as u32;
        if half_seconds > 0 {
            log::trace!("[{}] timer poll, {} ticks", self.link.name(), half_seconds);
            stack.timer_poll(&mut packet, &mut tx, half_seconds);
            self.timer_base += TIMER_TICK * half_seconds;
        } else {
            stack.poll(&mut packet, &mut tx);
        }
    }
}

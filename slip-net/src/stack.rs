//! The seam between a link and the network stack it feeds.
//!
//! The stack implements [`NetworkStack`]; the link hands it a
//! [`LinkHandle`](crate::LinkHandle), which implements [`NetDriver`], so the
//! stack can bring the interface up and down and ask for an early poll.
//!
//! Every `NetworkStack` method is called with the link's gate held, so an
//! implementation never sees two of its methods running at once for the same
//! link.

use std::io;

use crate::link::LinkHandle;
use crate::packet::Packet;

/// Per-packet output callback handed to [`NetworkStack::poll`].
pub trait Transmit {
    /// Frame and write `packet` to the serial line.
    fn transmit(&mut self, packet: &Packet<'_>) -> io::Result<()>;
}

/// Operations a link needs from its network stack.
pub trait NetworkStack: Send {
    /// Called once while the link is being set up, before any other method.
    fn attach(&mut self, _driver: LinkHandle) {}

    /// Process a received IPv4 datagram.
    ///
    /// To answer immediately, overwrite `packet` with the reply and leave its
    /// length non-zero; the link transmits it before releasing the gate.
    /// Clear it otherwise.
    fn ipv4_input(&mut self, packet: &mut Packet<'_>);

    /// Process a received IPv6 datagram. Same reply contract as
    /// [`NetworkStack::ipv4_input`].
    fn ipv6_input(&mut self, packet: &mut Packet<'_>);

    /// Build pending output in `packet` and pass each one to `tx`.
    fn poll(&mut self, packet: &mut Packet<'_>, tx: &mut dyn Transmit);

    /// Like [`NetworkStack::poll`], but `half_seconds` of link time have
    /// passed since the previous timer poll, so timers should advance.
    fn timer_poll(&mut self, packet: &mut Packet<'_>, tx: &mut dyn Transmit, half_seconds: u32) {
        let _ = half_seconds;
        self.poll(packet, tx);
    }
}

/// Driver controls exposed to the network stack.
pub trait NetDriver: Send + Sync {
    /// Mark the interface up; received packets start flowing to the stack.
    fn up(&self);

    /// Mark the interface down; input is discarded and polling stops.
    fn down(&self);

    /// New output is queued: poll now instead of waiting for the interval.
    fn notify_tx_available(&self);

    /// SLIP has no hardware address filter, so there is nothing to program.
    fn add_multicast(&self, _mac: &[u8]) -> io::Result<()> {
        Ok(())
    }

    fn remove_multicast(&self, _mac: &[u8]) -> io::Result<()> {
        Ok(())
    }
}

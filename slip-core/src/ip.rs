//! IP version sniffing.
//!
//! SLIP carries bare datagrams with no link-layer type field, so the only way
//! to route a received packet is the version nibble of its first byte.

/// IP version of a received datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// Classify a packet by the high nibble of its first byte.
    ///
    /// Returns `None` for an empty packet or an unsupported version.
    pub fn of(packet: &[u8]) -> Option<IpVersion> {
        match packet.first()? >> 4 {
            4 => Some(IpVersion::V4),
            6 => Some(IpVersion::V6),
            _ => None,
        }
    }
}

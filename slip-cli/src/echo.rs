//! A minimal network stack that answers ICMPv4 echo requests.
//!
//! Enough to `ping` the far end of a serial line. Replies are built in place
//! in the receive buffer and go back out inline; nothing is ever originated,
//! so polls are no-ops.

use std::io;

use slip_net::{LinkHandle, NetDriver, NetworkStack, Packet, Transmit};

const IPPROTO_ICMP: u8 = 1;
const ICMP_ECHO_REPLY: u8 = 0;
const ICMP_ECHO_REQUEST: u8 = 8;
const REPLY_TTL: u8 = 64;

/// Internet checksum (RFC 1071) of `data`.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for pair in &mut chunks {
        sum += u16::from_be_bytes([pair[0], pair[1]]) as u32;
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// Why an IPv4 packet got no reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    Malformed,
    BadChecksum,
    Fragment,
    NotIcmp,
    NotEchoRequest,
}

#[derive(Default)]
pub struct EchoStack {
    driver: Option<LinkHandle>,
    replies: u64,
    ignored: u64,
}

impl EchoStack {
    pub fn new() -> Self {
        EchoStack::default()
    }

    pub fn replies(&self) -> u64 {
        self.replies
    }

    pub fn ignored(&self) -> u64 {
        self.ignored
    }

    fn name(&self) -> &str {
        self.driver.as_ref().map(|d| d.name()).unwrap_or("echo")
    }
}

/// Rewrite an echo request in `data` into its reply. Returns the reply length.
pub fn echo_reply(data: &mut [u8]) -> Result<usize, Ignored> {
    if data.len() < 20 || data[0] >> 4 != 4 {
        return Err(Ignored::Malformed);
    }
    let ihl = ((data[0] & 0x0f) as usize) * 4;
    let total = u16::from_be_bytes([data[2], data[3]]) as usize;
    if ihl < 20 || total < ihl + 8 || total > data.len() {
        return Err(Ignored::Malformed);
    }
    if checksum(&data[..ihl]) != 0 {
        return Err(Ignored::BadChecksum);
    }
    // MF set or non-zero offset
    if u16::from_be_bytes([data[6], data[7]]) & 0x3fff != 0 {
        return Err(Ignored::Fragment);
    }
    if data[9] != IPPROTO_ICMP {
        return Err(Ignored::NotIcmp);
    }
    let icmp = ihl..total;
    if data[icmp.start] != ICMP_ECHO_REQUEST || data[icmp.start + 1] != 0 {
        return Err(Ignored::NotEchoRequest);
    }
    if checksum(&data[icmp.clone()]) != 0 {
        return Err(Ignored::BadChecksum);
    }

    // IP header: swap addresses, fresh TTL, new checksum
    let (src, dst) = data[12..20].split_at_mut(4);
    src.swap_with_slice(dst);
    data[8] = REPLY_TTL;
    data[10..12].fill(0);
    let sum = checksum(&data[..ihl]);
    data[10..12].copy_from_slice(&sum.to_be_bytes());

    // ICMP: type 0, same id/sequence/payload
    data[icmp.start] = ICMP_ECHO_REPLY;
    data[icmp.start + 2..icmp.start + 4].fill(0);
    let sum = checksum(&data[icmp.clone()]);
    data[icmp.start + 2..icmp.start + 4].copy_from_slice(&sum.to_be_bytes());

    Ok(total)
}

impl NetworkStack for EchoStack {
    fn attach(&mut self, driver: LinkHandle) {
        driver.up();
        self.driver = Some(driver);
    }

    fn ipv4_input(&mut self, packet: &mut Packet<'_>) {
        match echo_reply(packet.as_mut_slice()) {
            Ok(len) => {
                self.replies += 1;
                log::debug!("[{}] echo reply, {} bytes", self.name(), len);
                packet.set_len(len);
            }
            Err(reason) => {
                self.ignored += 1;
                log::trace!("[{}] ignoring IPv4 packet: {:?}", self.name(), reason);
                packet.clear();
            }
        }
    }

    fn ipv6_input(&mut self, packet: &mut Packet<'_>) {
        self.ignored += 1;
        log::trace!("[{}] ignoring IPv6 packet", self.name());
        packet.clear();
    }

    fn poll(&mut self, _packet: &mut Packet<'_>, _tx: &mut dyn Transmit) {}

    fn timer_poll(&mut self, _packet: &mut Packet<'_>, _tx: &mut dyn Transmit, half_seconds: u32) {
        log::trace!("[{}] timer, {} ticks", self.name(), half_seconds);
    }
}

/// Build an ICMPv4 echo request. Used by tests and for smoke-testing links.
pub fn echo_request(
    src: [u8; 4],
    dst: [u8; 4],
    id: u16,
    seq: u16,
    payload: &[u8],
) -> io::Result<Vec<u8>> {
    let total = 20 + 8 + payload.len();
    let total16 = u16::try_from(total)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "payload too large"))?;

    let mut packet = vec![0u8; total];
    packet[0] = 0x45;
    packet[2..4].copy_from_slice(&total16.to_be_bytes());
    packet[8] = REPLY_TTL;
    packet[9] = IPPROTO_ICMP;
    packet[12..16].copy_from_slice(&src);
    packet[16..20].copy_from_slice(&dst);
    let sum = checksum(&packet[..20]);
    packet[10..12].copy_from_slice(&sum.to_be_bytes());

    packet[20] = ICMP_ECHO_REQUEST;
    packet[24..26].copy_from_slice(&id.to_be_bytes());
    packet[26..28].copy_from_slice(&seq.to_be_bytes());
    packet[28..].copy_from_slice(payload);
    let sum = checksum(&packet[20..]);
    packet[22..24].copy_from_slice(&sum.to_be_bytes());
    Ok(packet)
}

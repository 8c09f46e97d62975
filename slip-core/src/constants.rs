// =============================================================================
// SLIP protocol constants
// RFC 1055, plus the link defaults used by the serial drivers
// =============================================================================

// --- Wire format ---

/// Frame delimiter. Sent before and after every packet.
pub const END: u8 = 0xC0;

/// Byte-stuffing escape.
pub const ESC: u8 = 0xDB;

/// `ESC ESC_END` stands for a literal END data byte.
pub const ESC_END: u8 = 0xDC;

/// `ESC ESC_ESC` stands for a literal ESC data byte.
pub const ESC_ESC: u8 = 0xDD;

// --- Link sizing ---

/// Smallest packet size a link may be configured with: 40 bytes of IP+TCP
/// headers plus 256 bytes of data, the value hard-coded by Linux slip.
pub const MIN_MTU: usize = 296;

/// Default packet size.
pub const DEFAULT_MTU: usize = MIN_MTU;

/// Extra room in each packet buffer beyond the MTU.
pub const BUFFER_SLACK: usize = 2;

/// Capacity of a link's receive and transmit buffers for a given MTU.
pub const fn buffer_capacity(mtu: usize) -> usize {
    mtu + BUFFER_SLACK
}

// --- Timing ---

/// Transmit poll interval in microseconds (1 second).
pub const DEFAULT_POLL_INTERVAL_US: u64 = 1_000_000;

/// Granularity of the stack's timer poll in milliseconds (half a second).
pub const TIMER_TICK_MS: u64 = 500;

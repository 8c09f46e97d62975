//! SLIP network links over serial ports.
//!
//! Each link runs a receive thread that decodes frames into the network stack
//! and a transmit thread that polls the stack for output. The two share one
//! gate, so the stack is never entered concurrently.

pub mod config;
pub mod error;
pub mod gate;
pub mod link;
pub mod packet;
pub mod reader;
pub mod registry;
pub mod serial;
pub mod stack;

mod rx;
mod tx;

pub use config::{ConfigError, LinkConfig, SlipConfig};
pub use error::Error;
pub use gate::IoSink;
pub use link::{Link, LinkHandle, LinkId, LinkStats, LinkStatsSnapshot};
pub use packet::{Packet, PacketBuf};
pub use reader::FrameReader;
pub use registry::{start, start_with_io, Registry};
pub use serial::{Parity, SerialConfig, SerialPort};
pub use stack::{NetDriver, NetworkStack, Transmit};

pub use slip_core;

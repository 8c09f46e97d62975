#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

pub mod constants;
pub mod decoder;
pub mod encoder;
pub mod ip;

pub use decoder::{Decoder, State, Step};
pub use encoder::{encode_to, encoded_len, frame, Sink};
pub use ip::IpVersion;

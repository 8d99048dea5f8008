//! PPP wire formats
//!
//! Frame and option codecs for the PPP control protocols. All decoding starts
//! at the PPP Protocol field; HDLC framing and carrier headers are stripped by
//! the transport before frames reach this layer.

pub mod chap;
pub mod cp;
pub mod ipcp;
pub mod lcp;
pub mod pap;
pub mod ppp;

pub use cp::{CpBody, CpPacket, OptionCodec};
pub use ppp::PppFrame;

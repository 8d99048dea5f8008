//! ppplink - PPP link engine
//!
//! Frame codec for the PPP control protocols (RFC 1661/1332/1334) and the
//! layered state machine that drives a session from Dead to Network and back:
//! a generic option-negotiation automaton instantiated for LCP and IPCP, a
//! PAP authenticator, and the orchestrator tying them to a transport and an
//! accounting sink.

pub mod config;
pub mod error;
pub mod link;
pub mod protocol;
pub mod telemetry;

pub use error::{Error, Result};

//! Link engine
//!
//! The negotiation automaton, the per-protocol policies plugged into it, the
//! PAP authenticator, and the orchestrator that walks one PPP session through
//! its phases.

pub mod accounting;
pub mod automaton;
pub mod ipcp;
pub mod lcp;
pub mod pap;
pub mod session;
pub mod transport;

pub use session::{Link, Phase};

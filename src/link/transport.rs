//! Transport contract
//!
//! The engine is carrier-agnostic: anything that can move complete PPP
//! payloads (Protocol field onward) and count them qualifies. PPPoE, HDLC,
//! a UDP lab rig and the in-memory test transport all fit this trait.

/// Octet and packet counters for one session, as reported by the carrier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    pub in_octets: u64,
    pub out_octets: u64,
    pub in_packets: u64,
    pub out_packets: u64,
}

/// Subscriber line parameters some carriers (PPPoE over DSL) learn from
/// intermediate agents; reported verbatim in accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineInfo {
    pub actual_rate_up: Option<u32>,
    pub actual_rate_down: Option<u32>,
    pub min_rate_up: Option<u32>,
    pub min_rate_down: Option<u32>,
    pub attainable_rate_up: Option<u32>,
    pub attainable_rate_down: Option<u32>,
    pub interleaving_delay_up: Option<u32>,
    pub interleaving_delay_down: Option<u32>,
    pub circuit_id: Option<String>,
    pub remote_id: Option<String>,
}

/// A byte-oriented PPP carrier owned by exactly one link.
pub trait Transport {
    /// Enqueue one complete PPP payload for the peer. Must not block.
    fn send(&mut self, frame: &[u8]);

    /// Session traffic counters.
    fn counters(&self) -> SessionCounters;

    /// Line parameters, when the carrier knows them.
    fn line_info(&self) -> Option<LineInfo> {
        None
    }

    /// Tear the carrier down. Called once when the link dies.
    fn terminate(&mut self);
}

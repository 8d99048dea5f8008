//! Accounting records
//!
//! The link emits RADIUS-shaped attribute sets at session start, on the
//! interim timer, and at session stop. Delivery is somebody else's problem:
//! the sink is fire-and-forget and must never block the link.

use std::net::Ipv4Addr;

use tracing::info;

use super::transport::LineInfo;

/// Acct-Status-Type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcctStatus {
    Start,
    Interim,
    Stop,
}

/// Service-Type value for framed sessions.
pub const SERVICE_TYPE_FRAMED: u32 = 2;
/// Framed-Protocol value for PPP.
pub const FRAMED_PROTOCOL_PPP: u32 = 1;

/// One accounting attribute. The DSL-Forum attributes mirror what a PPPoE
/// intermediate agent reports about the subscriber line.
#[derive(Debug, Clone, PartialEq)]
pub enum AcctAttr {
    UserName(String),
    FramedIpAddress(Ipv4Addr),
    SessionTime(u32),
    NasIdentifier(String),
    ServiceType(u32),
    FramedProtocol(u32),
    TerminateCause(String),
    InputOctets(u64),
    OutputOctets(u64),
    InputPackets(u64),
    OutputPackets(u64),
    ActualDataRateUp(u32),
    ActualDataRateDown(u32),
    MinDataRateUp(u32),
    MinDataRateDown(u32),
    AttainableDataRateUp(u32),
    AttainableDataRateDown(u32),
    InterleavingDelayUp(u32),
    InterleavingDelayDown(u32),
    CircuitId(String),
    RemoteId(String),
}

/// One accounting event.
#[derive(Debug, Clone, PartialEq)]
pub struct AcctRecord {
    pub status: AcctStatus,
    pub attrs: Vec<AcctAttr>,
}

impl AcctRecord {
    /// Append the DSL-Forum line attributes the carrier knows.
    pub fn with_line_info(mut self, line: &LineInfo) -> Self {
        let attrs = &mut self.attrs;
        if let Some(v) = line.actual_rate_up {
            attrs.push(AcctAttr::ActualDataRateUp(v));
        }
        if let Some(v) = line.actual_rate_down {
            attrs.push(AcctAttr::ActualDataRateDown(v));
        }
        if let Some(v) = line.min_rate_up {
            attrs.push(AcctAttr::MinDataRateUp(v));
        }
        if let Some(v) = line.min_rate_down {
            attrs.push(AcctAttr::MinDataRateDown(v));
        }
        if let Some(v) = line.attainable_rate_up {
            attrs.push(AcctAttr::AttainableDataRateUp(v));
        }
        if let Some(v) = line.attainable_rate_down {
            attrs.push(AcctAttr::AttainableDataRateDown(v));
        }
        if let Some(v) = line.interleaving_delay_up {
            attrs.push(AcctAttr::InterleavingDelayUp(v));
        }
        if let Some(v) = line.interleaving_delay_down {
            attrs.push(AcctAttr::InterleavingDelayDown(v));
        }
        if let Some(ref v) = line.circuit_id {
            attrs.push(AcctAttr::CircuitId(v.clone()));
        }
        if let Some(ref v) = line.remote_id {
            attrs.push(AcctAttr::RemoteId(v.clone()));
        }
        self
    }

    /// First UserName attribute, if any.
    pub fn user_name(&self) -> Option<&str> {
        self.attrs.iter().find_map(|a| match a {
            AcctAttr::UserName(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// Receiver of accounting records. Implementations hand the record off to a
/// worker (RADIUS client, log, test recorder) without back-pressure.
pub trait AccountingSink {
    fn emit(&self, record: AcctRecord);
}

/// Sink that writes records to the log. The default for the daemon when no
/// accounting server is configured.
#[derive(Debug, Default)]
pub struct LogSink;

impl AccountingSink for LogSink {
    fn emit(&self, record: AcctRecord) {
        info!(
            "accounting {:?} user={} attrs={:?}",
            record.status,
            record.user_name().unwrap_or("-"),
            record.attrs
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_info_attrs_appended() {
        let line = LineInfo {
            actual_rate_up: Some(1024),
            actual_rate_down: Some(16384),
            circuit_id: Some("dslam1 atm 3/0".into()),
            ..LineInfo::default()
        };

        let record = AcctRecord {
            status: AcctStatus::Start,
            attrs: vec![AcctAttr::UserName("alice".into())],
        }
        .with_line_info(&line);

        assert!(record.attrs.contains(&AcctAttr::ActualDataRateUp(1024)));
        assert!(record.attrs.contains(&AcctAttr::ActualDataRateDown(16384)));
        assert!(record
            .attrs
            .contains(&AcctAttr::CircuitId("dslam1 atm 3/0".into())));
        assert_eq!(record.user_name(), Some("alice"));
    }
}

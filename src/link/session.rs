//! Link orchestrator - RFC 1661 section 3
//!
//! Walks one PPP session through Establish, Authenticate, Network and
//! Terminate. Owns the LCP automaton, starts the PAP driver and the IPCP
//! automaton when their phases arrive, enforces the per-phase packet filter,
//! and emits accounting records. Pure state machine: time is injected, I/O
//! goes through the transport and sink traits.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{merge_session_opts, Config, SessionOpts};
use crate::protocol::cp::{CpBody, CpPacket};
use crate::protocol::ipcp as ipcp_proto;
use crate::protocol::lcp::{AuthProto, LcpOpt};
use crate::protocol::pap as pap_proto;
use crate::protocol::ppp::PppFrame;
use crate::telemetry::LinkStats;

use super::accounting::{
    AccountingSink, AcctAttr, AcctRecord, AcctStatus, FRAMED_PROTOCOL_PPP, SERVICE_TYPE_FRAMED,
};
use super::automaton::{Automaton, AutomatonConfig, Effects, Signal};
use super::ipcp::{address_in, IpcpPolicy};
use super::lcp::{auth_in, mru_in, LcpPolicy};
use super::pap::{AuthDirection, AuthOutcome, CredentialProvider, PapDriver, PapEffects};
use super::transport::Transport;

/// Link phase. Dead doubles as the terminal state after teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Dead,
    Establish,
    Auth,
    Network,
    Terminating,
}

/// One PPP session over one transport.
pub struct Link<T: Transport, C: CredentialProvider, A: AccountingSink> {
    config: Config,
    transport: T,
    creds: C,
    acct: A,
    stats: Arc<LinkStats>,

    phase: Phase,
    lcp: Automaton<LcpPolicy>,
    pap: Option<PapDriver>,
    ipcp: Option<Automaton<IpcpPolicy>>,

    auth_pending: HashSet<AuthDirection>,
    peer_id: Vec<u8>,
    session_opts: SessionOpts,

    session_start: Option<Instant>,
    interim_interval: Duration,
    interim_deadline: Option<Instant>,

    framed_ip: Option<std::net::Ipv4Addr>,
    acct_started: bool,
    acct_stopped: bool,

    reject_id: u8,
    inbound_ipv4: Vec<Vec<u8>>,
    dead_for_good: bool,
}

impl<T: Transport, C: CredentialProvider, A: AccountingSink> Link<T, C, A> {
    pub fn new(config: Config, transport: T, creds: C, acct: A, stats: Arc<LinkStats>) -> Self {
        let lcp = Automaton::new(
            LcpPolicy::new(&config.link),
            AutomatonConfig {
                link_extensions: true,
                ..AutomatonConfig::default()
            },
        );
        let session_opts = config.base_session_opts();
        let interim_interval = Duration::from_secs(u64::from(config.link.interim_accounting));

        Self {
            config,
            transport,
            creds,
            acct,
            stats,
            phase: Phase::Dead,
            lcp,
            pap: None,
            ipcp: None,
            auth_pending: HashSet::new(),
            peer_id: Vec::new(),
            session_opts,
            session_start: None,
            interim_interval,
            interim_deadline: None,
            framed_ip: None,
            acct_started: false,
            acct_stopped: false,
            reject_id: 0,
            inbound_ipv4: Vec::new(),
            dead_for_good: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The link has torn down its transport and will process nothing more.
    pub fn is_finished(&self) -> bool {
        self.dead_for_good
    }

    /// IPv4 payloads received in Network phase, for the upward sink.
    pub fn drain_ipv4(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.inbound_ipv4)
    }

    /// Bring the link up: the transport exists, LCP may negotiate.
    pub fn start(&mut self, now: Instant) {
        info!("link: starting, entering Establish phase");
        self.phase = Phase::Establish;
        let open = self.lcp.open(now);
        self.process_lcp_effects(open, now);
        let up = self.lcp.up(now);
        self.process_lcp_effects(up, now);
    }

    /// Administrative shutdown.
    pub fn stop(&mut self, now: Instant) {
        if matches!(self.phase, Phase::Dead | Phase::Terminating) {
            return;
        }
        self.phase = Phase::Terminating;
        let effects = self.lcp.close(now, "User request");
        self.process_lcp_effects(effects, now);
    }

    /// One received PPP payload (Protocol field onward).
    pub fn handle_packet(&mut self, buf: &[u8], now: Instant) {
        if self.phase == Phase::Dead {
            return;
        }

        self.stats.rx_packets.inc();
        self.stats.rx_octets.add(buf.len() as u64);

        let frame = match PppFrame::decode(buf) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("link: dropping malformed frame: {}", e);
                self.stats.rx_malformed.inc();
                return;
            }
        };

        match frame {
            PppFrame::Lcp(packet) => self.handle_lcp(packet, now),
            PppFrame::Pap(packet) => {
                let effects = match &mut self.pap {
                    Some(driver) if self.phase == Phase::Auth => {
                        driver.handle(packet, &self.creds, now)
                    }
                    _ => {
                        self.discard("PAP outside Auth phase");
                        return;
                    }
                };
                self.process_pap_effects(effects, now);
            }
            PppFrame::Chap(_) => {
                self.discard("CHAP has no driver");
            }
            PppFrame::Ipcp(bytes) => {
                if self.phase != Phase::Network {
                    self.discard("IPCP outside Network phase");
                    return;
                }
                let Some(fsm) = &mut self.ipcp else {
                    self.discard("IPCP without an automaton");
                    return;
                };
                let packet = match CpPacket::decode(&bytes) {
                    Ok(packet) => packet,
                    Err(e) => {
                        debug!("link: dropping malformed IPCP frame: {}", e);
                        self.stats.rx_malformed.inc();
                        return;
                    }
                };
                let effects = fsm.handle(packet, now);
                self.process_ipcp_effects(effects, now);
            }
            PppFrame::Ipv4(payload) => {
                if self.phase == Phase::Network {
                    self.inbound_ipv4.push(payload);
                } else {
                    self.discard("IPv4 outside Network phase");
                }
            }
            PppFrame::Unknown { protocol, payload } => {
                if self.phase == Phase::Network {
                    self.protocol_reject(protocol, payload, now);
                } else {
                    self.discard("unknown protocol outside Network phase");
                }
            }
        }
    }

    /// Clock service: restart timers, PAP retransmission, interim accounting.
    pub fn tick(&mut self, now: Instant) {
        if self.phase == Phase::Dead {
            return;
        }

        let effects = self.lcp.tick(now);
        self.process_lcp_effects(effects, now);

        if let Some(driver) = &mut self.pap {
            let effects = driver.tick(now);
            self.process_pap_effects(effects, now);
        }

        if let Some(fsm) = &mut self.ipcp {
            let effects = fsm.tick(now);
            self.process_ipcp_effects(effects, now);
        }

        self.tick_interim(now);
    }

    fn discard(&self, what: &str) {
        debug!("link: discarding {} in {:?}", what, self.phase);
        self.stats.rx_discarded.inc();
    }

    fn send_frame(&mut self, frame: PppFrame) {
        let bytes = frame.encode();
        self.stats.tx_packets.inc();
        self.stats.tx_octets.add(bytes.len() as u64);
        self.transport.send(&bytes);
    }

    // ------------------------------------------------------------------
    // LCP

    fn handle_lcp(&mut self, packet: CpPacket<LcpOpt>, now: Instant) {
        // Protocol-Reject names another protocol on this link; route it.
        if let CpBody::ProtocolReject { protocol, .. } = &packet.body {
            match *protocol {
                ipcp_proto::PROTOCOL => {
                    if let Some(fsm) = &mut self.ipcp {
                        warn!("link: peer protocol-rejected IPCP");
                        let effects = fsm.protocol_rejected(now);
                        self.process_ipcp_effects(effects, now);
                    }
                    return;
                }
                pap_proto::PROTOCOL => {
                    warn!("link: peer protocol-rejected PAP");
                    if self.phase == Phase::Auth {
                        self.auth_failed(AuthDirection::UsToPeer, now);
                    }
                    return;
                }
                crate::protocol::lcp::PROTOCOL => {
                    // Rejecting LCP itself falls through to the automaton
                    // as a catastrophic RXJ.
                }
                other => {
                    debug!("link: peer protocol-rejected 0x{:04x}, ignoring", other);
                    return;
                }
            }
        }

        let effects = self.lcp.handle(packet, now);
        self.process_lcp_effects(effects, now);
    }

    fn process_lcp_effects(&mut self, effects: Effects<LcpOpt>, now: Instant) {
        for packet in effects.sends {
            self.send_frame(PppFrame::Lcp(packet));
        }
        for signal in effects.signals {
            match signal {
                Signal::Up { ours, peers } => self.lcp_up(ours, peers, now),
                Signal::Down => self.lcp_down(now),
                Signal::Started => {}
                Signal::Finished => self.lcp_finished(now),
            }
        }
    }

    fn lcp_up(&mut self, ours: Vec<LcpOpt>, peers: Vec<LcpOpt>, now: Instant) {
        let verify_with = auth_in(&ours);
        let prove_with = auth_in(&peers);

        info!(
            "link: LCP opened (verify_peer={:?}, prove_ourselves={:?})",
            verify_with, prove_with
        );

        if verify_with.is_none() && prove_with.is_none() {
            self.np_open(now);
            return;
        }

        // Only PAP has a driver. A CHAP/EAP agreement cannot complete, so
        // the link closes rather than hang in Auth forever.
        if matches!(verify_with, Some(proto) if proto != AuthProto::Pap) {
            warn!("link: negotiated authenticator {:?} has no driver", verify_with);
            self.close_link("Authentication failed", now);
            return;
        }
        if matches!(prove_with, Some(proto) if proto != AuthProto::Pap) {
            warn!("link: peer demands {:?}, which we cannot speak", prove_with);
            self.close_link("Failed to authenticate ourselves to peer", now);
            return;
        }

        self.auth_pending.clear();
        if verify_with.is_some() {
            self.auth_pending.insert(AuthDirection::PeerToUs);
        }
        let prove = if prove_with.is_some() {
            match (&self.config.link.our_username, &self.config.link.our_password) {
                (Some(name), Some(secret)) => {
                    self.auth_pending.insert(AuthDirection::UsToPeer);
                    Some((name.clone(), secret.clone()))
                }
                _ => {
                    warn!("link: peer wants authentication but we have no credentials");
                    self.close_link("Failed to authenticate ourselves to peer", now);
                    return;
                }
            }
        } else {
            None
        };

        self.phase = Phase::Auth;
        let mut driver = PapDriver::new(verify_with.is_some(), prove);
        let effects = driver.start(now);
        self.pap = Some(driver);
        self.process_pap_effects(effects, now);
    }

    fn lcp_down(&mut self, now: Instant) {
        info!("link: LCP down, back to Establish");
        if self.phase == Phase::Network {
            self.emit_stop("LCP down", now);
        }
        if let Some(fsm) = &mut self.ipcp {
            // Lower layer vanished under the NCP.
            let _ = fsm.down();
        }
        self.ipcp = None;
        self.pap = None;
        self.auth_pending.clear();
        self.session_start = None;
        self.interim_deadline = None;
        self.framed_ip = None;
        // A fresh negotiation cycle accounts as a fresh session.
        self.acct_started = false;
        self.acct_stopped = false;
        if self.phase != Phase::Terminating {
            self.phase = Phase::Establish;
        }
    }

    fn lcp_finished(&mut self, now: Instant) {
        info!("link: LCP finished, tearing down");
        self.emit_stop("LCP terminated", now);
        self.transport.terminate();
        self.interim_deadline = None;
        self.dead_for_good = true;
        self.phase = Phase::Dead;
    }

    fn close_link(&mut self, reason: &str, now: Instant) {
        self.phase = Phase::Terminating;
        self.pap = None;
        self.interim_deadline = None;
        let effects = self.lcp.close(now, reason);
        self.process_lcp_effects(effects, now);
    }

    fn protocol_reject(&mut self, protocol: u16, payload: Vec<u8>, now: Instant) {
        if !self.lcp.is_opened() {
            self.discard("unknown protocol before LCP opened");
            return;
        }

        // The rejected-information field must fit the peer's MRU.
        let mru = mru_in(self.lcp.his_opts()).unwrap_or(1500) as usize;
        let budget = mru.saturating_sub(8);
        let mut data = payload;
        data.truncate(budget);

        self.reject_id = self.reject_id.wrapping_add(1);
        debug!("link: protocol-rejecting 0x{:04x}", protocol);
        self.send_frame(PppFrame::Lcp(CpPacket {
            identifier: self.reject_id,
            body: CpBody::ProtocolReject {
                protocol,
                data,
            },
        }));
    }

    // ------------------------------------------------------------------
    // Authentication

    fn process_pap_effects(&mut self, effects: PapEffects, now: Instant) {
        for packet in effects.sends {
            self.send_frame(PppFrame::Pap(packet));
        }
        for outcome in effects.outcomes {
            match outcome {
                AuthOutcome::Success {
                    direction,
                    peer_id,
                    session_opts,
                } => {
                    self.auth_pending.remove(&direction);
                    if direction == AuthDirection::PeerToUs {
                        self.peer_id = peer_id;
                        self.session_opts =
                            merge_session_opts(&self.config.base_session_opts(), &session_opts);
                    }
                    if self.auth_pending.is_empty() && self.phase == Phase::Auth {
                        self.np_open(now);
                    }
                }
                AuthOutcome::Fail { direction, message } => {
                    debug!("link: authentication failed ({:?}): {}", direction, message);
                    self.auth_failed(direction, now);
                }
            }
        }
    }

    fn auth_failed(&mut self, direction: AuthDirection, now: Instant) {
        let reason = match direction {
            AuthDirection::PeerToUs => "Authentication failed",
            AuthDirection::UsToPeer => "Failed to authenticate ourselves to peer",
        };
        self.auth_pending.remove(&direction);
        self.close_link(reason, now);
    }

    // ------------------------------------------------------------------
    // Network

    fn np_open(&mut self, now: Instant) {
        info!("link: entering Network phase");
        self.phase = Phase::Network;
        self.pap = None;

        // Per-user overrides may retune the interim interval.
        self.interim_interval = self
            .session_opts
            .get("interim_accounting")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.interim_interval);
        self.session_start = Some(now);
        self.interim_deadline = Some(now + self.interim_interval);

        let policy = IpcpPolicy::new(&self.config.ipcp, &self.session_opts);
        let mut fsm = Automaton::new(policy, AutomatonConfig::default());
        let open = fsm.open(now);
        let up = fsm.up(now);
        self.ipcp = Some(fsm);
        self.process_ipcp_effects(open, now);
        self.process_ipcp_effects(up, now);
    }

    fn process_ipcp_effects(
        &mut self,
        effects: Effects<crate::protocol::ipcp::IpcpOpt>,
        now: Instant,
    ) {
        for packet in effects.sends {
            self.send_frame(PppFrame::Ipcp(packet.encode()));
        }
        for signal in effects.signals {
            match signal {
                Signal::Up { ours, peers } => self.ipcp_up(&ours, &peers, now),
                Signal::Down | Signal::Finished => self.np_finished(now),
                Signal::Started => {}
            }
        }
    }

    fn ipcp_up(
        &mut self,
        ours: &[crate::protocol::ipcp::IpcpOpt],
        peers: &[crate::protocol::ipcp::IpcpOpt],
        _now: Instant,
    ) {
        let (our_ip, his_ip) = match self.ipcp.as_ref() {
            Some(fsm) => {
                let policy = fsm.policy();
                (
                    address_in(ours).unwrap_or_else(|| policy.our_ip()),
                    address_in(peers).unwrap_or_else(|| policy.peer_ip()),
                )
            }
            None => return,
        };

        info!("link: IPCP opened, our_ip={} peer_ip={}", our_ip, his_ip);
        self.framed_ip = Some(his_ip);

        if !self.acct_started {
            self.acct_started = true;
            let mut attrs = self.base_attrs();
            attrs.push(AcctAttr::FramedIpAddress(his_ip));
            let record = AcctRecord {
                status: AcctStatus::Start,
                attrs,
            };
            let record = match self.transport.line_info() {
                Some(line) => record.with_line_info(&line),
                None => record,
            };
            self.acct.emit(record);
        }
    }

    fn np_finished(&mut self, now: Instant) {
        if self.phase != Phase::Network {
            return;
        }
        info!("link: no network protocols running, closing");
        self.emit_stop("IPCP down", now);
        self.interim_deadline = None;
        self.close_link("No network protocols running", now);
    }

    // ------------------------------------------------------------------
    // Accounting

    fn base_attrs(&self) -> Vec<AcctAttr> {
        let username = self
            .session_opts
            .get("username")
            .cloned()
            .unwrap_or_else(|| {
                if self.peer_id.is_empty() {
                    "unknown".to_string()
                } else {
                    String::from_utf8_lossy(&self.peer_id).into_owned()
                }
            });

        vec![
            AcctAttr::UserName(username),
            AcctAttr::NasIdentifier(self.config.accounting.nas_identifier.clone()),
            AcctAttr::ServiceType(SERVICE_TYPE_FRAMED),
            AcctAttr::FramedProtocol(FRAMED_PROTOCOL_PPP),
        ]
    }

    fn session_time(&self, now: Instant) -> u32 {
        self.session_start
            .map(|start| now.duration_since(start).as_secs() as u32)
            .unwrap_or(0)
    }

    fn volume_attrs(&self) -> Vec<AcctAttr> {
        let counters = self.transport.counters();
        vec![
            AcctAttr::InputOctets(counters.in_octets),
            AcctAttr::OutputOctets(counters.out_octets),
            AcctAttr::InputPackets(counters.in_packets),
            AcctAttr::OutputPackets(counters.out_packets),
        ]
    }

    fn tick_interim(&mut self, now: Instant) {
        if self.phase != Phase::Network {
            return;
        }
        let Some(deadline) = self.interim_deadline else {
            return;
        };
        if now < deadline {
            return;
        }
        let Some(start) = self.session_start else {
            return;
        };

        let mut attrs = self.base_attrs();
        attrs.push(AcctAttr::SessionTime(self.session_time(now)));
        if let Some(ip) = self.framed_ip {
            attrs.push(AcctAttr::FramedIpAddress(ip));
        }
        attrs.extend(self.volume_attrs());
        self.acct.emit(AcctRecord {
            status: AcctStatus::Interim,
            attrs,
        });

        // Reschedule compensated for drift: the next fire lands on the
        // interval grid counted from session start, not from `now`.
        let elapsed = now.duration_since(start);
        let interval = self.interim_interval.as_millis().max(1) as u64;
        let into_period = (elapsed.as_millis() as u64) % interval;
        let next = Duration::from_millis(interval - into_period);
        self.interim_deadline = Some(now + next);
    }

    fn emit_stop(&mut self, cause: &str, now: Instant) {
        if !self.acct_started || self.acct_stopped {
            return;
        }
        self.acct_stopped = true;

        let mut attrs = self.base_attrs();
        attrs.push(AcctAttr::SessionTime(self.session_time(now)));
        if let Some(ip) = self.framed_ip {
            attrs.push(AcctAttr::FramedIpAddress(ip));
        }
        attrs.extend(self.volume_attrs());
        attrs.push(AcctAttr::TerminateCause(cause.to_string()));
        self.acct.emit(AcctRecord {
            status: AcctStatus::Stop,
            attrs,
        });
    }
}

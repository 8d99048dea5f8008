//! Option negotiation automaton - RFC 1661 section 4
//!
//! One state machine drives every control protocol on the link; the pieces
//! that differ per protocol (which options to ask for, how to judge the
//! peer's request) plug in through [`OptionPolicy`]. The machine performs no
//! I/O: every event handler returns the packets to transmit and the layer
//! signals for the owner, and time enters only through `Instant` arguments.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::protocol::cp::{codes, CpBody, CpPacket, OptionCodec};

/// Default Restart timer interval.
pub const DEFAULT_RESTART_INTERVAL: Duration = Duration::from_secs(3);
/// Default Max-Terminate.
pub const DEFAULT_MAX_TERMINATE: u32 = 2;
/// Default Max-Configure.
pub const DEFAULT_MAX_CONFIGURE: u32 = 10;
/// Default Max-Failure.
pub const DEFAULT_MAX_FAILURE: u32 = 5;

/// Automaton states as named by RFC 1661 section 4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    #[default]
    Initial,
    Starting,
    Closed,
    Stopped,
    Closing,
    Stopping,
    ReqSent,
    AckRcvd,
    AckSent,
    Opened,
}

/// Result of judging a peer Configure-Request, in the order the reply is
/// chosen: any rejects force a Configure-Reject, else any naks force a
/// Configure-Nak, else everything was acceptable.
#[derive(Debug)]
pub struct Classified<O> {
    pub ack: Vec<O>,
    pub nak: Vec<O>,
    pub reject: Vec<O>,
}

impl<O> Default for Classified<O> {
    fn default() -> Self {
        Self {
            ack: Vec::new(),
            nak: Vec::new(),
            reject: Vec::new(),
        }
    }
}

impl<O> Classified<O> {
    pub fn is_acceptable(&self) -> bool {
        self.nak.is_empty() && self.reject.is_empty()
    }
}

/// Per-protocol negotiation behavior plugged into the automaton.
pub trait OptionPolicy {
    type Opt: OptionCodec;

    /// PPP protocol number, for logging and Protocol-Reject bookkeeping.
    fn protocol(&self) -> u16;

    /// Short protocol name for the logs.
    fn name(&self) -> &'static str;

    /// The options we currently want the peer to acknowledge.
    fn request(&mut self) -> Vec<Self::Opt>;

    /// Judge a peer Configure-Request.
    fn classify(&mut self, request: &[Self::Opt]) -> Classified<Self::Opt>;

    /// The peer naked these options of our request; update our desire.
    fn nak_received(&mut self, options: &[Self::Opt]);

    /// The peer rejected these options of our request; update our desire.
    fn reject_received(&mut self, options: &[Self::Opt]);
}

/// Layer signal to the automaton's owner.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal<O> {
    /// This-Layer-Up: negotiation converged. `ours` is what the peer
    /// acknowledged for us, `peers` what we acknowledged for the peer.
    Up { ours: Vec<O>, peers: Vec<O> },
    /// This-Layer-Down: leaving Opened.
    Down,
    /// This-Layer-Started: the lower layer should be brought up.
    Started,
    /// This-Layer-Finished: negotiation is over for good (or until the next
    /// administrative Open).
    Finished,
}

/// Everything one event handler wants done: packets out, signals up.
#[derive(Debug)]
pub struct Effects<O> {
    pub sends: Vec<CpPacket<O>>,
    pub signals: Vec<Signal<O>>,
}

impl<O> Default for Effects<O> {
    fn default() -> Self {
        Self {
            sends: Vec::new(),
            signals: Vec::new(),
        }
    }
}

impl<O> Effects<O> {
    fn merge(&mut self, mut other: Effects<O>) {
        self.sends.append(&mut other.sends);
        self.signals.append(&mut other.signals);
    }
}

/// Tunables for one automaton instance.
#[derive(Debug, Clone)]
pub struct AutomatonConfig {
    pub restart_interval: Duration,
    pub max_terminate: u32,
    pub max_configure: u32,
    pub max_failure: u32,
    /// Whether this protocol understands the LCP-only codes (Echo,
    /// Discard-Request, Identification, Time-Remaining, Protocol-Reject).
    /// NCPs answer them with a Code-Reject instead.
    pub link_extensions: bool,
}

impl Default for AutomatonConfig {
    fn default() -> Self {
        Self {
            restart_interval: DEFAULT_RESTART_INTERVAL,
            max_terminate: DEFAULT_MAX_TERMINATE,
            max_configure: DEFAULT_MAX_CONFIGURE,
            max_failure: DEFAULT_MAX_FAILURE,
            link_extensions: false,
        }
    }
}

/// The RFC 1661 option negotiation automaton.
#[derive(Debug)]
pub struct Automaton<P: OptionPolicy> {
    policy: P,
    config: AutomatonConfig,

    state: State,

    restart_counter: u32,
    failure_counter: u32,
    deadline: Option<Instant>,

    configure_id: u8,
    terminate_id: u8,

    last_request: Vec<P::Opt>,
    our_opts: Vec<P::Opt>,
    his_opts: Vec<P::Opt>,

    close_reason: Vec<u8>,
}

impl<P: OptionPolicy> Automaton<P> {
    pub fn new(policy: P, config: AutomatonConfig) -> Self {
        Self {
            policy,
            config,
            state: State::default(),
            restart_counter: 0,
            failure_counter: 0,
            deadline: None,
            configure_id: 0,
            terminate_id: 0,
            last_request: Vec::new(),
            our_opts: Vec::new(),
            his_opts: Vec::new(),
            close_reason: Vec::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_opened(&self) -> bool {
        self.state == State::Opened
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    /// Options the peer has acknowledged for us.
    pub fn our_opts(&self) -> &[P::Opt] {
        &self.our_opts
    }

    /// Options we have acknowledged for the peer.
    pub fn his_opts(&self) -> &[P::Opt] {
        &self.his_opts
    }

    fn set_state(&mut self, next: State) {
        if next != self.state {
            trace!("{}: {:?} -> {:?}", self.policy.name(), self.state, next);
            self.state = next;
        }
    }

    fn start_timer(&mut self, now: Instant) {
        self.deadline = Some(now + self.config.restart_interval);
    }

    fn stop_timer(&mut self) {
        self.deadline = None;
    }

    // irc for a Configure exchange
    fn init_configure(&mut self) {
        self.restart_counter = self.config.max_configure;
        self.failure_counter = self.config.max_failure;
    }

    // irc for a Terminate exchange
    fn init_terminate(&mut self) {
        self.restart_counter = self.config.max_terminate;
    }

    // scr: send a Configure-Request and charge the restart counter. A fresh
    // identifier is taken whenever the request is new rather than a timeout
    // retransmission.
    fn send_configure_request(&mut self, now: Instant, fresh: bool) -> Effects<P::Opt> {
        if fresh {
            self.configure_id = self.configure_id.wrapping_add(1);
        }
        self.last_request = self.policy.request();
        self.restart_counter = self.restart_counter.saturating_sub(1);
        self.start_timer(now);

        debug!(
            "{}: sending Configure-Request id={}",
            self.policy.name(),
            self.configure_id
        );

        Effects {
            sends: vec![CpPacket {
                identifier: self.configure_id,
                body: CpBody::ConfigureRequest(self.last_request.clone()),
            }],
            signals: Vec::new(),
        }
    }

    // str
    fn send_terminate_request(&mut self, now: Instant) -> Effects<P::Opt> {
        self.terminate_id = self.terminate_id.wrapping_add(1);
        self.restart_counter = self.restart_counter.saturating_sub(1);
        self.start_timer(now);

        Effects {
            sends: vec![CpPacket {
                identifier: self.terminate_id,
                body: CpBody::TerminateRequest(self.close_reason.clone()),
            }],
            signals: Vec::new(),
        }
    }

    // sta
    fn send_terminate_ack(&self, identifier: u8) -> Effects<P::Opt> {
        Effects {
            sends: vec![CpPacket {
                identifier,
                body: CpBody::TerminateAck(Vec::new()),
            }],
            signals: Vec::new(),
        }
    }

    // sca
    fn send_configure_ack(&mut self, identifier: u8, options: Vec<P::Opt>) -> Effects<P::Opt> {
        self.his_opts = options.clone();
        Effects {
            sends: vec![CpPacket {
                identifier,
                body: CpBody::ConfigureAck(options),
            }],
            signals: Vec::new(),
        }
    }

    // scn: Configure-Reject wins over Configure-Nak; naking past Max-Failure
    // turns the remaining naks into rejects so a stubborn peer converges.
    fn send_configure_nak(
        &mut self,
        identifier: u8,
        classified: Classified<P::Opt>,
    ) -> Effects<P::Opt> {
        let body = if !classified.reject.is_empty() {
            CpBody::ConfigureReject(classified.reject)
        } else if self.failure_counter > 0 {
            self.failure_counter -= 1;
            CpBody::ConfigureNak(classified.nak)
        } else {
            debug!(
                "{}: Max-Failure exhausted, rejecting instead of naking",
                self.policy.name()
            );
            CpBody::ConfigureReject(classified.nak)
        };

        Effects {
            sends: vec![CpPacket { identifier, body }],
            signals: Vec::new(),
        }
    }

    // scj
    fn send_code_reject(&self, rejected: CpPacket<P::Opt>) -> Effects<P::Opt> {
        Effects {
            sends: vec![CpPacket {
                identifier: rejected.identifier,
                body: CpBody::CodeReject(rejected.encode()),
            }],
            signals: Vec::new(),
        }
    }

    fn signal(signal: Signal<P::Opt>) -> Effects<P::Opt> {
        Effects {
            sends: Vec::new(),
            signals: vec![signal],
        }
    }

    fn this_layer_up(&self) -> Effects<P::Opt> {
        Self::signal(Signal::Up {
            ours: self.our_opts.clone(),
            peers: self.his_opts.clone(),
        })
    }

    /// Up event: the lower layer is available.
    pub fn up(&mut self, now: Instant) -> Effects<P::Opt> {
        match self.state {
            State::Initial => {
                self.set_state(State::Closed);
                Effects::default()
            }
            State::Starting => {
                self.init_configure();
                let effects = self.send_configure_request(now, true);
                self.set_state(State::ReqSent);
                effects
            }
            _ => Effects::default(),
        }
    }

    /// Down event: the lower layer is gone.
    pub fn down(&mut self) -> Effects<P::Opt> {
        self.stop_timer();
        match self.state {
            State::Closed => {
                self.set_state(State::Initial);
                Effects::default()
            }
            State::Stopped => {
                self.set_state(State::Starting);
                Self::signal(Signal::Started)
            }
            State::Closing => {
                self.set_state(State::Initial);
                Effects::default()
            }
            State::Stopping | State::ReqSent | State::AckRcvd | State::AckSent => {
                self.set_state(State::Starting);
                Effects::default()
            }
            State::Opened => {
                self.set_state(State::Starting);
                Self::signal(Signal::Down)
            }
            State::Initial | State::Starting => Effects::default(),
        }
    }

    /// Administrative Open.
    pub fn open(&mut self, now: Instant) -> Effects<P::Opt> {
        match self.state {
            State::Initial => {
                self.set_state(State::Starting);
                Self::signal(Signal::Started)
            }
            State::Closed => {
                self.init_configure();
                let effects = self.send_configure_request(now, true);
                self.set_state(State::ReqSent);
                effects
            }
            State::Closing => {
                self.set_state(State::Stopping);
                Effects::default()
            }
            _ => Effects::default(),
        }
    }

    /// Administrative Close. `reason` rides in the Terminate-Request data.
    pub fn close(&mut self, now: Instant, reason: &str) -> Effects<P::Opt> {
        match self.state {
            State::Starting => {
                self.set_state(State::Initial);
                Self::signal(Signal::Finished)
            }
            State::Stopped => {
                self.set_state(State::Closed);
                Effects::default()
            }
            State::Stopping => {
                self.set_state(State::Closing);
                Effects::default()
            }
            State::ReqSent | State::AckRcvd | State::AckSent => {
                self.close_reason = reason.as_bytes().to_vec();
                self.init_terminate();
                let effects = self.send_terminate_request(now);
                self.set_state(State::Closing);
                effects
            }
            State::Opened => {
                self.close_reason = reason.as_bytes().to_vec();
                let mut effects = Self::signal(Signal::Down);
                self.init_terminate();
                effects.merge(self.send_terminate_request(now));
                self.set_state(State::Closing);
                effects
            }
            State::Initial | State::Closed | State::Closing => Effects::default(),
        }
    }

    /// Restart timer service; call on every clock tick.
    pub fn tick(&mut self, now: Instant) -> Effects<P::Opt> {
        let Some(deadline) = self.deadline else {
            return Effects::default();
        };
        if now < deadline {
            return Effects::default();
        }

        match self.state {
            State::Closing | State::Stopping => {
                if self.restart_counter > 0 {
                    self.send_terminate_request(now)
                } else {
                    // TO-
                    self.stop_timer();
                    let next = if self.state == State::Closing {
                        State::Closed
                    } else {
                        State::Stopped
                    };
                    self.set_state(next);
                    Self::signal(Signal::Finished)
                }
            }
            State::ReqSent | State::AckRcvd | State::AckSent => {
                if self.restart_counter > 0 {
                    let effects = self.send_configure_request(now, false);
                    if self.state == State::AckRcvd {
                        self.set_state(State::ReqSent);
                    }
                    effects
                } else {
                    // TO-: negotiation never converged
                    self.stop_timer();
                    self.set_state(State::Stopped);
                    Self::signal(Signal::Finished)
                }
            }
            _ => {
                self.stop_timer();
                Effects::default()
            }
        }
    }

    /// The link received a Protocol-Reject naming this protocol (RXJ-).
    pub fn protocol_rejected(&mut self, now: Instant) -> Effects<P::Opt> {
        self.rxj_bad(now)
    }

    /// Feed a received packet of this protocol into the automaton.
    pub fn handle(&mut self, packet: CpPacket<P::Opt>, now: Instant) -> Effects<P::Opt> {
        let extension_code = matches!(
            packet.body,
            CpBody::ProtocolReject { .. }
                | CpBody::EchoRequest
                | CpBody::EchoReply
                | CpBody::DiscardRequest
                | CpBody::Identification { .. }
                | CpBody::TimeRemaining { .. }
        );
        if (extension_code && !self.config.link_extensions)
            || matches!(packet.body, CpBody::Unknown { .. })
        {
            // RUC: an NCP does not implement the LCP-only codes, and nobody
            // implements codes outside the table.
            return self.send_code_reject(packet);
        }

        let identifier = packet.identifier;
        match packet.body {
            CpBody::ConfigureRequest(options) => self.rcr(identifier, options, now),
            CpBody::ConfigureAck(_) => self.rca(identifier, now),
            CpBody::ConfigureNak(options) => self.rcn(identifier, &options, true, now),
            CpBody::ConfigureReject(options) => self.rcn(identifier, &options, false, now),
            CpBody::TerminateRequest(_) => self.rtr(identifier, now),
            CpBody::TerminateAck(_) => self.rta(now),
            CpBody::CodeReject(data) => self.rxj(&data, now),
            CpBody::EchoRequest => self.rxr_echo(identifier),
            CpBody::EchoReply
            | CpBody::DiscardRequest
            | CpBody::Identification { .. }
            | CpBody::TimeRemaining { .. } => Effects::default(),
            // Protocol-Reject is routed by the link to the named protocol's
            // automaton as `protocol_rejected`; one that reaches the LCP
            // automaton itself is catastrophic.
            CpBody::ProtocolReject { .. } => self.rxj_bad(now),
            CpBody::Unknown { .. } => unreachable!("handled above"),
        }
    }

    // RCR
    fn rcr(&mut self, identifier: u8, options: Vec<P::Opt>, now: Instant) -> Effects<P::Opt> {
        match self.state {
            State::Closed => self.send_terminate_ack(identifier),
            State::Closing | State::Stopping => Effects::default(),
            State::Stopped | State::ReqSent | State::AckRcvd | State::AckSent | State::Opened => {
                let classified = self.policy.classify(&options);
                let acceptable = classified.is_acceptable();

                let mut effects = Effects::default();

                match self.state {
                    State::Stopped => {
                        self.init_configure();
                        effects.merge(self.send_configure_request(now, true));
                    }
                    State::Opened => {
                        effects.merge(Self::signal(Signal::Down));
                        effects.merge(self.send_configure_request(now, true));
                    }
                    _ => {}
                }

                if acceptable {
                    effects.merge(self.send_configure_ack(identifier, options));
                    let next = match self.state {
                        State::AckRcvd => {
                            effects.merge(self.this_layer_up_after_ack());
                            State::Opened
                        }
                        _ => State::AckSent,
                    };
                    self.set_state(next);
                } else {
                    effects.merge(self.send_configure_nak(identifier, classified));
                    let next = match self.state {
                        State::AckRcvd => State::AckRcvd,
                        State::AckSent | State::Stopped | State::Opened | State::ReqSent => {
                            State::ReqSent
                        }
                        s => s,
                    };
                    self.set_state(next);
                }

                effects
            }
            State::Initial | State::Starting => Effects::default(),
        }
    }

    // tlu ordered after the Ack that completed the exchange
    fn this_layer_up_after_ack(&mut self) -> Effects<P::Opt> {
        self.stop_timer();
        self.this_layer_up()
    }

    // RCA
    fn rca(&mut self, identifier: u8, now: Instant) -> Effects<P::Opt> {
        if matches!(
            self.state,
            State::ReqSent | State::AckRcvd | State::AckSent | State::Opened
        ) && identifier != self.configure_id
        {
            debug!(
                "{}: Configure-Ack id={} does not match pending id={}",
                self.policy.name(),
                identifier,
                self.configure_id
            );
            return Effects::default();
        }

        match self.state {
            State::Closed | State::Stopped => self.send_terminate_ack(identifier),
            State::Closing | State::Stopping => Effects::default(),
            State::ReqSent => {
                self.restart_counter = self.config.max_configure;
                self.our_opts = self.last_request.clone();
                self.set_state(State::AckRcvd);
                Effects::default()
            }
            State::AckRcvd => {
                // Crossed acknowledgement; restart the exchange.
                let effects = self.send_configure_request(now, false);
                self.set_state(State::ReqSent);
                effects
            }
            State::AckSent => {
                self.restart_counter = self.config.max_configure;
                self.our_opts = self.last_request.clone();
                self.stop_timer();
                self.set_state(State::Opened);
                self.this_layer_up()
            }
            State::Opened => {
                let mut effects = Self::signal(Signal::Down);
                effects.merge(self.send_configure_request(now, false));
                self.set_state(State::ReqSent);
                effects
            }
            State::Initial | State::Starting => Effects::default(),
        }
    }

    // RCN: Configure-Nak and Configure-Reject share a row in the table.
    fn rcn(
        &mut self,
        identifier: u8,
        options: &[P::Opt],
        is_nak: bool,
        now: Instant,
    ) -> Effects<P::Opt> {
        if matches!(
            self.state,
            State::ReqSent | State::AckRcvd | State::AckSent | State::Opened
        ) {
            if identifier != self.configure_id {
                return Effects::default();
            }
            if is_nak {
                self.policy.nak_received(options);
            } else {
                self.policy.reject_received(options);
            }
        }

        match self.state {
            State::Closed | State::Stopped => self.send_terminate_ack(identifier),
            State::Closing | State::Stopping => Effects::default(),
            State::ReqSent => {
                self.init_configure();
                self.send_configure_request(now, true)
            }
            State::AckRcvd => {
                let effects = self.send_configure_request(now, false);
                self.set_state(State::ReqSent);
                effects
            }
            State::AckSent => {
                self.init_configure();
                self.send_configure_request(now, true)
            }
            State::Opened => {
                let mut effects = Self::signal(Signal::Down);
                effects.merge(self.send_configure_request(now, false));
                self.set_state(State::ReqSent);
                effects
            }
            State::Initial | State::Starting => Effects::default(),
        }
    }

    // RTR
    fn rtr(&mut self, identifier: u8, now: Instant) -> Effects<P::Opt> {
        match self.state {
            State::Initial | State::Starting => Effects::default(),
            State::Opened => {
                let mut effects = Self::signal(Signal::Down);
                // zrc: let the restart timer expire once, then finish
                self.restart_counter = 0;
                self.start_timer(now);
                effects.merge(self.send_terminate_ack(identifier));
                self.set_state(State::Stopping);
                effects
            }
            State::ReqSent | State::AckRcvd | State::AckSent => {
                let effects = self.send_terminate_ack(identifier);
                self.set_state(State::ReqSent);
                effects
            }
            _ => self.send_terminate_ack(identifier),
        }
    }

    // RTA
    fn rta(&mut self, now: Instant) -> Effects<P::Opt> {
        match self.state {
            State::Closing => {
                self.stop_timer();
                self.set_state(State::Closed);
                Self::signal(Signal::Finished)
            }
            State::Stopping => {
                self.stop_timer();
                self.set_state(State::Stopped);
                Self::signal(Signal::Finished)
            }
            State::AckRcvd => {
                self.set_state(State::ReqSent);
                Effects::default()
            }
            State::Opened => {
                let mut effects = Self::signal(Signal::Down);
                effects.merge(self.send_configure_request(now, false));
                self.set_state(State::ReqSent);
                effects
            }
            _ => Effects::default(),
        }
    }

    // RXJ: a Code-Reject is tolerable when it names a code we can live
    // without; rejecting the negotiation codes themselves is fatal.
    fn rxj(&mut self, rejected: &[u8], now: Instant) -> Effects<P::Opt> {
        let code = rejected.first().copied().unwrap_or(0);
        let catastrophic = (codes::CONFIGURE_REQUEST..=codes::CODE_REJECT).contains(&code);

        if catastrophic {
            self.rxj_bad(now)
        } else {
            // RXJ+
            if self.state == State::AckRcvd {
                self.set_state(State::ReqSent);
            }
            Effects::default()
        }
    }

    fn rxj_bad(&mut self, now: Instant) -> Effects<P::Opt> {
        match self.state {
            State::Opened => {
                let mut effects = Self::signal(Signal::Down);
                self.close_reason.clear();
                self.init_terminate();
                effects.merge(self.send_terminate_request(now));
                self.set_state(State::Stopping);
                effects
            }
            State::Closing | State::Closed => {
                self.stop_timer();
                self.set_state(State::Closed);
                Self::signal(Signal::Finished)
            }
            State::Stopping | State::Stopped | State::ReqSent | State::AckRcvd
            | State::AckSent => {
                self.stop_timer();
                self.set_state(State::Stopped);
                Self::signal(Signal::Finished)
            }
            State::Initial | State::Starting => Effects::default(),
        }
    }

    // RXR: only an Echo-Request in Opened demands a reply.
    fn rxr_echo(&mut self, identifier: u8) -> Effects<P::Opt> {
        if self.state != State::Opened {
            return Effects::default();
        }
        Effects {
            sends: vec![CpPacket {
                identifier,
                body: CpBody::EchoReply,
            }],
            signals: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::cp::codes;

    /// A policy that wants one two-byte option and accepts everything legal.
    #[derive(Debug, Clone, PartialEq)]
    enum TestOpt {
        Word(u16),
        Raw(u8, Vec<u8>),
    }

    impl OptionCodec for TestOpt {
        fn decode(opt_type: u8, value: &[u8]) -> Self {
            match opt_type {
                1 if value.len() == 2 => TestOpt::Word(u16::from_be_bytes([value[0], value[1]])),
                _ => TestOpt::Raw(opt_type, value.to_vec()),
            }
        }

        fn raw(opt_type: u8, value: Vec<u8>) -> Self {
            TestOpt::Raw(opt_type, value)
        }

        fn encode(&self) -> (u8, Vec<u8>) {
            match self {
                TestOpt::Word(w) => (1, w.to_be_bytes().to_vec()),
                TestOpt::Raw(t, v) => (*t, v.clone()),
            }
        }
    }

    struct TestPolicy {
        want: u16,
    }

    impl OptionPolicy for TestPolicy {
        type Opt = TestOpt;

        fn protocol(&self) -> u16 {
            0xc021
        }

        fn name(&self) -> &'static str {
            "test"
        }

        fn request(&mut self) -> Vec<TestOpt> {
            vec![TestOpt::Word(self.want)]
        }

        fn classify(&mut self, request: &[TestOpt]) -> Classified<TestOpt> {
            let mut classified = Classified::default();
            for opt in request {
                match opt {
                    TestOpt::Word(0) => classified.nak.push(TestOpt::Word(100)),
                    TestOpt::Word(_) => classified.ack.push(opt.clone()),
                    TestOpt::Raw(..) => classified.reject.push(opt.clone()),
                }
            }
            classified
        }

        fn nak_received(&mut self, options: &[TestOpt]) {
            if let Some(TestOpt::Word(w)) = options.first() {
                self.want = *w;
            }
        }

        fn reject_received(&mut self, _options: &[TestOpt]) {}
    }

    fn automaton() -> Automaton<TestPolicy> {
        Automaton::new(
            TestPolicy { want: 1492 },
            AutomatonConfig {
                link_extensions: true,
                ..AutomatonConfig::default()
            },
        )
    }

    fn t0() -> Instant {
        Instant::now()
    }

    #[test]
    fn test_up_from_initial() {
        let mut a = automaton();
        let effects = a.up(t0());
        assert_eq!(a.state(), State::Closed);
        assert!(effects.sends.is_empty());
    }

    #[test]
    fn test_open_from_closed_sends_configure_request() {
        let mut a = automaton();
        a.up(t0());
        let effects = a.open(t0());

        assert_eq!(a.state(), State::ReqSent);
        assert_eq!(effects.sends.len(), 1);
        assert_eq!(effects.sends[0].identifier, 1);
        assert_eq!(
            effects.sends[0].body,
            CpBody::ConfigureRequest(vec![TestOpt::Word(1492)])
        );
    }

    #[test]
    fn test_open_from_initial_signals_started() {
        let mut a = automaton();
        let effects = a.open(t0());
        assert_eq!(a.state(), State::Starting);
        assert_eq!(effects.signals, vec![Signal::Started]);

        // Up then brings the request out
        let effects = a.up(t0());
        assert_eq!(a.state(), State::ReqSent);
        assert_eq!(effects.sends.len(), 1);
    }

    /// Full converging handshake; tlu fires exactly once.
    #[test]
    fn test_handshake_reaches_opened() {
        let now = t0();
        let mut a = automaton();
        a.up(now);
        a.open(now);

        // Peer request arrives first: we ack it
        let effects = a.handle(
            CpPacket {
                identifier: 7,
                body: CpBody::ConfigureRequest(vec![TestOpt::Word(1500)]),
            },
            now,
        );
        assert_eq!(a.state(), State::AckSent);
        assert_eq!(
            effects.sends[0].body,
            CpBody::ConfigureAck(vec![TestOpt::Word(1500)])
        );

        // Peer acks ours: Opened, single Up signal
        let effects = a.handle(
            CpPacket {
                identifier: 1,
                body: CpBody::ConfigureAck(vec![TestOpt::Word(1492)]),
            },
            now,
        );
        assert_eq!(a.state(), State::Opened);
        let ups: Vec<_> = effects
            .signals
            .iter()
            .filter(|s| matches!(s, Signal::Up { .. }))
            .collect();
        assert_eq!(ups.len(), 1);
        match &effects.signals[0] {
            Signal::Up { ours, peers } => {
                assert_eq!(ours, &vec![TestOpt::Word(1492)]);
                assert_eq!(peers, &vec![TestOpt::Word(1500)]);
            }
            other => panic!("expected Up, got {:?}", other),
        }
    }

    #[test]
    fn test_ack_with_wrong_id_is_discarded() {
        let now = t0();
        let mut a = automaton();
        a.up(now);
        a.open(now);

        let effects = a.handle(
            CpPacket {
                identifier: 9,
                body: CpBody::ConfigureAck(vec![TestOpt::Word(1492)]),
            },
            now,
        );
        assert_eq!(a.state(), State::ReqSent);
        assert!(effects.sends.is_empty());
        assert!(effects.signals.is_empty());
    }

    #[test]
    fn test_nak_updates_desire_and_resends() {
        let now = t0();
        let mut a = automaton();
        a.up(now);
        a.open(now);

        let effects = a.handle(
            CpPacket {
                identifier: 1,
                body: CpBody::ConfigureNak(vec![TestOpt::Word(1400)]),
            },
            now,
        );
        assert_eq!(a.state(), State::ReqSent);
        assert_eq!(
            effects.sends[0].body,
            CpBody::ConfigureRequest(vec![TestOpt::Word(1400)])
        );
        // New negotiation round gets a new identifier
        assert_eq!(effects.sends[0].identifier, 2);
    }

    #[test]
    fn test_unacceptable_request_naked() {
        let now = t0();
        let mut a = automaton();
        a.up(now);
        a.open(now);

        let effects = a.handle(
            CpPacket {
                identifier: 3,
                body: CpBody::ConfigureRequest(vec![TestOpt::Word(0)]),
            },
            now,
        );
        assert_eq!(a.state(), State::ReqSent);
        assert_eq!(
            effects.sends[0].body,
            CpBody::ConfigureNak(vec![TestOpt::Word(100)])
        );
        assert_eq!(effects.sends[0].identifier, 3);
    }

    #[test]
    fn test_unknown_option_rejected() {
        let now = t0();
        let mut a = automaton();
        a.up(now);
        a.open(now);

        let effects = a.handle(
            CpPacket {
                identifier: 4,
                body: CpBody::ConfigureRequest(vec![TestOpt::Raw(99, vec![1, 2, 3])]),
            },
            now,
        );
        assert_eq!(
            effects.sends[0].body,
            CpBody::ConfigureReject(vec![TestOpt::Raw(99, vec![1, 2, 3])])
        );
    }

    #[test]
    fn test_max_failure_turns_nak_into_reject() {
        let now = t0();
        let mut a = automaton();
        a.up(now);
        a.open(now);

        for _ in 0..DEFAULT_MAX_FAILURE {
            let effects = a.handle(
                CpPacket {
                    identifier: 3,
                    body: CpBody::ConfigureRequest(vec![TestOpt::Word(0)]),
                },
                now,
            );
            assert!(matches!(effects.sends[0].body, CpBody::ConfigureNak(_)));
        }

        let effects = a.handle(
            CpPacket {
                identifier: 3,
                body: CpBody::ConfigureRequest(vec![TestOpt::Word(0)]),
            },
            now,
        );
        assert!(matches!(effects.sends[0].body, CpBody::ConfigureReject(_)));
    }

    /// Scenario: peer stays silent; requests retransmit until Max-Configure,
    /// then the automaton finishes in Stopped.
    #[test]
    fn test_restart_exhaustion() {
        let mut now = t0();
        let mut a = automaton();
        a.up(now);
        let first = a.open(now);
        let mut transmissions = first.sends.len();

        let mut finished = false;
        for _ in 0..DEFAULT_MAX_CONFIGURE + 2 {
            now += DEFAULT_RESTART_INTERVAL;
            let effects = a.tick(now);
            transmissions += effects.sends.len();
            if effects.signals.contains(&Signal::Finished) {
                finished = true;
                break;
            }
        }

        assert!(finished);
        assert_eq!(a.state(), State::Stopped);
        assert_eq!(transmissions as u32, DEFAULT_MAX_CONFIGURE);
    }

    #[test]
    fn test_close_from_opened_terminates() {
        let now = t0();
        let mut a = automaton();
        a.up(now);
        a.open(now);
        a.handle(
            CpPacket {
                identifier: 5,
                body: CpBody::ConfigureRequest(vec![TestOpt::Word(1500)]),
            },
            now,
        );
        a.handle(
            CpPacket {
                identifier: 1,
                body: CpBody::ConfigureAck(vec![TestOpt::Word(1492)]),
            },
            now,
        );
        assert_eq!(a.state(), State::Opened);

        let effects = a.close(now, "Authentication failed");
        assert_eq!(a.state(), State::Closing);
        assert_eq!(effects.signals[0], Signal::Down);
        assert_eq!(
            effects.sends[0].body,
            CpBody::TerminateRequest(b"Authentication failed".to_vec())
        );

        // Peer acknowledges: Finished from Closed
        let effects = a.rta(now);
        assert_eq!(a.state(), State::Closed);
        assert_eq!(effects.signals, vec![Signal::Finished]);
    }

    #[test]
    fn test_terminate_request_in_opened() {
        let now = t0();
        let mut a = automaton();
        a.up(now);
        a.open(now);
        a.handle(
            CpPacket {
                identifier: 5,
                body: CpBody::ConfigureRequest(vec![TestOpt::Word(1500)]),
            },
            now,
        );
        a.handle(
            CpPacket {
                identifier: 1,
                body: CpBody::ConfigureAck(vec![TestOpt::Word(1492)]),
            },
            now,
        );

        let effects = a.handle(
            CpPacket {
                identifier: 9,
                body: CpBody::TerminateRequest(b"bye".to_vec()),
            },
            now,
        );
        assert_eq!(a.state(), State::Stopping);
        assert_eq!(effects.signals[0], Signal::Down);
        assert_eq!(effects.sends[0].body, CpBody::TerminateAck(Vec::new()));
        assert_eq!(effects.sends[0].identifier, 9);

        // zrc: the next timeout finishes the shutdown
        let effects = a.tick(now + DEFAULT_RESTART_INTERVAL);
        assert_eq!(a.state(), State::Stopped);
        assert_eq!(effects.signals, vec![Signal::Finished]);
    }

    #[test]
    fn test_echo_request_answered_in_opened_only() {
        let now = t0();
        let mut a = automaton();
        a.up(now);
        a.open(now);

        // Not opened yet: no reply
        let effects = a.handle(
            CpPacket {
                identifier: 1,
                body: CpBody::EchoRequest,
            },
            now,
        );
        assert!(effects.sends.is_empty());

        a.handle(
            CpPacket {
                identifier: 5,
                body: CpBody::ConfigureRequest(vec![TestOpt::Word(1500)]),
            },
            now,
        );
        a.handle(
            CpPacket {
                identifier: 1,
                body: CpBody::ConfigureAck(vec![TestOpt::Word(1492)]),
            },
            now,
        );

        let effects = a.handle(
            CpPacket {
                identifier: 8,
                body: CpBody::EchoRequest,
            },
            now,
        );
        assert_eq!(effects.sends[0].body, CpBody::EchoReply);
        assert_eq!(effects.sends[0].identifier, 8);
    }

    #[test]
    fn test_unknown_code_gets_code_reject() {
        let now = t0();
        let mut a = automaton();
        a.up(now);
        a.open(now);

        let effects = a.handle(
            CpPacket {
                identifier: 2,
                body: CpBody::Unknown {
                    code: codes::RESET_REQUEST,
                    data: vec![0xaa],
                },
            },
            now,
        );
        match &effects.sends[0].body {
            CpBody::CodeReject(data) => {
                assert_eq!(data[0], codes::RESET_REQUEST);
            }
            other => panic!("expected Code-Reject, got {:?}", other),
        }
    }

    #[test]
    fn test_ncp_code_rejects_echo() {
        let now = t0();
        let mut a = Automaton::new(
            TestPolicy { want: 1 },
            AutomatonConfig {
                link_extensions: false,
                ..AutomatonConfig::default()
            },
        );
        a.up(now);
        a.open(now);

        let effects = a.handle(
            CpPacket {
                identifier: 3,
                body: CpBody::EchoRequest,
            },
            now,
        );
        assert!(matches!(effects.sends[0].body, CpBody::CodeReject(_)));
    }

    #[test]
    fn test_down_from_opened_signals_down() {
        let now = t0();
        let mut a = automaton();
        a.up(now);
        a.open(now);
        a.handle(
            CpPacket {
                identifier: 5,
                body: CpBody::ConfigureRequest(vec![TestOpt::Word(1500)]),
            },
            now,
        );
        a.handle(
            CpPacket {
                identifier: 1,
                body: CpBody::ConfigureAck(vec![TestOpt::Word(1492)]),
            },
            now,
        );

        let effects = a.down();
        assert_eq!(a.state(), State::Starting);
        assert_eq!(effects.signals, vec![Signal::Down]);
    }
}

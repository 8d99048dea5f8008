//! PAP authenticator - RFC 1334
//!
//! Runs after LCP opens with an Authentication-Protocol option on either
//! side. Each negotiated direction is independent: we verify the peer
//! against the credential store, and we prove ourselves with the configured
//! name/secret, retransmitting the request a few times before giving up.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::SessionOpts;
use crate::protocol::pap::{PapMessage, PapPacket};

/// Retransmission interval for our Authenticate-Request.
pub const RETRANSMIT_INTERVAL: Duration = Duration::from_secs(3);
/// Resends of our Authenticate-Request before declaring failure.
pub const MAX_AUTHENTICATE: u32 = 3;

/// Which way an authentication exchange runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthDirection {
    /// The peer proves itself to us.
    PeerToUs,
    /// We prove ourselves to the peer.
    UsToPeer,
}

/// Verdict from the credential store.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthReply {
    /// Credentials are good; carries the user's session option overrides.
    Success(SessionOpts),
    Fail,
}

/// Answers authentication requests from the configured user database.
pub trait CredentialProvider {
    fn authenticate(&self, peer_id: &[u8], password: &[u8]) -> AuthReply;
}

/// Provider backed by a static user table (the `[users.*]` config sections).
#[derive(Debug, Default)]
pub struct StaticCredentials {
    users: HashMap<String, (String, SessionOpts)>,
}

impl StaticCredentials {
    pub fn new(users: HashMap<String, (String, SessionOpts)>) -> Self {
        Self { users }
    }

    pub fn insert(&mut self, name: &str, password: &str, opts: SessionOpts) {
        self.users
            .insert(name.to_string(), (password.to_string(), opts));
    }
}

impl CredentialProvider for StaticCredentials {
    fn authenticate(&self, peer_id: &[u8], password: &[u8]) -> AuthReply {
        let Ok(name) = std::str::from_utf8(peer_id) else {
            return AuthReply::Fail;
        };
        match self.users.get(name) {
            Some((expected, opts)) if expected.as_bytes() == password => {
                AuthReply::Success(opts.clone())
            }
            _ => AuthReply::Fail,
        }
    }
}

/// Outcome of one direction of the exchange, reported to the link.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    Success {
        direction: AuthDirection,
        peer_id: Vec<u8>,
        session_opts: SessionOpts,
    },
    Fail {
        direction: AuthDirection,
        message: String,
    },
}

/// Packets out and outcomes up from one driver step.
#[derive(Debug, Default)]
pub struct PapEffects {
    pub sends: Vec<PapPacket>,
    pub outcomes: Vec<AuthOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProveState {
    Idle,
    RequestSent,
    Done,
}

/// Both sides of a PAP exchange for one link.
#[derive(Debug)]
pub struct PapDriver {
    /// We expect the peer to authenticate to us.
    verify_peer: bool,
    /// Name and secret for proving ourselves, when that direction is on.
    prove: Option<(String, String)>,

    prove_state: ProveState,
    request_id: u8,
    deadline: Option<Instant>,
    retries_left: u32,

    /// Peer-ID accepted in the verify direction, for duplicate re-acks.
    verified_peer: Option<Vec<u8>>,
}

impl PapDriver {
    pub fn new(verify_peer: bool, prove: Option<(String, String)>) -> Self {
        Self {
            verify_peer,
            prove,
            prove_state: ProveState::Idle,
            request_id: 0,
            deadline: None,
            retries_left: MAX_AUTHENTICATE,
            verified_peer: None,
        }
    }

    /// Kick off the exchange; sends our Authenticate-Request if we have the
    /// proving direction.
    pub fn start(&mut self, now: Instant) -> PapEffects {
        let mut effects = PapEffects::default();
        if let Some(request) = self.build_request(now) {
            self.prove_state = ProveState::RequestSent;
            self.retries_left = MAX_AUTHENTICATE;
            effects.sends.push(request);
        }
        effects
    }

    fn build_request(&mut self, now: Instant) -> Option<PapPacket> {
        let (name, secret) = self.prove.as_ref()?;
        let request = PapPacket {
            identifier: self.request_id.wrapping_add(1),
            message: PapMessage::AuthenticateRequest {
                peer_id: name.as_bytes().to_vec(),
                password: secret.as_bytes().to_vec(),
            },
        };
        self.request_id = request.identifier;
        self.deadline = Some(now + RETRANSMIT_INTERVAL);
        Some(request)
    }

    /// Feed a received PAP packet through the driver.
    pub fn handle<C: CredentialProvider>(
        &mut self,
        packet: PapPacket,
        creds: &C,
        _now: Instant,
    ) -> PapEffects {
        let mut effects = PapEffects::default();

        match packet.message {
            PapMessage::AuthenticateRequest { peer_id, password } => {
                if !self.verify_peer {
                    debug!("pap: unsolicited Authenticate-Request ignored");
                    return effects;
                }

                // RFC 1334: a duplicate request after success is re-acked.
                if let Some(ref verified) = self.verified_peer {
                    if *verified == peer_id {
                        effects.sends.push(PapPacket {
                            identifier: packet.identifier,
                            message: PapMessage::AuthenticateAck {
                                message: b"Login ok".to_vec(),
                            },
                        });
                        return effects;
                    }
                }

                match creds.authenticate(&peer_id, &password) {
                    AuthReply::Success(session_opts) => {
                        info!(
                            "pap: peer `{}` authenticated",
                            String::from_utf8_lossy(&peer_id)
                        );
                        self.verified_peer = Some(peer_id.clone());
                        effects.sends.push(PapPacket {
                            identifier: packet.identifier,
                            message: PapMessage::AuthenticateAck {
                                message: b"Login ok".to_vec(),
                            },
                        });
                        effects.outcomes.push(AuthOutcome::Success {
                            direction: AuthDirection::PeerToUs,
                            peer_id,
                            session_opts,
                        });
                    }
                    AuthReply::Fail => {
                        warn!(
                            "pap: peer `{}` failed authentication",
                            String::from_utf8_lossy(&peer_id)
                        );
                        effects.sends.push(PapPacket {
                            identifier: packet.identifier,
                            message: PapMessage::AuthenticateNak {
                                message: b"Authentication failure".to_vec(),
                            },
                        });
                        effects.outcomes.push(AuthOutcome::Fail {
                            direction: AuthDirection::PeerToUs,
                            message: "Authentication failure".to_string(),
                        });
                    }
                }
            }
            PapMessage::AuthenticateAck { .. } => {
                if self.prove_state == ProveState::RequestSent
                    && packet.identifier == self.request_id
                {
                    self.prove_state = ProveState::Done;
                    self.deadline = None;
                    if let Some((name, _)) = self.prove.as_ref() {
                        info!("pap: peer accepted our credentials");
                        effects.outcomes.push(AuthOutcome::Success {
                            direction: AuthDirection::UsToPeer,
                            peer_id: name.as_bytes().to_vec(),
                            session_opts: SessionOpts::new(),
                        });
                    }
                }
            }
            PapMessage::AuthenticateNak { message } => {
                if self.prove_state == ProveState::RequestSent
                    && packet.identifier == self.request_id
                {
                    self.prove_state = ProveState::Done;
                    self.deadline = None;
                    let message = String::from_utf8_lossy(&message).into_owned();
                    warn!("pap: peer refused our credentials: {}", message);
                    effects.outcomes.push(AuthOutcome::Fail {
                        direction: AuthDirection::UsToPeer,
                        message,
                    });
                }
            }
        }

        effects
    }

    /// Retransmission service.
    pub fn tick(&mut self, now: Instant) -> PapEffects {
        let mut effects = PapEffects::default();

        if self.prove_state != ProveState::RequestSent {
            return effects;
        }
        let Some(deadline) = self.deadline else {
            return effects;
        };
        if now < deadline {
            return effects;
        }

        if self.retries_left > 0 {
            self.retries_left -= 1;
            debug!(
                "pap: retransmitting Authenticate-Request ({} retries left)",
                self.retries_left
            );
            if let Some(request) = self.build_request(now) {
                effects.sends.push(request);
            }
        } else {
            self.prove_state = ProveState::Done;
            self.deadline = None;
            effects.outcomes.push(AuthOutcome::Fail {
                direction: AuthDirection::UsToPeer,
                message: "peer did not answer Authenticate-Request".to_string(),
            });
        }

        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> StaticCredentials {
        let mut c = StaticCredentials::default();
        c.insert("alice", "pw", SessionOpts::new());
        c
    }

    fn t0() -> Instant {
        Instant::now()
    }

    #[test]
    fn test_verify_success() {
        let now = t0();
        let mut driver = PapDriver::new(true, None);
        driver.start(now);

        let effects = driver.handle(
            PapPacket {
                identifier: 1,
                message: PapMessage::AuthenticateRequest {
                    peer_id: b"alice".to_vec(),
                    password: b"pw".to_vec(),
                },
            },
            &creds(),
            now,
        );

        assert!(matches!(
            effects.sends[0].message,
            PapMessage::AuthenticateAck { .. }
        ));
        assert_eq!(effects.sends[0].identifier, 1);
        assert_eq!(
            effects.outcomes,
            vec![AuthOutcome::Success {
                direction: AuthDirection::PeerToUs,
                peer_id: b"alice".to_vec(),
                session_opts: SessionOpts::new(),
            }]
        );
    }

    #[test]
    fn test_verify_failure() {
        let now = t0();
        let mut driver = PapDriver::new(true, None);
        driver.start(now);

        let effects = driver.handle(
            PapPacket {
                identifier: 2,
                message: PapMessage::AuthenticateRequest {
                    peer_id: b"alice".to_vec(),
                    password: b"wrong".to_vec(),
                },
            },
            &creds(),
            now,
        );

        assert!(matches!(
            effects.sends[0].message,
            PapMessage::AuthenticateNak { .. }
        ));
        assert!(matches!(
            effects.outcomes[0],
            AuthOutcome::Fail {
                direction: AuthDirection::PeerToUs,
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_request_reacked_without_new_outcome() {
        let now = t0();
        let mut driver = PapDriver::new(true, None);
        driver.start(now);

        let request = PapPacket {
            identifier: 1,
            message: PapMessage::AuthenticateRequest {
                peer_id: b"alice".to_vec(),
                password: b"pw".to_vec(),
            },
        };
        driver.handle(request.clone(), &creds(), now);
        let effects = driver.handle(request, &creds(), now);

        assert!(matches!(
            effects.sends[0].message,
            PapMessage::AuthenticateAck { .. }
        ));
        assert!(effects.outcomes.is_empty());
    }

    #[test]
    fn test_prove_success() {
        let now = t0();
        let mut driver = PapDriver::new(false, Some(("us".into(), "secret".into())));
        let effects = driver.start(now);

        match &effects.sends[0].message {
            PapMessage::AuthenticateRequest { peer_id, password } => {
                assert_eq!(peer_id, b"us");
                assert_eq!(password, b"secret");
            }
            other => panic!("expected request, got {:?}", other),
        }

        let effects = driver.handle(
            PapPacket {
                identifier: effects.sends[0].identifier,
                message: PapMessage::AuthenticateAck {
                    message: b"welcome".to_vec(),
                },
            },
            &creds(),
            now,
        );
        assert!(matches!(
            effects.outcomes[0],
            AuthOutcome::Success {
                direction: AuthDirection::UsToPeer,
                ..
            }
        ));
    }

    #[test]
    fn test_prove_nak_fails() {
        let now = t0();
        let mut driver = PapDriver::new(false, Some(("us".into(), "secret".into())));
        let effects = driver.start(now);

        let effects = driver.handle(
            PapPacket {
                identifier: effects.sends[0].identifier,
                message: PapMessage::AuthenticateNak {
                    message: b"no entry".to_vec(),
                },
            },
            &creds(),
            now,
        );
        assert_eq!(
            effects.outcomes,
            vec![AuthOutcome::Fail {
                direction: AuthDirection::UsToPeer,
                message: "no entry".to_string(),
            }]
        );
    }

    #[test]
    fn test_prove_retransmits_then_fails() {
        let mut now = t0();
        let mut driver = PapDriver::new(false, Some(("us".into(), "secret".into())));
        driver.start(now);

        let mut resends = 0;
        let mut failed = false;
        for _ in 0..MAX_AUTHENTICATE + 2 {
            now += RETRANSMIT_INTERVAL;
            let effects = driver.tick(now);
            resends += effects.sends.len() as u32;
            if !effects.outcomes.is_empty() {
                assert!(matches!(
                    effects.outcomes[0],
                    AuthOutcome::Fail {
                        direction: AuthDirection::UsToPeer,
                        ..
                    }
                ));
                failed = true;
                break;
            }
        }

        assert_eq!(resends, MAX_AUTHENTICATE);
        assert!(failed);

        // Driver is done; further ticks stay quiet.
        now += RETRANSMIT_INTERVAL;
        let effects = driver.tick(now);
        assert!(effects.sends.is_empty() && effects.outcomes.is_empty());
    }

    #[test]
    fn test_stale_ack_ignored() {
        let now = t0();
        let mut driver = PapDriver::new(false, Some(("us".into(), "secret".into())));
        driver.start(now);

        let effects = driver.handle(
            PapPacket {
                identifier: 99,
                message: PapMessage::AuthenticateAck {
                    message: Vec::new(),
                },
            },
            &creds(),
            now,
        );
        assert!(effects.outcomes.is_empty());
    }
}

//! LCP negotiation policy
//!
//! Decides which link options we ask for and how we judge the peer's. The
//! option set follows RFC 1661 plus the RFC 1990 multilink trio; options we
//! know but do not negotiate are rejected by name, everything else by type.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::config::LinkSection;
use crate::protocol::lcp::{AuthProto, LcpOpt, PROTOCOL};

use super::automaton::{Classified, OptionPolicy};

/// Smallest MRU we tolerate before naking (RFC 1661 default minimum).
const MIN_MRU: u16 = 576;

/// Derive a magic number from the clock. Zero is reserved for "no magic", so
/// never return it.
pub fn generate_magic() -> u32 {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u32;
    let magic = seed.wrapping_mul(1664525).wrapping_add(1013904223);
    if magic == 0 {
        1
    } else {
        magic
    }
}

/// LCP policy for one link.
#[derive(Debug)]
pub struct LcpPolicy {
    /// MRU we announce.
    mru: u16,
    /// Largest peer MRU we accept before naking down.
    max_mru: u16,
    magic: u32,
    /// What we demand the peer authenticate with, if anything.
    auth: Option<AuthProto>,
    /// What we are willing to use to prove ourselves to the peer.
    allowed_auth: Vec<AuthProto>,
    /// RFC 1990 multilink options are only entertained when enabled.
    multilink: bool,
    /// Cleared when the peer rejects Magic-Number outright.
    request_magic: bool,
    /// The peer rejected our Authentication-Protocol option.
    auth_rejected: bool,
}

impl LcpPolicy {
    pub fn new(config: &LinkSection) -> Self {
        let allowed_auth: Vec<AuthProto> =
            config.allowed_auth.iter().map(|m| m.to_proto()).collect();
        let auth = if config.auth_required {
            allowed_auth.first().copied()
        } else {
            None
        };

        Self {
            mru: config.mru,
            max_mru: config.max_mru,
            magic: config.magic.unwrap_or_else(generate_magic),
            auth,
            allowed_auth,
            multilink: false,
            request_magic: true,
            auth_rejected: false,
        }
    }

    pub fn magic(&self) -> u32 {
        self.magic
    }

    /// True if we demanded authentication and the peer refused the option.
    pub fn auth_rejected(&self) -> bool {
        self.auth_rejected
    }

    fn acceptable_auth(&self, proto: &AuthProto) -> bool {
        self.allowed_auth.contains(proto)
    }
}

impl OptionPolicy for LcpPolicy {
    type Opt = LcpOpt;

    fn protocol(&self) -> u16 {
        PROTOCOL
    }

    fn name(&self) -> &'static str {
        "lcp"
    }

    fn request(&mut self) -> Vec<LcpOpt> {
        let mut request = Vec::new();
        if self.mru != 1500 {
            request.push(LcpOpt::Mru(self.mru));
        }
        if self.request_magic {
            request.push(LcpOpt::Magic(self.magic));
        }
        if let Some(auth) = self.auth {
            request.push(LcpOpt::Auth(auth));
        }
        request
    }

    fn classify(&mut self, request: &[LcpOpt]) -> Classified<LcpOpt> {
        let mut classified = Classified::default();

        for opt in request {
            match opt {
                LcpOpt::Mru(mru) => {
                    if *mru < MIN_MRU {
                        classified.nak.push(LcpOpt::Mru(MIN_MRU));
                    } else if *mru > self.max_mru {
                        classified.nak.push(LcpOpt::Mru(self.max_mru));
                    } else {
                        classified.ack.push(opt.clone());
                    }
                }
                LcpOpt::AsyncMap(_) => classified.ack.push(opt.clone()),
                LcpOpt::Auth(proto) => {
                    if self.acceptable_auth(proto) {
                        classified.ack.push(opt.clone());
                    } else if let Some(preferred) = self.allowed_auth.first() {
                        classified.nak.push(LcpOpt::Auth(*preferred));
                    } else {
                        classified.reject.push(opt.clone());
                    }
                }
                LcpOpt::Magic(magic) => {
                    // A zero magic, or one equal to ours, defeats loopback
                    // detection; suggest a different value.
                    if *magic == 0 || *magic == self.magic {
                        classified.nak.push(LcpOpt::Magic(generate_magic()));
                    } else {
                        classified.ack.push(opt.clone());
                    }
                }
                LcpOpt::Pfc | LcpOpt::Acfc => classified.ack.push(opt.clone()),
                LcpOpt::Mrru(_) | LcpOpt::Ssnhf | LcpOpt::EndpointDisc { .. } => {
                    if self.multilink {
                        classified.ack.push(opt.clone());
                    } else {
                        classified.reject.push(opt.clone());
                    }
                }
                LcpOpt::Quality { .. }
                | LcpOpt::Callback { .. }
                | LcpOpt::LinkDisc(_)
                | LcpOpt::Raw(..) => classified.reject.push(opt.clone()),
            }
        }

        classified
    }

    fn nak_received(&mut self, options: &[LcpOpt]) {
        for opt in options {
            match opt {
                LcpOpt::Mru(mru) => {
                    // Adopt the peer's preference when it fits our buffers.
                    if *mru >= MIN_MRU && *mru <= self.max_mru {
                        self.mru = *mru;
                    }
                }
                LcpOpt::Magic(magic) => {
                    debug!("lcp: peer naked our magic, picking a new one");
                    self.magic = if *magic != 0 && *magic != self.magic {
                        *magic
                    } else {
                        generate_magic()
                    };
                }
                LcpOpt::Auth(proto) => {
                    if self.acceptable_auth(proto) {
                        self.auth = Some(*proto);
                    } else {
                        warn!("lcp: peer suggested auth {:?} we cannot verify", proto);
                    }
                }
                other => {
                    debug!("lcp: ignoring nak for {:?}", other);
                }
            }
        }
    }

    fn reject_received(&mut self, options: &[LcpOpt]) {
        for opt in options {
            match opt {
                LcpOpt::Mru(_) => self.mru = 1500,
                LcpOpt::Magic(_) => {
                    warn!("lcp: peer rejected Magic-Number, loopback detection disabled");
                    self.request_magic = false;
                }
                LcpOpt::Auth(_) => {
                    warn!("lcp: peer rejected Authentication-Protocol");
                    self.auth = None;
                    self.auth_rejected = true;
                }
                other => {
                    debug!("lcp: ignoring reject for {:?}", other);
                }
            }
        }
    }
}

/// Authentication protocol in an acknowledged option list, if present.
pub fn auth_in(opts: &[LcpOpt]) -> Option<AuthProto> {
    opts.iter().find_map(|opt| match opt {
        LcpOpt::Auth(proto) => Some(*proto),
        _ => None,
    })
}

/// Magic number in an acknowledged option list, if present.
pub fn magic_in(opts: &[LcpOpt]) -> Option<u32> {
    opts.iter().find_map(|opt| match opt {
        LcpOpt::Magic(magic) => Some(*magic),
        _ => None,
    })
}

/// MRU in an acknowledged option list, if present.
pub fn mru_in(opts: &[LcpOpt]) -> Option<u16> {
    opts.iter().find_map(|opt| match opt {
        LcpOpt::Mru(mru) => Some(*mru),
        _ => None,
    })
}

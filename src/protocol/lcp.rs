//! LCP options - RFC 1661
//!
//! Link Control Protocol configuration options. The packet layer itself is
//! shared with the NCPs and lives in [`crate::protocol::cp`].

use super::cp::OptionCodec;

/// PPP protocol number for LCP.
pub const PROTOCOL: u16 = 0xc021;

/// LCP option types
pub mod options {
    /// Maximum-Receive-Unit
    pub const MRU: u8 = 1;
    /// Async-Control-Character-Map
    pub const ACCM: u8 = 2;
    /// Authentication-Protocol
    pub const AUTH_PROTOCOL: u8 = 3;
    /// Quality-Protocol
    pub const QUALITY_PROTOCOL: u8 = 4;
    /// Magic-Number
    pub const MAGIC_NUMBER: u8 = 5;
    /// Protocol-Field-Compression
    pub const PFC: u8 = 7;
    /// Address-and-Control-Field-Compression
    pub const ACFC: u8 = 8;
    /// Callback (RFC 1570)
    pub const CALLBACK: u8 = 13;
    /// Multilink MRRU (RFC 1990)
    pub const MRRU: u8 = 17;
    /// Multilink Short-Sequence-Number-Header (RFC 1990)
    pub const SSNHF: u8 = 18;
    /// Multilink Endpoint-Discriminator (RFC 1990)
    pub const ENDPOINT_DISC: u8 = 19;
    /// Link-Discriminator (RFC 2125)
    pub const LINK_DISC: u8 = 23;
}

/// Authentication protocol numbers carried in option 3
pub mod auth {
    /// Password Authentication Protocol
    pub const PAP: u16 = 0xc023;
    /// Challenge Handshake Authentication Protocol
    pub const CHAP: u16 = 0xc223;
    /// Extensible Authentication Protocol
    pub const EAP: u16 = 0xc227;
}

/// CHAP digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapDigest {
    Md5,
    Sha1,
    MsChap,
    MsChapV2,
}

impl ChapDigest {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            5 => Some(ChapDigest::Md5),
            6 => Some(ChapDigest::Sha1),
            128 => Some(ChapDigest::MsChap),
            129 => Some(ChapDigest::MsChapV2),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            ChapDigest::Md5 => 5,
            ChapDigest::Sha1 => 6,
            ChapDigest::MsChap => 128,
            ChapDigest::MsChapV2 => 129,
        }
    }
}

/// Negotiated authentication protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProto {
    Pap,
    Chap(ChapDigest),
    Eap,
}

/// An LCP configuration option.
///
/// Types with a fixed schema decode into their own variant; anything else
/// (unknown type, or a known type whose value size is off) is carried as
/// `Raw` so it can be echoed back verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum LcpOpt {
    Mru(u16),
    AsyncMap(u32),
    Auth(AuthProto),
    Quality { protocol: u16, period: u32 },
    Magic(u32),
    Pfc,
    Acfc,
    Callback { operation: u8, message: Vec<u8> },
    Mrru(u16),
    Ssnhf,
    EndpointDisc { class: u8, address: Vec<u8> },
    LinkDisc(u16),
    Raw(u8, Vec<u8>),
}

impl LcpOpt {
    /// Wire type byte.
    pub fn opt_type(&self) -> u8 {
        match self {
            LcpOpt::Mru(_) => options::MRU,
            LcpOpt::AsyncMap(_) => options::ACCM,
            LcpOpt::Auth(_) => options::AUTH_PROTOCOL,
            LcpOpt::Quality { .. } => options::QUALITY_PROTOCOL,
            LcpOpt::Magic(_) => options::MAGIC_NUMBER,
            LcpOpt::Pfc => options::PFC,
            LcpOpt::Acfc => options::ACFC,
            LcpOpt::Callback { .. } => options::CALLBACK,
            LcpOpt::Mrru(_) => options::MRRU,
            LcpOpt::Ssnhf => options::SSNHF,
            LcpOpt::EndpointDisc { .. } => options::ENDPOINT_DISC,
            LcpOpt::LinkDisc(_) => options::LINK_DISC,
            LcpOpt::Raw(t, _) => *t,
        }
    }
}

fn decode_auth(value: &[u8]) -> Option<AuthProto> {
    if value.len() < 2 {
        return None;
    }
    let protocol = u16::from_be_bytes([value[0], value[1]]);
    match (protocol, value.len()) {
        (auth::PAP, 2) => Some(AuthProto::Pap),
        (auth::CHAP, 3) => ChapDigest::from_wire(value[2]).map(AuthProto::Chap),
        (auth::EAP, 2) => Some(AuthProto::Eap),
        _ => None,
    }
}

impl OptionCodec for LcpOpt {
    fn decode(opt_type: u8, value: &[u8]) -> Self {
        match (opt_type, value.len()) {
            (options::MRU, 2) => LcpOpt::Mru(u16::from_be_bytes([value[0], value[1]])),
            (options::ACCM, 4) => {
                LcpOpt::AsyncMap(u32::from_be_bytes([value[0], value[1], value[2], value[3]]))
            }
            (options::AUTH_PROTOCOL, _) => match decode_auth(value) {
                Some(proto) => LcpOpt::Auth(proto),
                None => LcpOpt::Raw(opt_type, value.to_vec()),
            },
            (options::QUALITY_PROTOCOL, 6) => LcpOpt::Quality {
                protocol: u16::from_be_bytes([value[0], value[1]]),
                period: u32::from_be_bytes([value[2], value[3], value[4], value[5]]),
            },
            (options::MAGIC_NUMBER, 4) => {
                LcpOpt::Magic(u32::from_be_bytes([value[0], value[1], value[2], value[3]]))
            }
            (options::PFC, 0) => LcpOpt::Pfc,
            (options::ACFC, 0) => LcpOpt::Acfc,
            (options::CALLBACK, n) if n >= 1 => LcpOpt::Callback {
                operation: value[0],
                message: value[1..].to_vec(),
            },
            (options::MRRU, 2) => LcpOpt::Mrru(u16::from_be_bytes([value[0], value[1]])),
            (options::SSNHF, 0) => LcpOpt::Ssnhf,
            (options::ENDPOINT_DISC, n) if n >= 1 => LcpOpt::EndpointDisc {
                class: value[0],
                address: value[1..].to_vec(),
            },
            (options::LINK_DISC, 2) => LcpOpt::LinkDisc(u16::from_be_bytes([value[0], value[1]])),
            _ => LcpOpt::Raw(opt_type, value.to_vec()),
        }
    }

    fn raw(opt_type: u8, value: Vec<u8>) -> Self {
        LcpOpt::Raw(opt_type, value)
    }

    fn encode(&self) -> (u8, Vec<u8>) {
        let value = match self {
            LcpOpt::Mru(mru) => mru.to_be_bytes().to_vec(),
            LcpOpt::AsyncMap(map) => map.to_be_bytes().to_vec(),
            LcpOpt::Auth(AuthProto::Pap) => auth::PAP.to_be_bytes().to_vec(),
            LcpOpt::Auth(AuthProto::Chap(digest)) => {
                let mut v = auth::CHAP.to_be_bytes().to_vec();
                v.push(digest.to_wire());
                v
            }
            LcpOpt::Auth(AuthProto::Eap) => auth::EAP.to_be_bytes().to_vec(),
            LcpOpt::Quality { protocol, period } => {
                let mut v = protocol.to_be_bytes().to_vec();
                v.extend_from_slice(&period.to_be_bytes());
                v
            }
            LcpOpt::Magic(magic) => magic.to_be_bytes().to_vec(),
            LcpOpt::Pfc | LcpOpt::Acfc | LcpOpt::Ssnhf => Vec::new(),
            LcpOpt::Callback { operation, message } => {
                let mut v = vec![*operation];
                v.extend_from_slice(message);
                v
            }
            LcpOpt::Mrru(mrru) => mrru.to_be_bytes().to_vec(),
            LcpOpt::EndpointDisc { class, address } => {
                let mut v = vec![*class];
                v.extend_from_slice(address);
                v
            }
            LcpOpt::LinkDisc(disc) => disc.to_be_bytes().to_vec(),
            LcpOpt::Raw(_, value) => value.clone(),
        };
        (self.opt_type(), value)
    }
}

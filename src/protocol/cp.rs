//! Control-protocol packet codec - RFC 1661
//!
//! LCP and the NCPs share one header layout (code, identifier, length) and one
//! option TLV format. This module implements both generically; the per-protocol
//! option sets plug in through [`OptionCodec`].

use crate::{Error, Result};

/// CP header size (code + identifier + length)
pub const CP_HEADER_SIZE: usize = 4;

/// CP packet codes
pub mod codes {
    /// Vendor-Specific (RFC 2153)
    pub const VENDOR_SPECIFIC: u8 = 0;
    /// Configure-Request
    pub const CONFIGURE_REQUEST: u8 = 1;
    /// Configure-Ack
    pub const CONFIGURE_ACK: u8 = 2;
    /// Configure-Nak
    pub const CONFIGURE_NAK: u8 = 3;
    /// Configure-Reject
    pub const CONFIGURE_REJECT: u8 = 4;
    /// Terminate-Request
    pub const TERMINATE_REQUEST: u8 = 5;
    /// Terminate-Ack
    pub const TERMINATE_ACK: u8 = 6;
    /// Code-Reject
    pub const CODE_REJECT: u8 = 7;
    /// Protocol-Reject (LCP only)
    pub const PROTOCOL_REJECT: u8 = 8;
    /// Echo-Request (LCP only)
    pub const ECHO_REQUEST: u8 = 9;
    /// Echo-Reply (LCP only)
    pub const ECHO_REPLY: u8 = 10;
    /// Discard-Request (LCP only)
    pub const DISCARD_REQUEST: u8 = 11;
    /// Identification (RFC 1570)
    pub const IDENTIFICATION: u8 = 12;
    /// Time-Remaining (RFC 1570)
    pub const TIME_REMAINING: u8 = 13;
    /// Reset-Request (CCP/ECP)
    pub const RESET_REQUEST: u8 = 14;
    /// Reset-Reply (CCP/ECP)
    pub const RESET_REPLY: u8 = 15;
}

/// Per-protocol option codec.
///
/// Decoding a single TLV value never fails: a value whose size disagrees with
/// the per-type schema is preserved as the protocol's raw variant so it can be
/// echoed back in a Configure-Reject byte for byte.
pub trait OptionCodec: Sized + Clone + PartialEq + std::fmt::Debug {
    /// Decode one option from its type byte and value bytes.
    fn decode(opt_type: u8, value: &[u8]) -> Self;

    /// Build the raw passthrough variant.
    fn raw(opt_type: u8, value: Vec<u8>) -> Self;

    /// Wire type byte and value bytes of this option.
    fn encode(&self) -> (u8, Vec<u8>);
}

/// A control-protocol packet, decoded from the byte after the PPP Protocol
/// field onward.
#[derive(Debug, Clone, PartialEq)]
pub struct CpPacket<O> {
    pub identifier: u8,
    pub body: CpBody<O>,
}

/// Body of a control-protocol packet, tagged by code.
#[derive(Debug, Clone, PartialEq)]
pub enum CpBody<O> {
    ConfigureRequest(Vec<O>),
    ConfigureAck(Vec<O>),
    ConfigureNak(Vec<O>),
    ConfigureReject(Vec<O>),
    TerminateRequest(Vec<u8>),
    TerminateAck(Vec<u8>),
    CodeReject(Vec<u8>),
    ProtocolReject { protocol: u16, data: Vec<u8> },
    EchoRequest,
    EchoReply,
    DiscardRequest,
    Identification { magic: u32, message: Vec<u8> },
    TimeRemaining { magic: u32, seconds: u32, message: Vec<u8> },
    /// Code outside the set this implementation handles. The link answers
    /// these with a Code-Reject. Never constructed with a known code.
    Unknown { code: u8, data: Vec<u8> },
}

impl<O> CpBody<O> {
    /// Wire code of this body.
    pub fn code(&self) -> u8 {
        match self {
            CpBody::ConfigureRequest(_) => codes::CONFIGURE_REQUEST,
            CpBody::ConfigureAck(_) => codes::CONFIGURE_ACK,
            CpBody::ConfigureNak(_) => codes::CONFIGURE_NAK,
            CpBody::ConfigureReject(_) => codes::CONFIGURE_REJECT,
            CpBody::TerminateRequest(_) => codes::TERMINATE_REQUEST,
            CpBody::TerminateAck(_) => codes::TERMINATE_ACK,
            CpBody::CodeReject(_) => codes::CODE_REJECT,
            CpBody::ProtocolReject { .. } => codes::PROTOCOL_REJECT,
            CpBody::EchoRequest => codes::ECHO_REQUEST,
            CpBody::EchoReply => codes::ECHO_REPLY,
            CpBody::DiscardRequest => codes::DISCARD_REQUEST,
            CpBody::Identification { .. } => codes::IDENTIFICATION,
            CpBody::TimeRemaining { .. } => codes::TIME_REMAINING,
            CpBody::Unknown { code, .. } => *code,
        }
    }
}

impl<O: OptionCodec> CpPacket<O> {
    /// Decode a CP packet. `buf` starts at the Code field.
    ///
    /// Bytes beyond the Length field are padding and are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < CP_HEADER_SIZE {
            return Err(Error::Parse("CP packet too short".into()));
        }

        let code = buf[0];
        let identifier = buf[1];
        let length = u16::from_be_bytes([buf[2], buf[3]]) as usize;

        if length < CP_HEADER_SIZE {
            return Err(Error::Parse("CP length too small".into()));
        }
        if buf.len() < length {
            return Err(Error::Parse("CP packet truncated".into()));
        }

        let data = &buf[CP_HEADER_SIZE..length];

        let body = match code {
            codes::CONFIGURE_REQUEST => CpBody::ConfigureRequest(decode_options(data)),
            codes::CONFIGURE_ACK => CpBody::ConfigureAck(decode_options(data)),
            codes::CONFIGURE_NAK => CpBody::ConfigureNak(decode_options(data)),
            codes::CONFIGURE_REJECT => CpBody::ConfigureReject(decode_options(data)),
            codes::TERMINATE_REQUEST => CpBody::TerminateRequest(data.to_vec()),
            codes::TERMINATE_ACK => CpBody::TerminateAck(data.to_vec()),
            codes::CODE_REJECT => CpBody::CodeReject(data.to_vec()),
            codes::PROTOCOL_REJECT => {
                if data.len() < 2 {
                    return Err(Error::Parse("Protocol-Reject too short".into()));
                }
                CpBody::ProtocolReject {
                    protocol: u16::from_be_bytes([data[0], data[1]]),
                    data: data[2..].to_vec(),
                }
            }
            codes::ECHO_REQUEST => CpBody::EchoRequest,
            codes::ECHO_REPLY => CpBody::EchoReply,
            codes::DISCARD_REQUEST => CpBody::DiscardRequest,
            codes::IDENTIFICATION => {
                if data.len() < 4 {
                    return Err(Error::Parse("Identification too short".into()));
                }
                CpBody::Identification {
                    magic: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
                    message: data[4..].to_vec(),
                }
            }
            codes::TIME_REMAINING => {
                if data.len() < 8 {
                    return Err(Error::Parse("Time-Remaining too short".into()));
                }
                CpBody::TimeRemaining {
                    magic: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
                    seconds: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
                    message: data[8..].to_vec(),
                }
            }
            _ => CpBody::Unknown {
                code,
                data: data.to_vec(),
            },
        };

        Ok(Self { identifier, body })
    }

    /// Encode this packet, Code field onward.
    pub fn encode(&self) -> Vec<u8> {
        let data = match &self.body {
            CpBody::ConfigureRequest(opts)
            | CpBody::ConfigureAck(opts)
            | CpBody::ConfigureNak(opts)
            | CpBody::ConfigureReject(opts) => encode_options(opts),
            CpBody::TerminateRequest(data)
            | CpBody::TerminateAck(data)
            | CpBody::CodeReject(data) => data.clone(),
            CpBody::ProtocolReject { protocol, data } => {
                let mut out = protocol.to_be_bytes().to_vec();
                out.extend_from_slice(data);
                out
            }
            CpBody::EchoRequest | CpBody::EchoReply | CpBody::DiscardRequest => Vec::new(),
            CpBody::Identification { magic, message } => {
                let mut out = magic.to_be_bytes().to_vec();
                out.extend_from_slice(message);
                out
            }
            CpBody::TimeRemaining {
                magic,
                seconds,
                message,
            } => {
                let mut out = magic.to_be_bytes().to_vec();
                out.extend_from_slice(&seconds.to_be_bytes());
                out.extend_from_slice(message);
                out
            }
            CpBody::Unknown { data, .. } => data.clone(),
        };

        let length = (CP_HEADER_SIZE + data.len()) as u16;
        let mut packet = Vec::with_capacity(length as usize);
        packet.push(self.body.code());
        packet.push(self.identifier);
        packet.extend_from_slice(&length.to_be_bytes());
        packet.extend_from_slice(&data);
        packet
    }
}

/// Decode an option list in wire order.
///
/// A TLV with `length < 2` or `length` past the end of the buffer cannot be
/// stepped over: everything after its type byte is delivered as one raw
/// option and the loop stops. Nothing is dropped silently.
pub fn decode_options<O: OptionCodec>(data: &[u8]) -> Vec<O> {
    let mut options = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        let opt_type = data[offset];

        if offset + 2 > data.len() {
            options.push(O::raw(opt_type, Vec::new()));
            break;
        }

        let opt_len = data[offset + 1] as usize;
        if opt_len < 2 || offset + opt_len > data.len() {
            options.push(O::raw(opt_type, data[offset + 1..].to_vec()));
            break;
        }

        options.push(O::decode(opt_type, &data[offset + 2..offset + opt_len]));
        offset += opt_len;
    }

    options
}

/// Encode an option list in wire order. Length byte = value length + 2.
pub fn encode_options<O: OptionCodec>(options: &[O]) -> Vec<u8> {
    let mut out = Vec::new();
    for opt in options {
        let (opt_type, value) = opt.encode();
        out.push(opt_type);
        out.push((2 + value.len()) as u8);
        out.extend_from_slice(&value);
    }
    out
}

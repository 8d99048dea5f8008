//! PAP messages - RFC 1334
//!
//! Password Authentication Protocol frames. Both sides of the exchange are
//! modeled: the link acts as authenticator for the peer and can prove itself
//! in the opposite direction.

use crate::{Error, Result};

/// PAP header size (code + identifier + length)
pub const PAP_HEADER_SIZE: usize = 4;

/// PPP protocol number for PAP.
pub const PROTOCOL: u16 = 0xc023;

/// PAP packet codes
pub mod codes {
    /// Authenticate-Request
    pub const AUTHENTICATE_REQUEST: u8 = 1;
    /// Authenticate-Ack
    pub const AUTHENTICATE_ACK: u8 = 2;
    /// Authenticate-Nak
    pub const AUTHENTICATE_NAK: u8 = 3;
}

/// A PAP packet.
#[derive(Debug, Clone, PartialEq)]
pub struct PapPacket {
    pub identifier: u8,
    pub message: PapMessage,
}

/// Body of a PAP packet.
#[derive(Debug, Clone, PartialEq)]
pub enum PapMessage {
    AuthenticateRequest { peer_id: Vec<u8>, password: Vec<u8> },
    AuthenticateAck { message: Vec<u8> },
    AuthenticateNak { message: Vec<u8> },
}

impl PapMessage {
    /// Wire code of this message.
    pub fn code(&self) -> u8 {
        match self {
            PapMessage::AuthenticateRequest { .. } => codes::AUTHENTICATE_REQUEST,
            PapMessage::AuthenticateAck { .. } => codes::AUTHENTICATE_ACK,
            PapMessage::AuthenticateNak { .. } => codes::AUTHENTICATE_NAK,
        }
    }
}

impl PapPacket {
    /// Decode a PAP packet. Trailing bytes after the parsed fields are
    /// silently discarded.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < PAP_HEADER_SIZE {
            return Err(Error::Parse("PAP packet too short".into()));
        }

        let code = buf[0];
        let identifier = buf[1];
        let length = u16::from_be_bytes([buf[2], buf[3]]) as usize;

        if length < PAP_HEADER_SIZE {
            return Err(Error::Parse("PAP length too small".into()));
        }
        if buf.len() < length {
            return Err(Error::Parse("PAP packet truncated".into()));
        }

        let data = &buf[PAP_HEADER_SIZE..length];

        let message = match code {
            codes::AUTHENTICATE_REQUEST => {
                if data.is_empty() {
                    return Err(Error::Parse("PAP request missing Peer-ID".into()));
                }
                let peer_len = data[0] as usize;
                if data.len() < 1 + peer_len + 1 {
                    return Err(Error::Parse("PAP request truncated Peer-ID".into()));
                }
                let peer_id = data[1..1 + peer_len].to_vec();
                let pass_len = data[1 + peer_len] as usize;
                let pass_start = 1 + peer_len + 1;
                if data.len() < pass_start + pass_len {
                    return Err(Error::Parse("PAP request truncated password".into()));
                }
                PapMessage::AuthenticateRequest {
                    peer_id,
                    password: data[pass_start..pass_start + pass_len].to_vec(),
                }
            }
            codes::AUTHENTICATE_ACK | codes::AUTHENTICATE_NAK => {
                let message = if data.is_empty() {
                    Vec::new()
                } else {
                    let msg_len = data[0] as usize;
                    if data.len() < 1 + msg_len {
                        return Err(Error::Parse("PAP message truncated".into()));
                    }
                    data[1..1 + msg_len].to_vec()
                };
                if code == codes::AUTHENTICATE_ACK {
                    PapMessage::AuthenticateAck { message }
                } else {
                    PapMessage::AuthenticateNak { message }
                }
            }
            _ => return Err(Error::Parse(format!("unknown PAP code {}", code))),
        };

        Ok(Self {
            identifier,
            message,
        })
    }

    /// Encode this packet, Code field onward.
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::new();
        match &self.message {
            PapMessage::AuthenticateRequest { peer_id, password } => {
                data.push(peer_id.len() as u8);
                data.extend_from_slice(peer_id);
                data.push(password.len() as u8);
                data.extend_from_slice(password);
            }
            PapMessage::AuthenticateAck { message } | PapMessage::AuthenticateNak { message } => {
                data.push(message.len() as u8);
                data.extend_from_slice(message);
            }
        }

        let length = (PAP_HEADER_SIZE + data.len()) as u16;
        let mut packet = Vec::with_capacity(length as usize);
        packet.push(self.message.code());
        packet.push(self.identifier);
        packet.extend_from_slice(&length.to_be_bytes());
        packet.extend_from_slice(&data);
        packet
    }
}

//! CHAP messages - RFC 1994
//!
//! Challenge Handshake Authentication Protocol frame encoding. Digest
//! computation belongs to a future CHAP driver; this module only moves the
//! bytes.

use crate::{Error, Result};

/// CHAP header size (code + identifier + length)
pub const CHAP_HEADER_SIZE: usize = 4;

/// PPP protocol number for CHAP.
pub const PROTOCOL: u16 = 0xc223;

/// CHAP packet codes
pub mod codes {
    /// Challenge from authenticator
    pub const CHALLENGE: u8 = 1;
    /// Response from peer
    pub const RESPONSE: u8 = 2;
    /// Authentication success
    pub const SUCCESS: u8 = 3;
    /// Authentication failure
    pub const FAILURE: u8 = 4;
}

/// A CHAP packet.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapPacket {
    pub identifier: u8,
    pub message: ChapMessage,
}

/// Body of a CHAP packet.
///
/// Challenge and Response carry a length-prefixed value followed by the
/// sender's name; Success and Failure carry a free-form message.
#[derive(Debug, Clone, PartialEq)]
pub enum ChapMessage {
    Challenge { value: Vec<u8>, name: Vec<u8> },
    Response { value: Vec<u8>, name: Vec<u8> },
    Success { message: Vec<u8> },
    Failure { message: Vec<u8> },
}

impl ChapMessage {
    /// Wire code of this message.
    pub fn code(&self) -> u8 {
        match self {
            ChapMessage::Challenge { .. } => codes::CHALLENGE,
            ChapMessage::Response { .. } => codes::RESPONSE,
            ChapMessage::Success { .. } => codes::SUCCESS,
            ChapMessage::Failure { .. } => codes::FAILURE,
        }
    }
}

impl ChapPacket {
    /// Decode a CHAP packet.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < CHAP_HEADER_SIZE {
            return Err(Error::Parse("CHAP packet too short".into()));
        }

        let code = buf[0];
        let identifier = buf[1];
        let length = u16::from_be_bytes([buf[2], buf[3]]) as usize;

        if length < CHAP_HEADER_SIZE {
            return Err(Error::Parse("CHAP length too small".into()));
        }
        if buf.len() < length {
            return Err(Error::Parse("CHAP packet truncated".into()));
        }

        let data = &buf[CHAP_HEADER_SIZE..length];

        let message = match code {
            codes::CHALLENGE | codes::RESPONSE => {
                if data.is_empty() {
                    return Err(Error::Parse("CHAP value missing".into()));
                }
                let value_size = data[0] as usize;
                if data.len() < 1 + value_size {
                    return Err(Error::Parse("CHAP value truncated".into()));
                }
                let value = data[1..1 + value_size].to_vec();
                let name = data[1 + value_size..].to_vec();
                if code == codes::CHALLENGE {
                    ChapMessage::Challenge { value, name }
                } else {
                    ChapMessage::Response { value, name }
                }
            }
            codes::SUCCESS => ChapMessage::Success {
                message: data.to_vec(),
            },
            codes::FAILURE => ChapMessage::Failure {
                message: data.to_vec(),
            },
            _ => return Err(Error::Parse(format!("unknown CHAP code {}", code))),
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
            ChapMessage::Challenge { value, name } | ChapMessage::Response { value, name } => {
                data.push(value.len() as u8);
                data.extend_from_slice(value);
                data.extend_from_slice(name);
            }
            ChapMessage::Success { message } | ChapMessage::Failure { message } => {
                data.extend_from_slice(message);
            }
        }

        let length = (CHAP_HEADER_SIZE + data.len()) as u16;
        let mut packet = Vec::with_capacity(length as usize);
        packet.push(self.message.code());
        packet.push(self.identifier);
        packet.extend_from_slice(&length.to_be_bytes());
        packet.extend_from_slice(&data);
        packet
    }
}

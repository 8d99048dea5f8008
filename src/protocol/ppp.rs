//! PPP frame dispatch - RFC 1661
//!
//! Maps between raw PPP payloads (starting at the 16-bit Protocol field) and
//! the typed frames the link engine consumes. Only the protocols this engine
//! drives decode into structured variants; everything else, known or not, is
//! surfaced as `Unknown` so the link can answer with a Protocol-Reject.

use crate::{Error, Result};

use super::chap::{self, ChapPacket};
use super::cp::CpPacket;
use super::ipcp;
use super::lcp::{self, LcpOpt};
use super::pap::{self, PapPacket};

/// PPP header size (uncompressed Protocol field; no HDLC framing)
pub const PPP_HEADER_SIZE: usize = 2;

/// PPP protocol numbers
pub mod protocols {
    /// Internet Protocol version 4
    pub const IPV4: u16 = 0x0021;
    /// AppleTalk
    pub const AT: u16 = 0x0029;
    /// Novell IPX
    pub const IPX: u16 = 0x002b;
    /// Van Jacobson compressed TCP/IP
    pub const VJC_COMP: u16 = 0x002d;
    /// Van Jacobson uncompressed TCP/IP
    pub const VJC_UNCOMP: u16 = 0x002f;
    /// Internet Protocol version 6
    pub const IPV6: u16 = 0x0057;
    /// Compressed datagram
    pub const COMP: u16 = 0x00fd;
    /// IP Control Protocol
    pub const IPCP: u16 = 0x8021;
    /// AppleTalk Control Protocol
    pub const ATCP: u16 = 0x8029;
    /// IPX Control Protocol
    pub const IPXCP: u16 = 0x802b;
    /// Encryption Control Protocol
    pub const ECP: u16 = 0x8053;
    /// IPv6 Control Protocol
    pub const IPV6CP: u16 = 0x8057;
    /// Compression Control Protocol
    pub const CCP: u16 = 0x80fd;
    /// Link Control Protocol
    pub const LCP: u16 = 0xc021;
    /// Password Authentication Protocol
    pub const PAP: u16 = 0xc023;
    /// Link Quality Report
    pub const LQR: u16 = 0xc025;
    /// Callback Control Protocol
    pub const CBCP: u16 = 0xc029;
    /// Challenge Handshake Authentication Protocol
    pub const CHAP: u16 = 0xc223;
    /// Extensible Authentication Protocol
    pub const EAP: u16 = 0xc227;
}

/// A typed PPP frame.
///
/// IPv4 and IPCP payloads are handed on unchanged; IPCP re-enters
/// [`CpPacket::decode`] inside the IPCP machine so that a payload the
/// machine is not ready for never costs a parse.
#[derive(Debug, Clone, PartialEq)]
pub enum PppFrame {
    Ipv4(Vec<u8>),
    Ipcp(Vec<u8>),
    Lcp(CpPacket<LcpOpt>),
    Pap(PapPacket),
    Chap(ChapPacket),
    Unknown { protocol: u16, payload: Vec<u8> },
}

impl PppFrame {
    /// PPP protocol number of this frame.
    pub fn protocol(&self) -> u16 {
        match self {
            PppFrame::Ipv4(_) => protocols::IPV4,
            PppFrame::Ipcp(_) => ipcp::PROTOCOL,
            PppFrame::Lcp(_) => lcp::PROTOCOL,
            PppFrame::Pap(_) => pap::PROTOCOL,
            PppFrame::Chap(_) => chap::PROTOCOL,
            PppFrame::Unknown { protocol, .. } => *protocol,
        }
    }

    /// Decode a PPP payload starting at the Protocol field.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < PPP_HEADER_SIZE {
            return Err(Error::Parse("PPP frame too short".into()));
        }

        let protocol = u16::from_be_bytes([buf[0], buf[1]]);
        let payload = &buf[PPP_HEADER_SIZE..];

        Ok(match protocol {
            protocols::IPV4 => PppFrame::Ipv4(payload.to_vec()),
            protocols::IPCP => PppFrame::Ipcp(payload.to_vec()),
            protocols::LCP => PppFrame::Lcp(CpPacket::decode(payload)?),
            protocols::PAP => PppFrame::Pap(PapPacket::decode(payload)?),
            protocols::CHAP => PppFrame::Chap(ChapPacket::decode(payload)?),
            _ => PppFrame::Unknown {
                protocol,
                payload: payload.to_vec(),
            },
        })
    }

    /// Encode this frame, Protocol field onward.
    pub fn encode(&self) -> Vec<u8> {
        let payload = match self {
            PppFrame::Ipv4(payload) | PppFrame::Ipcp(payload) => payload.clone(),
            PppFrame::Lcp(packet) => packet.encode(),
            PppFrame::Pap(packet) => packet.encode(),
            PppFrame::Chap(packet) => packet.encode(),
            PppFrame::Unknown { payload, .. } => payload.clone(),
        };

        let mut frame = Vec::with_capacity(PPP_HEADER_SIZE + payload.len());
        frame.extend_from_slice(&self.protocol().to_be_bytes());
        frame.extend_from_slice(&payload);
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::cp::CpBody;
    use crate::protocol::pap::PapMessage;

    #[test]
    fn test_decode_lcp() {
        let data = [
            0xc0, 0x21, // Protocol: LCP
            0x01, 0x01, 0x00, 0x08, // Configure-Request id=1
            0x01, 0x04, 0x05, 0xd4, // MRU=1492
        ];

        let frame = PppFrame::decode(&data).unwrap();
        match frame {
            PppFrame::Lcp(packet) => {
                assert_eq!(packet.identifier, 1);
                assert_eq!(
                    packet.body,
                    CpBody::ConfigureRequest(vec![LcpOpt::Mru(1492)])
                );
            }
            other => panic!("expected LCP, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_ipcp_stays_raw() {
        let data = [0x80, 0x21, 0x01, 0x02, 0x00, 0x0a, 0x03, 0x06, 0, 0, 0, 0];

        let frame = PppFrame::decode(&data).unwrap();
        assert_eq!(frame, PppFrame::Ipcp(data[2..].to_vec()));
    }

    #[test]
    fn test_decode_ipv4() {
        let data = [0x00, 0x21, 0x45, 0x00, 0x00, 0x14];

        let frame = PppFrame::decode(&data).unwrap();
        assert_eq!(frame, PppFrame::Ipv4(vec![0x45, 0x00, 0x00, 0x14]));
    }

    #[test]
    fn test_decode_pap() {
        let data = [
            0xc0, 0x23, // Protocol: PAP
            0x01, 0x01, 0x00, 0x09, // Authenticate-Request id=1
            0x01, b'a', // Peer-ID "a"
            0x02, b'p', b'w', // Password "pw"
        ];

        let frame = PppFrame::decode(&data).unwrap();
        match frame {
            PppFrame::Pap(packet) => {
                assert_eq!(
                    packet.message,
                    PapMessage::AuthenticateRequest {
                        peer_id: b"a".to_vec(),
                        password: b"pw".to_vec(),
                    }
                );
            }
            other => panic!("expected PAP, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_protocol() {
        let data = [0x40, 0x21, 0xde, 0xad];

        let frame = PppFrame::decode(&data).unwrap();
        assert_eq!(
            frame,
            PppFrame::Unknown {
                protocol: 0x4021,
                payload: vec![0xde, 0xad],
            }
        );
    }

    #[test]
    fn test_decode_reserved_ncp_is_unknown() {
        // IPv6CP is in the constants table but not negotiated by this engine
        let data = [0x80, 0x57, 0x01, 0x01, 0x00, 0x04];

        let frame = PppFrame::decode(&data).unwrap();
        assert_eq!(frame.protocol(), protocols::IPV6CP);
        assert!(matches!(frame, PppFrame::Unknown { .. }));
    }

    #[test]
    fn test_roundtrip() {
        let frames = vec![
            PppFrame::Ipv4(vec![0x45, 0, 0, 20]),
            PppFrame::Ipcp(vec![0x01, 0x01, 0x00, 0x04]),
            PppFrame::Lcp(CpPacket {
                identifier: 3,
                body: CpBody::EchoRequest,
            }),
            PppFrame::Pap(PapPacket {
                identifier: 1,
                message: PapMessage::AuthenticateAck {
                    message: b"ok".to_vec(),
                },
            }),
            PppFrame::Unknown {
                protocol: 0x80fd,
                payload: vec![14, 1, 0, 4],
            },
        ];

        for frame in frames {
            let decoded = PppFrame::decode(&frame.encode()).unwrap();
            assert_eq!(decoded, frame);
        }
    }

    #[test]
    fn test_decode_too_short() {
        assert!(PppFrame::decode(&[0xc0]).is_err());
    }

    #[test]
    fn test_decode_malformed_lcp_is_error() {
        // Truncated LCP body surfaces as a parse error, not a panic
        let data = [0xc0, 0x21, 0x01, 0x01, 0x00, 0x20];
        assert!(PppFrame::decode(&data).is_err());
    }
}

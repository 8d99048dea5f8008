//! IPCP options - RFC 1332
//!
//! Internet Protocol Control Protocol configuration options. IP-Address
//! (type 3) is the one this engine negotiates; the remaining registered types
//! decode into their own variants so policies can reject them by name.

use super::cp::OptionCodec;
use std::net::Ipv4Addr;

/// PPP protocol number for IPCP.
pub const PROTOCOL: u16 = 0x8021;

/// IPCP option types
pub mod options {
    /// IP-Addresses (deprecated, RFC 1172)
    pub const IP_ADDRESSES: u8 = 1;
    /// IP-Compression-Protocol
    pub const IP_COMPRESSION: u8 = 2;
    /// IP-Address
    pub const IP_ADDRESS: u8 = 3;
    /// Mobile-IPv4 (RFC 2290)
    pub const MOBILE_IPV4: u8 = 4;
    /// Primary DNS Server Address (RFC 1877)
    pub const PRIMARY_DNS: u8 = 129;
    /// Primary NBNS Server Address (RFC 1877)
    pub const PRIMARY_NBNS: u8 = 130;
    /// Secondary DNS Server Address (RFC 1877)
    pub const SECONDARY_DNS: u8 = 131;
    /// Secondary NBNS Server Address (RFC 1877)
    pub const SECONDARY_NBNS: u8 = 132;
}

/// An IPCP configuration option.
#[derive(Debug, Clone, PartialEq)]
pub enum IpcpOpt {
    IpAddresses { local: Ipv4Addr, remote: Ipv4Addr },
    IpCompression { protocol: u16, data: Vec<u8> },
    IpAddress(Ipv4Addr),
    MobileIpv4(Ipv4Addr),
    PrimaryDns(Ipv4Addr),
    PrimaryNbns(Ipv4Addr),
    SecondaryDns(Ipv4Addr),
    SecondaryNbns(Ipv4Addr),
    Raw(u8, Vec<u8>),
}

impl IpcpOpt {
    /// Wire type byte.
    pub fn opt_type(&self) -> u8 {
        match self {
            IpcpOpt::IpAddresses { .. } => options::IP_ADDRESSES,
            IpcpOpt::IpCompression { .. } => options::IP_COMPRESSION,
            IpcpOpt::IpAddress(_) => options::IP_ADDRESS,
            IpcpOpt::MobileIpv4(_) => options::MOBILE_IPV4,
            IpcpOpt::PrimaryDns(_) => options::PRIMARY_DNS,
            IpcpOpt::PrimaryNbns(_) => options::PRIMARY_NBNS,
            IpcpOpt::SecondaryDns(_) => options::SECONDARY_DNS,
            IpcpOpt::SecondaryNbns(_) => options::SECONDARY_NBNS,
            IpcpOpt::Raw(t, _) => *t,
        }
    }
}

fn addr(value: &[u8]) -> Ipv4Addr {
    Ipv4Addr::new(value[0], value[1], value[2], value[3])
}

impl OptionCodec for IpcpOpt {
    fn decode(opt_type: u8, value: &[u8]) -> Self {
        match (opt_type, value.len()) {
            (options::IP_ADDRESSES, 8) => IpcpOpt::IpAddresses {
                local: addr(&value[0..4]),
                remote: addr(&value[4..8]),
            },
            (options::IP_COMPRESSION, n) if n >= 2 => IpcpOpt::IpCompression {
                protocol: u16::from_be_bytes([value[0], value[1]]),
                data: value[2..].to_vec(),
            },
            (options::IP_ADDRESS, 4) => IpcpOpt::IpAddress(addr(value)),
            (options::MOBILE_IPV4, 4) => IpcpOpt::MobileIpv4(addr(value)),
            (options::PRIMARY_DNS, 4) => IpcpOpt::PrimaryDns(addr(value)),
            (options::PRIMARY_NBNS, 4) => IpcpOpt::PrimaryNbns(addr(value)),
            (options::SECONDARY_DNS, 4) => IpcpOpt::SecondaryDns(addr(value)),
            (options::SECONDARY_NBNS, 4) => IpcpOpt::SecondaryNbns(addr(value)),
            _ => IpcpOpt::Raw(opt_type, value.to_vec()),
        }
    }

    fn raw(opt_type: u8, value: Vec<u8>) -> Self {
        IpcpOpt::Raw(opt_type, value)
    }

    fn encode(&self) -> (u8, Vec<u8>) {
        let value = match self {
            IpcpOpt::IpAddresses { local, remote } => {
                let mut v = local.octets().to_vec();
                v.extend_from_slice(&remote.octets());
                v
            }
            IpcpOpt::IpCompression { protocol, data } => {
                let mut v = protocol.to_be_bytes().to_vec();
                v.extend_from_slice(data);
                v
            }
            IpcpOpt::IpAddress(ip)
            | IpcpOpt::MobileIpv4(ip)
            | IpcpOpt::PrimaryDns(ip)
            | IpcpOpt::PrimaryNbns(ip)
            | IpcpOpt::SecondaryDns(ip)
            | IpcpOpt::SecondaryNbns(ip) => ip.octets().to_vec(),
            IpcpOpt::Raw(_, value) => value.clone(),
        };
        (self.opt_type(), value)
    }
}

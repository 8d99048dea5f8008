//! IPCP negotiation policy - RFC 1332
//!
//! Negotiates the IPv4 addresses of both ends. We always know our own
//! address; the peer either proposes a concrete one or asks for an
//! assignment with 0.0.0.0 and gets the configured suggestion in a nak.
//! DNS requests (RFC 1877) are answered from config the same way.

use std::net::Ipv4Addr;

use tracing::debug;

use crate::config::{IpcpSection, SessionOpts};
use crate::protocol::ipcp::{IpcpOpt, PROTOCOL};

use super::automaton::{Classified, OptionPolicy};

/// IPCP policy for one link.
#[derive(Debug)]
pub struct IpcpPolicy {
    our_ip: Ipv4Addr,
    /// Address we want the peer to use.
    peer_ip: Ipv4Addr,
    dns: Vec<Ipv4Addr>,
}

impl IpcpPolicy {
    /// `opts` is the merged session option set; an authenticated user's
    /// `peer_ip` override beats the pool address.
    pub fn new(config: &IpcpSection, opts: &SessionOpts) -> Self {
        let peer_ip = opts
            .get("peer_ip")
            .and_then(|s| s.parse().ok())
            .unwrap_or(config.peer_ip);

        Self {
            our_ip: config.our_ip,
            peer_ip,
            dns: config.dns.clone(),
        }
    }

    pub fn our_ip(&self) -> Ipv4Addr {
        self.our_ip
    }

    pub fn peer_ip(&self) -> Ipv4Addr {
        self.peer_ip
    }

    fn dns_for(&self, index: usize) -> Option<Ipv4Addr> {
        self.dns.get(index).copied()
    }
}

impl OptionPolicy for IpcpPolicy {
    type Opt = IpcpOpt;

    fn protocol(&self) -> u16 {
        PROTOCOL
    }

    fn name(&self) -> &'static str {
        "ipcp"
    }

    fn request(&mut self) -> Vec<IpcpOpt> {
        vec![IpcpOpt::IpAddress(self.our_ip)]
    }

    fn classify(&mut self, request: &[IpcpOpt]) -> Classified<IpcpOpt> {
        let mut classified = Classified::default();

        for opt in request {
            match opt {
                IpcpOpt::IpAddress(ip) => {
                    if ip.is_unspecified() || *ip != self.peer_ip {
                        // RFC 1332: suggest the address we want it to use.
                        classified.nak.push(IpcpOpt::IpAddress(self.peer_ip));
                    } else {
                        classified.ack.push(opt.clone());
                    }
                }
                IpcpOpt::PrimaryDns(ip) => match self.dns_for(0) {
                    Some(server) if *ip != server => {
                        classified.nak.push(IpcpOpt::PrimaryDns(server))
                    }
                    Some(_) => classified.ack.push(opt.clone()),
                    None => classified.reject.push(opt.clone()),
                },
                IpcpOpt::SecondaryDns(ip) => match self.dns_for(1) {
                    Some(server) if *ip != server => {
                        classified.nak.push(IpcpOpt::SecondaryDns(server))
                    }
                    Some(_) => classified.ack.push(opt.clone()),
                    None => classified.reject.push(opt.clone()),
                },
                IpcpOpt::IpAddresses { .. }
                | IpcpOpt::IpCompression { .. }
                | IpcpOpt::MobileIpv4(_)
                | IpcpOpt::PrimaryNbns(_)
                | IpcpOpt::SecondaryNbns(_)
                | IpcpOpt::Raw(..) => classified.reject.push(opt.clone()),
            }
        }

        classified
    }

    fn nak_received(&mut self, options: &[IpcpOpt]) {
        for opt in options {
            if let IpcpOpt::IpAddress(ip) = opt {
                if !ip.is_unspecified() {
                    debug!("ipcp: adopting our address {} from peer nak", ip);
                    self.our_ip = *ip;
                }
            }
        }
    }

    fn reject_received(&mut self, options: &[IpcpOpt]) {
        for opt in options {
            debug!("ipcp: peer rejected {:?}", opt);
        }
    }
}

/// IP-Address in an acknowledged option list, if present.
pub fn address_in(opts: &[IpcpOpt]) -> Option<Ipv4Addr> {
    opts.iter().find_map(|opt| match opt {
        IpcpOpt::IpAddress(ip) => Some(*ip),
        _ => None,
    })
}

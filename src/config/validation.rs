//! Configuration validation

use super::{AuthMethod, Config};

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            eprintln!("[WARN] {}", warning);
        }
        for error in &self.errors {
            eprintln!("[ERROR] {}", error);
        }
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_link(config, &mut result);
    validate_ipcp(config, &mut result);
    validate_users(config, &mut result);

    result
}

fn validate_link(config: &Config, result: &mut ValidationResult) {
    let link = &config.link;

    if link.mru < 576 {
        result.error(format!("link.mru: {} is below the RFC 1661 minimum 576", link.mru));
    }
    if link.max_mru < link.mru {
        result.error(format!(
            "link.max_mru: {} is smaller than link.mru {}",
            link.max_mru, link.mru
        ));
    }

    if link.auth_required {
        if link.allowed_auth.is_empty() {
            result.error("link.allowed_auth: empty but auth_required is set".to_string());
        }
        if config.users.is_empty() {
            result.warn("link.auth_required set but no [users.*] entries exist".to_string());
        }
        if !link.allowed_auth.contains(&AuthMethod::Pap) {
            result.warn(
                "link.allowed_auth: only PAP has a driver; CHAP/EAP peers will be rejected"
                    .to_string(),
            );
        }
    }

    if link.our_username.is_some() != link.our_password.is_some() {
        result.error(
            "link.our_username and link.our_password must be set together".to_string(),
        );
    }

    if let Some(magic) = link.magic {
        if magic == 0 {
            result.error("link.magic: 0 is not a valid magic number".to_string());
        }
    }

    if link.interim_accounting == 0 {
        result.error("link.interim_accounting: must be at least 1 second".to_string());
    }

    if link.listen.parse::<std::net::SocketAddr>().is_err() {
        result.error(format!("link.listen: `{}` is not host:port", link.listen));
    }
}

fn validate_ipcp(config: &Config, result: &mut ValidationResult) {
    let ipcp = &config.ipcp;

    if ipcp.our_ip.is_unspecified() {
        result.error("ipcp.our_ip: must not be 0.0.0.0".to_string());
    }
    if ipcp.peer_ip.is_unspecified() {
        result.error("ipcp.peer_ip: must not be 0.0.0.0".to_string());
    }
    if ipcp.our_ip == ipcp.peer_ip {
        result.error("ipcp: our_ip and peer_ip must differ".to_string());
    }
    if ipcp.dns.len() > 2 {
        result.warn(format!(
            "ipcp.dns: only the first two of {} servers are offered",
            ipcp.dns.len()
        ));
    }
}

fn validate_users(config: &Config, result: &mut ValidationResult) {
    for (name, user) in &config.users {
        if user.password.is_empty() {
            result.error(format!("users.{}: empty password", name));
        }
        if let Some(peer_ip) = user.overrides.get("peer_ip") {
            if peer_ip.parse::<std::net::Ipv4Addr>().is_err() {
                result.error(format!(
                    "users.{}: peer_ip override `{}` is not an IPv4 address",
                    name, peer_ip
                ));
            }
        }
    }
}

//! Configuration types

use serde::Deserialize;
use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::protocol::lcp::{AuthProto, ChapDigest};

/// Per-user session option overrides, and the merge the link applies when an
/// authenticated user brings their own values: string keyed, last write wins.
pub type SessionOpts = HashMap<String, String>;

/// Merge `overrides` over `base`, last write wins.
pub fn merge_session_opts(base: &SessionOpts, overrides: &SessionOpts) -> SessionOpts {
    let mut merged = base.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// User-defined configuration (ppplink.toml)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log: LogSection,
    #[serde(default)]
    pub link: LinkSection,
    #[serde(default)]
    pub ipcp: IpcpSection,
    #[serde(default)]
    pub accounting: AccountingSection,
    #[serde(default)]
    pub users: HashMap<String, UserSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkSection {
    /// UDP endpoint the daemon answers PPP payloads on.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// MRU we announce to the peer.
    #[serde(default = "default_mru")]
    pub mru: u16,
    /// Largest MRU we accept from the peer before naking.
    #[serde(default = "default_max_mru")]
    pub max_mru: u16,
    /// Fixed magic number; absent means a fresh random one per session.
    pub magic: Option<u32>,
    /// Require the peer to authenticate to us.
    #[serde(default)]
    pub auth_required: bool,
    /// Authentication protocols we are willing to speak, preferred first.
    #[serde(default = "default_allowed_auth")]
    pub allowed_auth: Vec<AuthMethod>,
    /// Credentials for proving ourselves when the peer demands it.
    pub our_username: Option<String>,
    pub our_password: Option<String>,
    /// Interim accounting interval in seconds.
    #[serde(default = "default_interim")]
    pub interim_accounting: u32,
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            mru: default_mru(),
            max_mru: default_max_mru(),
            magic: None,
            auth_required: false,
            allowed_auth: default_allowed_auth(),
            our_username: None,
            our_password: None,
            interim_accounting: default_interim(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:6633".to_string()
}

fn default_mru() -> u16 {
    1492
}

fn default_max_mru() -> u16 {
    1500
}

fn default_allowed_auth() -> Vec<AuthMethod> {
    vec![AuthMethod::Pap]
}

fn default_interim() -> u32 {
    10
}

/// Authentication protocol selection as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    Pap,
    ChapMd5,
    ChapSha1,
    Eap,
}

impl AuthMethod {
    /// The LCP option value this method negotiates as.
    pub fn to_proto(self) -> AuthProto {
        match self {
            AuthMethod::Pap => AuthProto::Pap,
            AuthMethod::ChapMd5 => AuthProto::Chap(ChapDigest::Md5),
            AuthMethod::ChapSha1 => AuthProto::Chap(ChapDigest::Sha1),
            AuthMethod::Eap => AuthProto::Eap,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpcpSection {
    /// Our end of the point-to-point link.
    #[serde(default = "default_our_ip")]
    pub our_ip: Ipv4Addr,
    /// The address we hand to the peer when it asks (or proposes 0.0.0.0).
    #[serde(default = "default_peer_ip")]
    pub peer_ip: Ipv4Addr,
    /// DNS servers offered through the RFC 1877 options.
    #[serde(default)]
    pub dns: Vec<Ipv4Addr>,
}

impl Default for IpcpSection {
    fn default() -> Self {
        Self {
            our_ip: default_our_ip(),
            peer_ip: default_peer_ip(),
            dns: Vec::new(),
        }
    }
}

fn default_our_ip() -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, 1)
}

fn default_peer_ip() -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, 2)
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountingSection {
    #[serde(default = "default_nas_identifier")]
    pub nas_identifier: String,
    /// RADIUS accounting endpoint; absent means records go to the log.
    pub server: Option<String>,
}

impl Default for AccountingSection {
    fn default() -> Self {
        Self {
            nas_identifier: default_nas_identifier(),
            server: None,
        }
    }
}

fn default_nas_identifier() -> String {
    "ppplink".to_string()
}

/// One credential entry. Keys other than `password` are per-user session
/// option overrides (`peer_ip`, `username`, `interim_accounting`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct UserSection {
    pub password: String,
    #[serde(flatten)]
    pub overrides: SessionOpts,
}

impl Config {
    /// Base session options derived from the static config; per-user
    /// overrides merge over these after authentication.
    pub fn base_session_opts(&self) -> SessionOpts {
        let mut opts = SessionOpts::new();
        opts.insert("peer_ip".to_string(), self.ipcp.peer_ip.to_string());
        opts.insert(
            "interim_accounting".to_string(),
            self.link.interim_accounting.to_string(),
        );
        opts
    }
}

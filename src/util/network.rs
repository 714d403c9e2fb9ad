use ipnet::IpNet;
use std::net::IpAddr;
use tracing::warn;

use crate::config::NetworkConfig;
use crate::error::ConfigurationError;

pub const BLOCKED_TITLE: &str = "VPN Access Required";
pub const BLOCKED_MESSAGE: &str = "Please connect to the company VPN to access this application.";

/// Allow/deny predicate over caller addresses.
#[derive(Debug, Clone)]
pub struct NetworkGate {
    enforced: bool,
    allowed: Vec<IpNet>,
    trust_forwarded_for: bool,
}

impl NetworkGate {
    pub fn new(enforced: bool, allowed: Vec<IpNet>) -> Self {
        Self {
            enforced,
            allowed,
            trust_forwarded_for: false,
        }
    }

    /// Unparseable ranges are skipped; the gate stays closed for them.
    pub fn from_config(config: &NetworkConfig) -> Self {
        let allowed = config
            .allowed_networks
            .iter()
            .filter_map(|range| match range.trim().parse::<IpNet>() {
                Ok(net) => Some(net),
                Err(e) => {
                    let invalid = ConfigurationError::Invalid {
                        key: "network.allowed_networks".to_string(),
                        reason: format!("'{}' is not a CIDR range ({})", range, e),
                    };
                    warn!("Ignoring {}", invalid);
                    None
                }
            })
            .collect();

        Self {
            enforced: config.require_vpn && !config.local_development,
            allowed,
            trust_forwarded_for: config.trust_forwarded_for,
        }
    }

    pub fn is_enforced(&self) -> bool {
        self.enforced
    }

    pub fn trusts_forwarded_for(&self) -> bool {
        self.trust_forwarded_for
    }

    pub fn allows(&self, ip: IpAddr) -> bool {
        if !self.enforced {
            return true;
        }
        let ip = canonical(ip);
        self.allowed.iter().any(|net| net.contains(&ip))
    }
}

/// IPv4-mapped IPv6 peers (dual-stack listeners) are checked as IPv4.
fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

/// First address of an `X-Forwarded-For` header value.
pub fn forwarded_client(header: &str) -> Option<IpAddr> {
    header.split(',').next()?.trim().parse().ok()
}

//! The user being anonymized
//!
//! [`Subject`] is built once per run from command-line input. Building it validates
//! the username and the IP, fills in a generated pseudonym when none was supplied and
//! draws the replacement IP from the configured pseudonym range.

use crate::domain::errors::ForgetError;
use crate::domain::result::Result;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::net::{IpAddr, Ipv4Addr};
use uuid::Uuid;

/// Tenant domain of the default (super) tenant
pub const SUPER_TENANT_DOMAIN: &str = "carbon.super";

/// Start of the default IP pseudonym range (reserved 240.0.0.0/4 space)
pub const DEFAULT_IP_RANGE_START: Ipv4Addr = Ipv4Addr::new(240, 0, 0, 1);

/// End of the default IP pseudonym range
pub const DEFAULT_IP_RANGE_END: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 254);

/// Inclusive IPv4 range replacement addresses are drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpRange {
    start: Ipv4Addr,
    end: Ipv4Addr,
}

impl IpRange {
    /// Creates a range, rejecting `start > end`
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> Result<Self> {
        if u32::from(start) > u32::from(end) {
            return Err(ForgetError::Configuration(format!(
                "IP pseudonym range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The reserved range used when nothing is configured
    pub fn reserved() -> Self {
        Self {
            start: DEFAULT_IP_RANGE_START,
            end: DEFAULT_IP_RANGE_END,
        }
    }

    /// Draws one address uniformly from the range
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Ipv4Addr {
        Ipv4Addr::from(rng.gen_range(u32::from(self.start)..=u32::from(self.end)))
    }

    /// Whether `ip` lies within the range
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        (u32::from(self.start)..=u32::from(self.end)).contains(&u32::from(ip))
    }

    pub fn start(&self) -> Ipv4Addr {
        self.start
    }

    pub fn end(&self) -> Ipv4Addr {
        self.end
    }
}

impl Default for IpRange {
    fn default() -> Self {
        Self::reserved()
    }
}

/// How a missing pseudonym is generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PseudonymSource {
    /// Random UUID v4
    #[default]
    Uuid,
    /// Hex SHA-256 of the username
    Sha256,
}

impl PseudonymSource {
    /// Generates a pseudonym for `username`
    pub fn generate(&self, username: &str) -> String {
        match self {
            PseudonymSource::Uuid => Uuid::new_v4().to_string(),
            PseudonymSource::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(username.as_bytes());
                format!("{:x}", hasher.finalize())
            }
        }
    }
}

/// The user whose identifying data is replaced in this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    username: String,
    pseudonym: String,
    tenant_domain: String,
    email: Option<String>,
    ip: Option<String>,
    ip_pseudonym: Ipv4Addr,
    super_tenant_domain: String,
    pseudonym_generated: bool,
}

impl Subject {
    /// Starts building a subject for `username`
    pub fn builder(username: impl Into<String>) -> SubjectBuilder {
        SubjectBuilder::new(username)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn pseudonym(&self) -> &str {
        &self.pseudonym
    }

    pub fn tenant_domain(&self) -> &str {
        &self.tenant_domain
    }

    /// Email address, `None` when not supplied or empty
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// IP address as supplied, `None` when not supplied or empty
    pub fn ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    /// Replacement IP, generated even when no IP was supplied
    pub fn ip_pseudonym(&self) -> Ipv4Addr {
        self.ip_pseudonym
    }

    /// Whether the pseudonym was generated rather than supplied
    pub fn pseudonym_generated(&self) -> bool {
        self.pseudonym_generated
    }

    /// Whether the subject belongs to the super tenant (case-insensitive)
    pub fn is_default_tenant(&self) -> bool {
        self.tenant_domain.eq_ignore_ascii_case(&self.super_tenant_domain)
    }

    /// `username@tenant_domain`
    pub fn username_with_domain(&self) -> String {
        format!("{}@{}", self.username, self.tenant_domain)
    }

    /// `pseudonym@tenant_domain`
    pub fn pseudonym_with_domain(&self) -> String {
        format!("{}@{}", self.pseudonym, self.tenant_domain)
    }
}

/// Builder for [`Subject`]
#[derive(Debug, Clone)]
pub struct SubjectBuilder {
    username: String,
    pseudonym: Option<String>,
    tenant_domain: Option<String>,
    email: Option<String>,
    ip: Option<String>,
    ip_pseudonym: Option<Ipv4Addr>,
    ip_range: IpRange,
    super_tenant_domain: String,
    pseudonym_source: PseudonymSource,
}

impl SubjectBuilder {
    fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            pseudonym: None,
            tenant_domain: None,
            email: None,
            ip: None,
            ip_pseudonym: None,
            ip_range: IpRange::reserved(),
            super_tenant_domain: SUPER_TENANT_DOMAIN.to_string(),
            pseudonym_source: PseudonymSource::Uuid,
        }
    }

    pub fn pseudonym(mut self, pseudonym: Option<impl Into<String>>) -> Self {
        self.pseudonym = pseudonym.map(Into::into);
        self
    }

    pub fn tenant_domain(mut self, tenant_domain: Option<impl Into<String>>) -> Self {
        self.tenant_domain = tenant_domain.map(Into::into);
        self
    }

    pub fn email(mut self, email: Option<impl Into<String>>) -> Self {
        self.email = email.map(Into::into);
        self
    }

    pub fn ip(mut self, ip: Option<impl Into<String>>) -> Self {
        self.ip = ip.map(Into::into);
        self
    }

    /// Fixes the replacement IP instead of drawing one
    pub fn ip_pseudonym(mut self, ip_pseudonym: Ipv4Addr) -> Self {
        self.ip_pseudonym = Some(ip_pseudonym);
        self
    }

    pub fn ip_range(mut self, range: IpRange) -> Self {
        self.ip_range = range;
        self
    }

    /// Overrides the domain treated as the default tenant
    pub fn super_tenant_domain(mut self, domain: impl Into<String>) -> Self {
        self.super_tenant_domain = domain.into();
        self
    }

    pub fn pseudonym_source(mut self, source: PseudonymSource) -> Self {
        self.pseudonym_source = source;
        self
    }

    /// Validates the input and produces the subject
    pub fn build(self) -> Result<Subject> {
        let username = self.username.trim().to_string();
        if username.is_empty() {
            return Err(ForgetError::InvalidInput(
                "Username cannot be empty".to_string(),
            ));
        }

        let ip = match non_empty(self.ip) {
            Some(ip) => {
                ip.parse::<IpAddr>().map_err(|_| {
                    ForgetError::InvalidInput(format!("Invalid IP address: {ip}"))
                })?;
                Some(ip)
            }
            None => None,
        };

        let (pseudonym, pseudonym_generated) = match non_empty(self.pseudonym) {
            Some(pseudonym) => (pseudonym, false),
            None => (self.pseudonym_source.generate(&username), true),
        };

        let tenant_domain =
            non_empty(self.tenant_domain).unwrap_or_else(|| self.super_tenant_domain.clone());

        let ip_pseudonym = self
            .ip_pseudonym
            .unwrap_or_else(|| self.ip_range.generate(&mut rand::thread_rng()));

        Ok(Subject {
            username,
            pseudonym,
            tenant_domain,
            email: non_empty(self.email),
            ip,
            ip_pseudonym,
            super_tenant_domain: self.super_tenant_domain,
            pseudonym_generated,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

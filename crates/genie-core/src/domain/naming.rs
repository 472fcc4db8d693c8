//! Naming resolver: `(slug, root domain)` → external resource names.
//!
//! Everything here is a pure function of its input. Recomputing the names for
//! the same site always yields the same project and hostname, which is what
//! lets `deploy` be re-run safely.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::error::DomainError;

/// Prefix shared by every hosting project this tool creates.
pub const PROJECT_PREFIX: &str = "lp-";

/// Cloudflare Pages rejects project names longer than this.
pub const MAX_PROJECT_NAME_LEN: usize = 58;

/// DNS labels are limited to 63 octets.
const MAX_LABEL_LEN: usize = 63;

// ── Slug ─────────────────────────────────────────────────────────────────────

/// A validated site identifier, usable both as a directory name and a DNS label.
///
/// Invariant: 1–63 chars of `[a-z0-9-]`, no leading or trailing hyphen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Validate a slug exactly as given.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let invalid = |reason: &str| DomainError::InvalidSlug {
            slug: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("slug cannot be empty"));
        }
        if raw.len() > MAX_LABEL_LEN {
            return Err(invalid("slug must be at most 63 characters"));
        }
        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
        {
            return Err(invalid(&format!(
                "character '{c}' is not allowed (use a-z, 0-9 and '-')"
            )));
        }
        if raw.starts_with('-') || raw.ends_with('-') {
            return Err(invalid("slug cannot start or end with '-'"));
        }

        Ok(Self(raw.to_string()))
    }

    /// Lenient constructor for user input: trims, lowercases and turns spaces
    /// into hyphens before validating.
    pub fn normalize(raw: &str) -> Result<Self, DomainError> {
        let cleaned = raw.trim().to_lowercase().replace(' ', "-");
        Self::parse(&cleaned)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Slug {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Slug {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── RootDomain ───────────────────────────────────────────────────────────────

/// A normalized apex domain such as `example.com`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RootDomain(String);

impl RootDomain {
    /// Normalize user or config input: strips scheme, path, port and trailing
    /// dot, then lowercases.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let invalid = |reason: &str| DomainError::InvalidRootDomain {
            domain: raw.to_string(),
            reason: reason.to_string(),
        };

        let mut host = raw.trim();
        if let Some((_, rest)) = host.split_once("://") {
            host = rest;
        }
        host = host.split(['/', '?', '#']).next().unwrap_or_default();
        host = host.split(':').next().unwrap_or_default();
        let host = host.trim_end_matches('.').to_ascii_lowercase();

        if host.is_empty() {
            return Err(invalid("domain is empty"));
        }
        if !host.contains('.') {
            return Err(invalid("domain must contain at least one dot"));
        }
        if host
            .chars()
            .any(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-'))
        {
            return Err(invalid("domain may only contain a-z, 0-9, '.' and '-'"));
        }
        if host.split('.').any(|label| {
            label.is_empty()
                || label.len() > MAX_LABEL_LEN
                || label.starts_with('-')
                || label.ends_with('-')
        }) {
            return Err(invalid("domain contains an empty or malformed label"));
        }

        Ok(Self(host))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Project-name friendly form: dots become hyphens.
    pub fn dashed(&self) -> String {
        self.0.replace('.', "-")
    }
}

impl fmt::Display for RootDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── ResourceNames ────────────────────────────────────────────────────────────

/// Derived, never stored: names of the remote resources backing one site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceNames {
    pub project_name: String,
    pub fqdn: String,
    /// Zone the DNS record lives in (the root domain).
    pub zone: String,
}

impl ResourceNames {
    /// Hostname the Pages platform serves the project on.
    pub fn pages_hostname(&self) -> String {
        format!("{}.pages.dev", self.project_name)
    }
}

/// Resolve the external names for a site.
///
/// ```
/// use genie_core::domain::naming::resolve;
///
/// let names = resolve("habitlab", "example.com").unwrap();
/// assert_eq!(names.project_name, "lp-habitlab-example-com");
/// assert_eq!(names.fqdn, "habitlab.example.com");
/// ```
pub fn resolve(slug: &str, root_domain: &str) -> Result<ResourceNames, DomainError> {
    let slug = Slug::parse(slug)?;
    let root = RootDomain::parse(root_domain)?;
    Ok(resolve_validated(&slug, &root))
}

/// Infallible variant for already validated inputs.
pub fn resolve_validated(slug: &Slug, root: &RootDomain) -> ResourceNames {
    let raw = format!("{PROJECT_PREFIX}{}-{}", slug, root.dashed());
    ResourceNames {
        project_name: clamp_project_name(&raw),
        fqdn: format!("{slug}.{root}"),
        zone: root.to_string(),
    }
}

/// Keep long names deterministic: truncate and append a short digest of the
/// full name.
fn clamp_project_name(raw: &str) -> String {
    if raw.len() <= MAX_PROJECT_NAME_LEN {
        return raw.to_string();
    }
    let digest = Sha256::digest(raw.as_bytes());
    let suffix: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    let keep = MAX_PROJECT_NAME_LEN - suffix.len() - 1;
    let head = raw[..keep].trim_end_matches('-');
    format!("{head}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_habitlab_example() {
        let names = resolve("habitlab", "example.com").unwrap();
        assert_eq!(names.project_name, "lp-habitlab-example-com");
        assert_eq!(names.fqdn, "habitlab.example.com");
        assert_eq!(names.zone, "example.com");
        assert_eq!(names.pages_hostname(), "lp-habitlab-example-com.pages.dev");
    }

    #[test]
    fn resolve_is_deterministic() {
        let a = resolve("habitlab", "https://Example.COM/").unwrap();
        let b = resolve("habitlab", "example.com").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, resolve("habitlab", "example.com.").unwrap());
    }

    #[test]
    fn root_domain_strips_scheme_port_and_path() {
        let root = RootDomain::parse("https://sub.Example.org:8443/landing?x=1").unwrap();
        assert_eq!(root.as_str(), "sub.example.org");
        assert_eq!(root.dashed(), "sub-example-org");
    }

    #[test]
    fn root_domain_rejects_bare_labels() {
        assert!(RootDomain::parse("localhost").is_err());
        assert!(RootDomain::parse("").is_err());
        assert!(RootDomain::parse("exa_mple.com").is_err());
        assert!(RootDomain::parse("example..com").is_err());
    }

    #[test]
    fn slug_rejects_illegal_characters() {
        for bad in ["", "Habit", "habit lab", "habit_lab", "-habit", "habit-", "../etc", "ü"] {
            assert!(
                matches!(Slug::parse(bad), Err(DomainError::InvalidSlug { .. })),
                "{bad:?} should be rejected"
            );
        }
        assert!(Slug::parse(&"a".repeat(64)).is_err());
        assert!(Slug::parse(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn slug_normalize_is_lenient() {
        assert_eq!(Slug::normalize("  Habit Lab ").unwrap().as_str(), "habit-lab");
        assert!(Slug::normalize("habit/lab").is_err());
    }

    #[test]
    fn invalid_slug_fails_resolve() {
        assert!(matches!(
            resolve("Bad Slug", "example.com"),
            Err(DomainError::InvalidSlug { .. })
        ));
    }

    #[test]
    fn long_project_names_are_clamped_deterministically() {
        let slug = "a".repeat(50);
        let first = resolve(&slug, "marketing.example.co.uk").unwrap();
        let second = resolve(&slug, "marketing.example.co.uk").unwrap();
        assert_eq!(first.project_name, second.project_name);
        assert!(first.project_name.len() <= MAX_PROJECT_NAME_LEN);
        assert!(first.project_name.starts_with(PROJECT_PREFIX));
        assert!(!first.project_name.ends_with('-'));

        let other = resolve(&slug, "marketing.example.co.nz").unwrap();
        assert_ne!(first.project_name, other.project_name);
    }
}

//! DNS record model and the ownership-aware upsert decision.
//!
//! Every record this tool writes carries [`OWNER_MARKER`] in its comment.
//! Ownership is decided from that marker, never from the target value alone,
//! so a record a user pointed somewhere else is never silently rewritten.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Comment attached to records created by this tool.
pub const OWNER_MARKER: &str = "managed-by=landing-genie";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Txt,
    Mx,
    #[serde(other)]
    Other,
}

impl RecordType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Aaaa => "AAAA",
            Self::Cname => "CNAME",
            Self::Txt => "TXT",
            Self::Mx => "MX",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record as it currently exists at the DNS provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    pub record_type: RecordType,
    pub name: String,
    pub content: String,
    pub proxied: bool,
    pub comment: Option<String>,
}

impl DnsRecord {
    /// `true` if the record carries this tool's ownership marker.
    pub fn is_managed(&self) -> bool {
        self.comment
            .as_deref()
            .is_some_and(|c| c.split_whitespace().any(|part| part == OWNER_MARKER))
    }

    fn matches(&self, desired: &DesiredRecord) -> bool {
        self.record_type == desired.record_type
            && self
                .content
                .trim_end_matches('.')
                .eq_ignore_ascii_case(desired.content.trim_end_matches('.'))
    }
}

/// The record a deployment wants to exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredRecord {
    pub record_type: RecordType,
    pub name: String,
    pub content: String,
    pub proxied: bool,
}

impl DesiredRecord {
    /// Proxied CNAME pointing a site's hostname at its Pages project.
    pub fn cname(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            record_type: RecordType::Cname,
            name: name.into(),
            content: target.into(),
            proxied: true,
        }
    }

    /// Comment to store on the record so later runs recognise it.
    pub fn comment(&self) -> &'static str {
        OWNER_MARKER
    }
}

/// What an upsert must do given the current state of the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordAction {
    Create,
    /// Replace the record with this id.
    Update { id: String },
    Keep,
    Conflict,
}

impl DnsRecord {
    /// Decide how to bring `existing` in line with `desired`.
    ///
    /// | existing                      | managed | action   |
    /// |-------------------------------|---------|----------|
    /// | absent                        | -       | Create   |
    /// | same type and target          | any     | Keep     |
    /// | different target or type      | yes     | Update   |
    /// | different target or type      | no      | Conflict |
    pub fn reconcile(existing: Option<&DnsRecord>, desired: &DesiredRecord) -> RecordAction {
        match existing {
            None => RecordAction::Create,
            Some(record) if record.matches(desired) => RecordAction::Keep,
            Some(record) if record.is_managed() => RecordAction::Update {
                id: record.id.clone(),
            },
            Some(_) => RecordAction::Conflict,
        }
    }
}

/// Result of an upsert, as reported by a platform client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
    /// The name is held by a record this tool did not create. Nothing was written.
    Conflict { existing: DnsRecord },
}

impl UpsertOutcome {
    /// `true` if the upsert issued a write.
    pub fn wrote(&self) -> bool {
        matches!(self, Self::Created | Self::Updated)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Conflict { .. } => "conflict",
        }
    }
}

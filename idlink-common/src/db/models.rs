//! Contact models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Contact id (surrogate key, monotonically increasing)
pub type ContactId = i64;

/// Position of a contact within its identity cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
    Primary,
    Secondary,
}

impl LinkPrecedence {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkPrecedence::Primary => "primary",
            LinkPrecedence::Secondary => "secondary",
        }
    }
}

impl fmt::Display for LinkPrecedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkPrecedence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(LinkPrecedence::Primary),
            "secondary" => Ok(LinkPrecedence::Secondary),
            other => Err(Error::Internal(format!(
                "Unknown link precedence: {}",
                other
            ))),
        }
    }
}

/// A stored contact record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    /// Primary this record belongs to; `None` for primaries
    pub linked_id: Option<ContactId>,
    pub link_precedence: LinkPrecedence,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Contact {
    pub fn is_primary(&self) -> bool {
        self.link_precedence == LinkPrecedence::Primary
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Sort key for "created first": creation time, then id
    pub fn creation_key(&self) -> (DateTime<Utc>, ContactId) {
        (self.created_at, self.id)
    }
}

/// A contact about to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub linked_id: Option<ContactId>,
    pub link_precedence: LinkPrecedence,
    pub created_at: DateTime<Utc>,
}

impl NewContact {
    /// New identity anchor
    pub fn primary(
        email: Option<String>,
        phone_number: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            phone_number,
            email,
            linked_id: None,
            link_precedence: LinkPrecedence::Primary,
            created_at,
        }
    }

    /// New alias attached to `primary_id`
    pub fn secondary(
        email: Option<String>,
        phone_number: Option<String>,
        primary_id: ContactId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            phone_number,
            email,
            linked_id: Some(primary_id),
            link_precedence: LinkPrecedence::Secondary,
            created_at,
        }
    }
}

/// Result of a store connectivity probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreProbe {
    /// Current time as reported by the store
    pub time: String,
    pub version: String,
}

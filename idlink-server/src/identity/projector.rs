//! Projection of a resolved cluster into the consolidated identity view

use idlink_common::db::{Contact, ContactId};
use serde::Serialize;

use super::{ClusterResult, IdentityError};

/// Externally visible identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityView {
    pub primary_contact_id: ContactId,
    /// Primary's email first, then secondaries in creation order, no duplicates
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub secondary_contact_ids: Vec<ContactId>,
}

/// Reduce a cluster to its identity view
///
/// Fails with `InvariantViolation` unless the cluster has exactly one active
/// primary and every active secondary links to it.
pub fn project(cluster: &ClusterResult) -> Result<IdentityView, IdentityError> {
    let active: Vec<&Contact> = cluster.contacts.iter().filter(|c| c.is_active()).collect();

    let mut primaries = active.iter().filter(|c| c.is_primary());
    let primary = primaries.next().ok_or_else(|| {
        IdentityError::InvariantViolation("cluster has no primary contact".to_string())
    })?;
    if let Some(extra) = primaries.next() {
        return Err(IdentityError::InvariantViolation(format!(
            "cluster has more than one primary ({} and {})",
            primary.id, extra.id
        )));
    }

    let mut secondaries: Vec<&Contact> = active.iter().copied().filter(|c| !c.is_primary()).collect();
    secondaries.sort_by_key(|c| c.creation_key());

    for secondary in &secondaries {
        if secondary.linked_id != Some(primary.id) {
            return Err(IdentityError::InvariantViolation(format!(
                "secondary contact {} is not linked to primary {}",
                secondary.id, primary.id
            )));
        }
    }

    let ordered = || std::iter::once(*primary).chain(secondaries.iter().copied());

    Ok(IdentityView {
        primary_contact_id: primary.id,
        emails: distinct(ordered().filter_map(|c| c.email.as_deref())),
        phone_numbers: distinct(ordered().filter_map(|c| c.phone_number.as_deref())),
        secondary_contact_ids: secondaries.iter().map(|c| c.id).collect(),
    })
}

/// First occurrence wins
fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !out.iter().any(|seen| seen == value) {
            out.push(value.to_string());
        }
    }
    out
}

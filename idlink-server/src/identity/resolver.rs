//! Cluster resolution
//!
//! **Algorithm:**
//! 1. Fetch active records matching the email or the phone (candidates)
//! 2. No candidates: insert a new primary and return it alone
//! 3. Collect the primaries behind the candidates (a candidate secondary
//!    pulls in the primary it links to)
//! 4. Several primaries: the oldest by (created_at, id) survives; every other
//!    primary is demoted under it and all of its active secondaries are
//!    re-pointed at the survivor
//! 5. Re-fetch the merged cluster; insert a secondary if the input carries an
//!    email or phone the cluster does not already have
//! 6. Commit and return the cluster
//!
//! Steps 1-6 share one transaction. Any failure drops it, rolling back
//! demotions, relinks and the insert together.

use std::collections::BTreeSet;

use chrono::Utc;
use idlink_common::db::{
    Contact, ContactId, ContactStore, ContactTx, LinkPrecedence, NewContact,
};
use tracing::{debug, info};

use super::{ContactQuery, IdentityError};

/// A resolved identity cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterResult {
    /// Primary plus active secondaries, ordered by (created_at, id)
    pub contacts: Vec<Contact>,
    /// Record inserted by this resolution, if any
    pub created: Option<ContactId>,
    /// Former primaries demoted by this resolution
    pub demoted: Vec<ContactId>,
}

impl ClusterResult {
    /// Cluster read back without mutations
    pub fn from_contacts(contacts: Vec<Contact>) -> Self {
        Self {
            contacts,
            created: None,
            demoted: Vec::new(),
        }
    }

    pub fn primary(&self) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.is_primary())
    }
}

/// Resolve one observation in a single transaction
pub async fn resolve<S: ContactStore>(
    store: &S,
    query: &ContactQuery,
) -> Result<ClusterResult, IdentityError> {
    let mut tx = store.begin().await?;

    let candidates = tx
        .find_matching(query.email(), query.phone_number())
        .await?;
    // Read the clock only once the transaction's snapshot is taken
    let now = Utc::now();

    if candidates.is_empty() {
        let created = tx
            .insert(NewContact::primary(
                query.email().map(str::to_owned),
                query.phone_number().map(str::to_owned),
                now,
            ))
            .await?;
        tx.commit().await?;

        info!(contact_id = created.id, "New identity created");
        return Ok(ClusterResult {
            created: Some(created.id),
            demoted: Vec::new(),
            contacts: vec![created],
        });
    }

    let mut primaries = load_primaries(&mut tx, &candidates).await?;
    primaries.sort_by_key(Contact::creation_key);
    let mut primaries = primaries.into_iter();
    let survivor = primaries.next().ok_or_else(|| {
        IdentityError::InvariantViolation("candidates without a primary".to_string())
    })?;

    let mut demoted = Vec::new();
    for loser in primaries {
        let relinked = tx.relink_secondaries(loser.id, survivor.id, now).await?;
        tx.demote(loser.id, survivor.id, now).await?;

        info!(
            primary_id = survivor.id,
            demoted_id = loser.id,
            relinked,
            "Merged identity clusters"
        );
        demoted.push(loser.id);
    }

    let mut contacts = tx.find_cluster(survivor.id).await?;

    let mut created = None;
    if introduces_new_information(&contacts, query) {
        let alias = tx
            .insert(NewContact::secondary(
                query.email().map(str::to_owned),
                query.phone_number().map(str::to_owned),
                survivor.id,
                now,
            ))
            .await?;

        debug!(
            contact_id = alias.id,
            primary_id = survivor.id,
            "Attached secondary contact"
        );
        created = Some(alias.id);
        contacts.push(alias);
    }

    tx.commit().await?;

    Ok(ClusterResult {
        contacts,
        created,
        demoted,
    })
}

/// Primaries of every cluster touched by the candidate set
async fn load_primaries<T: ContactTx>(
    tx: &mut T,
    candidates: &[Contact],
) -> Result<Vec<Contact>, IdentityError> {
    let mut primary_ids = BTreeSet::new();
    for candidate in candidates {
        match (candidate.link_precedence, candidate.linked_id) {
            (LinkPrecedence::Primary, _) => primary_ids.insert(candidate.id),
            (LinkPrecedence::Secondary, Some(primary_id)) => primary_ids.insert(primary_id),
            (LinkPrecedence::Secondary, None) => {
                return Err(IdentityError::InvariantViolation(format!(
                    "secondary contact {} has no linked primary",
                    candidate.id
                )))
            }
        };
    }

    let mut primaries = Vec::with_capacity(primary_ids.len());
    for id in primary_ids {
        let primary = match candidates.iter().find(|c| c.id == id) {
            Some(candidate) => candidate.clone(),
            None => tx.find_active(id).await?.ok_or_else(|| {
                IdentityError::InvariantViolation(format!(
                    "contact {} links to missing or deleted primary",
                    id
                ))
            })?,
        };

        if !primary.is_primary() {
            return Err(IdentityError::InvariantViolation(format!(
                "contact {} is referenced as a primary but is secondary",
                primary.id
            )));
        }
        primaries.push(primary);
    }

    Ok(primaries)
}

/// True if the query carries an email or phone the cluster does not have yet
fn introduces_new_information(cluster: &[Contact], query: &ContactQuery) -> bool {
    let new_email = query
        .email()
        .is_some_and(|email| !cluster.iter().any(|c| c.email.as_deref() == Some(email)));
    let new_phone = query.phone_number().is_some_and(|phone| {
        !cluster
            .iter()
            .any(|c| c.phone_number.as_deref() == Some(phone))
    });

    new_email || new_phone
}

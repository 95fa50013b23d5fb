//! Soft deletion of contacts
//!
//! Deleting a primary dissolves the whole visible identity: the primary and
//! every active record linked to it are soft-deleted together. Deleting a
//! secondary removes only that alias; no other record is promoted.

use chrono::Utc;
use idlink_common::db::{Contact, ContactId, ContactStore, ContactTx, LinkPrecedence};
use tracing::{info, warn};

use super::IdentityError;

/// Result of deleting one contact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub contact_id: ContactId,
    /// Precedence the contact had when it was deleted
    pub precedence: LinkPrecedence,
    /// Records soft-deleted, the target included
    pub deleted_count: u64,
}

impl DeleteOutcome {
    pub fn message(&self) -> String {
        match self.precedence {
            LinkPrecedence::Primary => format!(
                "Primary contact {} and {} linked contact(s) deleted",
                self.contact_id,
                self.deleted_count.saturating_sub(1)
            ),
            LinkPrecedence::Secondary => format!("Contact {} deleted", self.contact_id),
        }
    }
}

/// Soft-delete one active contact, cascading to its secondaries if it is a primary
pub async fn delete_one<S: ContactStore>(
    store: &S,
    id: ContactId,
) -> Result<DeleteOutcome, IdentityError> {
    let mut tx = store.begin().await?;

    let contact = tx
        .find_active(id)
        .await?
        .ok_or(IdentityError::NotFound(id))?;
    let now = Utc::now();

    let deleted_count = if contact.is_primary() {
        let linked = tx.soft_delete_linked(id, now).await?;
        tx.soft_delete(id, now).await? + linked
    } else {
        tx.soft_delete(id, now).await?
    };

    tx.commit().await?;

    info!(
        contact_id = id,
        precedence = %contact.link_precedence,
        deleted_count,
        "Contact soft-deleted"
    );

    Ok(DeleteOutcome {
        contact_id: id,
        precedence: contact.link_precedence,
        deleted_count,
    })
}

/// Soft-delete every active contact. Nothing is touched unless `confirmed`.
pub async fn delete_all<S: ContactStore>(store: &S, confirmed: bool) -> Result<u64, IdentityError> {
    if !confirmed {
        return Err(IdentityError::ConfirmationRequired);
    }

    let mut tx = store.begin().await?;
    let deleted = tx.soft_delete_all(Utc::now()).await?;
    tx.commit().await?;

    warn!(deleted, "All contacts soft-deleted");
    Ok(deleted)
}

/// Every active contact ordered by id
pub async fn active_contacts<S: ContactStore>(store: &S) -> Result<Vec<Contact>, IdentityError> {
    let mut tx = store.begin().await?;
    let contacts = tx.list_active().await?;
    tx.commit().await?;
    Ok(contacts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_messages() {
        let primary = DeleteOutcome {
            contact_id: 4,
            precedence: LinkPrecedence::Primary,
            deleted_count: 3,
        };
        assert_eq!(primary.message(), "Primary contact 4 and 2 linked contact(s) deleted");

        let secondary = DeleteOutcome {
            contact_id: 9,
            precedence: LinkPrecedence::Secondary,
            deleted_count: 1,
        };
        assert_eq!(secondary.message(), "Contact 9 deleted");
    }
}

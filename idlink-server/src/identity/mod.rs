//! Identity core: cluster resolution, projection and lifecycle
//!
//! Every public operation runs as one store transaction. Transactions that
//! lose a race against a concurrent writer are re-run from scratch by
//! [`retry_on_lock`] until the configured lock wait is exhausted.

use std::time::Duration;

use idlink_common::db::{Contact, ContactId, ContactStore, StoreProbe};
use idlink_common::retry::{retry_on_lock, Retryable};
use thiserror::Error;

pub mod lifecycle;
pub mod projector;
pub mod resolver;

pub use lifecycle::DeleteOutcome;
pub use projector::IdentityView;
pub use resolver::ClusterResult;

/// Identity operation errors
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Malformed or insufficient input (400)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Target record absent or already soft-deleted (404)
    #[error("Contact {0} not found")]
    NotFound(ContactId),

    /// Bulk destructive operation without explicit confirmation (400)
    #[error("Bulk delete requires confirm=true")]
    ConfirmationRequired,

    /// Connectivity, timeout or transaction failure; safe to retry (500)
    #[error("Contact store unavailable: {0}")]
    StoreUnavailable(#[source] idlink_common::Error),

    /// Stored clusters violate the primary/secondary structure (500)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl From<idlink_common::Error> for IdentityError {
    fn from(err: idlink_common::Error) -> Self {
        IdentityError::StoreUnavailable(err)
    }
}

impl Retryable for IdentityError {
    fn is_retryable(&self) -> bool {
        match self {
            IdentityError::StoreUnavailable(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// Validated (email, phone) observation
///
/// Values are trimmed and empty strings count as absent, so an omitted field
/// is always stored as NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactQuery {
    email: Option<String>,
    phone_number: Option<String>,
}

impl ContactQuery {
    pub fn new(
        email: Option<String>,
        phone_number: Option<String>,
    ) -> Result<Self, IdentityError> {
        let email = normalize(email);
        let phone_number = normalize(phone_number);

        if email.is_none() && phone_number.is_none() {
            return Err(IdentityError::InvalidRequest(
                "Either email or phoneNumber must be provided".to_string(),
            ));
        }

        Ok(Self {
            email,
            phone_number,
        })
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Entry point for identity operations against one contact store
#[derive(Debug, Clone)]
pub struct IdentityService<S> {
    store: S,
    max_lock_wait: Duration,
}

impl<S: ContactStore> IdentityService<S> {
    pub fn new(store: S, max_lock_wait: Duration) -> Self {
        Self {
            store,
            max_lock_wait,
        }
    }

    /// Resolve an observation and return the consolidated identity
    pub async fn identify(
        &self,
        email: Option<String>,
        phone_number: Option<String>,
    ) -> Result<IdentityView, IdentityError> {
        let query = ContactQuery::new(email, phone_number)?;
        let cluster = self.resolve(&query).await?;
        projector::project(&cluster)
    }

    /// Resolve an observation and return the raw cluster
    pub async fn resolve(&self, query: &ContactQuery) -> Result<ClusterResult, IdentityError> {
        retry_on_lock("identify", self.max_lock_wait, || {
            resolver::resolve(&self.store, query)
        })
        .await
    }

    pub async fn delete_contact(&self, id: ContactId) -> Result<DeleteOutcome, IdentityError> {
        retry_on_lock("delete_contact", self.max_lock_wait, || {
            lifecycle::delete_one(&self.store, id)
        })
        .await
    }

    pub async fn delete_all(&self, confirmed: bool) -> Result<u64, IdentityError> {
        retry_on_lock("delete_all", self.max_lock_wait, || {
            lifecycle::delete_all(&self.store, confirmed)
        })
        .await
    }

    pub async fn active_contacts(&self) -> Result<Vec<Contact>, IdentityError> {
        lifecycle::active_contacts(&self.store).await
    }

    pub async fn probe(&self) -> Result<StoreProbe, IdentityError> {
        Ok(self.store.probe().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_requires_a_field() {
        assert!(matches!(
            ContactQuery::new(None, None),
            Err(IdentityError::InvalidRequest(_))
        ));
        assert!(matches!(
            ContactQuery::new(Some("  ".into()), Some(String::new())),
            Err(IdentityError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_query_trims_and_drops_empty() {
        let query =
            ContactQuery::new(Some(" doc@hillvalley.edu ".into()), Some("".into())).unwrap();
        assert_eq!(query.email(), Some("doc@hillvalley.edu"));
        assert_eq!(query.phone_number(), None);
    }

    #[test]
    fn test_only_contention_is_retryable() {
        let fault = IdentityError::from(idlink_common::Error::Internal("disk gone".into()));
        assert!(matches!(fault, IdentityError::StoreUnavailable(_)));
        assert!(!fault.is_retryable());
        assert!(!IdentityError::NotFound(1).is_retryable());
        assert!(!IdentityError::ConfirmationRequired.is_retryable());
    }
}

//! Contact store seam
//!
//! The identity core talks to storage only through these traits. Every
//! operation runs inside a [`ContactTx`]; dropping a transaction without
//! calling [`ContactTx::commit`] rolls back everything it did.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{Contact, ContactId, NewContact, StoreProbe};
use crate::Result;

/// Handle to a contact store (cheap to clone, shared across requests)
#[async_trait]
pub trait ContactStore: Clone + Send + Sync + 'static {
    type Tx: ContactTx;

    /// Open a transaction. Fails once the acquisition timeout elapses.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Report store time and version
    async fn probe(&self) -> Result<StoreProbe>;
}

/// One unit of work against the contact table.
///
/// All queries only see active (non-deleted) records unless stated otherwise.
/// Result sets of cluster queries are ordered by (created_at, id).
#[async_trait]
pub trait ContactTx: Send {
    /// Active records whose email equals `email` or whose phone equals `phone`.
    /// An absent argument matches nothing.
    async fn find_matching(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>>;

    /// Active record by id
    async fn find_active(&mut self, id: ContactId) -> Result<Option<Contact>>;

    /// The primary plus every active record linked to it
    async fn find_cluster(&mut self, primary_id: ContactId) -> Result<Vec<Contact>>;

    async fn insert(&mut self, contact: NewContact) -> Result<Contact>;

    /// Rewrite a primary as a secondary of `primary_id`
    async fn demote(
        &mut self,
        id: ContactId,
        primary_id: ContactId,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Re-point every active record linked to `from` at `to`; returns rows moved
    async fn relink_secondaries(
        &mut self,
        from: ContactId,
        to: ContactId,
        now: DateTime<Utc>,
    ) -> Result<u64>;

    /// Soft-delete one active record; returns 0 if it was not active
    async fn soft_delete(&mut self, id: ContactId, now: DateTime<Utc>) -> Result<u64>;

    /// Soft-delete every active record linked to `primary_id`
    async fn soft_delete_linked(
        &mut self,
        primary_id: ContactId,
        now: DateTime<Utc>,
    ) -> Result<u64>;

    async fn soft_delete_all(&mut self, now: DateTime<Utc>) -> Result<u64>;

    /// All active records ordered by id
    async fn list_active(&mut self) -> Result<Vec<Contact>>;

    async fn commit(self) -> Result<()>;
}

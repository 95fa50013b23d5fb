//! In-memory contact store
//!
//! Arena keyed by id plus a secondary index keyed by linked id. A transaction
//! holds the store lock for its whole lifetime (writers are serialised) and
//! mutates a private working copy that replaces the committed state only on
//! commit, so a dropped transaction leaves no trace.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::models::{Contact, ContactId, LinkPrecedence, NewContact, StoreProbe};
use super::store::{ContactStore, ContactTx};
use crate::{Error, Result};

const WRITES_UNLIMITED: usize = usize::MAX;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    contacts: BTreeMap<ContactId, Contact>,
    /// primary id -> ids of records linked to it (active or not)
    by_linked: BTreeMap<ContactId, BTreeSet<ContactId>>,
    last_id: ContactId,
}

impl MemoryState {
    fn active(&self, id: ContactId) -> Option<&Contact> {
        self.contacts.get(&id).filter(|c| c.is_active())
    }

    fn linked_active_ids(&self, primary_id: ContactId) -> Vec<ContactId> {
        self.by_linked
            .get(&primary_id)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|id| self.active(*id).is_some())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn set_link(&mut self, id: ContactId, linked_id: Option<ContactId>) {
        let Some(contact) = self.contacts.get_mut(&id) else {
            return;
        };
        if let Some(old) = contact.linked_id {
            if let Some(ids) = self.by_linked.get_mut(&old) {
                ids.remove(&id);
            }
        }
        contact.linked_id = linked_id;
        if let Some(new) = linked_id {
            self.by_linked.entry(new).or_default().insert(id);
        }
    }

    fn mark_deleted(&mut self, id: ContactId, now: DateTime<Utc>) -> u64 {
        match self.contacts.get_mut(&id) {
            Some(contact) if contact.is_active() => {
                contact.deleted_at = Some(now);
                contact.updated_at = now;
                1
            }
            _ => 0,
        }
    }
}

#[derive(Debug)]
struct FaultPlan {
    unavailable: AtomicBool,
    writes_remaining: AtomicUsize,
}

impl Default for FaultPlan {
    fn default() -> Self {
        Self {
            unavailable: AtomicBool::new(false),
            writes_remaining: AtomicUsize::new(WRITES_UNLIMITED),
        }
    }
}

impl FaultPlan {
    fn check_write(&self) -> Result<()> {
        let remaining = self.writes_remaining.load(Ordering::SeqCst);
        if remaining == WRITES_UNLIMITED {
            return Ok(());
        }
        if remaining == 0 {
            return Err(Error::Internal("injected write failure".to_string()));
        }
        self.writes_remaining.store(remaining - 1, Ordering::SeqCst);
        Ok(())
    }
}

/// Contact store kept entirely in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryContactStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<FaultPlan>,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `begin` fail as if the pool timed out
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Allow `n` more writes, then fail every write until [`Self::clear_faults`]
    pub fn fail_writes_after(&self, n: usize) {
        self.faults.writes_remaining.store(n, Ordering::SeqCst);
    }

    pub fn clear_faults(&self) {
        self.faults.unavailable.store(false, Ordering::SeqCst);
        self.faults
            .writes_remaining
            .store(WRITES_UNLIMITED, Ordering::SeqCst);
    }

    /// Every record ever written, deleted ones included, ordered by id
    pub async fn snapshot(&self) -> Vec<Contact> {
        self.state.lock().await.contacts.values().cloned().collect()
    }
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    type Tx = MemoryContactTx;

    async fn begin(&self) -> Result<MemoryContactTx> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Database(sqlx::Error::PoolTimedOut));
        }
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryContactTx {
            guard,
            working,
            faults: Arc::clone(&self.faults),
        })
    }

    async fn probe(&self) -> Result<StoreProbe> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(StoreProbe {
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            version: "memory".to_string(),
        })
    }
}

/// Transaction over a [`MemoryContactStore`]
pub struct MemoryContactTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    faults: Arc<FaultPlan>,
}

fn by_creation(mut contacts: Vec<Contact>) -> Vec<Contact> {
    contacts.sort_by_key(Contact::creation_key);
    contacts
}

#[async_trait]
impl ContactTx for MemoryContactTx {
    async fn find_matching(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>> {
        let matches = self
            .working
            .contacts
            .values()
            .filter(|c| c.is_active())
            .filter(|c| {
                let email_hit = email.is_some() && c.email.as_deref() == email;
                let phone_hit = phone.is_some() && c.phone_number.as_deref() == phone;
                email_hit || phone_hit
            })
            .cloned()
            .collect();

        Ok(by_creation(matches))
    }

    async fn find_active(&mut self, id: ContactId) -> Result<Option<Contact>> {
        Ok(self.working.active(id).cloned())
    }

    async fn find_cluster(&mut self, primary_id: ContactId) -> Result<Vec<Contact>> {
        let mut cluster: Vec<Contact> =
            self.working.active(primary_id).cloned().into_iter().collect();
        for id in self.working.linked_active_ids(primary_id) {
            if let Some(contact) = self.working.active(id) {
                cluster.push(contact.clone());
            }
        }
        Ok(by_creation(cluster))
    }

    async fn insert(&mut self, contact: NewContact) -> Result<Contact> {
        self.faults.check_write()?;

        self.working.last_id += 1;
        let stored = Contact {
            id: self.working.last_id,
            phone_number: contact.phone_number,
            email: contact.email,
            linked_id: None,
            link_precedence: contact.link_precedence,
            created_at: contact.created_at,
            updated_at: contact.created_at,
            deleted_at: None,
        };
        let id = stored.id;
        self.working.contacts.insert(id, stored);
        self.working.set_link(id, contact.linked_id);

        Ok(self.working.contacts[&id].clone())
    }

    async fn demote(
        &mut self,
        id: ContactId,
        primary_id: ContactId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.faults.check_write()?;

        if self.working.active(id).is_none() {
            return Ok(());
        }
        self.working.set_link(id, Some(primary_id));
        if let Some(contact) = self.working.contacts.get_mut(&id) {
            contact.link_precedence = LinkPrecedence::Secondary;
            contact.updated_at = now;
        }
        Ok(())
    }

    async fn relink_secondaries(
        &mut self,
        from: ContactId,
        to: ContactId,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        self.faults.check_write()?;

        let ids = self.working.linked_active_ids(from);
        for id in &ids {
            self.working.set_link(*id, Some(to));
            if let Some(contact) = self.working.contacts.get_mut(id) {
                contact.updated_at = now;
            }
        }
        Ok(ids.len() as u64)
    }

    async fn soft_delete(&mut self, id: ContactId, now: DateTime<Utc>) -> Result<u64> {
        self.faults.check_write()?;
        Ok(self.working.mark_deleted(id, now))
    }

    async fn soft_delete_linked(
        &mut self,
        primary_id: ContactId,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        self.faults.check_write()?;

        let mut count = 0;
        for id in self.working.linked_active_ids(primary_id) {
            count += self.working.mark_deleted(id, now);
        }
        Ok(count)
    }

    async fn soft_delete_all(&mut self, now: DateTime<Utc>) -> Result<u64> {
        self.faults.check_write()?;

        let ids: Vec<ContactId> = self.working.contacts.keys().copied().collect();
        let mut count = 0;
        for id in ids {
            count += self.working.mark_deleted(id, now);
        }
        Ok(count)
    }

    async fn list_active(&mut self) -> Result<Vec<Contact>> {
        Ok(self
            .working
            .contacts
            .values()
            .filter(|c| c.is_active())
            .cloned()
            .collect())
    }

    async fn commit(self) -> Result<()> {
        let MemoryContactTx {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }
}

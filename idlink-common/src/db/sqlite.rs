//! SQLite-backed contact store

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};

use super::init::init_database;
use super::models::{Contact, ContactId, LinkPrecedence, NewContact, StoreProbe};
use super::store::{ContactStore, ContactTx};
use crate::config::StoreConfig;
use crate::Result;

const CONTACT_COLUMNS: &str = "id, phone_number, email, linked_id, link_precedence, \
                               created_at, updated_at, deleted_at";

/// Contact store over a pooled SQLite database
#[derive(Debug, Clone)]
pub struct SqliteContactStore {
    pool: SqlitePool,
}

impl SqliteContactStore {
    /// Open the pool and bootstrap the schema
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let pool = init_database(config).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ContactStore for SqliteContactStore {
    type Tx = SqliteContactTx;

    async fn begin(&self) -> Result<SqliteContactTx> {
        let tx = self.pool.begin().await?;
        Ok(SqliteContactTx { tx })
    }

    async fn probe(&self) -> Result<StoreProbe> {
        let (time, version): (String, String) = sqlx::query_as(
            "SELECT strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), sqlite_version()",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreProbe {
            time,
            version: format!("SQLite {}", version),
        })
    }
}

/// Open transaction; rolled back by sqlx if dropped before commit
pub struct SqliteContactTx {
    tx: Transaction<'static, Sqlite>,
}

#[derive(sqlx::FromRow)]
struct ContactRow {
    id: i64,
    phone_number: Option<String>,
    email: Option<String>,
    linked_id: Option<i64>,
    link_precedence: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<ContactRow> for Contact {
    type Error = crate::Error;

    fn try_from(row: ContactRow) -> Result<Self> {
        Ok(Contact {
            id: row.id,
            phone_number: row.phone_number,
            email: row.email,
            linked_id: row.linked_id,
            link_precedence: row.link_precedence.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

/// Fixed-width UTC text so that `ORDER BY created_at` is chronological
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn into_contacts(rows: Vec<ContactRow>) -> Result<Vec<Contact>> {
    rows.into_iter().map(Contact::try_from).collect()
}

#[async_trait]
impl ContactTx for SqliteContactTx {
    async fn find_matching(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>> {
        let sql = format!(
            r#"
            SELECT {CONTACT_COLUMNS}
            FROM contacts
            WHERE deleted_at IS NULL
              AND ((? IS NOT NULL AND email = ?) OR (? IS NOT NULL AND phone_number = ?))
            ORDER BY created_at ASC, id ASC
            "#
        );
        let rows = sqlx::query_as::<_, ContactRow>(&sql)
            .bind(email)
            .bind(email)
            .bind(phone)
            .bind(phone)
            .fetch_all(&mut *self.tx)
            .await?;

        into_contacts(rows)
    }

    async fn find_active(&mut self, id: ContactId) -> Result<Option<Contact>> {
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ? AND deleted_at IS NULL"
        );
        let row = sqlx::query_as::<_, ContactRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(Contact::try_from).transpose()
    }

    async fn find_cluster(&mut self, primary_id: ContactId) -> Result<Vec<Contact>> {
        let sql = format!(
            r#"
            SELECT {CONTACT_COLUMNS}
            FROM contacts
            WHERE deleted_at IS NULL AND (id = ? OR linked_id = ?)
            ORDER BY created_at ASC, id ASC
            "#
        );
        let rows = sqlx::query_as::<_, ContactRow>(&sql)
            .bind(primary_id)
            .bind(primary_id)
            .fetch_all(&mut *self.tx)
            .await?;

        into_contacts(rows)
    }

    async fn insert(&mut self, contact: NewContact) -> Result<Contact> {
        let created_at = timestamp(contact.created_at);
        let result = sqlx::query(
            r#"
            INSERT INTO contacts (
                phone_number, email, linked_id, link_precedence, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&contact.phone_number)
        .bind(&contact.email)
        .bind(contact.linked_id)
        .bind(contact.link_precedence.as_str())
        .bind(&created_at)
        .bind(&created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(Contact {
            id: result.last_insert_rowid(),
            phone_number: contact.phone_number,
            email: contact.email,
            linked_id: contact.linked_id,
            link_precedence: contact.link_precedence,
            created_at: contact.created_at,
            updated_at: contact.created_at,
            deleted_at: None,
        })
    }

    async fn demote(
        &mut self,
        id: ContactId,
        primary_id: ContactId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE contacts
            SET link_precedence = ?, linked_id = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(LinkPrecedence::Secondary.as_str())
        .bind(primary_id)
        .bind(timestamp(now))
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn relink_secondaries(
        &mut self,
        from: ContactId,
        to: ContactId,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE contacts
            SET linked_id = ?, updated_at = ?
            WHERE linked_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(to)
        .bind(timestamp(now))
        .bind(from)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn soft_delete(&mut self, id: ContactId, now: DateTime<Utc>) -> Result<u64> {
        let now = timestamp(now);
        let result = sqlx::query(
            "UPDATE contacts SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn soft_delete_linked(
        &mut self,
        primary_id: ContactId,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let now = timestamp(now);
        let result = sqlx::query(
            r#"
            UPDATE contacts
            SET deleted_at = ?, updated_at = ?
            WHERE linked_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(&now)
        .bind(&now)
        .bind(primary_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn soft_delete_all(&mut self, now: DateTime<Utc>) -> Result<u64> {
        let now = timestamp(now);
        let result = sqlx::query(
            "UPDATE contacts SET deleted_at = ?, updated_at = ? WHERE deleted_at IS NULL",
        )
        .bind(&now)
        .bind(&now)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_active(&mut self) -> Result<Vec<Contact>> {
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE deleted_at IS NULL ORDER BY id ASC"
        );
        let rows = sqlx::query_as::<_, ContactRow>(&sql)
            .fetch_all(&mut *self.tx)
            .await?;

        into_contacts(rows)
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

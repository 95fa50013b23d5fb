//! Database initialization
//!
//! Opens the connection pool and creates the contact schema if needed.
//! Schema creation is idempotent and safe to run on every start.

use crate::config::StoreConfig;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// Open the pool described by `config` and create tables if needed
pub async fn init_database(config: &StoreConfig) -> Result<SqlitePool> {
    config.validate()?;

    // Pragmas go on the connect options so every pooled connection gets them
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(config.busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await?;

    create_contacts_table(&pool).await?;
    create_contact_indexes(&pool).await?;

    info!(
        max_connections = config.max_connections,
        acquire_timeout_ms = config.acquire_timeout.as_millis() as u64,
        busy_timeout_ms = config.busy_timeout.as_millis() as u64,
        "Contact store ready"
    );

    Ok(pool)
}

async fn create_contacts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            phone_number TEXT,
            email TEXT,
            linked_id INTEGER REFERENCES contacts(id),
            link_precedence TEXT NOT NULL
                CHECK (link_precedence IN ('primary', 'secondary')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            CHECK ((link_precedence = 'primary') = (linked_id IS NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_contact_indexes(pool: &SqlitePool) -> Result<()> {
    let statements = [
        "CREATE INDEX IF NOT EXISTS idx_contacts_email ON contacts(email)",
        "CREATE INDEX IF NOT EXISTS idx_contacts_phone_number ON contacts(phone_number)",
        "CREATE INDEX IF NOT EXISTS idx_contacts_linked_id ON contacts(linked_id)",
        // One active record per exact pair; a racing duplicate insert fails and is retried
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_contacts_active_pair
            ON contacts(COALESCE(email, ''), COALESCE(phone_number, ''))
            WHERE deleted_at IS NULL
        "#,
    ];

    for sql in statements {
        sqlx::query(sql).execute(pool).await?;
    }

    Ok(())
}

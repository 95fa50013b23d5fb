//! Concurrent resolution against a real SQLite store
//!
//! Racing transactions hit busy/stale-snapshot errors or the active-pair
//! unique index; the loser is rolled back and re-run by the retry loop.

use std::time::Duration;

use idlink_common::config::StoreConfig;
use idlink_common::db::{Contact, SqliteContactStore};
use idlink_server::identity::{IdentityError, IdentityService, IdentityView};
use tempfile::TempDir;

const ROUNDS: usize = 5;
const WORKERS: usize = 8;

async fn setup_service() -> (TempDir, IdentityService<SqliteContactStore>) {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("contacts.db");
    let config = StoreConfig::new(format!("sqlite://{}?mode=rwc", db_path.display()));
    let store = SqliteContactStore::connect(&config).await.unwrap();
    (dir, IdentityService::new(store, Duration::from_secs(10)))
}

/// Run one `identify` per pair, all at once, and collect the results
async fn identify_concurrently(
    service: &IdentityService<SqliteContactStore>,
    pairs: Vec<(String, String)>,
) -> Vec<Result<IdentityView, IdentityError>> {
    let handles: Vec<_> = pairs
        .into_iter()
        .map(|(email, phone)| {
            let service = service.clone();
            tokio::spawn(async move { service.identify(Some(email), Some(phone)).await })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

/// Exactly one active primary, every other record linked to it and created no earlier
fn assert_single_cluster(contacts: &[Contact]) -> &Contact {
    let primaries: Vec<&Contact> = contacts.iter().filter(|c| c.is_primary()).collect();
    assert_eq!(primaries.len(), 1, "expected one primary, got {:?}", primaries);
    let primary = primaries[0];

    for contact in contacts.iter().filter(|c| !c.is_primary()) {
        assert_eq!(contact.linked_id, Some(primary.id));
        assert!(
            contact.creation_key() > primary.creation_key(),
            "secondary {} predates its primary {}",
            contact.id,
            primary.id
        );
    }
    primary
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_identical_pairs_create_one_record() {
    for _ in 0..ROUNDS {
        let (_dir, service) = setup_service().await;

        let pairs = vec![("a@x.io".to_string(), "111".to_string()); WORKERS];
        let results = identify_concurrently(&service, pairs).await;

        let views: Vec<IdentityView> = results
            .into_iter()
            .map(|r| r.expect("resolution should succeed after retry"))
            .collect();

        let contacts = service.active_contacts().await.unwrap();
        assert_eq!(contacts.len(), 1);
        let primary = assert_single_cluster(&contacts);
        for view in views {
            assert_eq!(view.primary_contact_id, primary.id);
            assert!(view.secondary_contact_ids.is_empty());
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_overlapping_pairs_share_one_primary() {
    for _ in 0..ROUNDS {
        let (_dir, service) = setup_service().await;

        let pairs = (0..WORKERS)
            .map(|i| ("a@x.io".to_string(), format!("55500{}", i)))
            .collect();
        let results = identify_concurrently(&service, pairs).await;

        for result in &results {
            assert!(result.is_ok(), "resolution failed: {:?}", result);
        }

        // One record per distinct phone, all in a single cluster
        let contacts = service.active_contacts().await.unwrap();
        assert_eq!(contacts.len(), WORKERS);
        let primary = assert_single_cluster(&contacts);

        let view = service.identify(Some("a@x.io".to_string()), None).await.unwrap();
        assert_eq!(view.primary_contact_id, primary.id);
        assert_eq!(view.emails, vec!["a@x.io"]);
        assert_eq!(view.phone_numbers.len(), WORKERS);
        assert_eq!(view.secondary_contact_ids.len(), WORKERS - 1);
    }
}

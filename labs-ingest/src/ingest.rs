//! The bulk ingestion operation behind `POST /sync/pair`.

use labs_core::error::LabsError;
use serde_json::Value;
use uuid::Uuid;

use crate::payload::validate_items;
use crate::store::SessionStore;

/// Validate and persist a whole sync batch for one caller.
///
/// Strict all-or-nothing: every item must pass shape and semantic checks and
/// carry an unused idempotency identifier before anything is written, and the
/// storage write itself is one transaction. Returns the number of sessions
/// paired. No external calls happen here.
pub async fn ingest_sessions(
    store: &dyn SessionStore,
    owner_id: Uuid,
    items: &[Value],
) -> Result<u64, LabsError> {
    let (parsed, mut report) = validate_items(items);

    // Advisory duplicate check against storage, reported per item. The unique
    // constraint inside the transaction remains the authoritative guard.
    let local_ids: Vec<i64> = parsed.iter().map(|(_, s)| s.local_db_id).collect();
    if !local_ids.is_empty() {
        let existing = store.existing_local_ids(&local_ids).await?;
        for (index, session) in &parsed {
            if existing.contains(&session.local_db_id) {
                report.push(*index, "local_db_id", "session already paired with Learning Labs");
            }
        }
    }

    if !report.is_empty() {
        return Err(LabsError::Validation(report));
    }

    let batch: Vec<_> = parsed.into_iter().map(|(_, s)| s).collect();
    let paired = store.ingest_batch(owner_id, &batch).await?;

    tracing::info!(paired, "Sync batch committed");
    Ok(paired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemorySessionStore;
    use serde_json::json;
    use std::sync::Arc;

    fn item(local_db_id: i64, telemetry: usize, failures: usize) -> Value {
        let telemetry: Vec<Value> = (0..telemetry)
            .map(|i| json!({ "force": 10.0 + i as f64, "timestamp": "2026-02-17T15:01:00Z" }))
            .collect();
        let failures: Vec<Value> = (0..failures)
            .map(|i| {
                json!({
                    "concept": format!("Concept {i}"),
                    "ai_feedback": "Review the inverse relationship.",
                    "timestamp": "2026-02-17T15:05:00Z"
                })
            })
            .collect();
        json!({
            "local_db_id": local_db_id,
            "start_time": "2026-02-17T15:00:00Z",
            "score": 100,
            "failures": failures,
            "telemetry": telemetry
        })
    }

    #[tokio::test]
    async fn test_happy_path_persists_all_rows_and_counts() {
        let store = InMemorySessionStore::new();
        let owner = Uuid::new_v4();

        let batch = vec![item(1, 3, 2), item(2, 5, 0)];
        let paired = ingest_sessions(&store, owner, &batch).await.unwrap();

        assert_eq!(paired, 2);
        assert_eq!(store.session_count(), 2);
        assert_eq!(store.row_counts_for_local(1), Some((2, 3)));
        assert_eq!(store.row_counts_for_local(2), Some((0, 5)));
    }

    #[tokio::test]
    async fn test_empty_batch_pairs_nothing() {
        let store = InMemorySessionStore::new();
        let paired = ingest_sessions(&store, Uuid::new_v4(), &[]).await.unwrap();
        assert_eq!(paired, 0);
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test]
    async fn test_single_invalid_item_blocks_whole_batch() {
        let store = InMemorySessionStore::new();
        let owner = Uuid::new_v4();

        let batch = vec![item(1, 2, 0), json!({ "score": 10 }), item(3, 2, 0)];
        let result = ingest_sessions(&store, owner, &batch).await;

        match result {
            Err(LabsError::Validation(report)) => {
                assert_eq!(report.errors.len(), 1);
                assert_eq!(report.errors[0].index, 1);
            }
            other => panic!("Expected Validation error, got {:?}", other.map(|_| ())),
        }
        // strict strategy: valid siblings were not persisted either
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_against_storage_reported_per_item() {
        let store = InMemorySessionStore::new();
        let owner = Uuid::new_v4();

        ingest_sessions(&store, owner, &[item(42, 1, 0)]).await.unwrap();

        let batch = vec![item(41, 1, 0), item(42, 1, 0)];
        let result = ingest_sessions(&store, owner, &batch).await;

        match result {
            Err(LabsError::Validation(report)) => {
                assert_eq!(report.errors.len(), 1);
                assert_eq!(report.errors[0].index, 1);
                assert_eq!(report.errors[0].field, "local_db_id");
            }
            other => panic!("Expected Validation error, got {:?}", other.map(|_| ())),
        }
        // nothing from the second batch persisted
        assert_eq!(store.session_count(), 1);
        assert!(store.session_id_for_local(41).is_none());
    }

    #[tokio::test]
    async fn test_duplicate_within_batch_persists_nothing() {
        let store = InMemorySessionStore::new();
        let result = ingest_sessions(&store, Uuid::new_v4(), &[item(5, 1, 0), item(5, 1, 0)]).await;
        assert!(matches!(result, Err(LabsError::Validation(_))));
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_batches_sharing_local_id_have_one_winner() {
        let store = Arc::new(InMemorySessionStore::new());
        let owner = Uuid::new_v4();

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                ingest_sessions(store.as_ref(), owner, &[item(99, 2, 0), item(100, 2, 0)]).await
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                ingest_sessions(store.as_ref(), owner, &[item(99, 2, 0), item(101, 2, 0)]).await
            })
        };

        let (ra, rb) = (a.await.unwrap(), b.await.unwrap());
        let successes = [&ra, &rb].iter().filter(|r| r.is_ok()).count();

        // The shared identifier serializes the two batches: exactly one commits.
        assert_eq!(successes, 1, "exactly one batch must win the shared local_db_id");
        assert!(store.session_id_for_local(99).is_some());
        // the loser persisted nothing at all, not even its unshared session
        if ra.is_err() {
            assert!(store.session_id_for_local(100).is_none());
            assert!(store.session_id_for_local(101).is_some());
        } else {
            assert!(store.session_id_for_local(101).is_none());
            assert!(store.session_id_for_local(100).is_some());
        }
    }
}

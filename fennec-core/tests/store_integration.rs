//! Store integration tests. These need a PostgreSQL instance with the
//! pgvector extension and are therefore gated behind `--ignored`:
//!
//! ```sh
//! DATABASE_URL=postgres://localhost/fennec_test cargo test -- --ignored
//! ```

use fennec_core::Store;
use fennec_core::types::file::NewVideoFile;
use fennec_core::types::queue::QueueStatus;
use fennec_core::types::scene::NewScene;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

async fn test_store() -> Store {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required for integration tests");
    let store = Store::connect(&url).await.expect("connect");
    store.migrate().await.expect("migrate");
    store
}

fn unique_path(label: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("/fennec-test/{label}-{nanos}.mp4")
}

async fn insert_file(store: &Store, label: &str) -> i64 {
    let path = unique_path(label);
    let new = NewVideoFile::from_path(Path::new(&path), 1024);
    store.files().insert(&new).await.expect("insert").id
}

#[tokio::test]
#[ignore]
async fn queue_is_fifo_and_claim_flips_to_processing() {
    let store = test_store().await;

    let first = insert_file(&store, "fifo-a").await;
    let second = insert_file(&store, "fifo-b").await;
    store.queue().enqueue(first).await.unwrap();
    store.queue().enqueue(second).await.unwrap();

    let claimed = store.queue().claim_one().await.unwrap().expect("a job");
    assert_eq!(claimed.file_id, first);
    assert_eq!(claimed.status, QueueStatus::Processing);
    assert!(claimed.started_at.is_some());

    let next = store.queue().claim_one().await.unwrap().expect("a job");
    assert_eq!(next.file_id, second);

    store.queue().complete(claimed.id).await.unwrap();
    store.queue().complete(next.id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn failed_jobs_requeue_and_processing_resets() {
    let store = test_store().await;

    let file_id = insert_file(&store, "fail").await;
    store.queue().enqueue(file_id).await.unwrap();

    let job = store.queue().claim_one().await.unwrap().expect("a job");
    store.queue().fail(job.id, "decoder exploded").await.unwrap();

    let resurrected = store.queue().reset_failed().await.unwrap();
    assert!(resurrected >= 1);

    let job = store.queue().claim_one().await.unwrap().expect("a job");
    assert_eq!(job.retry_count, 1);
    assert!(job.error.is_none());

    let reclaimed = store.queue().reset_processing().await.unwrap();
    assert!(reclaimed >= 1);
    let snapshot = store.queue().snapshot().await.unwrap();
    assert_eq!(snapshot.processing, 0);
}

#[tokio::test]
#[ignore]
async fn embedding_upsert_overwrites_per_model() {
    let store = test_store().await;

    let file_id = insert_file(&store, "embed").await;
    let scenes = store
        .scenes()
        .replace_for_file(
            file_id,
            &[NewScene {
                start_secs: 0.0,
                end_secs: 10.0,
            }],
        )
        .await
        .unwrap();
    let scene_id = scenes[0].id;

    let v1 = vec![1.0f32, 0.0, 0.0];
    let v2 = vec![0.0f32, 1.0, 0.0];
    store
        .embeddings()
        .upsert(scene_id, "clip", "v1", &v1)
        .await
        .unwrap();
    store
        .embeddings()
        .upsert(scene_id, "clip", "v2", &v2)
        .await
        .unwrap();

    let summaries = store.embeddings().summaries_for_scene(scene_id).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].model_version, "v2");

    let stored = store.embeddings().get(scene_id, "clip").await.unwrap().unwrap();
    assert_eq!(stored.embedding.as_slice(), v2.as_slice());
}

#[tokio::test]
#[ignore]
async fn nearest_neighbour_respects_model_and_threshold() {
    let store = test_store().await;

    let file_id = insert_file(&store, "nn").await;
    let scenes = store
        .scenes()
        .replace_for_file(
            file_id,
            &[
                NewScene {
                    start_secs: 0.0,
                    end_secs: 5.0,
                },
                NewScene {
                    start_secs: 5.0,
                    end_secs: 10.0,
                },
            ],
        )
        .await
        .unwrap();

    // Orthogonal unit vectors; cos(query, a) = 1, cos(query, b) = 0.
    store
        .embeddings()
        .upsert(scenes[0].id, "clip", "v1", &[1.0, 0.0])
        .await
        .unwrap();
    store
        .embeddings()
        .upsert(scenes[1].id, "clip", "v1", &[0.0, 1.0])
        .await
        .unwrap();
    // Same dimension, different model: must never appear in clip search.
    store
        .embeddings()
        .upsert(scenes[1].id, "transcript", "v1", &[1.0, 0.0])
        .await
        .unwrap();

    let hits = store
        .embeddings()
        .nearest("clip", &[1.0, 0.0], None, 0.5, 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].scene_id, scenes[0].id);
    assert!((hits[0].similarity - 1.0).abs() < 1e-6);

    // Threshold 0 admits every clip row.
    let all = store
        .embeddings()
        .nearest("clip", &[1.0, 0.0], None, 0.0, 10)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
#[ignore]
async fn soft_delete_keeps_scenes_until_purge() {
    let store = test_store().await;

    let file_id = insert_file(&store, "softdel").await;
    store.queue().enqueue(file_id).await.unwrap();
    store
        .scenes()
        .replace_for_file(
            file_id,
            &[NewScene {
                start_secs: 0.0,
                end_secs: 3.0,
            }],
        )
        .await
        .unwrap();

    store.files().mark_missing(file_id).await.unwrap();

    let row = store.files().get(file_id).await.unwrap();
    assert!(row.deleted_at.is_some());
    // Scenes survive the soft delete.
    assert_eq!(store.scenes().list_for_file(file_id).await.unwrap().len(), 1);

    let purged = store.admin().purge_deleted().await.unwrap();
    assert!(purged >= 1);
    assert!(store.files().get(file_id).await.is_err());
    assert!(store.scenes().list_for_file(file_id).await.unwrap().is_empty());
}

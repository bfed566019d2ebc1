//! Concurrency tests for playback arbitration, admission and queue linearizability

use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;

use karaoke_common::db::init_memory_database;
use karaoke_server::admission::AdmissionPolicy;
use karaoke_server::db::{PlayLogger, QueueStore, SettingRegistry};
use karaoke_server::playback::{PlaybackArbiter, PlaybackError};
use karaoke_server::Error;

async fn setup(queued: usize) -> (Arc<PlaybackArbiter>, QueueStore) {
    let pool = init_memory_database().await.unwrap();
    let queue = QueueStore::new(pool.clone());
    let settings = SettingRegistry::new(pool, Path::new("/srv/karaoke"));
    for i in 0..queued {
        queue
            .append(&format!("singer-{}", i), &format!("song-{}.mp4", i))
            .await
            .unwrap();
    }
    (Arc::new(PlaybackArbiter::new(queue.clone(), settings)), queue)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_commits_exactly_one_wins() {
    let (arbiter, queue) = setup(20).await;

    let mut join_set = JoinSet::new();
    for _ in 0..16 {
        let arbiter = Arc::clone(&arbiter);
        join_set.spawn(async move { arbiter.commit().await });
    }

    let mut wins = 0;
    let mut conflicts = 0;
    while let Some(result) = join_set.join_next().await {
        match result.unwrap() {
            Ok(_) => wins += 1,
            Err(PlaybackError::AlreadyPlaying) => conflicts += 1,
            Err(e) => panic!("unexpected rejection: {}", e),
        }
    }

    assert_eq!(wins, 1);
    assert_eq!(conflicts, 15);
    assert_eq!(queue.len().await.unwrap(), 19);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_commit_after_finish_serves_next_in_order() {
    let (arbiter, _) = setup(3).await;

    for expected in ["song-0.mp4", "song-1.mp4", "song-2.mp4"] {
        let entry = arbiter.commit().await.unwrap();
        assert_eq!(entry.song_name, expected);
        assert!(matches!(
            arbiter.commit().await,
            Err(PlaybackError::AlreadyPlaying)
        ));
        arbiter.finish().await;
    }

    assert!(matches!(arbiter.commit().await, Err(PlaybackError::QueueEmpty)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_peeks_preview_once() {
    let (arbiter, queue) = setup(1).await;

    let mut join_set = JoinSet::new();
    for _ in 0..8 {
        let arbiter = Arc::clone(&arbiter);
        join_set.spawn(async move { arbiter.peek().await });
    }

    let mut previews = 0;
    while let Some(result) = join_set.join_next().await {
        match result.unwrap() {
            Ok(Some(_)) => previews += 1,
            Ok(None) => panic!("queue was not empty"),
            Err(e) => assert!(e.is_idle_rejection()),
        }
    }

    assert_eq!(previews, 1);
    assert_eq!(queue.len().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_removes_of_same_entry() {
    let (_, queue) = setup(0).await;
    let entry = queue.append("ana", "a.mp4").await.unwrap();

    let mut join_set = JoinSet::new();
    for _ in 0..8 {
        let queue = queue.clone();
        join_set.spawn(async move { queue.remove_by_id(entry.id).await.unwrap() });
    }

    let mut removed = 0;
    while let Some(result) = join_set.join_next().await {
        if result.unwrap() {
            removed += 1;
        }
    }

    assert_eq!(removed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submits_from_one_requester_admit_one() {
    let pool = init_memory_database().await.unwrap();
    let queue = QueueStore::new(pool.clone());
    let admission = Arc::new(AdmissionPolicy::new(
        queue.clone(),
        SettingRegistry::new(pool.clone(), Path::new("/srv/karaoke")),
        PlayLogger::new(pool),
    ));

    let mut join_set = JoinSet::new();
    for i in 0..16 {
        let admission = Arc::clone(&admission);
        join_set.spawn(async move { admission.submit("ana", &format!("song-{}.mp4", i)).await });
    }

    let mut admitted = 0;
    while let Some(result) = join_set.join_next().await {
        match result.unwrap() {
            Ok(_) => admitted += 1,
            Err(Error::Conflict(_)) => {}
            Err(e) => panic!("unexpected rejection: {}", e),
        }
    }

    assert_eq!(admitted, 1);
    assert_eq!(queue.len().await.unwrap(), 1);
}

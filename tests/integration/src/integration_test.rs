//! End-to-end tests across the workspace
//!
//! These exercise the complete flow: config files -> loader -> provisioning
//! -> bucket lookup -> shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bucket_core::{BucketManager, EventKind};
use bucket_meta::{ConfigProvider, FileProvider};
use bucket_test_utils::{ConfigBuilder, EventRecorder, MockConnector, Recorded, write_config};
use pretty_assertions::assert_eq;

const CLUSTERS_TOML: &str = r#"
[clusters.main]
connectionString = "couchbase://db1"

[clusters.main.options]
kvTimeout = 2500

[clusters.main.buckets.accounts]
password = "s3cret"

[clusters.main.buckets.sessions]
"#;

const REPOSITORIES_JSON: &str = r#"{
  "repositories": {
    "users": { "cluster": "main", "bucket": "accounts" },
    "admins": { "cluster": "main", "bucket": "accounts" },
    "logins": { "cluster": "main", "bucket": "sessions" }
  }
}"#;

#[tokio::test]
async fn test_file_backed_provisioning_end_to_end() {
    // Other tests in this binary may have installed it already.
    let _ = bucket_core::logging::init();

    let (_clusters_dir, clusters) = write_config("clusters.toml", CLUSTERS_TOML);
    let (_repos_dir, repositories) = write_config("repositories.json", REPOSITORIES_JSON);
    let providers: Vec<Box<dyn ConfigProvider>> = vec![
        Box::new(FileProvider::new(&clusters)),
        Box::new(FileProvider::new(&repositories)),
    ];

    let manager = BucketManager::new(MockConnector::new());
    let mut recorder = EventRecorder::attach(&manager);
    manager.load(&providers).await.unwrap();

    let mut opened = Vec::new();
    while opened.len() < 2 {
        match recorder.next_of(EventKind::Bucket).await {
            Some(Recorded::Bucket { name, .. }) => opened.push(name),
            other => panic!("expected a bucket event, got {other:?}"),
        }
    }
    opened.sort();
    assert_eq!(opened, vec!["accounts", "sessions"]);

    let users = manager.get_bucket("users").unwrap();
    assert_eq!(users.connection_string, "couchbase://db1");
    assert_eq!(users.password.as_deref(), Some("s3cret"));
    assert_eq!(manager.get_bucket("admins").unwrap(), users);
    assert_eq!(manager.get_bucket_name("logins").unwrap(), "sessions");

    manager.with_registry(|registry| {
        assert_eq!(registry.repository_names(), vec!["admins", "logins", "users"]);
        let main = registry.find_cluster("main").unwrap();
        assert_eq!(main.options()["kvTimeout"], 2500);
    });

    manager.shutdown().await.unwrap();
    assert_eq!(manager.connector().closes().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_converge() {
    let manager = BucketManager::new(MockConnector::new());

    let mut tasks = Vec::new();
    for i in 0..8 {
        let manager = manager.clone();
        let config = ConfigBuilder::new()
            .cluster("main", "couchbase://db1")
            .bucket("main", "shared")
            .bucket("main", &format!("own{}", i % 2))
            .repository(&format!("repo{i}"), "main", "shared")
            .build();
        tasks.push(tokio::spawn(async move {
            manager.add([config]).map(|_| ())
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    manager.wait_for_opens().await;

    assert_eq!(manager.connector().cluster_opens(), 1);
    assert_eq!(manager.connector().bucket_opens(), 3);
    for i in 0..8 {
        let bucket = manager.get_bucket(&format!("repo{i}")).unwrap();
        assert_eq!(bucket.name, "shared");
    }
}

#[tokio::test]
async fn test_listeners_registered_by_name() {
    let manager = BucketManager::new(MockConnector::new());
    let calls = Arc::new(AtomicUsize::new(0));

    for name in ["config", "done", "bucket"] {
        let calls = Arc::clone(&calls);
        manager
            .on_named(name, move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }
    assert!(manager.on_named("bucket-opened", |_| {}).is_err());

    let config = ConfigBuilder::new()
        .cluster("c1", "couchbase://a")
        .bucket("c1", "b1")
        .repository("r1", "c1", "b1")
        .build();
    manager.add([config]).unwrap();
    manager.wait_for_opens().await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

//! Metadata store integration tests.

mod common;

use common::TestMetadata;
use common::fixtures::header;
use scriptvault_metadata::MetadataError;
use scriptvault_metadata::models::{ScriptWrite, UserRow, content_digest};
use time::OffsetDateTime;
use uuid::Uuid;

fn user_row(name: &str, github: Option<&str>, token_hash: Option<&str>) -> UserRow {
    UserRow {
        user_id: Uuid::new_v4(),
        name: name.to_string(),
        github_username: github.map(str::to_string),
        token_hash: token_hash.map(str::to_string),
        created_at: OffsetDateTime::now_utc(),
    }
}

#[tokio::test]
async fn test_user_lookups() {
    let metadata = TestMetadata::new().await.unwrap();
    let row = user_row("alice", Some("alice-gh"), Some("abc123"));
    metadata.store.create_user(&row).await.unwrap();

    let by_github = metadata
        .store
        .get_user_by_github_username("alice-gh")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_github.user_id, row.user_id);

    let by_token = metadata
        .store
        .get_user_by_token_hash("abc123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_token.user_id, row.user_id);

    assert!(metadata.store.get_user_by_token_hash("zzz").await.unwrap().is_none());
    assert!(
        metadata
            .store
            .get_user_by_github_username("bob-gh")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_duplicate_user_is_rejected() {
    let metadata = TestMetadata::new().await.unwrap();
    metadata
        .store
        .create_user(&user_row("alice", Some("gh"), None))
        .await
        .unwrap();

    let err = metadata
        .store
        .create_user(&user_row("alice", None, None))
        .await
        .unwrap_err();
    assert!(matches!(err, MetadataError::AlreadyExists(_)));

    let err = metadata
        .store
        .create_user(&user_row("bob", Some("gh"), None))
        .await
        .unwrap_err();
    assert!(matches!(err, MetadataError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_upsert_reports_creation_once() {
    let metadata = TestMetadata::new().await.unwrap();
    let author = user_row("alice", None, None);
    metadata.store.create_user(&author).await.unwrap();

    let write =
        ScriptWrite::new("alice/demo.user.js", "Demo", &header("Demo", None), author.user_id, b"v1")
            .unwrap();
    let first = metadata.store.upsert_script(&write).await.unwrap().expect("own record");
    assert!(first.created);
    assert!(!first.row.blob_synced);
    assert_eq!(first.row.installs, 0);
    assert!(first.row.installable);

    assert!(
        metadata
            .store
            .mark_blob_synced("alice/demo.user.js", &write.content_sha256)
            .await
            .unwrap()
    );

    let rewrite = ScriptWrite::new(
        "alice/demo.user.js",
        "Demo v2",
        &header("Demo", None),
        author.user_id,
        b"v2",
    )
    .unwrap();
    let second = metadata.store.upsert_script(&rewrite).await.unwrap().expect("own record");
    assert!(!second.created);
    assert_eq!(second.row.name, "Demo v2");
    assert_eq!(second.row.content_sha256, content_digest(b"v2"));
    assert_eq!(second.row.created_at, first.row.created_at);
    // a rewrite invalidates the blob until the new one lands
    assert!(!second.row.blob_synced);
}

#[tokio::test]
async fn test_update_if_exists() {
    let metadata = TestMetadata::new().await.unwrap();
    let author = user_row("alice", None, None);
    metadata.store.create_user(&author).await.unwrap();

    let write =
        ScriptWrite::new("alice/demo.user.js", "Demo", &header("Demo", None), author.user_id, b"v1")
            .unwrap();
    assert!(
        metadata
            .store
            .update_script_if_exists(&write)
            .await
            .unwrap()
            .is_none()
    );
    assert!(metadata.store.get_script("alice/demo.user.js").await.unwrap().is_none());

    metadata.store.upsert_script(&write).await.unwrap();
    let mut meta = header("Demo", None);
    meta.insert("description", "now with docs");
    let update =
        ScriptWrite::new("alice/demo.user.js", "Demo", &meta, author.user_id, b"v2").unwrap();
    let row = metadata
        .store
        .update_script_if_exists(&update)
        .await
        .unwrap()
        .expect("record exists");
    assert_eq!(row.meta().unwrap().get("description"), Some("now with docs"));
}

#[tokio::test]
async fn test_meta_round_trips_key_order() {
    let metadata = TestMetadata::new().await.unwrap();
    let author = user_row("alice", None, None);
    metadata.store.create_user(&author).await.unwrap();

    let mut meta = header("Ordered", None);
    meta.insert("match", "https://example.com/*");
    meta.insert("grant", "none");
    let write =
        ScriptWrite::new("alice/ordered.user.js", "Ordered", &meta, author.user_id, b"").unwrap();
    metadata.store.upsert_script(&write).await.unwrap();

    let row = metadata
        .store
        .get_script("alice/ordered.user.js")
        .await
        .unwrap()
        .unwrap();
    let keys: Vec<_> = row.meta().unwrap().iter().map(|(k, _)| k.to_string()).collect();
    assert_eq!(keys, ["name", "version", "match", "grant"]);
}

#[tokio::test]
async fn test_install_counter() {
    let metadata = TestMetadata::new().await.unwrap();
    let author = user_row("alice", None, None);
    metadata.store.create_user(&author).await.unwrap();

    assert!(!metadata.store.increment_installs("alice/none.user.js").await.unwrap());

    let write =
        ScriptWrite::new("alice/demo.user.js", "Demo", &header("Demo", None), author.user_id, b"v1")
            .unwrap();
    metadata.store.upsert_script(&write).await.unwrap();
    for _ in 0..3 {
        assert!(metadata.store.increment_installs("alice/demo.user.js").await.unwrap());
    }

    let row = metadata.store.get_script("alice/demo.user.js").await.unwrap().unwrap();
    assert_eq!(row.installs, 3);
}

#[tokio::test]
async fn test_unsynced_listing_and_marking() {
    let metadata = TestMetadata::new().await.unwrap();
    let author = user_row("alice", None, None);
    metadata.store.create_user(&author).await.unwrap();

    for name in ["a", "b", "c"] {
        let install = format!("alice/{name}.user.js");
        let write =
            ScriptWrite::new(&install, name, &header(name, None), author.user_id, name.as_bytes())
                .unwrap();
        metadata.store.upsert_script(&write).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    assert!(
        metadata
            .store
            .mark_blob_synced("alice/b.user.js", &content_digest(b"b"))
            .await
            .unwrap()
    );

    let unsynced = metadata.store.list_unsynced_scripts(10).await.unwrap();
    let names: Vec<_> = unsynced.iter().map(|r| r.install_name.as_str()).collect();
    assert_eq!(names, ["alice/a.user.js", "alice/c.user.js"]);

    let first = metadata.store.list_unsynced_scripts(1).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].install_name, "alice/a.user.js");

    assert!(
        !metadata
            .store
            .mark_blob_synced("alice/missing.user.js", &content_digest(b"b"))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_mark_synced_ignores_superseded_digest() {
    let metadata = TestMetadata::new().await.unwrap();
    let author = user_row("alice", None, None);
    metadata.store.create_user(&author).await.unwrap();

    let v1 = ScriptWrite::new("alice/s.user.js", "S", &header("S", None), author.user_id, b"v1")
        .unwrap();
    metadata.store.upsert_script(&v1).await.unwrap();
    let v2 = ScriptWrite::new("alice/s.user.js", "S", &header("S", None), author.user_id, b"v2")
        .unwrap();
    metadata.store.upsert_script(&v2).await.unwrap();

    // confirming the older content must not mark the newer record synced
    assert!(
        !metadata
            .store
            .mark_blob_synced("alice/s.user.js", &v1.content_sha256)
            .await
            .unwrap()
    );
    let row = metadata.store.get_script("alice/s.user.js").await.unwrap().unwrap();
    assert!(!row.blob_synced);
    assert_eq!(row.content_sha256, v2.content_sha256);
}

#[tokio::test]
async fn test_writes_never_touch_another_authors_record() {
    let metadata = TestMetadata::new().await.unwrap();
    let owner = user_row("alice", None, None);
    let other = user_row("Alice", None, None);
    metadata.store.create_user(&owner).await.unwrap();
    metadata.store.create_user(&other).await.unwrap();

    let original =
        ScriptWrite::new("alice/s.user.js", "S", &header("S", None), owner.user_id, b"mine")
            .unwrap();
    metadata.store.upsert_script(&original).await.unwrap();

    let hijack =
        ScriptWrite::new("alice/s.user.js", "Hijacked", &header("S", None), other.user_id, b"theirs")
            .unwrap();
    assert!(metadata.store.upsert_script(&hijack).await.unwrap().is_none());
    assert!(
        metadata
            .store
            .update_script_if_exists(&hijack)
            .await
            .unwrap()
            .is_none()
    );

    let row = metadata.store.get_script("alice/s.user.js").await.unwrap().unwrap();
    assert_eq!(row.author_id, owner.user_id);
    assert_eq!(row.name, "S");
    assert_eq!(row.content_sha256, original.content_sha256);
}

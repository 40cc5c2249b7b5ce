//! Test fixtures for generating test data.

use bytes::Bytes;
use scriptvault_core::{HeaderMap, UserRef};
use scriptvault_metadata::MetadataStore;
use scriptvault_metadata::models::UserRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Build a userscript with a header block followed by `body`.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub fn userscript(name: &str, namespace: Option<&str>, body: &str) -> String {
    let mut script = String::from("// ==UserScript==\n");
    script.push_str(&format!("// @name        {name}\n"));
    if let Some(ns) = namespace {
        script.push_str(&format!("// @namespace   {ns}\n"));
    }
    script.push_str("// @version     1.0\n");
    script.push_str("// ==/UserScript==\n");
    script.push_str(body);
    script
}

/// Header mapping with the given `@name` and optional `@namespace`.
#[allow(dead_code)]
pub fn header(name: &str, namespace: Option<&str>) -> HeaderMap {
    let mut meta = HeaderMap::new();
    meta.insert("name", name);
    if let Some(ns) = namespace {
        meta.insert("namespace", ns);
    }
    meta.insert("version", "1.0");
    meta
}

/// Create an author account. Returns the author and the raw upload token.
#[allow(dead_code)]
pub async fn create_user(
    metadata: &dyn MetadataStore,
    name: &str,
    github_username: Option<&str>,
) -> (UserRef, String) {
    let token = format!("test-token-{}", Uuid::new_v4());
    let row = UserRow {
        user_id: Uuid::new_v4(),
        name: name.to_string(),
        github_username: github_username.map(str::to_string),
        token_hash: Some(scriptvault_server::auth::hash_token(&token)),
        created_at: OffsetDateTime::now_utc(),
    };
    metadata
        .create_user(&row)
        .await
        .expect("Failed to create user");
    (row.to_user_ref(), token)
}

/// Split data into chunks of specified size.
#[allow(dead_code)]
pub fn split_into_chunks(data: &[u8], chunk_size: usize) -> Vec<Bytes> {
    data.chunks(chunk_size)
        .map(Bytes::copy_from_slice)
        .collect()
}

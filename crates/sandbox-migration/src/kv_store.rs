//! External K/V store abstraction.
//!
//! The store itself is an out-of-scope collaborator — this crate only needs
//! put/get of opaque byte blobs under fixed keys. Modeled as a small
//! `async_trait` interface so tests can swap in an in-memory fake, following
//! the same shape as `agent-api-client`'s transport `Connector` trait.

use async_trait::async_trait;

pub const MANIFEST_KEY: &str = "sandbox/migration/manifest.json";
pub const TARBALL_KEY: &str = "sandbox/migration/changes.tar.gz";

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn put(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()>;
    /// `Ok(None)` means the key is absent — not an error.
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
}

/// HTTP-backed store: `PUT {base_url}/{key}` to write, `GET` to read, a 404
/// response is translated to `Ok(None)`.
pub struct HttpKvStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpKvStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

#[async_trait]
impl KvStore for HttpKvStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()> {
        let response = self.client.put(self.url_for(key)).body(value).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("kv store rejected put for {key}: {}", response.status());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let response = self.client.get(self.url_for(key)).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("kv store rejected get for {key}: {}", response.status());
        }
        Ok(Some(response.bytes().await?.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    pub struct InMemoryKvStore {
        entries: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl InMemoryKvStore {
        pub fn new() -> Self {
            Self {
                entries: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl KvStore for InMemoryKvStore {
        async fn put(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()> {
            self.entries.lock().await.insert(key.to_string(), value);
            Ok(())
        }

        async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
            Ok(self.entries.lock().await.get(key).cloned())
        }
    }

    #[tokio::test]
    async fn roundtrips_through_memory_store() {
        let store = InMemoryKvStore::new();
        assert!(store.get(MANIFEST_KEY).await.unwrap().is_none());
        store.put(MANIFEST_KEY, b"hello".to_vec()).await.unwrap();
        assert_eq!(store.get(MANIFEST_KEY).await.unwrap().unwrap(), b"hello");
    }
}

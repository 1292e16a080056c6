//! In-memory object store used by unit and HTTP tests.

use crate::services::storage_gateway::{ObjectStore, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Failure to inject into [`MemoryObjectStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    HeadBucket,
    CreateBucket,
    PutObject,
    /// Put succeeds but the backend reports no entity tag.
    NoEntityTag,
    /// Put succeeds with an entity tag that is not a legal header value.
    MalformedEntityTag,
}

#[derive(Clone, Debug)]
pub struct StoredObject {
    pub content_type: String,
    pub body: Bytes,
}

#[derive(Default)]
struct State {
    buckets: HashSet<String>,
    objects: HashMap<(String, String), StoredObject>,
    hidden_heads_left: usize,
}

#[derive(Default)]
pub struct MemoryObjectStore {
    state: Mutex<State>,
    fault: Option<Fault>,
    visibility_delay: usize,
    head_calls: AtomicUsize,
    create_calls: AtomicUsize,
    put_calls: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn with_bucket(bucket: &str) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().buckets.insert(bucket.to_string());
        store
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    /// Newly created buckets stay invisible for this many HEAD calls.
    pub fn with_visibility_delay(mut self, heads: usize) -> Self {
        self.visibility_delay = heads;
        self
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut keys: Vec<String> = state
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn head_calls(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    fn failure(&self, fault: Fault, operation: &'static str, retryable: bool) -> StorageResult<()> {
        if self.fault == Some(fault) {
            return Err(StorageError::Backend {
                operation,
                message: "simulated backend fault".into(),
                retryable,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        self.failure(Fault::HeadBucket, "head_bucket", true)?;
        let mut state = self.state.lock().unwrap();
        if !state.buckets.contains(bucket) {
            return Ok(false);
        }
        if state.hidden_heads_left > 0 {
            state.hidden_heads_left -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.failure(Fault::CreateBucket, "create_bucket", false)?;
        let mut state = self.state.lock().unwrap();
        if state.buckets.insert(bucket.to_string()) {
            state.hidden_heads_left = self.visibility_delay;
        }
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: Bytes,
    ) -> StorageResult<Option<String>> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        self.failure(Fault::PutObject, "put_object", false)?;
        let etag = format!("\"{:x}\"", md5::compute(&body));
        self.state.lock().unwrap().objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                content_type: content_type.to_string(),
                body,
            },
        );
        match self.fault {
            Some(Fault::NoEntityTag) => Ok(None),
            Some(Fault::MalformedEntityTag) => Ok(Some("tag\nsplit".to_string())),
            _ => Ok(Some(etag)),
        }
    }
}

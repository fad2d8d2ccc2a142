//! In-memory client for tests.
//!
//! This provides an [`ObjectStoreClient`] backed by a `BTreeMap`, with scripted
//! latency, chunked bodies and failure injection. The client is [`Clone`] so
//! tests can hold a handle for inspecting call counts while the engine owns a
//! boxed copy.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;

use crate::client::{GetObjectResponse, HeadObjectResponse, ObjectStoreClient};
use crate::error::{Error, Result};

/// The object store verbs, used to count and script calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Verb {
    Get,
    Head,
    Put,
    Delete,
    List,
}

/// How a scripted call fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Failure {
    Backend,
    Transport,
}

#[derive(Clone, Debug)]
struct StoredObject {
    content_encoding: Option<String>,
    payload: Bytes,
}

type Store = BTreeMap<(String, String), StoredObject>;

#[derive(Debug, Default)]
struct State {
    store: Mutex<Store>,
    calls: Mutex<HashMap<Verb, usize>>,
    chunks_served: AtomicUsize,
}

/// A scripted in-memory object store.
#[derive(Clone, Debug)]
pub struct InMemoryClient {
    name: &'static str,
    latency: Duration,
    chunk_size: Option<usize>,
    chunk_delay: Duration,
    failures: Vec<(Verb, usize, Failure)>,
    state: Arc<State>,
}

impl InMemoryClient {
    /// Creates an empty store that answers immediately.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            latency: Duration::ZERO,
            chunk_size: None,
            chunk_delay: Duration::ZERO,
            failures: Vec::new(),
            state: Arc::default(),
        }
    }

    /// Every call sleeps for `latency` before it is answered.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Bodies are streamed in chunks of `size` bytes, each delayed by `delay`.
    pub fn with_chunks(mut self, size: usize, delay: Duration) -> Self {
        self.chunk_size = Some(size.max(1));
        self.chunk_delay = delay;
        self
    }

    /// The `nth` call (starting at 1) of `verb` fails with a backend error.
    pub fn fail_call(mut self, verb: Verb, nth: usize) -> Self {
        self.failures.push((verb, nth, Failure::Backend));
        self
    }

    /// The `nth` call (starting at 1) of `verb` fails as if the connection dropped.
    pub fn fail_transport(mut self, verb: Verb, nth: usize) -> Self {
        self.failures.push((verb, nth, Failure::Transport));
        self
    }

    /// Stores an object directly, bypassing call counting and latency.
    pub fn insert(&self, bucket: &str, key: &str, payload: impl Into<Bytes>, encoding: Option<&str>) {
        let object = StoredObject {
            content_encoding: encoding.map(str::to_owned),
            payload: payload.into(),
        };
        self.state
            .store
            .lock()
            .unwrap()
            .insert((bucket.to_owned(), key.to_owned()), object);
    }

    /// Returns `true` if the store contains the given object.
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.state
            .store
            .lock()
            .unwrap()
            .contains_key(&(bucket.to_owned(), key.to_owned()))
    }

    /// Number of calls of the given verb so far, including failed ones.
    pub fn calls(&self, verb: Verb) -> usize {
        self.state
            .calls
            .lock()
            .unwrap()
            .get(&verb)
            .copied()
            .unwrap_or_default()
    }

    /// Number of body chunks consumed by readers so far.
    pub fn chunks_served(&self) -> usize {
        self.state.chunks_served.load(Ordering::SeqCst)
    }

    async fn enter(&self, verb: Verb) -> Result<()> {
        let nth = {
            let mut calls = self.state.calls.lock().unwrap();
            let count = calls.entry(verb).or_default();
            *count += 1;
            *count
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failure = self
            .failures
            .iter()
            .find(|&&(v, n, _)| v == verb && n == nth)
            .map(|&(_, _, failure)| failure);

        match failure {
            Some(Failure::Backend) => Err(Error::backend(
                "InternalError",
                format!("injected failure on {verb:?} call {nth}"),
            )),
            Some(Failure::Transport) => Err(Error::transport(
                format!("{verb:?} call {nth}"),
                std::io::Error::from(std::io::ErrorKind::ConnectionReset),
            )),
            None => Ok(()),
        }
    }

    fn lookup(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        self.state
            .store
            .lock()
            .unwrap()
            .get(&(bucket.to_owned(), key.to_owned()))
            .cloned()
            .ok_or_else(|| Error::backend("NoSuchKey", "The specified key does not exist."))
    }
}

#[async_trait::async_trait]
impl ObjectStoreClient for InMemoryClient {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<GetObjectResponse> {
        self.enter(Verb::Get).await?;
        let object = self.lookup(bucket, key)?;

        let content_length = object.payload.len() as u64;
        let chunk_size = self.chunk_size.unwrap_or(object.payload.len().max(1));
        let chunks: Vec<Bytes> = object
            .payload
            .chunks(chunk_size)
            .map(Bytes::copy_from_slice)
            .collect();

        let delay = self.chunk_delay;
        let state = Arc::clone(&self.state);
        let stream = futures_util::stream::iter(chunks)
            .then(move |chunk| {
                let state = Arc::clone(&state);
                async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    state.chunks_served.fetch_add(1, Ordering::SeqCst);
                    Ok(chunk)
                }
            })
            .boxed();

        Ok(GetObjectResponse {
            content_encoding: object.content_encoding,
            content_length,
            stream,
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<HeadObjectResponse> {
        self.enter(Verb::Head).await?;
        let object = self.lookup(bucket, key)?;

        Ok(HeadObjectResponse {
            content_length: object.payload.len() as u64,
            content_encoding: object.content_encoding,
            e_tag: Some(format!("\"{}\"", crate::digest::md5_hex(&object.payload))),
            ..Default::default()
        })
    }

    async fn put_object(&self, bucket: &str, key: &str, payload: Bytes) -> Result<()> {
        self.enter(Verb::Put).await?;
        self.insert(bucket, key, payload, None);
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.enter(Verb::Delete).await?;
        self.state
            .store
            .lock()
            .unwrap()
            .remove(&(bucket.to_owned(), key.to_owned()));
        Ok(())
    }

    async fn list_objects(&self, bucket: &str, max_keys: usize) -> Result<Vec<String>> {
        self.enter(Verb::List).await?;
        let keys = self
            .state
            .store
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, key)| key.clone())
            .take(max_keys)
            .collect();
        Ok(keys)
    }
}

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use super::engine::DocumentStore;
use super::error::{Result, StoreError};
use super::persistence::EncodedCollection;

/// A record type that lives in one collection of the [`DocumentStore`].
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn key(&self) -> &str;

    /// The collection holding documents of this type.
    fn slot(store: &DocumentStore) -> &Collection<Self>;
}

/// Documents of one type keyed by id.
pub struct Collection<T> {
    pub(super) documents: RwLock<BTreeMap<String, T>>,
}

impl<T: Document> Collection<T> {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(BTreeMap::new()),
        }
    }

    pub(super) fn decode(encoded: EncodedCollection) -> Result<Self> {
        let mut documents = BTreeMap::new();
        for (key, payload) in encoded {
            let document: T =
                rmp_serde::from_slice(&payload).map_err(|e| StoreError::decode(T::COLLECTION, e))?;
            documents.insert(key, document);
        }
        Ok(Self {
            documents: RwLock::new(documents),
        })
    }

    pub(super) fn encode_all(documents: &BTreeMap<String, T>) -> Result<EncodedCollection> {
        documents
            .iter()
            .map(|(key, document)| Ok((key.clone(), encode(document)?)))
            .collect()
    }
}

impl<T: Document> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub(super) fn encode<T: Document>(document: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(document).map_err(|e| StoreError::encode(T::COLLECTION, e))
}

use std::collections::BTreeMap;
use std::path::Path;

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::collection::{Collection, Document, encode};
use super::error::{Result, StoreError};
use super::persistence::{DurabilityMode, JournalEntry, PersistenceManager, StoreImage};
use crate::model::{Campaign, Event, Lead, User};

/// Embedded document store: one typed collection per record kind, with an
/// optional journal + snapshot on disk.
///
/// Single-document writes are atomic. Nothing spans more than one document.
pub struct DocumentStore {
    leads: Collection<Lead>,
    users: Collection<User>,
    campaigns: Collection<Campaign>,
    events: Collection<Event>,
    persistence: Option<Mutex<PersistenceManager>>,
}

impl Document for Lead {
    const COLLECTION: &'static str = "leads";

    fn key(&self) -> &str {
        self.id.as_str()
    }

    fn slot(store: &DocumentStore) -> &Collection<Self> {
        &store.leads
    }
}

impl Document for User {
    const COLLECTION: &'static str = "users";

    fn key(&self) -> &str {
        self.id.as_str()
    }

    fn slot(store: &DocumentStore) -> &Collection<Self> {
        &store.users
    }
}

impl Document for Campaign {
    const COLLECTION: &'static str = "campaigns";

    fn key(&self) -> &str {
        self.id.as_str()
    }

    fn slot(store: &DocumentStore) -> &Collection<Self> {
        &store.campaigns
    }
}

impl Document for Event {
    const COLLECTION: &'static str = "events";

    fn key(&self) -> &str {
        self.id.as_str()
    }

    fn slot(store: &DocumentStore) -> &Collection<Self> {
        &store.events
    }
}

impl DocumentStore {
    /// Store with no disk footprint.
    pub fn in_memory() -> Self {
        Self {
            leads: Collection::new(),
            users: Collection::new(),
            campaigns: Collection::new(),
            events: Collection::new(),
            persistence: None,
        }
    }

    /// Opens (or creates) a store under `data_dir`, recovering snapshot and journal.
    pub fn open<P: AsRef<Path>>(
        data_dir: P,
        mode: DurabilityMode,
        checkpoint_every: usize,
    ) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let manager = PersistenceManager::open(data_dir, mode, checkpoint_every)?;

        let mut store = match manager.recover()? {
            Some(mut image) => {
                info!(
                    path = %data_dir.display(),
                    documents = image.document_count(),
                    "recovered document store"
                );
                let mut take = |name: &str| image.collections.remove(name).unwrap_or_default();
                Self {
                    leads: Collection::decode(take(Lead::COLLECTION))?,
                    users: Collection::decode(take(User::COLLECTION))?,
                    campaigns: Collection::decode(take(Campaign::COLLECTION))?,
                    events: Collection::decode(take(Event::COLLECTION))?,
                    persistence: None,
                }
            }
            None => {
                info!(path = %data_dir.display(), "starting with an empty document store");
                Self::in_memory()
            }
        };
        store.persistence = Some(Mutex::new(manager));
        Ok(store)
    }

    pub fn is_persistent(&self) -> bool {
        self.persistence.is_some()
    }

    pub async fn get<T: Document>(&self, key: &str) -> Option<T> {
        T::slot(self).documents.read().await.get(key).cloned()
    }

    /// Every document matching `predicate`, in key order.
    pub async fn find<T, F>(&self, predicate: F) -> Vec<T>
    where
        T: Document,
        F: Fn(&T) -> bool,
    {
        T::slot(self)
            .documents
            .read()
            .await
            .values()
            .filter(|document| predicate(document))
            .cloned()
            .collect()
    }

    pub async fn count<T, F>(&self, predicate: F) -> usize
    where
        T: Document,
        F: Fn(&T) -> bool,
    {
        T::slot(self)
            .documents
            .read()
            .await
            .values()
            .filter(|document| predicate(document))
            .count()
    }

    /// Inserts or overwrites a document.
    pub async fn insert<T: Document>(&self, document: T) -> Result<T> {
        self.insert_unless(document, |_| None).await
    }

    /// Inserts unless `clash` reports a conflict with an existing document.
    pub async fn insert_unless<T, F>(&self, document: T, clash: F) -> Result<T>
    where
        T: Document,
        F: Fn(&T) -> Option<String>,
    {
        {
            let mut documents = T::slot(self).documents.write().await;
            if let Some(message) = documents.values().find_map(&clash) {
                return Err(StoreError::Conflict(message));
            }
            self.record(put_entry(&document)?).await?;
            documents.insert(document.key().to_string(), document.clone());
        }
        self.maybe_checkpoint().await;
        Ok(document)
    }

    /// Applies `change` to a copy of the document and stores it if `change` succeeds.
    ///
    /// Returns `Ok(None)` when no document has that key.
    pub async fn modify<T, E, F>(&self, key: &str, change: F) -> std::result::Result<Option<T>, E>
    where
        T: Document,
        E: From<StoreError>,
        F: FnOnce(&mut T) -> std::result::Result<(), E>,
    {
        let updated = {
            let mut documents = T::slot(self).documents.write().await;
            let Some(current) = documents.get(key) else {
                return Ok(None);
            };
            let mut next = current.clone();
            change(&mut next)?;
            self.record(put_entry(&next)?).await?;
            documents.insert(key.to_string(), next.clone());
            next
        };
        self.maybe_checkpoint().await;
        Ok(Some(updated))
    }

    pub async fn remove<T: Document>(&self, key: &str) -> Result<Option<T>> {
        let removed = {
            let mut documents = T::slot(self).documents.write().await;
            if !documents.contains_key(key) {
                return Ok(None);
            }
            self.record(JournalEntry::Remove {
                collection: T::COLLECTION.to_string(),
                key: key.to_string(),
            })
            .await?;
            documents.remove(key)
        };
        self.maybe_checkpoint().await;
        Ok(removed)
    }

    /// Removes every document of the collection, returning how many there were.
    pub async fn clear<T: Document>(&self) -> Result<usize> {
        let removed = {
            let mut documents = T::slot(self).documents.write().await;
            self.record(JournalEntry::Clear {
                collection: T::COLLECTION.to_string(),
            })
            .await?;
            let removed = documents.len();
            documents.clear();
            removed
        };
        self.maybe_checkpoint().await;
        Ok(removed)
    }

    /// Writes a full snapshot and truncates the journal. No-op for in-memory stores.
    pub async fn checkpoint(&self) -> Result<()> {
        let Some(persistence) = &self.persistence else {
            return Ok(());
        };

        // Collection locks before the journal lock, same order as the write path.
        let leads = self.leads.documents.read().await;
        let users = self.users.documents.read().await;
        let campaigns = self.campaigns.documents.read().await;
        let events = self.events.documents.read().await;

        let mut collections = BTreeMap::new();
        collections.insert(
            Lead::COLLECTION.to_string(),
            Collection::<Lead>::encode_all(&leads)?,
        );
        collections.insert(
            User::COLLECTION.to_string(),
            Collection::<User>::encode_all(&users)?,
        );
        collections.insert(
            Campaign::COLLECTION.to_string(),
            Collection::<Campaign>::encode_all(&campaigns)?,
        );
        collections.insert(
            Event::COLLECTION.to_string(),
            Collection::<Event>::encode_all(&events)?,
        );

        persistence
            .lock()
            .await
            .checkpoint(&StoreImage::new(collections))
    }

    async fn record(&self, entry: JournalEntry) -> Result<()> {
        if let Some(persistence) = &self.persistence {
            persistence.lock().await.log(&entry)?;
        }
        Ok(())
    }

    async fn maybe_checkpoint(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        if !persistence.lock().await.needs_checkpoint() {
            return;
        }
        // The write itself is already durable in the journal.
        if let Err(err) = self.checkpoint().await {
            warn!(error = %err, "automatic checkpoint failed");
        }
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn put_entry<T: Document>(document: &T) -> Result<JournalEntry> {
    Ok(JournalEntry::Put {
        collection: T::COLLECTION.to_string(),
        key: document.key().to_string(),
        payload: encode(document)?,
    })
}

//! Persistent index storage
//!
//! Snapshots the committed side of a file-backed index with bincode.
//! Includes file locking for safe concurrent access (exclusive writes, shared reads).

use anyhow::{Context, Result};
use fs2::FileExt;
use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::postings::Postings;
use super::store::{DocumentStore, StoredDocument};
use crate::config::IndexConfig;

/// Serializable representation of one committed document
#[derive(Serialize, Deserialize, Clone)]
pub struct PersistedDocument {
    pub id: u32,
    pub url: String,
    pub digest: [u8; 16],
    pub length: u32,
    pub term_freqs: Vec<(String, u32)>,
    /// Present when the index was built with proximity indexing
    pub positions: Option<Vec<(String, Vec<u32>)>>,
}

impl PersistedDocument {
    fn from_stored(id: u32, doc: &StoredDocument) -> Self {
        Self {
            id,
            url: doc.url.clone(),
            digest: doc.digest,
            length: doc.length,
            term_freqs: doc
                .term_freqs
                .iter()
                .map(|(term, tf)| (term.clone(), *tf))
                .collect(),
            positions: doc.positions.as_ref().map(|positions| {
                positions
                    .iter()
                    .map(|(term, p)| (term.clone(), p.clone()))
                    .collect()
            }),
        }
    }

    fn into_stored(self) -> (u32, StoredDocument) {
        let doc = StoredDocument {
            url: self.url,
            digest: self.digest,
            length: self.length,
            term_freqs: self.term_freqs.into_iter().collect(),
            positions: self.positions.map(|p| p.into_iter().collect()),
        };
        (self.id, doc)
    }
}

/// Complete persisted index state
#[derive(Serialize, Deserialize)]
pub struct PersistedIndex {
    /// Version for forward compatibility
    pub version: u32,
    /// Settings the index was created with
    pub config: IndexConfig,
    /// Fingerprint of `config` at save time
    pub config_fingerprint: String,
    /// Next document id to hand out
    pub next_id: u32,
    pub documents: Vec<PersistedDocument>,
    /// Map from term to serialized roaring bitmap
    pub postings: Vec<(String, Vec<u8>)>,
}

impl PersistedIndex {
    /// Current persistence format version (bump this when format changes)
    pub const CURRENT_VERSION: u32 = 1;

    /// Create a new persisted index from the committed store
    pub fn new(config: &IndexConfig, store: &DocumentStore) -> Result<Self> {
        let mut postings = Vec::with_capacity(store.postings().num_terms());
        for (term, bitmap) in store.postings().iter() {
            let mut buf = Vec::new();
            bitmap.serialize_into(&mut buf)?;
            postings.push((term.clone(), buf));
        }

        let documents = store
            .iter()
            .map(|(id, doc)| PersistedDocument::from_stored(*id, doc))
            .collect();

        Ok(Self {
            version: Self::CURRENT_VERSION,
            config: config.clone(),
            config_fingerprint: config.fingerprint(),
            next_id: store.next_id(),
            documents,
            postings,
        })
    }

    /// Save the index to a file with exclusive lock
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create index directory: {}", parent.display())
            })?;
        }

        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create index file: {}", path.display()))?;

        file.lock_exclusive()
            .with_context(|| format!("Failed to acquire exclusive lock on: {}", path.display()))?;

        let writer = std::io::BufWriter::new(&file);
        bincode::serialize_into(writer, self)
            .with_context(|| format!("Failed to serialize index: {}", path.display()))?;

        // Lock is automatically released when file is dropped
        Ok(())
    }

    /// Load an index from a file with shared lock (allows multiple readers)
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open index file: {}", path.display()))?;

        file.lock_shared()
            .with_context(|| format!("Failed to acquire shared lock on: {}", path.display()))?;

        let reader = std::io::BufReader::new(&file);
        let index: Self = bincode::deserialize_from(reader)
            .with_context(|| format!("Failed to deserialize index: {}", path.display()))?;

        if index.version != Self::CURRENT_VERSION {
            anyhow::bail!(
                "Index version mismatch: found {}, expected {}",
                index.version,
                Self::CURRENT_VERSION
            );
        }

        Ok(index)
    }

    /// Check if the index was built with the given settings
    pub fn is_config_compatible(&self, config: &IndexConfig) -> bool {
        self.config_fingerprint == config.fingerprint()
    }

    /// Restore the postings from persisted data (parallelized for performance)
    pub fn restore_postings(&self) -> Result<FxHashMap<String, RoaringBitmap>> {
        use rayon::prelude::*;

        let results: Result<Vec<_>> = self
            .postings
            .par_iter()
            .map(|(term, bitmap_data)| {
                let bitmap = RoaringBitmap::deserialize_from(&bitmap_data[..])?;
                Ok((term.clone(), bitmap))
            })
            .collect();

        Ok(results?.into_iter().collect())
    }

    /// Rebuild the committed document store
    pub fn into_store(self) -> Result<(IndexConfig, DocumentStore)> {
        let postings = Postings::from_map(self.restore_postings()?);
        let docs: FxHashMap<u32, StoredDocument> = self
            .documents
            .into_iter()
            .map(PersistedDocument::into_stored)
            .collect();
        Ok((
            self.config,
            DocumentStore::restore(docs, postings, self.next_id),
        ))
    }
}

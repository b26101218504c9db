use rustc_hash::FxHashMap;

use super::engine::DocumentId;
use super::postings::Postings;
use super::tokenizer::Analysis;

/// A committed, searchable document
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub url: String,
    /// md5 of the text the document was built from
    pub digest: [u8; 16],
    /// Number of indexed tokens
    pub length: u32,
    pub term_freqs: FxHashMap<String, u32>,
    pub positions: Option<FxHashMap<String, Vec<u32>>>,
}

impl StoredDocument {
    pub fn new(url: String, digest: [u8; 16], analysis: Analysis) -> Self {
        Self {
            url,
            digest,
            length: analysis.length,
            term_freqs: analysis.term_freqs,
            positions: analysis.positions,
        }
    }

    pub fn term_freq(&self, term: &str) -> u32 {
        self.term_freqs.get(term).copied().unwrap_or(0)
    }
}

/// The committed side of an index: documents by id, the URL lookup table and
/// the postings built from them.
#[derive(Debug, Default)]
pub struct DocumentStore {
    docs: FxHashMap<DocumentId, StoredDocument>,
    url_to_id: FxHashMap<String, DocumentId>,
    postings: Postings,
    total_length: u64,
    next_id: DocumentId,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted parts
    pub fn restore(
        docs: FxHashMap<DocumentId, StoredDocument>,
        postings: Postings,
        next_id: DocumentId,
    ) -> Self {
        let url_to_id = docs.iter().map(|(id, doc)| (doc.url.clone(), *id)).collect();
        let total_length = docs.values().map(|doc| doc.length as u64).sum();
        let next_id = docs.keys().map(|id| id + 1).max().unwrap_or(0).max(next_id);
        Self {
            docs,
            url_to_id,
            postings,
            total_length,
            next_id,
        }
    }

    pub fn get(&self, id: DocumentId) -> Option<&StoredDocument> {
        self.docs.get(&id)
    }

    pub fn get_by_url(&self, url: &str) -> Option<&StoredDocument> {
        self.url_to_id.get(url).and_then(|id| self.docs.get(id))
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.url_to_id.contains_key(url)
    }

    pub fn postings(&self) -> &Postings {
        &self.postings
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn next_id(&self) -> DocumentId {
        self.next_id
    }

    pub fn avg_length(&self) -> f32 {
        if self.docs.is_empty() {
            0.0
        } else {
            self.total_length as f32 / self.docs.len() as f32
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DocumentId, &StoredDocument)> {
        self.docs.iter()
    }

    /// Insert or replace the document for `url`.
    /// A replaced document keeps its id.
    pub fn insert(&mut self, url: String, digest: [u8; 16], analysis: Analysis) -> DocumentId {
        let existing = self.url_to_id.get(&url).copied();
        let id = match existing {
            Some(id) => {
                self.unlink(id);
                id
            }
            None => {
                let id = self.next_id;
                self.next_id += 1;
                self.url_to_id.insert(url.clone(), id);
                id
            }
        };

        let doc = StoredDocument::new(url, digest, analysis);
        self.postings.add_document(id, doc.term_freqs.keys());
        self.total_length += doc.length as u64;
        self.docs.insert(id, doc);
        id
    }

    /// Remove the document for `url`, returning whether it was present.
    /// Its id is never handed out again.
    pub fn remove(&mut self, url: &str) -> bool {
        match self.url_to_id.remove(url) {
            Some(id) => {
                self.unlink(id);
                true
            }
            None => false,
        }
    }

    fn unlink(&mut self, id: DocumentId) {
        if let Some(old) = self.docs.remove(&id) {
            self.postings.remove_document(id, old.term_freqs.keys());
            self.total_length -= old.length as u64;
        }
    }
}

use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;

/// Inverted index mapping terms to document IDs using roaring bitmaps
#[derive(Debug, Default)]
pub struct Postings {
    term_to_docs: FxHashMap<String, RoaringBitmap>,
}

impl Postings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(term_to_docs: FxHashMap<String, RoaringBitmap>) -> Self {
        Self { term_to_docs }
    }

    /// Add a document under each of its terms
    pub fn add_document<'a>(&mut self, doc_id: u32, terms: impl IntoIterator<Item = &'a String>) {
        for term in terms {
            if let Some(docs) = self.term_to_docs.get_mut(term.as_str()) {
                docs.insert(doc_id);
            } else {
                let mut docs = RoaringBitmap::new();
                docs.insert(doc_id);
                self.term_to_docs.insert(term.clone(), docs);
            }
        }
    }

    /// Remove a document from each of its terms, dropping terms left empty
    pub fn remove_document<'a>(&mut self, doc_id: u32, terms: impl IntoIterator<Item = &'a String>) {
        for term in terms {
            if let Some(docs) = self.term_to_docs.get_mut(term.as_str()) {
                docs.remove(doc_id);
                if docs.is_empty() {
                    self.term_to_docs.remove(term.as_str());
                }
            }
        }
    }

    /// Documents containing the exact term
    pub fn docs(&self, term: &str) -> Option<&RoaringBitmap> {
        self.term_to_docs.get(term)
    }

    /// Number of documents containing the exact term
    pub fn doc_freq(&self, term: &str) -> u64 {
        self.term_to_docs.get(term).map_or(0, RoaringBitmap::len)
    }

    /// Terms starting with `prefix`
    pub fn terms_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.term_to_docs
            .keys()
            .filter(move |term| term.starts_with(prefix))
            .map(String::as_str)
    }

    /// Union of documents for every term starting with `prefix`
    pub fn docs_with_prefix(&self, prefix: &str) -> RoaringBitmap {
        let mut result = RoaringBitmap::new();
        for (term, docs) in &self.term_to_docs {
            if term.starts_with(prefix) {
                result |= docs;
            }
        }
        result
    }

    /// Get total number of distinct terms in the index
    pub fn num_terms(&self) -> usize {
        self.term_to_docs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RoaringBitmap)> {
        self.term_to_docs.iter()
    }
}

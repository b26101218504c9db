//! Scoring functions for search operations

/// BM25 parameters
pub const BM25_K1: f32 = 1.2;
pub const BM25_B: f32 = 0.75;

/// Inverse document frequency, always positive
pub fn idf(df: f32, total_docs: f32) -> f32 {
    ((total_docs - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Compute BM25 score for a term in a document
///
/// # Arguments
/// * `tf` - Term frequency in document
/// * `df` - Document frequency (how many documents contain the term)
/// * `total_docs` - Total number of documents in the index
/// * `doc_len` - Length of the document (in tokens)
/// * `avg_doc_len` - Average document length across all documents
pub fn bm25_score(tf: f32, df: f32, total_docs: f32, doc_len: f32, avg_doc_len: f32) -> f32 {
    let avg_doc_len = if avg_doc_len > 0.0 { avg_doc_len } else { 1.0 };
    let norm = 1.0 - BM25_B + BM25_B * (doc_len / avg_doc_len);
    idf(df, total_docs) * (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * norm)
}

/// Cosine similarity between two sparse vectors given as (dimension, weight)
/// pairs sorted by dimension. Returns a value in [0, 1].
pub fn sparse_cosine(a: &[(&str, f32)], b: &[(&str, f32)]) -> f32 {
    let mut dot = 0.0f32;
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }

    let norm_a: f32 = a.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
    }
}

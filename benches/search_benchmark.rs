//! Criterion benchmarks for indexing and progressive search
//!
//! Run with: cargo bench
//! View HTML report: target/criterion/report/index.html

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use progressive_search::{IndexConfig, SearchIndexer, SearchOptions};
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

const DEFAULT_NUM_DOCS: usize = 2_000;
const WORDS_PER_DOC: usize = 120;

const VOCABULARY: &[&str] = &[
    "license", "apache", "software", "distribution", "copyright", "notice", "warranty", "source",
    "object", "derivative", "contribution", "patent", "grant", "terms", "conditions", "work",
    "file", "text", "index", "search", "query", "document", "ranking", "cursor", "batch",
];

/// Cached indexer for benchmarks that don't need varying corpus sizes
static CACHED_INDEXER: OnceLock<SearchIndexer> = OnceLock::new();

fn get_or_create_indexer() -> &'static SearchIndexer {
    CACHED_INDEXER.get_or_init(|| setup_indexer(DEFAULT_NUM_DOCS))
}

/// Deterministic pseudo-random text so runs are comparable
fn generate_documents(num_docs: usize) -> Vec<(Url, String)> {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    (0..num_docs)
        .map(|i| {
            let mut text = String::with_capacity(WORDS_PER_DOC * 8);
            for _ in 0..WORDS_PER_DOC {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                text.push_str(VOCABULARY[(state % VOCABULARY.len() as u64) as usize]);
                text.push(' ');
            }
            text.push_str(&format!("unique{i}"));
            let url = Url::parse(&format!("doc://bench/{i}")).expect("valid url");
            (url, text)
        })
        .collect()
}

fn setup_indexer(num_docs: usize) -> SearchIndexer {
    let indexer = SearchIndexer::create_in_memory(IndexConfig::default());
    for (url, text) in generate_documents(num_docs) {
        indexer.add_text(&url, &text, false);
    }
    indexer.flush();
    indexer
}

fn drain(indexer: &SearchIndexer, query: &str, options: SearchOptions, limit: usize) -> usize {
    let session = indexer.progressive_search(query, options);
    let mut total = 0;
    loop {
        let batch = session.next(limit, Duration::from_secs(1));
        total += batch.results.len();
        if !batch.more_results_available {
            return total;
        }
    }
}

fn bench_indexing(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexing");
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(10);

    for num_docs in [500, 2_000] {
        let docs = generate_documents(num_docs);
        group.throughput(Throughput::Elements(num_docs as u64));
        group.bench_with_input(BenchmarkId::new("add_and_flush", num_docs), &docs, |b, docs| {
            b.iter(|| {
                let indexer = SearchIndexer::create_in_memory(IndexConfig::default());
                for (url, text) in docs {
                    indexer.add_text(url, text, false);
                }
                indexer.flush();
                black_box(indexer.document_count())
            })
        });
    }

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let indexer = get_or_create_indexer();
    let mut group = c.benchmark_group("queries");
    group.measurement_time(Duration::from_secs(3));

    let queries = [
        ("single_term", "apache"),
        ("and_terms", "apache license warranty"),
        ("or_terms", "patent OR copyright"),
        ("prefix", "deriv*"),
        ("exclusion", "search -cursor"),
        ("rare_term", "unique42"),
    ];

    for (name, query) in queries {
        group.bench_with_input(BenchmarkId::new("drain", name), &query, |b, query| {
            b.iter(|| black_box(drain(indexer, query, SearchOptions::default(), 100)))
        });
    }

    group.finish();
}

fn bench_batch_sizes(c: &mut Criterion) {
    let indexer = get_or_create_indexer();
    let mut group = c.benchmark_group("batch_size");
    group.measurement_time(Duration::from_secs(3));

    for limit in [1, 10, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(limit), &limit, |b, &limit| {
            b.iter(|| black_box(drain(indexer, "license", SearchOptions::default(), limit)))
        });
    }

    group.finish();
}

fn bench_first_batch(c: &mut Criterion) {
    let indexer = get_or_create_indexer();
    let mut group = c.benchmark_group("first_batch");
    group.measurement_time(Duration::from_secs(3));

    let modes = [
        ("bm25", SearchOptions::default()),
        (
            "unscored",
            SearchOptions {
                no_relevance_scores: true,
                ..Default::default()
            },
        ),
        (
            "find_similar",
            SearchOptions {
                find_similar: true,
                ..Default::default()
            },
        ),
    ];

    for (name, options) in modes {
        group.bench_function(name, |b| {
            b.iter(|| {
                let session = indexer.progressive_search("apache software license", options);
                black_box(session.next(10, Duration::from_secs(1)).results.len())
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_indexing,
    bench_queries,
    bench_batch_sizes,
    bench_first_batch
);
criterion_main!(benches);

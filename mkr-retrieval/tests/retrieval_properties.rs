//! Property tests for collections, persistence, and retriever composition.

use std::sync::Arc;

use mkr_retrieval::{
    CorpusRecord, Database, DenseRetriever, DocumentRetriever, EmbeddingProvider,
    HashEmbeddingProvider, HybridRetriever, KeywordOverlapScorer, LexicalConfig, Metadata, Metric,
    MultistageRetriever, Query, Reranker, RetrievalResult, Retriever, SimpleTokenizer,
    SparseRetriever, VectorConfig, fuse, normalize_scores,
};
use proptest::prelude::*;
use tempfile::TempDir;

const WORDS: &[&str] = &[
    "rust", "memory", "safety", "borrow", "checker", "vector", "search", "index", "query",
    "token", "python", "garbage", "thread", "async", "crate", "module",
];

/// Generate a short document from a fixed vocabulary so queries overlap.
fn arb_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(proptest::sample::select(WORDS), 1..8).prop_map(|w| w.join(" "))
}

/// Generate a corpus of distinct texts.
fn arb_corpus() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::btree_set(arb_text(), 1..16).prop_map(|set| set.into_iter().collect())
}

fn records(texts: &[String]) -> Vec<CorpusRecord> {
    texts.iter().map(|t| CorpusRecord::new(t.clone(), Metadata::new())).collect()
}

fn sparse(dir: &TempDir, name: &str, texts: &[String]) -> SparseRetriever {
    let db = Database::lexical(
        dir.path().join(name),
        LexicalConfig::default(),
        Arc::new(SimpleTokenizer),
    )
    .unwrap();
    let mut retriever = SparseRetriever::new(db).unwrap();
    retriever.add_corpus("corpus", &records(texts)).unwrap();
    retriever
}

fn dense(dir: &TempDir, name: &str, texts: &[String]) -> DenseRetriever {
    let encoder = HashEmbeddingProvider::new(32);
    let config = VectorConfig::new(encoder.name(), 32, Metric::InnerProduct).unwrap();
    let db = Database::vector(dir.path().join(name), config).unwrap();
    let mut retriever = DenseRetriever::new(db, Arc::new(encoder)).unwrap();
    retriever.add_corpus("corpus", &records(texts), 4).unwrap();
    retriever
}

fn ids(results: &[RetrievalResult]) -> Vec<String> {
    results.iter().map(|r| r.id.clone()).collect()
}

/// Candidate ids for the picked texts. Picks may repeat.
fn pick_ids(texts: &[String], picks: &[prop::sample::Index]) -> Vec<String> {
    picks
        .iter()
        .map(|pick| CorpusRecord::new(pick.get(texts).clone(), Metadata::new()).id())
        .collect()
}

fn filtered(results: &[RetrievalResult], candidates: &[String]) -> Vec<String> {
    results.iter().filter(|r| candidates.contains(&r.id)).map(|r| r.id.clone()).collect()
}

/// **Property: adding the same documents twice stores them once**
mod idempotent_add {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn second_add_is_a_no_op(texts in arb_corpus()) {
            let dir = TempDir::new().unwrap();
            let mut retriever = sparse(&dir, "sparse", &texts);
            let added = retriever.add_corpus("corpus", &records(&texts)).unwrap();
            prop_assert_eq!(added, 0);
            retriever.save().unwrap();

            let mut db = Database::lexical(
                dir.path().join("sparse"),
                LexicalConfig::default(),
                Arc::new(SimpleTokenizer),
            )
            .unwrap();
            prop_assert_eq!(db.get("corpus").unwrap().len(), texts.len());
        }
    }
}

/// **Property: save then load reproduces search results exactly**
mod persistence_round_trip {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn lexical_results_survive_reload(texts in arb_corpus(), query in arb_text()) {
            let dir = TempDir::new().unwrap();
            let mut before = sparse(&dir, "sparse", &texts);
            before.save().unwrap();
            let expected = Retriever::from(before).retrieve("corpus", &query, 10, None).unwrap();

            let db = Database::lexical(
                dir.path().join("sparse"),
                LexicalConfig::default(),
                Arc::new(SimpleTokenizer),
            )
            .unwrap();
            let mut after = Retriever::from(SparseRetriever::new(db).unwrap());
            let actual = after.retrieve("corpus", &query, 10, None).unwrap();
            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn vector_results_survive_reload(texts in arb_corpus(), query in arb_text()) {
            let dir = TempDir::new().unwrap();
            let mut before = dense(&dir, "dense", &texts);
            before.save().unwrap();
            let expected = Retriever::from(before).retrieve("corpus", &query, 10, None).unwrap();

            let encoder = HashEmbeddingProvider::new(32);
            let config = VectorConfig::new(encoder.name(), 32, Metric::InnerProduct).unwrap();
            let db = Database::vector(dir.path().join("dense"), config).unwrap();
            let mut after = Retriever::from(DenseRetriever::new(db, Arc::new(encoder)).unwrap());
            let actual = after.retrieve("corpus", &query, 10, None).unwrap();
            prop_assert_eq!(actual, expected);
        }
    }
}

/// **Property: every retriever returns scores in [0, 1] with max 1**
mod normalized_output {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn hybrid_scores_are_normalized(
            texts in arb_corpus(),
            query in arb_text(),
            weight in 0.0f32..=1.0,
            top_k in 1usize..12,
        ) {
            let dir = TempDir::new().unwrap();
            let hybrid = HybridRetriever::new(
                Retriever::from(dense(&dir, "dense", &texts)),
                Retriever::from(sparse(&dir, "sparse", &texts)),
                weight,
            )
            .unwrap();
            let results = Retriever::from(hybrid).retrieve("corpus", &query, top_k, None).unwrap();
            prop_assert!(results.len() <= top_k);
            prop_assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.score)));
            prop_assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
            if results.iter().any(|r| r.score > 0.0) {
                prop_assert_eq!(results[0].score, 1.0);
            }
        }

        #[test]
        fn normalization_is_idempotent(
            mut scores in proptest::collection::vec(-10.0f32..10.0, 0..20),
        ) {
            normalize_scores(&mut scores);
            let once = scores.clone();
            normalize_scores(&mut scores);
            prop_assert_eq!(once, scores);
        }
    }
}

/// **Property: hybrid weights 0 and 1 reproduce the pure retrievers**
mod hybrid_boundaries {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn boundary_weights(texts in arb_corpus(), query in arb_text(), top_k in 1usize..12) {
            let dir = TempDir::new().unwrap();
            let pure_dense = Retriever::from(dense(&dir, "d0", &texts))
                .retrieve("corpus", &query, top_k, None)
                .unwrap();
            let pure_sparse = Retriever::from(sparse(&dir, "s0", &texts))
                .retrieve("corpus", &query, top_k, None)
                .unwrap();

            let mut dense_only = Retriever::from(HybridRetriever::new(
                Retriever::from(dense(&dir, "d1", &texts)),
                Retriever::from(sparse(&dir, "s1", &texts)),
                0.0,
            ).unwrap());
            let mut sparse_only = Retriever::from(HybridRetriever::new(
                Retriever::from(dense(&dir, "d2", &texts)),
                Retriever::from(sparse(&dir, "s2", &texts)),
                1.0,
            ).unwrap());

            let fused_dense = dense_only.retrieve("corpus", &query, top_k, None).unwrap();
            let fused_sparse = sparse_only.retrieve("corpus", &query, top_k, None).unwrap();
            prop_assert_eq!(ids(&fused_dense), ids(&pure_dense));
            prop_assert_eq!(ids(&fused_sparse), ids(&pure_sparse));
        }
    }
}

/// **Property: a cascade of identical stages with equal depth is the identity**
mod multistage_identity {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn repeated_sparse_stage(texts in arb_corpus(), query in arb_text(), top_k in 1usize..12) {
            let dir = TempDir::new().unwrap();
            let expected = Retriever::from(sparse(&dir, "s0", &texts))
                .retrieve("corpus", &query, top_k, None)
                .unwrap();
            let stages = vec![
                Retriever::from(sparse(&dir, "s1", &texts)),
                Retriever::from(sparse(&dir, "s2", &texts)),
            ];
            let cascade = MultistageRetriever::new(stages, vec![top_k, top_k]).unwrap();
            let mut cascade = Retriever::from(cascade);
            let actual = cascade.retrieve("corpus", &query, top_k, None).unwrap();
            prop_assert_eq!(ids(&actual), ids(&expected));
        }
    }
}

/// **Property: restricted retrieval ranks candidates like a filtered full search**
mod candidate_restriction {
    use super::*;

    fn picks() -> impl Strategy<Value = Vec<prop::sample::Index>> {
        proptest::collection::vec(any::<prop::sample::Index>(), 1..6)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn dense_matches_filtered_search(
            texts in arb_corpus(),
            query in arb_text(),
            picks in picks(),
        ) {
            let dir = TempDir::new().unwrap();
            let candidates = pick_ids(&texts, &picks);
            let mut retriever = Retriever::from(dense(&dir, "dense", &texts));
            let all = retriever.retrieve("corpus", &query, texts.len(), None).unwrap();
            let restricted =
                retriever.retrieve("corpus", &query, texts.len(), Some(&candidates)).unwrap();
            prop_assert_eq!(ids(&restricted), filtered(&all, &candidates));
        }

        #[test]
        fn hybrid_fuses_restricted_sides(
            texts in arb_corpus(),
            query in arb_text(),
            picks in picks(),
            weight in 0.0f32..=1.0,
        ) {
            let dir = TempDir::new().unwrap();
            let candidates = pick_ids(&texts, &picks);
            let top_k = texts.len();
            let dense_side = Retriever::from(dense(&dir, "d0", &texts))
                .retrieve("corpus", &query, top_k, Some(&candidates))
                .unwrap();
            let sparse_side = Retriever::from(sparse(&dir, "s0", &texts))
                .retrieve("corpus", &query, top_k, Some(&candidates))
                .unwrap();
            let expected = fuse(dense_side, sparse_side, weight, top_k);

            let mut hybrid = Retriever::from(HybridRetriever::new(
                Retriever::from(dense(&dir, "d1", &texts)),
                Retriever::from(sparse(&dir, "s1", &texts)),
                weight,
            ).unwrap());
            let actual = hybrid.retrieve("corpus", &query, top_k, Some(&candidates)).unwrap();
            prop_assert!(actual.iter().all(|r| candidates.contains(&r.id)));
            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn hybrid_boundaries_match_filtered_side(
            texts in arb_corpus(),
            query in arb_text(),
            picks in picks(),
        ) {
            let dir = TempDir::new().unwrap();
            let candidates = pick_ids(&texts, &picks);
            let top_k = texts.len();
            let all_dense = Retriever::from(dense(&dir, "d0", &texts))
                .retrieve("corpus", &query, top_k, None)
                .unwrap();
            let all_sparse = Retriever::from(sparse(&dir, "s0", &texts))
                .retrieve("corpus", &query, top_k, None)
                .unwrap();

            for (weight, all) in [(0.0, &all_dense), (1.0, &all_sparse)] {
                let name = format!("h{weight}");
                let mut hybrid = Retriever::from(HybridRetriever::new(
                    Retriever::from(dense(&dir, &format!("{name}-d"), &texts)),
                    Retriever::from(sparse(&dir, &format!("{name}-s"), &texts)),
                    weight,
                ).unwrap());
                let restricted =
                    hybrid.retrieve("corpus", &query, top_k, Some(&candidates)).unwrap();
                prop_assert_eq!(ids(&restricted), filtered(all, &candidates));
            }
        }
    }
}

#[test]
fn candidate_restriction_ranks_only_candidates() {
    let dir = TempDir::new().unwrap();
    let texts: Vec<String> = (0..10)
        .map(|i| format!("{} shared {}", WORDS[i], "rust ".repeat(i + 1)))
        .collect();
    let mut retriever = Retriever::from(sparse(&dir, "sparse", &texts));
    let all = retriever.retrieve("corpus", "rust shared", 10, None).unwrap();
    assert_eq!(all.len(), 10);

    let candidates: Vec<String> = [7, 2, 4]
        .iter()
        .map(|i| CorpusRecord::new(texts[*i].clone(), Metadata::new()).id())
        .collect();
    let restricted = retriever.retrieve("corpus", "rust shared", 10, Some(&candidates)).unwrap();
    assert_eq!(restricted.len(), 3);
    assert!(restricted.iter().all(|r| candidates.contains(&r.id)));

    let expected: Vec<String> =
        all.iter().filter(|r| candidates.contains(&r.id)).map(|r| r.id.clone()).collect();
    assert_eq!(ids(&restricted), expected);
}

#[test]
fn unrestricted_vector_search_is_exact() {
    let dir = TempDir::new().unwrap();
    let config = VectorConfig::new("manual", 2, Metric::InnerProduct).unwrap();
    let mut db = Database::vector(dir.path(), config).unwrap();
    let collection = db.create_or_get("points").unwrap();
    let ids: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let contents = ids.clone();
    let metadatas = vec![Metadata::new(); 3];
    let vectors = vec![vec![1.0, 0.0], vec![0.6, 0.8], vec![0.0, 1.0]];
    collection.add(&ids, &contents, &metadatas, Some(&vectors)).unwrap();

    let results = collection.search(Query::Vector(&[0.0, 1.0]), 2, None).unwrap();
    assert_eq!(results.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["c", "b"]);
    assert!((results[1].score - 0.8).abs() < 1e-6);
}

#[test]
fn two_stage_reranks_first_stage_candidates() {
    let dir = TempDir::new().unwrap();
    let texts: Vec<String> = vec![
        "rust rust rust memory".into(),
        "rust borrow checker safety".into(),
        "python garbage collector".into(),
    ];
    let first = Retriever::from(sparse(&dir, "sparse", &texts));
    let mut reranker = Reranker::new(
        Database::corpus(dir.path().join("corpus")).unwrap(),
        Arc::new(KeywordOverlapScorer::default()),
    );
    reranker.add_corpus("corpus", &records(&texts)).unwrap();

    let mut two_stage = Retriever::two_stage(first, reranker, [2, 1]).unwrap();
    let results = two_stage.retrieve("corpus", "rust borrow checker", 5, None).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content, texts[1]);
    assert_eq!(results[0].score, 1.0);
}

#[test]
fn document_retriever_sums_passages() {
    let dir = TempDir::new().unwrap();
    let db = Database::lexical(dir.path(), LexicalConfig::default(), Arc::new(SimpleTokenizer))
        .unwrap();
    let mut sparse = SparseRetriever::new(db).unwrap();
    let passages = [
        ("doc1-0", "rust memory safety"),
        ("doc1-1", "rust borrow checker"),
        ("doc2-0", "rust async runtime"),
        ("doc3-0", "python garbage collector"),
        ("doc4-0", "java virtual machine"),
    ];
    let records: Vec<CorpusRecord> = passages
        .iter()
        .map(|(id, text)| CorpusRecord {
            hash: Some(id.to_string()),
            ..CorpusRecord::new(*text, Metadata::new())
        })
        .collect();
    sparse.add_corpus("corpus", &records).unwrap();

    let mut documents = DocumentRetriever::new(Retriever::from(sparse));
    let results = documents.retrieve("corpus", "rust", 2).unwrap();
    assert_eq!(results[0].id, "doc1");
    assert_eq!(results[0].passages.len(), 2);
    assert!(results[0].score > results[1].score);
    assert_eq!(results[1].id, "doc2");
}

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use semdex_core::schema::SourceSchema;
use semdex_core::traits::EmbeddingProvider;
use semdex_core::types::{Collection, MetaValue, Metadata, VectorRecord, TEXT_KEY};
use semdex_core::Error;
use semdex_embed::SharedEmbedder;
use semdex_hybrid::{AdapterState, Aggregator, SearchQuery, SearchType, SourceAdapter, UnifiedQuery};
use semdex_vector::store;

/// Two-dimensional provider with hand-picked query vectors.
struct FixedProvider {
    queries: HashMap<String, Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for FixedProvider {
    fn id(&self) -> &str {
        "fixed"
    }
    fn dim(&self) -> usize {
        2
    }
    async fn embed_batch(&self, texts: &[String]) -> semdex_core::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.queries.get(t).cloned().unwrap_or_else(|| vec![1.0, 0.0])).collect())
    }
}

fn embedder() -> SharedEmbedder {
    let queries = HashMap::from([("deploy".to_string(), vec![0.0, 1.0]), ("east".to_string(), vec![1.0, 0.0])]);
    SharedEmbedder::from_provider(Arc::new(FixedProvider { queries }))
}

fn record(id: &str, embedding: &[f32], text: &str, meta: &[(&str, &str)]) -> VectorRecord {
    let mut metadata: Metadata = meta.iter().map(|(k, v)| ((*k).to_string(), MetaValue::from(*v))).collect();
    metadata.insert(TEXT_KEY.to_string(), MetaValue::from(text));
    VectorRecord { id: id.to_string(), embedding: embedding.to_vec(), metadata }
}

fn write_files_snapshot(dir: &Path) {
    let records = vec![
        record("record1", &[1.0, 0.0], "deploy guide", &[("file_path", "docs/ops/deploy.md"), ("category", "ops")]),
        record("record2", &[0.0, 1.0], "holiday schedule", &[("file_path", "docs/hr/holidays.md"), ("category", "hr")]),
        record(
            "record3",
            &[0.9, 0.1],
            "release checklist: deploy, then deploy again",
            &[("file_path", "docs/ops/release.md"), ("category", "ops")],
        ),
    ];
    let collection = Collection::new("files", records).unwrap();
    store::save(&collection, &dir.join("files.json"), "fixed").unwrap();
}

fn write_messages_snapshot(dir: &Path) {
    let records = vec![
        record("m1:0", &[1.0, 0.0], "alert fired on east", &[("channel_id", "alerts"), ("timestamp", "2024-05-02T08:00:00Z")]),
        record("m2:0", &[0.0, 1.0], "lunch plans", &[("channel_id", "general"), ("timestamp", "2024-05-03T12:00:00Z")]),
    ];
    let collection = Collection::new("messages", records).unwrap();
    store::save(&collection, &dir.join("messages.json"), "fixed").unwrap();
}

fn files_adapter(dir: &TempDir) -> SourceAdapter {
    SourceAdapter::new(SourceSchema::files(), dir.path(), embedder())
}

fn ids(results: &[semdex_hybrid::RankedResult]) -> Vec<&str> {
    results.iter().map(|r| r.id.as_str()).collect()
}

#[tokio::test]
async fn semantic_search_returns_nearest_records() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_files_snapshot(dir.path());
    let adapter = files_adapter(&dir);

    let response = adapter.semantic_search(&SearchQuery::new("east").with_limit(2)).await?;

    assert_eq!(response.search_type, SearchType::Semantic);
    assert_eq!(ids(&response.results), vec!["record1", "record3"]);
    assert_eq!(response.total_results, 2);
    assert_eq!(response.results[0].score, 1.0);
    assert!((response.results[1].score - 0.9939).abs() < 1e-3);
    assert_eq!(response.results[1].text, "release checklist: deploy, then deploy again");
    assert_eq!(response.results[0].source, "files");
    assert!(response.weights.is_none());
    Ok(())
}

#[tokio::test]
async fn results_never_exceed_limit_and_scores_do_not_increase() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_files_snapshot(dir.path());
    let adapter = files_adapter(&dir);

    for limit in [0, 1, 2, 3, 10] {
        let response = adapter.semantic_search(&SearchQuery::new("east").with_limit(limit)).await?;
        assert!(response.results.len() <= limit);
        assert!(response.results.windows(2).all(|w| w[0].score >= w[1].score));
    }
    Ok(())
}

#[tokio::test]
async fn filters_narrow_results_and_are_echoed() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_files_snapshot(dir.path());
    let adapter = files_adapter(&dir);

    let response = adapter.semantic_search(&SearchQuery::new("east").with_filter("category", "hr")).await?;
    assert_eq!(ids(&response.results), vec!["record2"]);
    assert_eq!(response.filters.get("category").map(String::as_str), Some("hr"));
    assert_eq!(response.filters.get("path").map(String::as_str), Some("all"));
    assert_eq!(response.filters.get("doc_type").map(String::as_str), Some("all"));

    let response = adapter.semantic_search(&SearchQuery::new("east").with_filter("path", "/ops/")).await?;
    assert_eq!(ids(&response.results), vec!["record1", "record3"]);
    Ok(())
}

#[tokio::test]
async fn bad_arguments_are_rejected_before_loading() {
    let dir = tempfile::tempdir().unwrap();
    write_files_snapshot(dir.path());
    let adapter = files_adapter(&dir);

    let empty = adapter.semantic_search(&SearchQuery::new("   ")).await;
    assert!(matches!(empty, Err(Error::InvalidArgument(_))));
    let unknown = adapter.semantic_search(&SearchQuery::new("east").with_filter("server", "s1")).await;
    assert!(matches!(unknown, Err(Error::InvalidArgument(_))));
    let bad_weight = adapter.hybrid_search(&SearchQuery::new("east"), 1.5).await;
    assert!(matches!(bad_weight, Err(Error::InvalidArgument(_))));

    assert_eq!(adapter.state(), AdapterState::Uninitialized);
}

#[tokio::test]
async fn hybrid_with_full_semantic_weight_matches_semantic_order() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_files_snapshot(dir.path());
    let adapter = files_adapter(&dir);
    let query = SearchQuery::new("deploy").with_limit(3);

    let semantic = adapter.semantic_search(&query).await?;
    let hybrid = adapter.hybrid_search(&query, 1.0).await?;

    assert_eq!(ids(&hybrid.results), ids(&semantic.results));
    assert_eq!(ids(&hybrid.results), vec!["record2", "record3", "record1"]);
    Ok(())
}

#[tokio::test]
async fn keyword_weight_promotes_lexical_matches() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_files_snapshot(dir.path());
    let adapter = files_adapter(&dir);

    let response = adapter.hybrid_search(&SearchQuery::new("deploy").with_limit(3), 0.3).await?;

    assert_eq!(response.search_type, SearchType::Hybrid);
    assert_eq!(ids(&response.results), vec!["record3", "record2", "record1"]);
    let top = &response.results[0];
    assert_eq!(top.keyword_score, Some(0.4));
    assert!((top.score - (top.similarity * 0.3 + 0.4 * 0.7)).abs() < 1e-5);
    assert_eq!(response.results[1].keyword_score, Some(0.0));
    let weights = response.weights.expect("hybrid responses carry weights");
    assert!((weights.semantic - 0.3).abs() < 1e-6);
    assert!((weights.keyword - 0.7).abs() < 1e-6);
    Ok(())
}

#[tokio::test]
async fn adapter_loads_once_and_reuses_the_collection() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_files_snapshot(dir.path());
    let adapter = files_adapter(&dir);
    assert_eq!(adapter.state(), AdapterState::Uninitialized);

    let first = adapter.collection().await?;
    assert_eq!(adapter.state(), AdapterState::Ready);
    let second = adapter.collection().await?;
    assert!(Arc::ptr_eq(&first, &second));

    // Ready is terminal: a rewritten snapshot is not picked up.
    std::fs::remove_file(dir.path().join("files.json"))?;
    adapter.semantic_search(&SearchQuery::new("east")).await?;
    assert_eq!(adapter.state(), AdapterState::Ready);
    Ok(())
}

#[tokio::test]
async fn missing_snapshot_fails_then_retries_on_next_call() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let adapter = files_adapter(&dir);

    let err = adapter.semantic_search(&SearchQuery::new("east")).await.unwrap_err();
    match err {
        Error::NotFound { hint, .. } => assert!(hint.contains("semdex-indexer --source files")),
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert_eq!(adapter.state(), AdapterState::Uninitialized);

    write_files_snapshot(dir.path());
    let response = adapter.semantic_search(&SearchQuery::new("east").with_limit(1)).await?;
    assert_eq!(ids(&response.results), vec!["record1"]);
    assert_eq!(adapter.state(), AdapterState::Ready);
    Ok(())
}

#[tokio::test]
async fn concurrent_first_searches_share_one_load() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_files_snapshot(dir.path());
    let adapter = Arc::new(files_adapter(&dir));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let adapter = Arc::clone(&adapter);
            tokio::spawn(async move { adapter.collection().await })
        })
        .collect();
    let mut loaded = Vec::new();
    for handle in handles {
        loaded.push(handle.await??);
    }
    assert!(loaded.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    Ok(())
}

#[tokio::test]
async fn unified_search_isolates_failing_sources() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_files_snapshot(dir.path());
    let aggregator =
        Aggregator::from_schemas(vec![SourceSchema::files(), SourceSchema::messages()], dir.path(), embedder());

    let response = aggregator.search(&UnifiedQuery::new("east").with_limit(2)).await?;

    assert_eq!(response.search_type, SearchType::Unified);
    assert_eq!(ids(&response.results), vec!["record1", "record3"]);
    assert!(response.results.iter().all(|r| r.source == "files"));
    let counts = response.source_counts.as_ref().unwrap();
    assert_eq!(counts.get("files"), Some(&2));
    assert_eq!(counts.get("messages"), Some(&0));
    let errors = response.errors.as_ref().unwrap();
    assert!(errors.get("messages").is_some_and(|e| e.contains("run indexing first")));
    assert!(!errors.contains_key("files"));
    Ok(())
}

#[tokio::test]
async fn unified_merge_routes_filters_and_counts_before_truncation() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_files_snapshot(dir.path());
    write_messages_snapshot(dir.path());
    let aggregator =
        Aggregator::from_schemas(vec![SourceSchema::files(), SourceSchema::messages()], dir.path(), embedder());

    let query = UnifiedQuery::new("east").with_filter("category", "ops").with_filter("channel", "alerts");
    let response = aggregator.search(&query).await?;
    assert!(response.errors.as_ref().unwrap().is_empty());
    // Equal scores keep source order: files before messages.
    assert_eq!(ids(&response.results), vec!["record1", "m1:0", "record3"]);
    assert_eq!(response.filters.get("channel").map(String::as_str), Some("alerts"));

    let response = aggregator.search(&query.clone().with_limit(1)).await?;
    assert_eq!(ids(&response.results), vec!["record1"]);
    let counts = response.source_counts.unwrap();
    assert_eq!(counts.get("files"), Some(&1));
    assert_eq!(counts.get("messages"), Some(&1));
    Ok(())
}

#[tokio::test]
async fn unified_reports_unknown_sources_and_honours_selection() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_files_snapshot(dir.path());
    write_messages_snapshot(dir.path());
    let aggregator = Aggregator::from_schemas(SourceSchema::builtin_sources(), dir.path(), embedder());
    assert_eq!(aggregator.sources().collect::<Vec<_>>(), vec!["messages", "files", "knowledge"]);

    let response = aggregator.search(&UnifiedQuery::new("east").with_sources(["messages", "wiki", "messages"])).await?;
    assert!(response.results.iter().all(|r| r.source == "messages"));
    let errors = response.errors.unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors.contains_key("wiki"));
    let counts = response.source_counts.unwrap();
    assert_eq!(counts.get("wiki"), Some(&0));
    assert!(!counts.contains_key("files"));
    assert_eq!(aggregator.adapter("files").map(|a| a.state()), Some(AdapterState::Uninitialized));
    Ok(())
}

#[tokio::test]
async fn unified_hybrid_carries_weights() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_files_snapshot(dir.path());
    let aggregator = Aggregator::from_schemas(vec![SourceSchema::files()], dir.path(), embedder());

    let response = aggregator.search(&UnifiedQuery::new("deploy").with_limit(3).hybrid(0.3)).await?;
    assert_eq!(ids(&response.results), vec!["record3", "record2", "record1"]);
    assert!(response.weights.is_some());

    let err = aggregator.search(&UnifiedQuery::new("deploy").hybrid(-0.1)).await;
    assert!(matches!(err, Err(Error::InvalidArgument(_))));
    Ok(())
}

#[tokio::test]
async fn unified_empty_query_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let aggregator = Aggregator::from_schemas(SourceSchema::builtin_sources(), dir.path(), embedder());
    let err = aggregator.search(&UnifiedQuery::new("")).await;
    assert!(matches!(err, Err(Error::InvalidArgument(_))));
}

#[tokio::test]
async fn response_envelope_serializes_without_embeddings() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_files_snapshot(dir.path());
    let aggregator = Aggregator::from_schemas(vec![SourceSchema::files()], dir.path(), embedder());

    let response = aggregator.search(&UnifiedQuery::new("east").with_limit(1)).await?;
    let json = serde_json::to_value(&response)?;

    assert_eq!(json["query"], "east");
    assert_eq!(json["total_results"], 1);
    assert_eq!(json["search_type"], "unified");
    assert_eq!(json["results"][0]["id"], "record1");
    assert_eq!(json["results"][0]["metadata"]["category"], "ops");
    assert!(json["results"][0].get("embedding").is_none());
    assert!(json.get("weights").is_none());
    assert_eq!(json["source_counts"]["files"], 1);
    Ok(())
}

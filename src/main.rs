use arabic_legal_search_core::adapters::InMemoryStorage;
use arabic_legal_search_core::application::{
    IndexMaintenance, IndexMaintenanceApi, SearchApi, SearchService,
};
use arabic_legal_search_core::domain::types::{
    ChunkParent, LawBranch, LawChapter, LawSource, LawSourceKind, ParentStatus, SearchFilters,
    SearchRequest, SearchSourceType,
};
use arabic_legal_search_core::infrastructure::cache::QueryCache;
use arabic_legal_search_core::infrastructure::config::ConfigLoader;
use arabic_legal_search_core::infrastructure::embedding::{EmbeddingService, FastEmbedTextModel};
use arabic_legal_search_core::infrastructure::vector_index::BruteForceIndex;
use chrono::Utc;
use clap::Parser;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "arabic-legal-search-core")]
#[command(about = "Ingestion, indexing and retrieval core for Arabic legal corpora")]
#[command(version)]
struct Cli {
    /// Path to a configuration file overriding the embedded defaults.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Force NO-ML hash-fallback mode regardless of configuration.
    #[arg(long)]
    no_ml: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("arabic_legal_search_core=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ConfigLoader::new().load_with_file(path)?,
        None => ConfigLoader::new().load()?,
    };
    if cli.no_ml {
        config.embedding.no_ml_mode = true;
    }

    let storage = Arc::new(InMemoryStorage::new());
    seed_demo_corpus(&storage);

    let real_model = Arc::new(FastEmbedTextModel::new(
        config.embedding.model_name.clone(),
        config.embedding.model_dimensions,
    ));
    let embeddings = EmbeddingService::new(config.embedding.clone(), config.use_vector_index, real_model);
    embeddings.initialize().await?;
    tracing::info!(mode = ?embeddings.mode(), "embedding service ready");

    let index = Arc::new(BruteForceIndex::new());
    let generation = Arc::new(AtomicU64::new(0));
    let query_cache = QueryCache::new(config.query_cache.max_entries, generation.clone());

    let maintenance = IndexMaintenance::new(
        embeddings.clone(),
        index.clone(),
        storage.clone(),
        config.maintenance.clone(),
        generation,
    );
    let maintenance_api = IndexMaintenanceApi::new(maintenance);

    let search = SearchService::new(
        embeddings,
        index,
        storage,
        query_cache,
        config.scoring.clone(),
    );
    let search_api = SearchApi::new(search);

    let response = maintenance_api.generate_pending().await;
    print_json("generate_pending", &response);

    let response = maintenance_api.rebuild_index().await;
    print_json("rebuild_index", &response);

    let response = maintenance_api.status().await;
    print_json("status", &response);

    let request = SearchRequest {
        filters: SearchFilters::default(),
        ..SearchRequest::new("حرية التعبير", SearchSourceType::Law)
    };
    let response = search_api.find_similar(request).await;
    print_json("find_similar", &response);

    Ok(())
}

fn print_json<T: serde::Serialize>(label: &str, value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("--- {label} ---\n{json}"),
        Err(error) => tracing::error!(%error, label, "failed to serialize response"),
    }
}

/// Seeds a tiny, self-contained corpus so the CLI demonstrates the full
/// generate -> index -> search pipeline without external data. Mirrors
/// the shapes used in the integration tests.
fn seed_demo_corpus(storage: &InMemoryStorage) {
    let now = Utc::now();

    storage.insert_law_source(LawSource {
        id: 1,
        name: "النظام الأساسي للحكم".to_string(),
        kind: LawSourceKind::Law,
        jurisdiction: "SA".to_string(),
        issuing_authority: "مجلس الوزراء".to_string(),
        issue_date: now,
        last_update: now,
        status: ParentStatus::Raw,
    });
    storage.insert_branch(LawBranch {
        id: 10,
        law_source_id: 1,
        name: "الباب الأول".to_string(),
    });
    storage.insert_chapter(LawChapter {
        id: 100,
        branch_id: 10,
        name: "الفصل الأول".to_string(),
    });
    storage.insert_article_metadata(1000, "39", Some("حرية التعبير".to_string()));

    let segments = arabic_legal_search_core::domain::chunking::format_article(
        "النظام الأساسي للحكم",
        Some("الباب الأول"),
        Some("الفصل الأول"),
        "39",
        Some("حرية التعبير"),
        "تكفل الدولة حرية التعبير عن الرأي بالوسائل والشروط التي يحددها النظام، وذلك فيما لا يتعارض مع أحكام الشريعة الإسلامية والأنظمة العامة.",
    );

    for (index, content) in segments.into_iter().enumerate() {
        storage.insert_chunk(arabic_legal_search_core::domain::types::Chunk {
            id: 1 + index as i64,
            content,
            embedding_vector: None,
            parent: ChunkParent::LawArticle {
                law_source_id: 1,
                branch_id: Some(10),
                chapter_id: Some(100),
                article_id: 1000,
            },
            chunk_index: index,
            tokens_count: 40,
            verified_by_admin: true,
            created_at: now,
            status: ParentStatus::Raw,
        });
    }
}

//! `recall` command-line front end.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use recall_adapters::{OllamaConfig, OllamaEmbedder, OpenAiConfig, OpenAiEmbedder};
use recall_config::{EmbeddingProviderKind, EmbeddingsConfig, RecallConfig, StorageBackendKind};
use recall_memory::{
    BlobBackend, EmbeddingProvider, FileBlobBackend, InMemoryBlobBackend, MemoryStore,
    UserIdentity,
};
use recall_tools::{SearchLimits, ToolContext, ToolRegistry, register_memory_tools};
use serde_json::{Value, json};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "recall", version, about = "Per-user long-term semantic memory")]
struct Cli {
    /// JSON configuration file.
    #[arg(long, short, env = "RECALL_CONFIG")]
    config: Option<PathBuf>,

    /// Token identifying whose memories to operate on.
    #[arg(long, short, env = "RECALL_USER", hide_env_values = true)]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store a fact.
    Add {
        /// Text to remember.
        content: String,
        /// Importance in [0, 1].
        #[arg(long)]
        importance: Option<f32>,
        /// Category label.
        #[arg(long)]
        category: Option<String>,
        /// Topic tag; repeat for several.
        #[arg(long = "topic")]
        topics: Vec<String>,
    },
    /// Find the memories most similar to a query.
    Search {
        /// Question or keywords.
        query: String,
        /// Number of results.
        #[arg(long)]
        top_k: Option<usize>,
        /// Print the raw hits as JSON instead of markdown.
        #[arg(long)]
        json: bool,
    },
    /// Forget everything stored for the user.
    Delete,
    /// Collapse near-duplicates now, regardless of schedule.
    Dedup,
    /// Print the tool schemas offered to agents.
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = recall_config::load(cli.config.as_deref()).context("failed to load configuration")?;
    recall_telemetry::init_tracing(&config.telemetry)?;

    let identity = UserIdentity::new(cli.user).context("invalid user token")?;
    let store = build_store(&config)?;
    let registry = ToolRegistry::new();
    let limits = SearchLimits::new(config.search.default_top_k, config.search.max_top_k)?;
    register_memory_tools(&registry, &store, limits)?;
    let ctx = ToolContext::new(identity);

    match cli.command {
        Command::Add {
            content,
            importance,
            category,
            topics,
        } => {
            let output = registry
                .invoke("store_memory", &ctx, add_arguments(content, importance, category, topics))
                .await?;
            println!("{}", output.message);
        }
        Command::Search { query, top_k, json } => {
            let mut args = json!({ "query": query });
            if let Some(top_k) = top_k {
                args["top_k"] = json!(top_k);
            }
            let output = registry.invoke("search_memory", &ctx, args).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&output.data)?);
            } else {
                print!("{}", output.message);
            }
        }
        Command::Delete => {
            let output = registry.invoke("delete_memory", &ctx, json!({})).await?;
            println!("{}", output.message);
        }
        Command::Dedup => {
            let summary = store.deduplicate_now(ctx.identity()).await?;
            info!(kept = summary.kept, removed = summary.removed, "deduplication finished");
            println!("Kept {} memories, removed {} duplicates.", summary.kept, summary.removed);
        }
        Command::Tools => {
            println!("{}", serde_json::to_string_pretty(&registry.list())?);
        }
    }
    Ok(())
}

fn add_arguments(
    content: String,
    importance: Option<f32>,
    category: Option<String>,
    topics: Vec<String>,
) -> Value {
    let mut args = json!({ "content": content, "topics": topics });
    if let Some(importance) = importance {
        args["importance"] = json!(importance);
    }
    if let Some(category) = category {
        args["category"] = json!(category);
    }
    args
}

fn build_store(config: &RecallConfig) -> Result<MemoryStore> {
    let backend: Arc<dyn BlobBackend> = match config.storage.backend {
        StorageBackendKind::Memory => Arc::new(InMemoryBlobBackend::new()),
        StorageBackendKind::File => Arc::new(FileBlobBackend::new(&config.storage.root)),
    };
    let store = MemoryStore::builder()
        .with_backend(backend)
        .with_embedder(build_embedder(&config.embeddings)?)
        .with_resolver(Arc::new(config.path_resolver()?))
        .with_policy(config.dedup_policy()?)
        .build()?;
    Ok(store)
}

fn build_embedder(config: &EmbeddingsConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let embedder: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingProviderKind::Ollama => {
            let mut ollama = OllamaConfig::new(&config.model).with_timeout(timeout);
            if let Some(base_url) = &config.base_url {
                ollama = ollama.with_base_url(base_url)?;
            }
            if let Some(dimensions) = config.dimensions {
                ollama = ollama.with_dimensions(dimensions);
            }
            Arc::new(OllamaEmbedder::new(ollama)?)
        }
        EmbeddingProviderKind::OpenAi => {
            let mut openai = OpenAiConfig::from_env(&config.model).with_timeout(timeout);
            if let Some(key) = &config.api_key {
                openai = openai.with_api_key(key);
            }
            if let Some(base_url) = &config.base_url {
                openai = openai.with_base_url(base_url)?;
            }
            if let Some(dimensions) = config.dimensions {
                openai = openai.with_dimensions(dimensions);
            }
            Arc::new(OpenAiEmbedder::new(openai)?)
        }
    };
    info!(provider = %config.provider, model = %config.model, "embedding provider ready");
    Ok(embedder)
}

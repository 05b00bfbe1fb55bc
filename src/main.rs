use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use multimodal_search::client::{McpToolConnector, ToolConnector, ToolSession};
use multimodal_search::config::{
    DatabaseConfig, RouterConfig, ToolClientConfig, ToolServerConfig, TranscriberConfig,
};
use multimodal_search::db::ProductCollection;
use multimodal_search::embedding::ClipEmbedder;
use multimodal_search::ingest::ingest_catalog;
use multimodal_search::query::{QueryInputs, MAX_TOP_K};
use multimodal_search::transcribe::HttpTranscriber;
use multimodal_search::{tools, QueryRouter, SearchOutcome};

/// Text, image and audio product search over MCP.
#[derive(Parser)]
#[command(name = "multimodal-search", version, about, long_about = None)]
struct Cli {
    /// File that receives a copy of the log output
    #[arg(long, global = true, env = "LOG_FILE", default_value = "multimodal-search.log")]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the search tool service
    Serve {
        #[command(flatten)]
        db: DatabaseConfig,
        #[command(flatten)]
        server: ToolServerConfig,
    },

    /// Search with exactly one of --text, --image or --audio
    Search {
        /// Spoken query (WAV)
        #[arg(long)]
        audio: Option<PathBuf>,

        #[arg(long)]
        text: Option<String>,

        /// Query image
        #[arg(long)]
        image: Option<PathBuf>,

        /// Number of results
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..=MAX_TOP_K as u64))]
        top_k: u64,

        /// Directory the result images are written to
        #[arg(long)]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        client: ToolClientConfig,
        #[command(flatten)]
        transcriber: TranscriberConfig,
        #[command(flatten)]
        router: RouterConfig,
    },

    /// Index a directory of product images described by catalog.json
    Ingest {
        /// Catalog directory
        dir: PathBuf,

        #[command(flatten)]
        db: DatabaseConfig,
    },

    /// List the tools offered by the search tool service
    Tools {
        #[command(flatten)]
        client: ToolClientConfig,
    },
}

fn init_logging(log_file: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .init();
    Ok(())
}

fn print_outcome(outcome: &SearchOutcome, output_dir: Option<&Path>) -> Result<()> {
    if let Some(transcript) = &outcome.transcript {
        println!("Transcribed text: {}", transcript);
    }

    if outcome.gallery.is_empty() {
        println!("No results found!");
    } else {
        println!("\nResults:");
        println!("--------");
    }
    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)?;
    }
    for (i, item) in outcome.gallery.iter().enumerate() {
        match output_dir {
            Some(dir) => {
                let path = dir.join(format!("{:02}.png", i + 1));
                item.image
                    .save(&path)
                    .with_context(|| format!("Failed to save {}", path.display()))?;
                println!("{}. {}  [{}]", i + 1, item.caption, path.display());
            }
            None => println!("{}. {}", i + 1, item.caption),
        }
    }

    let metrics = &outcome.metrics;
    println!("\nLatency (s)");
    println!("  Transcribe:  {:.3}", metrics.transcription);
    println!("  Invoke tool: {:.3}", metrics.tool_call);
    println!("  Postprocess: {:.3}", metrics.post_processing);
    println!("  Total:       {:.3}", outcome.total_latency());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_file)?;

    match cli.command {
        Commands::Serve { db, server } => {
            let embedder = Arc::new(ClipEmbedder::new()?);
            let collection = ProductCollection::connect(&db, embedder).await?;
            tools::serve(&server, Arc::new(collection)).await?;
        }
        Commands::Search {
            audio,
            text,
            image,
            top_k,
            output_dir,
            client,
            transcriber,
            router,
        } => {
            let query_router = QueryRouter::new(
                Arc::new(McpToolConnector::new(&client)),
                Arc::new(HttpTranscriber::new(&transcriber)?),
                router,
                client.timeout(),
            );
            let inputs = QueryInputs { audio, text, image };

            match query_router.search(inputs, top_k as usize).await {
                Ok(outcome) => print_outcome(&outcome, output_dir.as_deref())?,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Ingest { dir, db } => {
            let embedder = Arc::new(ClipEmbedder::new()?);
            let collection = ProductCollection::connect(&db, embedder).await?;
            let indexed = ingest_catalog(&collection, &dir).await?;
            println!(
                "Indexed {} product(s); '{}' now holds {}",
                indexed,
                collection.name(),
                collection.count().await?
            );
        }
        Commands::Tools { client } => {
            let mut session = McpToolConnector::new(&client).connect().await?;
            let tools = session.list_tools().await;
            session.close().await?;
            for tool in tools? {
                println!("{}", tool);
            }
        }
    }

    Ok(())
}

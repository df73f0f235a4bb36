use anyhow::Result;
use book_rag::config::Config;
use book_rag::service::RagService;
use book_rag::types::{IngestRequest, JobStatus, QueryMode, QueryRequest};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "book-rag", version, about = "Grounded Q&A over a documentation tree")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the docs tree and re-ingest files as they change
    Watch,
    /// Re-ingest the whole docs tree
    Resync {
        /// Reprocess files even when their content is unchanged
        #[arg(long)]
        force: bool,
    },
    /// Ingest a single file immediately, bypassing the watch queue
    Ingest {
        /// Path to the document
        file: PathBuf,
    },
    /// Ask a question over the ingested corpus
    Query {
        /// The question text
        text: String,
        /// Session identifier for cache scoping
        #[arg(long, default_value = "cli")]
        session: String,
        /// Ground the answer only on this excerpt (local mode)
        #[arg(long)]
        selected_text: Option<String>,
        /// Restrict retrieval to one source path
        #[arg(long)]
        source: Option<String>,
    },
    /// Show sync and store status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "book_rag=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::new()?;
    let service = RagService::new(config).await?;

    match cli.command {
        Command::Watch => {
            service.sync().start().await?;
            println!("Watching for changes, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            service.sync().stop().await;
        }
        Command::Resync { force } => {
            let report = service.sync().sync_all(force).await;
            println!(
                "Resync complete: {} processed, {} skipped, {} failed",
                report.processed, report.skipped, report.failed
            );
        }
        Command::Ingest { file } => {
            let content = std::fs::read_to_string(&file)?;
            let job_id = service
                .ingest_document(IngestRequest {
                    document_path: file.display().to_string(),
                    title: String::new(),
                    content_text: content,
                    metadata: serde_json::Value::Null,
                })
                .await?;

            loop {
                match service.job_status(&job_id).await {
                    Some(job) if job.status == JobStatus::Processing => {
                        println!("[{:>3}%] {}", job.progress, job.details);
                        tokio::time::sleep(Duration::from_millis(200)).await;
                    }
                    Some(job) => {
                        println!("[{:>3}%] {}", job.progress, job.details);
                        break;
                    }
                    None => anyhow::bail!("Job {} disappeared", job_id),
                }
            }
        }
        Command::Query {
            text,
            session,
            selected_text,
            source,
        } => {
            let mode = if selected_text.is_some() {
                QueryMode::Local
            } else {
                QueryMode::Global
            };

            let response = service
                .process_query(QueryRequest {
                    query: text,
                    session_id: session,
                    mode,
                    selected_text,
                    source_filter: source,
                })
                .await?;

            println!("{}", response.answer);
            if response.degraded {
                println!("\n(degraded answer: language-model providers were unavailable)");
            }
            if !response.sources.is_empty() {
                println!("\nSources:");
                for source in &response.sources {
                    println!("  - {}", source);
                }
            }
            for question in &response.follow_up_questions {
                println!("Follow-up: {}", question);
            }
        }
        Command::Status => {
            let status = service.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}

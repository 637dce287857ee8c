//! Command-line entrypoint for building the index and asking questions without the HTTP server.
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use docqa::{config, extract, logging, qa::QaService};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

const PREVIEW_CHARS: usize = 500;

#[derive(Parser)]
#[command(name = "docqa", about = "Index local documents and ask questions about them")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the index from every supported file under a directory.
    Index {
        /// Directory to scan recursively.
        directory: PathBuf,
    },
    /// Print the text extracted from each supported file without indexing.
    Scan {
        /// Directory to scan recursively.
        directory: PathBuf,
    },
    /// Ask questions interactively; type `exit` to quit.
    Ask {
        /// Number of chunks to retrieve per question.
        #[arg(long)]
        k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_config().context("Failed to load configuration")?;
    logging::init_tracing();

    match cli.command {
        Command::Index { directory } => index(directory).await,
        Command::Scan { directory } => scan(directory).await,
        Command::Ask { k } => ask(k).await,
    }
}

async fn index(directory: PathBuf) -> Result<()> {
    if !directory.is_dir() {
        bail!(
            "The specified path '{}' is not a valid directory.",
            directory.display()
        );
    }
    let service = QaService::from_config().await?;
    let report = service.reindex(&directory).await?;
    if report.is_empty() {
        bail!(
            "No processable files were found in directory: {}",
            directory.display()
        );
    }
    println!(
        "Indexed {} chunks from {} files:",
        report.chunk_count,
        report.files.len()
    );
    for file in &report.files {
        println!("- {file}");
    }
    Ok(())
}

async fn scan(directory: PathBuf) -> Result<()> {
    if !directory.is_dir() {
        bail!(
            "The specified path '{}' is not a valid directory.",
            directory.display()
        );
    }
    println!("Scanning directory: {}", directory.display());
    let documents = tokio::task::spawn_blocking(move || {
        extract::scan_directory(&directory).collect::<Vec<_>>()
    })
    .await
    .context("Scan task failed")?;

    for (path, text) in documents {
        let preview: String = text.chars().take(PREVIEW_CHARS).collect();
        println!("\n--- {} ---\n{preview}...", path.display());
    }
    Ok(())
}

async fn ask(k: Option<usize>) -> Result<()> {
    let service = QaService::from_config().await?;
    println!("Local document search");
    println!("Type 'exit' to quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        println!("\nAsk a question about your documents");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.eq_ignore_ascii_case("exit") {
            break;
        }

        let answer = service.ask(question, k).await?;
        println!("\nAnswer:\n{}", answer.answer);
        if !answer.sources.is_empty() {
            println!("Sources:");
            for source in &answer.sources {
                println!("- {source}");
            }
        }
    }
    Ok(())
}

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use raglet::config::{
    DEFAULT_BASE_URL, DEFAULT_DOCS_DIR, DEFAULT_MAX_REVISION_ROUNDS, DEFAULT_MODEL, DEFAULT_TOP_K,
};
use raglet::retrieval::DEFAULT_CHUNK_SIZE;
use raglet::{Config, CorpusIndex, OllamaClientBuilder, Orchestrator, OrchestratorBuilder, RunResult};

/// raglet - answer questions over a local docs directory with a
/// planner/analyst/critic pipeline
#[derive(Parser)]
#[command(name = "raglet")]
#[command(about = "Local multi-role question answering over a docs directory")]
#[command(version)]
struct Cli {
    /// One-shot question; omit to enter the interactive loop
    #[arg(short, long)]
    question: Option<String>,

    /// Model identifier passed to the generation backend
    #[arg(long, env = "OLLAMA_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Base URL of the generation backend
    #[arg(long, env = "OLLAMA_HOST", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Directory of markdown/plain-text documents to index
    #[arg(long, default_value = DEFAULT_DOCS_DIR)]
    docs: PathBuf,

    /// Number of chunks retrieved per question
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Maximum chunk length in characters
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Maximum number of revision rounds per question
    #[arg(long, default_value_t = DEFAULT_MAX_REVISION_ROUNDS)]
    max_rounds: usize,

    /// List models available on the backend and exit
    #[arg(long)]
    list_models: bool,
}

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config {
        base_url: cli.base_url,
        model: cli.model,
        docs_dir: cli.docs,
        chunk_size: cli.chunk_size,
        top_k: cli.top_k,
        max_revision_rounds: cli.max_rounds,
    };

    let client = OllamaClientBuilder::new()
        .base_url(&config.base_url)
        .model(&config.model)
        .build()
        .context("Failed to create generation client")?;

    if cli.list_models {
        let models = client
            .list_models()
            .context("Failed to list models from the backend")?;
        if models.is_empty() {
            println!("No models available on the backend.");
        }
        for name in models {
            println!("{name}");
        }
        return Ok(());
    }

    let index = CorpusIndex::build(&config.docs_dir, config.chunk_size)
        .context("Failed to index the docs directory")?;

    let orchestrator = OrchestratorBuilder::new()
        .client(Arc::new(client))
        .index(index)
        .top_k(config.top_k)
        .max_revision_rounds(config.max_revision_rounds)
        .build();

    match cli.question {
        Some(question) => {
            let result = orchestrator
                .run(&question)
                .context("Generation backend failure")?;
            print_result(&result);
            Ok(())
        }
        None => repl(&orchestrator),
    }
}

/// Reads questions from stdin until EOF or an exit keyword.
fn repl(orchestrator: &Orchestrator) -> Result<()> {
    println!("Interactive mode. Type 'exit' or 'quit' to leave.\n");
    let stdin = io::stdin();
    loop {
        print!("question> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if is_exit_keyword(question) {
            break;
        }

        match orchestrator.run(question) {
            Ok(result) => {
                print_result(&result);
                println!("\n{}\n", "-".repeat(80));
            }
            Err(e) => eprintln!("Error: {e}"),
        }
    }
    Ok(())
}

fn is_exit_keyword(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

/// Prints one run's plan, ranked contexts, answer, and critique.
fn print_result(result: &RunResult) {
    println!("\n=== PLANNER ===");
    println!("{}", to_pretty_json(&result.plan));

    println!("\n=== RETRIEVER (top chunks) ===");
    if result.contexts.is_empty() {
        println!("No context found in the docs directory.");
    }
    for (i, context) in result.contexts.iter().enumerate() {
        println!(
            "{}. {} score={:.4} | {}",
            i + 1,
            context.source,
            context.score,
            preview(&context.text, 180)
        );
    }

    println!("\n=== ANALYST (final) ===");
    println!("{}", result.final_answer);

    println!("\n=== CRITIC ===");
    println!("{}", to_pretty_json(&result.critique));
    println!("Revision rounds: {}", result.revision_rounds);
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Flattens text to one line and truncates it to `limit` characters, adding
/// an ellipsis when anything was cut.
fn preview(text: &str, limit: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= limit {
        flat
    } else {
        let cut: String = flat.chars().take(limit).collect();
        format!("{cut}...")
    }
}

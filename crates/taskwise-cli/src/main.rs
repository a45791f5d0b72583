//! taskwise CLI — run the task agents against a local task file.
//!
//! Usage:
//!   taskwise onboard                       — Create a default configuration
//!   taskwise status                        — Show current configuration
//!   taskwise health                        — Probe the primary and fallback providers
//!   taskwise prioritize --tasks tasks.json — Suggest priorities
//!   taskwise decompose --tasks tasks.json --id t1
//!   taskwise chat --tasks tasks.json       — Interactive chat about your tasks

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use taskwise_core::agent::{DetailLevel, TaskSnapshot};
use taskwise_core::config::Config;
use taskwise_core::gateway::LlmGateway;
use taskwise_core::service::store::MemoryStore;
use taskwise_core::service::{AgentService, ChatRequest, DecomposeRequest, PrioritizeRequest};

/// Tasks without an explicit owner belong to this user.
const LOCAL_USER: &str = "local";

#[derive(Parser)]
#[command(
    name = "taskwise",
    version,
    about = "AI helpers for your todo list",
    long_about = "taskwise — prioritize, break down and chat about your tasks.\n\nUses a hosted Groq model when configured, with a local Ollama model as fallback."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or reset the default configuration
    Onboard,

    /// Show configuration status
    Status,

    /// Probe both LLM providers and print the result as JSON
    Health,

    /// Suggest a priority for each task
    Prioritize {
        /// JSON file with an array of tasks
        #[arg(short, long)]
        tasks: PathBuf,

        /// Only these task ids (default: all tasks in the file)
        #[arg(long = "id")]
        ids: Vec<String>,

        /// Extra context for the model (e.g. "exam week")
        #[arg(short, long)]
        context: Option<String>,
    },

    /// Break a task into subtasks
    Decompose {
        /// JSON file with an array of tasks
        #[arg(short, long)]
        tasks: PathBuf,

        /// Task id to break down
        #[arg(long)]
        id: String,

        /// Upper bound on returned subtasks (1-20)
        #[arg(short, long, default_value_t = 10)]
        max_subtasks: usize,

        /// brief, medium or detailed
        #[arg(short, long, default_value = "medium")]
        detail_level: DetailLevel,
    },

    /// Start an interactive chat session about your tasks
    Chat {
        /// JSON file with an array of tasks
        #[arg(short, long)]
        tasks: Option<PathBuf>,
    },
}

/// One entry of the task file.
#[derive(Deserialize)]
struct TaskFileEntry {
    #[serde(default)]
    owner: Option<String>,
    #[serde(flatten)]
    task: TaskSnapshot,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => cmd_onboard()?,
        Commands::Status => cmd_status()?,
        Commands::Health => cmd_health().await?,
        Commands::Prioritize {
            tasks,
            ids,
            context,
        } => cmd_prioritize(&tasks, ids, context).await?,
        Commands::Decompose {
            tasks,
            id,
            max_subtasks,
            detail_level,
        } => cmd_decompose(&tasks, id, max_subtasks, detail_level).await?,
        Commands::Chat { tasks } => cmd_chat(tasks.as_deref()).await?,
    }

    Ok(())
}

// ── Shared Setup ────────────────────────────────────────────────────

fn validate_config(config: &Config) -> Result<()> {
    if let Err(errors) = config.validate() {
        eprintln!("\n  \x1b[31m❌ Configuration errors:\x1b[0m");
        for e in &errors {
            eprintln!("     • {}", e);
        }
        eprintln!();
        anyhow::bail!("Fix the above {} error(s) in config.json", errors.len());
    }
    Ok(())
}

fn build_gateway() -> Result<Arc<LlmGateway>> {
    let config = Config::load()?;
    validate_config(&config)?;
    let gateway = LlmGateway::from_config(&config.llm, reqwest::Client::new());
    info!(
        primary = gateway.primary_name(),
        fallback = gateway.fallback_name(),
        "LLM gateway ready"
    );
    Ok(Arc::new(gateway))
}

/// Load the task file into a fresh in-memory store.
fn load_tasks(path: Option<&Path>) -> Result<(Arc<MemoryStore>, Vec<String>)> {
    let store = Arc::new(MemoryStore::new());
    let mut ids = Vec::new();

    if let Some(path) = path {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        let entries: Vec<TaskFileEntry> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid task file {}", path.display()))?;
        for entry in entries {
            let owner = entry.owner.as_deref().unwrap_or(LOCAL_USER);
            if owner == LOCAL_USER {
                ids.push(entry.task.id.clone());
            }
            store.insert_task(owner, entry.task)?;
        }
        info!(path = %path.display(), tasks = ids.len(), "Loaded tasks");
    }

    Ok((store, ids))
}

fn build_service(path: Option<&Path>) -> Result<(AgentService, Vec<String>)> {
    let gateway = build_gateway()?;
    let (store, ids) = load_tasks(path)?;
    let service = AgentService::new(gateway, store.clone(), store);
    Ok((service, ids))
}

// ── Commands ────────────────────────────────────────────────────────

fn cmd_onboard() -> Result<()> {
    let path = Config::write_default_template()?;
    println!();
    println!("  ✅ Configuration created at:");
    println!("     {}", path.display());
    println!();
    println!("  Next steps:");
    println!("  1. Add your Groq API key, or set \"provider\": \"ollama\"");
    println!("  2. Run `taskwise health` to check both providers");
    println!();
    Ok(())
}

fn cmd_status() -> Result<()> {
    let config = Config::load()?;
    let llm = &config.llm;

    println!();
    println!("  📝 taskwise status");
    println!("  ─────────────────────────────────────");

    if let Some(path) = Config::source_path() {
        println!("  Config:    {}", path.display());
    } else {
        println!("  Config:    ⚠️  Not found, using defaults (run `taskwise onboard`)");
    }

    if llm.use_remote_primary() {
        println!("  Primary:   ✅ {} ({})", llm.provider.as_str(), llm.groq.model);
    } else {
        println!("  Primary:   ollama ({})", llm.ollama.model);
    }
    println!("  Fallback:  ollama ({} at {})", llm.ollama.model, llm.ollama.base_url);
    println!("  Sampling:  temperature {} | max tokens {}", llm.temperature, llm.max_tokens);

    match config.validate() {
        Ok(()) => println!("  Checks:    ✅ ok"),
        Err(errors) => println!("  Checks:    ❌ {} problem(s)", errors.len()),
    }

    println!();
    Ok(())
}

async fn cmd_health() -> Result<()> {
    let gateway = build_gateway()?;
    let report = gateway.health_check().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_prioritize(path: &Path, ids: Vec<String>, context: Option<String>) -> Result<()> {
    let (service, all_ids) = build_service(Some(path))?;
    let request = PrioritizeRequest {
        task_ids: if ids.is_empty() { all_ids } else { ids },
        context,
    };

    let outcome = service.prioritize(LOCAL_USER, request).await?;
    println!();
    println!("  {}", outcome.message);
    for p in &outcome.priorities {
        println!("  • {:<12} {:<7} {}", p.task_id, p.priority, p.reason);
    }
    println!();
    Ok(())
}

async fn cmd_decompose(
    path: &Path,
    id: String,
    max_subtasks: usize,
    detail_level: DetailLevel,
) -> Result<()> {
    let (service, _) = build_service(Some(path))?;
    let request = DecomposeRequest {
        task_id: id,
        max_subtasks,
        detail_level,
    };

    let outcome = service.decompose(LOCAL_USER, request).await?;
    println!();
    println!("  {} ({})", outcome.message, outcome.parent_task_id);
    for (i, s) in outcome.subtasks.iter().enumerate() {
        println!("  {}. {} [{} / effort {}]", i + 1, s.title, s.priority, s.effort);
        if !s.description.is_empty() {
            println!("     {}", s.description);
        }
    }
    println!();
    Ok(())
}

async fn cmd_chat(path: Option<&Path>) -> Result<()> {
    let (service, ids) = build_service(path)?;

    println!();
    println!("  📝 taskwise v{}", env!("CARGO_PKG_VERSION"));
    println!("  Tasks loaded: {}", ids.len());
    println!();
    println!("  Type your message, or /quit to exit.");
    println!("  ─────────────────────────────────────");
    println!();

    let stdin = io::stdin();
    loop {
        print!("  \x1b[36m>\x1b[0m ");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" | "/q" => {
                println!("  Goodbye! 👋");
                break;
            }
            "/health" => {
                let report = service.health().await;
                println!("{}\n", serde_json::to_string_pretty(&report)?);
                continue;
            }
            "/logs" => {
                for log in service.logs(LOCAL_USER, 20).await? {
                    println!(
                        "  {} {:<11} {:<9} {}ms",
                        log.created_at.format("%H:%M:%S"),
                        log.agent_type.as_str(),
                        serde_json::to_string(&log.status)?.trim_matches('"'),
                        log.execution_time_ms
                    );
                }
                println!();
                continue;
            }
            _ => {}
        }

        println!();
        match service.chat(LOCAL_USER, ChatRequest::new(input)).await {
            Ok(outcome) if outcome.success => println!("  \x1b[32m{}\x1b[0m\n", outcome.message),
            Ok(outcome) => eprintln!("  \x1b[31m{}\x1b[0m\n", outcome.message),
            Err(e) => eprintln!("  \x1b[31mError: {}\x1b[0m\n", e),
        }
    }

    Ok(())
}

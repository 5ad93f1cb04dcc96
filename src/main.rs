// Qalam - Style-aware grammar correction, paraphrasing and rewriting
// Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use qalam::config::{load_config, load_config_from, Config};
use qalam::errors::{config_parse_error, model_not_found_error, RewriteError};
use qalam::language::Language;
use qalam::logging::init_tracing;
use qalam::models::ModelCatalog;
use qalam::prompts::Task;
use qalam::server::RewriteServer;
use qalam::service::RewriteService;

#[derive(Parser, Debug)]
#[command(name = "qalam")]
#[command(about = "Style-aware grammar correction, paraphrasing and rewriting", version)]
struct Args {
    /// Config file (default: $QALAM_CONFIG or ~/.qalam/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Bind address (overrides server.bind_address)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Rewrite one text and print the result
    Rewrite {
        /// grammar, paraphrase or ai-bypass
        #[arg(long)]
        task: Task,

        /// Style within the task (default from config)
        #[arg(long)]
        style: Option<String>,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,

        /// Text to rewrite (read from stdin when omitted)
        text: Option<String>,
    },
    /// Show which model a language/task pair resolves to
    Resolve {
        #[arg(long)]
        task: Task,

        /// arabic or english
        #[arg(long)]
        language: Language,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Suppress ONNX Runtime verbose logs before any session is created
    // ORT_LOGGING_LEVEL: 0=Verbose, 1=Info, 2=Warning, 3=Error, 4=Fatal
    std::env::set_var("ORT_LOGGING_LEVEL", "3");

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    }
    .map_err(|e| anyhow::anyhow!(config_parse_error(&format!("{:#}", e))))?;

    init_tracing(&config.logging)?;

    match args.command {
        Command::Serve { bind } => run_server(config, bind).await,
        Command::Rewrite {
            task,
            style,
            json,
            text,
        } => run_rewrite(config, task, style, json, text).await,
        Command::Resolve { task, language } => run_resolve(&config, task, language),
    }
}

async fn run_server(mut config: Config, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind_address = bind;
    }

    let service = RewriteService::from_config(&config)?;
    RewriteServer::new(service, config.server.clone()).serve().await
}

async fn run_rewrite(
    config: Config,
    task: Task,
    style: Option<String>,
    json: bool,
    text: Option<String>,
) -> Result<()> {
    let text = match text {
        Some(text) => text,
        None if !io::stdin().is_terminal() => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read text from stdin")?;
            input
        }
        None => anyhow::bail!("No text given (pass it as an argument or pipe it on stdin)"),
    };

    let service = RewriteService::from_config(&config)?;
    let outcome = tokio::task::spawn_blocking(move || {
        service.handle(task, Some(&text), style.as_deref())
    })
    .await
    .context("Rewrite worker panicked")?;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(RewriteError::ModelResolution { language, task, reason }) => {
            let catalog = ModelCatalog::new(config.catalog.clone());
            if let Ok(descriptor) = catalog.resolve(language, task) {
                eprintln!(
                    "{}\n",
                    model_not_found_error(&descriptor.name, &config.catalog.root.display().to_string())
                );
            }
            anyhow::bail!("no model resolvable for {}/{}: {}", language, task, reason);
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", outcome.normalized_text);
    }
    Ok(())
}

fn run_resolve(config: &Config, task: Task, language: Language) -> Result<()> {
    let catalog = ModelCatalog::new(config.catalog.clone());

    println!("Candidates for {}/{}:", language, task);
    for candidate in catalog.candidates(language, task) {
        println!("  {}", candidate);
    }

    let descriptor = catalog.resolve(language, task)?;
    println!("Resolved: {}", descriptor.name);
    println!("  directory: {}", descriptor.dir.display());
    println!("  encoder:   {}", descriptor.encoder_path.display());
    println!("  decoder:   {}", descriptor.decoder_path.display());
    println!("  device:    {}", descriptor.device.name());
    if descriptor.fallback {
        println!("  (fallback: artifacts missing, loading will fail until installed)\n");
        println!(
            "{}",
            model_not_found_error(&descriptor.name, &config.catalog.root.display().to_string())
        );
    }
    Ok(())
}

//! `coach`: Interview Coach command line.
//!
//! - `coach serve` runs the HTTP API
//! - `coach evaluate` grades one answer and prints the result
//! - `coach parse` runs the tolerant parser over saved model output
//! - `coach prompt` prints the prompt an answer would be sent with

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use coach_core::{parse_json, EvaluationRequest, EvaluationResult, ParseOutcome, NO_ANSWER_PLACEHOLDER};
use coach_runtime::prompts::{build_evaluation_prompt, SYSTEM_PROMPT};
use coach_runtime::{
    serve, AppState, EvaluateInput, EvaluationResponse, Evaluator, ProviderRegistry, RuntimeConfig,
};

#[derive(Parser, Debug)]
#[command(name = "coach", version, about, long_about = None)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Address to listen on (overrides config and COACH_BIND)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Grade one answer
    Evaluate {
        #[arg(long)]
        topic: String,

        #[arg(long)]
        question: String,

        /// Candidate answer; omitted means the question was skipped
        #[arg(long)]
        answer: Option<String>,

        /// Print the raw response body instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Parse model output from a file (or stdin) the way the server would
    Parse {
        /// File with model output; reads stdin when omitted
        file: Option<PathBuf>,
    },

    /// Print the prompt for an answer without calling the model
    Prompt {
        #[arg(long)]
        topic: String,

        #[arg(long)]
        question: String,

        #[arg(long)]
        answer: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Serve { bind } => run_serve(cli.config, bind).await,
        Commands::Evaluate {
            topic,
            question,
            answer,
            json,
        } => run_evaluate(cli.config, topic, question, answer, json).await,
        Commands::Parse { file } => run_parse(file),
        Commands::Prompt {
            topic,
            question,
            answer,
        } => run_prompt(topic, question, answer),
    }
}

/// Log to stderr. `RUST_LOG` applies unless `-v` is given.
fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<RuntimeConfig> {
    let config = RuntimeConfig::load(path.as_deref())
        .with_context(|| match &path {
            Some(path) => format!("Failed to load config from {}", path.display()),
            None => "Invalid configuration".to_string(),
        })?;
    Ok(config)
}

fn build_evaluator(config: RuntimeConfig) -> Result<Evaluator> {
    let provider_type = config.provider.provider_type.clone();
    Evaluator::from_config(config, &ProviderRegistry::with_defaults())
        .with_context(|| format!("Failed to create '{}' provider", provider_type))
}

async fn run_serve(config_path: Option<PathBuf>, bind: Option<String>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    let bind = config.server.bind.clone();

    let evaluator = build_evaluator(config)?;
    tracing::info!(provider = evaluator.provider_name(), "Evaluator ready");

    serve(AppState::in_memory(evaluator), &bind)
        .await
        .with_context(|| format!("Server on {} failed", bind))
}

async fn run_evaluate(
    config_path: Option<PathBuf>,
    topic: String,
    question: String,
    answer: Option<String>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let evaluator = build_evaluator(config)?;

    let input = EvaluateInput::new(
        topic,
        question,
        answer.unwrap_or_else(|| NO_ANSWER_PLACEHOLDER.to_string()),
    );
    let response = evaluator.evaluate(input).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&response.to_json())?);
    } else {
        print_response(&response);
    }

    if !response.is_success() {
        bail!("Evaluation did not succeed (HTTP {})", response.status_code());
    }
    Ok(())
}

fn print_response(response: &EvaluationResponse) {
    match response {
        EvaluationResponse::Success(evaluation) => print_evaluation(evaluation),
        EvaluationResponse::ParseFailure { reason, raw } => {
            println!("Could not parse model output: {}", reason);
            println!("{}", raw);
        }
        EvaluationResponse::BadGateway { message, debug } => {
            println!("{}", message);
            println!("Response: {}", debug);
        }
        EvaluationResponse::ClientError { message }
        | EvaluationResponse::ServiceUnavailable { message }
        | EvaluationResponse::ServerError { message } => println!("{}", message),
    }
}

fn print_evaluation(evaluation: &EvaluationResult) {
    println!("Score: {}", evaluation.score_label());
    if !evaluation.feedback.is_empty() {
        println!("\n{}", evaluation.feedback);
    }
    print_list("Mistakes", &evaluation.mistakes);
    print_list("Missing points", &evaluation.missing_points);
    if !evaluation.perfect_answer.is_empty() {
        println!("\nModel answer:\n{}", evaluation.perfect_answer);
    }
    if let Some(next) = &evaluation.next_question {
        println!("\nNext question: {}", next);
    }
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("\n{}:", title);
    for item in items {
        println!("  - {}", item);
    }
}

fn run_parse(file: Option<PathBuf>) -> Result<()> {
    let text = match &file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    match parse_json(&text) {
        ParseOutcome::Success(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            println!();
            print_evaluation(&EvaluationResult::from_value(&value));
            Ok(())
        }
        ParseOutcome::Failure { reason, raw } => {
            eprintln!("{}", raw);
            bail!("{}", reason)
        }
    }
}

fn run_prompt(topic: String, question: String, answer: Option<String>) -> Result<()> {
    let request = EvaluationRequest::new(
        topic,
        question,
        answer.unwrap_or_else(|| NO_ANSWER_PLACEHOLDER.to_string()),
    )?;

    println!("--- system ---\n{}\n", SYSTEM_PROMPT.trim());
    println!("--- user ---\n{}", build_evaluation_prompt(&request));
    Ok(())
}

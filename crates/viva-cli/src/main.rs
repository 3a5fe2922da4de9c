//! Viva CLI
//!
//! Main entry point for serving the examination API. Loads configuration,
//! assembles the reference collaborators, serves the HTTP/WebSocket surface
//! for a presentation layer, and writes verdict reports as sessions complete.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use viva_orchestrator::{
    create_router, AppState, Config, ExamOrchestrator, HeuristicEvaluator, ScriptedQuestionSource,
    Session, SessionEvent, SubjectScore, TranscriptAnalyzer, Turn,
};
use viva_report::{json::JsonGenerator, MarkdownGenerator, QuestionOutcome, Report, SubjectRating};

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// Viva - Adaptive Oral Examination Server
///
/// Runs turn-based viva voce examinations over uploaded documents: questions
/// come from exam scripts, responses are graded through the evaluator
/// capability, and each completed session produces a verdict report.
#[derive(Parser, Debug)]
#[command(name = "viva")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory containing exam-script JSON files
    #[arg(value_name = "SCRIPT_DIR")]
    script_dir: Option<String>,

    /// Path to configuration file (default: viva.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Output directory for reports
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,

    /// Port for the HTTP API server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize tracing subscriber with appropriate filter
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Viva starting");
    tracing::debug!(config = ?args.config, "Config file");
    tracing::debug!(output_dir = ?args.output_dir, "Output directory");

    match run_server(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Runs the examination server.
///
/// 1. Load config and apply CLI overrides
/// 2. Assemble the collaborators and orchestrator
/// 3. Start the HTTP/WebSocket server
/// 4. Write verdict reports as sessions complete
/// 5. Shut down on Ctrl+C
async fn run_server(args: Args) -> anyhow::Result<()> {
    // Load configuration
    let mut config = load_config(args.config.as_deref())?;

    // Apply CLI argument overrides
    if let Some(ref script_dir) = args.script_dir {
        config.script_dir.clone_from(script_dir);
    }
    if let Some(ref output_dir) = args.output_dir {
        config.output_dir.clone_from(output_dir);
    }

    // Re-validate after overrides
    config.validate()?;

    print_config(&config, args.port);

    // Assemble the reference collaborators behind their capability traits.
    let orchestrator = ExamOrchestrator::new(
        config.clone(),
        Arc::new(ScriptedQuestionSource::new(&config.script_dir)),
        Arc::new(HeuristicEvaluator),
        Arc::new(TranscriptAnalyzer),
    );

    // Write a verdict report whenever a session completes.
    let report_task = tokio::spawn(watch_for_completion(
        orchestrator.clone(),
        PathBuf::from(&config.output_dir),
    ));

    let router = create_router(AppState::new(orchestrator));

    let addr: SocketAddr = ([127, 0, 0, 1], args.port).into();
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("Viva examination server running on http://{addr}");
    println!("Press Ctrl+C to stop");
    println!();

    // Serve until interrupted
    tokio::select! {
        result = axum::serve(listener, router) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down");
            println!("Shutting down");
        }
    }

    report_task.abort();
    Ok(())
}

/// Listens for completion events and writes report files.
async fn watch_for_completion(orchestrator: ExamOrchestrator, output_dir: PathBuf) {
    let mut events = orchestrator.subscribe();
    loop {
        match events.recv().await {
            Ok(SessionEvent::SessionComplete(payload)) => {
                let Some(session) = orchestrator.snapshot().await else {
                    tracing::warn!("Completion event without a session snapshot");
                    continue;
                };
                print_summary(&session, payload.final_score, payload.max_score);
                let report = build_report(&session, &payload.breakdown);
                if let Err(e) = write_reports(&report, &output_dir) {
                    tracing::error!(error = %e, "Failed to write reports");
                    eprintln!("Failed to write reports: {e}");
                }
            }
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(missed = n, "Report task lagged behind the event stream");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Converts a completed session into a verdict report.
fn build_report(session: &Session, breakdown: &[SubjectScore]) -> Report {
    let mut builder = Report::builder()
        .document_name(session.document_ref.clone())
        .total_questions(session.total_questions());

    let mut current_question = None;
    for turn in &session.transcript {
        match turn {
            Turn::Examiner { question, .. } => current_question = Some(question),
            Turn::Student { grading, .. } => {
                let (Some(question), Some(grading)) = (current_question, grading) else {
                    continue;
                };
                builder = builder.outcome(QuestionOutcome::new(
                    question.text.clone(),
                    question.difficulty.display_name(),
                    grading.score,
                    question.max_points,
                    grading.feedback.clone(),
                ));
            }
        }
    }

    for subject in breakdown {
        builder = builder.subject(SubjectRating::new(subject.subject.clone(), subject.score));
    }

    builder.build()
}

/// Writes the Markdown and JSON report files.
fn write_reports(report: &Report, output_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(output_dir)?;

    let markdown_path = output_dir.join("viva-report.md");
    let markdown = MarkdownGenerator::new(report).generate();
    std::fs::write(&markdown_path, markdown)?;
    println!("Report written to {}", markdown_path.display());

    let json_path = output_dir.join("viva-report.json");
    JsonGenerator::new(report).write_to_file(&json_path, true)?;
    println!("Report written to {}", json_path.display());

    Ok(())
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Prints the effective configuration.
fn print_config(config: &Config, port: u16) {
    println!("Viva configuration:");
    println!("  Script directory: {}", config.script_dir);
    println!("  Output directory: {}", config.output_dir);
    println!("  Difficulty policy: {:?}", config.difficulty_policy);
    println!(
        "  Evaluator: {} attempts, {}s timeout",
        config.evaluator.max_attempts, config.evaluator.timeout_seconds
    );
    println!("  Port: {port}");
}

/// Prints the verdict line for a completed session.
fn print_summary(session: &Session, final_score: u32, max_score: u32) {
    println!();
    println!(
        "Session {} complete: {final_score}/{max_score} over {} questions",
        session.id,
        session.total_questions()
    );
}

//! QC Console: start a full pipeline run from the terminal and watch
//! its progress events stream in, or browse question banks.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use client::{
    FullRunRequest, QcClient, QuestionBankQuery, RunArchive, StreamOutcome,
    EVENT_CHANNEL_CAPACITY,
};
use shared::catalog::QuestionBankIndex;
use shared::events::RunEvent;
use shared::session::{format_section_key, RunSession, RunState, SectionToggles};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "qc-console", about = "Terminal client for the QC pipeline backend")]
struct Cli {
    /// Backend endpoint
    #[arg(long, global = true, default_value = client::qc::DEFAULT_ENDPOINT)]
    endpoint: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a full run and stream its progress events
    Run {
        /// Free-form task description
        #[arg(long)]
        description: String,
        /// Optional zip archive to attach
        #[arg(long)]
        zip: Option<PathBuf>,
        /// JSON configuration object, inline or @path
        #[arg(long, default_value = "{}")]
        config: String,
        /// Result sections to leave collapsed in the summary
        #[arg(long = "collapse", value_name = "SECTION")]
        collapsed: Vec<String>,
    },
    /// List question banks matching a search term
    Banks {
        #[arg(long)]
        token: String,
        #[arg(long)]
        search: String,
        /// Only show banks by this creator
        #[arg(long)]
        creator: Option<String>,
    },
    /// List the questions of one bank
    Questions {
        #[arg(long)]
        token: String,
        #[arg(long)]
        qb_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let client = QcClient::new(&cli.endpoint);

    match cli.command {
        Command::Run {
            description,
            zip,
            config,
            collapsed,
        } => run(client, description, zip, &config, &collapsed).await,
        Command::Banks {
            token,
            search,
            creator,
        } => banks(client, token, search, creator.as_deref()).await,
        Command::Questions { token, qb_id } => questions(client, &token, &qb_id).await,
    }
}

async fn run(
    client: QcClient,
    description: String,
    zip: Option<PathBuf>,
    config: &str,
    collapsed: &[String],
) -> Result<()> {
    let config = parse_config(config)?;
    let archive = zip.as_deref().map(read_archive).transpose()?;
    let request = FullRunRequest {
        description,
        archive,
        config,
    };

    let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();

    // Ctrl-C cancels the run: the pump stops reading and the connection
    // is released without a flush.
    let ctrlc_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("cancelling run");
            ctrlc_cancel.cancel();
        }
    });

    let worker = tokio::spawn(async move { client.full_run(request, &tx, &cancel).await });

    let mut session = RunSession::new();
    while let Some(event) = rx.recv().await {
        log_event(&event);
        session.apply(event);
    }

    let mut cancelled = false;
    match worker.await? {
        Ok(StreamOutcome::Completed) => session.complete(),
        Ok(StreamOutcome::Cancelled) => cancelled = true,
        Err(err) => session.fail(err.to_string()),
    }

    print_summary(&session, collapsed);

    if cancelled {
        info!("run cancelled before the stream finished");
        return Ok(());
    }
    match session.state() {
        RunState::Errored(message) => Err(anyhow!("run failed: {message}")),
        _ => Ok(()),
    }
}

/// Accept the configuration inline (`{"k":1}`) or from a file (`@cfg.json`).
fn parse_config(raw: &str) -> Result<serde_json::Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {path}"))?,
        None => raw.to_string(),
    };
    serde_json::from_str(&text).context("config is not valid JSON")
}

fn read_archive(path: &Path) -> Result<RunArchive> {
    let bytes =
        std::fs::read(path).with_context(|| format!("reading archive {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("archive.zip")
        .to_string();
    Ok(RunArchive { file_name, bytes })
}

fn log_event(event: &RunEvent) {
    match event {
        RunEvent::Structured(evt) => {
            info!(
                stage = evt.stage.as_deref().unwrap_or("-"),
                status = evt.status.as_deref().unwrap_or("-"),
                "progress event"
            );
        }
        RunEvent::Raw { raw } => warn!(payload = %raw, "undecoded event"),
    }
}

fn print_summary(session: &RunSession, collapsed: &[String]) {
    let sections: [(&str, Option<String>); 3] = [
        (
            "corrected_description",
            session.corrected_description.clone(),
        ),
        ("qc_results", session.qc_result.as_ref().map(pretty)),
        ("docker_results", session.docker_result.as_ref().map(pretty)),
    ];

    // Everything starts expanded except the sections the user collapsed.
    let mut toggles = SectionToggles::new();
    for (key, _) in &sections {
        if !collapsed.iter().any(|name| name == key) {
            toggles.toggle(key);
        }
    }

    println!("\n{} events received", session.events.len());
    for (key, content) in sections {
        let Some(content) = content else { continue };
        println!("\n== {} ==", format_section_key(key));
        if toggles.is_expanded(key) {
            println!("{content}");
        } else {
            println!("(collapsed)");
        }
    }
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

async fn banks(
    client: QcClient,
    token: String,
    search: String,
    creator: Option<&str>,
) -> Result<()> {
    let query = QuestionBankQuery {
        auth_token: token,
        search,
    };
    let index = QuestionBankIndex::new(client.fetch_question_banks(&query).await?);
    info!(
        banks = index.all().len(),
        creators = index.unique_creators().len(),
        "fetched question banks"
    );
    for bank in index.filter_by_creator(creator) {
        println!("{}  {}", bank.qb_id, bank.created_by.as_deref().unwrap_or("-"));
    }
    Ok(())
}

async fn questions(client: QcClient, token: &str, qb_id: &str) -> Result<()> {
    let questions = client.fetch_questions(token, qb_id).await?;
    for question in &questions {
        let (description, config) = question.form_prefill();
        let snippet: String = description.chars().take(80).collect();
        let config_note = if config.is_some() { " [has config]" } else { "" };
        println!("{}  {}{}", question.q_id, snippet, config_note);
    }
    info!(count = questions.len(), "fetched questions");
    Ok(())
}

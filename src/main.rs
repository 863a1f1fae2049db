//! tetrix-chat — chat with the document assistant from a terminal, or run
//! the local transcript store.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tetrix_chat_lib::config::{check_setting, Settings, SETTING_KEYS};
use tetrix_chat_lib::controller::Controller;
use tetrix_chat_lib::db::Database;
use tetrix_chat_lib::notice::{drain, Notice};
use tetrix_chat_lib::server::{self, ChatFileStore};
use tetrix_chat_lib::session::QueryTarget;
use tetrix_chat_lib::{init_logging, models};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Parser)]
#[command(name = "tetrix-chat", about = "Document-aware chat assistant")]
struct Cli {
    /// Directory holding the settings database and the default store file
    #[arg(long, env = "TETRIX_DATA_DIR", default_value = ".tetrix")]
    data_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Terminal(TerminalCommands),
    /// Launch the desktop app
    #[cfg(feature = "desktop")]
    Desktop,
}

#[derive(Subcommand)]
enum TerminalCommands {
    /// Serve the transcript store (GET/POST /api/chat/:id)
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: SocketAddr,
        /// JSON file to store transcripts in (defaults to the store_file setting)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Ask a single question
    Ask {
        text: String,
        /// Document or "document/sheet" to scope the question to
        #[arg(long)]
        doc: Option<String>,
    },
    /// Interactive chat; /up, /down <target>, /docs and /quit are commands
    Chat,
    /// Print the persisted transcript
    History,
    /// List documents known to the assistant
    Documents,
    /// Upload a spreadsheet, CSV or PDF
    Upload {
        path: PathBuf,
        /// MIME type reported for the file
        #[arg(long)]
        mime: Option<String>,
        /// Description for a sheet, as NAME=TEXT (repeatable)
        #[arg(long = "describe", value_name = "NAME=TEXT")]
        describe: Vec<String>,
    },
    /// Delete a document by name
    Delete { name: String },
    /// Read or change settings
    Settings {
        #[command(subcommand)]
        sub: SettingsCommands,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show effective settings, or one stored value
    Get { key: Option<String> },
    Set { key: String, value: String },
    Unset { key: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = match cli.command {
        // Tauri owns its own event loop, so it starts outside the tokio runtime.
        #[cfg(feature = "desktop")]
        Commands::Desktop => {
            tetrix_chat_lib::run();
            return Ok(());
        }
        Commands::Terminal(command) => command,
    };

    init_logging();
    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    runtime.block_on(run(&cli.data_dir, command))
}

async fn run(data_dir: &Path, command: TerminalCommands) -> anyhow::Result<()> {
    let db = Database::new(data_dir)
        .with_context(|| format!("failed to open settings in {}", data_dir.display()))?;
    let settings = Settings::load(&db, data_dir)?;

    match command {
        TerminalCommands::Serve { addr, file } => {
            let path = file.unwrap_or_else(|| settings.store_file.clone());
            server::serve(addr, Arc::new(ChatFileStore::new(path))).await?;
        }
        TerminalCommands::Ask { text, doc } => {
            let (controller, mut notices) = Controller::new(&settings);
            let target = doc
                .as_deref()
                .map(QueryTarget::from_option)
                .unwrap_or(QueryTarget::General);
            if let Some(reply) = controller.send_scoped(&text, &target).await {
                println!("{}", reply.message);
            }
            report(&mut notices);
        }
        TerminalCommands::Chat => chat(&settings).await?,
        TerminalCommands::History => {
            let (controller, _notices) = Controller::new(&settings);
            if settings.store_url.is_none() {
                bail!("store_url is not set; run `settings set store_url <url>` first");
            }
            controller.load_history().await?;
            for m in controller.messages().iter() {
                print_message(m);
            }
        }
        TerminalCommands::Documents => {
            let (controller, mut notices) = Controller::new(&settings);
            controller.refresh().await;
            report(&mut notices);
            if controller.documents_fetch_failed() {
                bail!("could not fetch documents from {}", settings.backend_url);
            }
            for doc in controller.documents().iter() {
                println!("{}", doc.name);
                for sheet in &doc.sheets {
                    println!("  - {}", sheet);
                }
            }
        }
        TerminalCommands::Upload {
            path,
            mime,
            describe,
        } => upload(&settings, path, mime, describe).await?,
        TerminalCommands::Delete { name } => {
            let (controller, mut notices) = Controller::new(&settings);
            controller.delete(&name).await;
            report(&mut notices);
        }
        TerminalCommands::Settings { sub } => settings_command(&db, &settings, sub)?,
    }
    Ok(())
}

async fn chat(settings: &Settings) -> anyhow::Result<()> {
    let (controller, mut notices) = Controller::new(settings);
    if let Err(e) = controller.load_history().await {
        tracing::warn!(error = %e, "could not load earlier messages");
    }
    for m in controller.messages().iter() {
        print_message(m);
    }
    controller.refresh().await;
    report(&mut notices);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/docs", _) => {
                for option in controller.documents().iter().map(|d| &d.name) {
                    println!("  {}", option);
                }
            }
            ("/up", _) => match controller.feedback_target() {
                Some(_) => controller.thumbs_up(),
                None => println!("nothing to rate yet"),
            },
            ("/down", target) => match controller.thumbs_down() {
                Some(retry) if target.is_empty() => {
                    println!("retry \"{}\" against one of:", retry.prefill);
                    for option in retry.options {
                        println!("  {}", option);
                    }
                }
                Some(retry) => {
                    if let Some(reply) = controller.resubmit(&retry.prefill, target).await {
                        print_message(&reply);
                    }
                }
                None => println!("nothing to rate yet"),
            },
            _ => {
                if let Some(reply) = controller.send(line).await {
                    print_message(&reply);
                }
            }
        }
        report(&mut notices);
    }
    Ok(())
}

async fn upload(
    settings: &Settings,
    path: PathBuf,
    mime: Option<String>,
    describe: Vec<String>,
) -> anyhow::Result<()> {
    let (controller, mut notices) = Controller::new(settings);
    let prepared = controller.prepare_upload(&path, mime.as_deref()).await;
    report(&mut notices);
    let mut descriptors = prepared?;
    let known = descriptors
        .iter()
        .map(|d| d.name.clone())
        .collect::<Vec<_>>()
        .join(", ");

    for pair in &describe {
        let (name, text) = pair
            .split_once('=')
            .with_context(|| format!("expected NAME=TEXT, got '{}'", pair))?;
        match descriptors.iter_mut().find(|d| d.name == name.trim()) {
            Some(d) => d.title = text.trim().to_string(),
            None => bail!("no sheet named '{}'; found: {}", name, known),
        }
    }

    let submitted = controller.upload(path, descriptors);
    report(&mut notices);
    let handle = submitted?;
    let mut progress = handle.progress();
    let watcher = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            eprintln!("{:>3}%", *progress.borrow_and_update());
        }
    });
    let result = handle.finish().await;
    watcher.abort();
    report(&mut notices);
    result?;

    for doc in controller.documents().iter() {
        println!("{}", doc.name);
    }
    Ok(())
}

fn settings_command(db: &Database, settings: &Settings, sub: SettingsCommands) -> anyhow::Result<()> {
    match sub {
        SettingsCommands::Get { key: None } => {
            println!("{}", serde_json::to_string_pretty(settings)?);
        }
        SettingsCommands::Get { key: Some(key) } => {
            if !SETTING_KEYS.contains(&key.as_str()) {
                bail!("unknown setting key: {}", key);
            }
            match db.get_setting(&key)? {
                Some(v) => println!("{}", v),
                None => println!("(unset)"),
            }
        }
        SettingsCommands::Set { key, value } => {
            check_setting(&key, &value).map_err(anyhow::Error::msg)?;
            db.set_setting(&key, &value)?;
        }
        SettingsCommands::Unset { key } => {
            if !db.delete_setting(&key)? {
                println!("{} was not set", key);
            }
        }
    }
    Ok(())
}

fn print_message(m: &models::ChatMessage) {
    let who = if m.is_bot { "bot" } else { "you" };
    println!("[{}] {}: {}", m.timestamp, who, m.message);
}

fn report(notices: &mut UnboundedReceiver<Notice>) {
    for notice in drain(notices) {
        match notice {
            Notice::Success(t) => eprintln!("ok: {}", t),
            Notice::Error(t) => eprintln!("error: {}", t),
        }
    }
}

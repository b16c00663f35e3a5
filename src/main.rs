//! Chatline CLI
//!
//! Terminal front end for a streaming question-answering backend:
//! - Interactive chat with live answer streaming
//! - One-shot questions
//! - Default config generation

use anyhow::{bail, Context};
use chatline::{
    generate_default_config, Applied, Assist, ChatSession, Config, LoggingConfig,
    MarkdownRenderer, MessageId, QuestionMode, Render, SessionError, SessionUpdate,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chatline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Streaming chat client for websocket question-answering backends")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Backend websocket endpoint (overrides config)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Config file (default: ~/.config/chatline/config.toml or ./chatline.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Question mode (auto, masked)
    #[arg(short, long, global = true)]
    pub mode: Option<QuestionMode>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive chat session
    Chat,

    /// Ask a single question and print the answer
    Ask {
        /// Question text (words are joined with spaces)
        #[arg(required = true)]
        question: Vec<String>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Raw answer text, streamed as it arrives
    Text,
    /// Rendered markdown/math HTML of each finished answer
    Html,
    /// Whole transcript as JSON on exit
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let question = match cli.command {
        Commands::Config { output } => return write_default_config(output),
        Commands::Chat => None,
        Commands::Ask { question } => Some(question.join(" ")),
    };

    // Logging settings come from the config, so loading it is logged to
    // stderr through a temporary subscriber
    let mut config = tracing::subscriber::with_default(bootstrap_subscriber(), || {
        match &cli.config {
            Some(path) => Config::load_with_env(path),
            None => Config::load_default(),
        }
    })
    .context("Failed to load configuration")?;
    if let Some(endpoint) = &cli.endpoint {
        config.connection.endpoint = endpoint.clone();
    }
    if let Some(mode) = cli.mode {
        config.connection.mode = mode;
    }

    init_logging(&config.logging);
    tracing::debug!(
        endpoint = %config.connection.endpoint,
        mode = %config.connection.mode,
        "Chatline v{}",
        env!("CARGO_PKG_VERSION")
    );

    let renderer = MarkdownRenderer::new(&config.render);
    let mut session = ChatSession::new(&config);
    let mut printer = StreamPrinter::new(cli.format, renderer);

    let result = match question {
        None => run_chat(&mut session, &mut printer).await,
        Some(question) => {
            let timeout = Duration::from_secs(config.connection.answer_timeout_secs);
            run_ask(&mut session, &mut printer, &question, timeout).await
        }
    };

    session.close().await;

    if cli.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(session.transcript().messages())?);
    }

    result
}

fn write_default_config(output: Option<PathBuf>) -> anyhow::Result<()> {
    let content = generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote default config to {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn bootstrap_subscriber() -> impl tracing::Subscriber + Send + Sync {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("chatline=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
}

fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("chatline={}", config.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run_chat(session: &mut ChatSession, printer: &mut StreamPrinter) -> anyhow::Result<()> {
    session.connect()?;

    eprintln!(
        "Connecting to {} (mode: {}). Type /help for commands.",
        session.endpoint(),
        session.mode()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if handle_line(session, &line) == Flow::Quit {
                        break;
                    }
                }
                None => break,
            },
            Some(update) = session.next_update() => printer.show(session, &update),
            _ = tokio::signal::ctrl_c() => {
                eprintln!();
                break;
            }
        }
    }

    Ok(())
}

async fn run_ask(
    session: &mut ChatSession,
    printer: &mut StreamPrinter,
    question: &str,
    timeout: Duration,
) -> anyhow::Result<()> {
    session.connect()?;

    match tokio::time::timeout(timeout, wait_for_answer(session, printer, question)).await {
        Ok(result) => result.map(|_| ()),
        Err(_) => bail!("No complete answer within {}s", timeout.as_secs()),
    }
}

/// Submit once connected, then stream until that answer has finished
async fn wait_for_answer(
    session: &mut ChatSession,
    printer: &mut StreamPrinter,
    question: &str,
) -> anyhow::Result<MessageId> {
    let mut pending: Option<MessageId> = None;

    while let Some(update) = session.next_update().await {
        printer.show(session, &update);

        match update {
            SessionUpdate::Connected if pending.is_none() => {
                pending = Some(session.submit(question)?.bot);
            }
            SessionUpdate::Transcript(applied) => {
                if let Some(id) = pending.filter(|id| applied.message_id() == Some(*id)) {
                    if session.answer_finished(id) {
                        return Ok(id);
                    }
                }
            }
            SessionUpdate::GaveUp { attempts } => {
                bail!("Gave up connecting to {} after {} attempts", session.endpoint(), attempts);
            }
            _ => {}
        }
    }

    bail!("Connection to {} went away", session.endpoint())
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

fn handle_line(session: &mut ChatSession, line: &str) -> Flow {
    let trimmed = line.trim();

    if let Some(command) = trimmed.strip_prefix('/') {
        let mut parts = command.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("quit" | "exit"), _) => return Flow::Quit,
            (Some("mode"), Some(mode)) => match mode.parse::<QuestionMode>() {
                Ok(mode) => {
                    session.set_mode(mode);
                    eprintln!("Mode: {}", mode);
                }
                Err(e) => eprintln!("{}", e),
            },
            (Some("mode"), None) => eprintln!("Mode: {}", session.mode()),
            (Some("search"), _) => print_assist(session.toggle_assist(Assist::DeepSearch)),
            (Some("think"), _) => print_assist(session.toggle_assist(Assist::Think)),
            (Some("reset"), _) => {
                session.reset();
                eprintln!("Transcript cleared");
            }
            (Some("status"), _) => {
                let status = session.status();
                eprintln!(
                    "{} ({:?}){}",
                    if status.connected { "Connected" } else { "Not connected" },
                    session.connection_state(),
                    status
                        .error
                        .as_deref()
                        .map(|e| format!(" - last error: {}", e))
                        .unwrap_or_default()
                );
            }
            _ => print_help(),
        }
        return Flow::Continue;
    }

    match session.submit(line) {
        Ok(_) => {}
        // blank lines are simply ignored
        Err(SessionError::Input(_)) => {}
        Err(e) => eprintln!("{}", e),
    }
    Flow::Continue
}

fn print_assist(assist: Option<Assist>) {
    match assist {
        Some(assist) => eprintln!("Assist: {}", assist.label()),
        None => eprintln!("Assist: off"),
    }
}

fn print_help() {
    eprintln!(
        "Commands:\n  \
         /mode [auto|masked]  show or set question mode\n  \
         /search              toggle Deep Search assist\n  \
         /think               toggle Think assist\n  \
         /status              connection status\n  \
         /reset               clear the transcript\n  \
         /quit                leave"
    );
}

/// Writes answers to stdout as they stream in
struct StreamPrinter {
    format: OutputFormat,
    renderer: MarkdownRenderer,
    /// Message currently being streamed and how much of it is on screen
    current: Option<(MessageId, usize)>,
}

impl StreamPrinter {
    fn new(format: OutputFormat, renderer: MarkdownRenderer) -> Self {
        Self {
            format,
            renderer,
            current: None,
        }
    }

    fn show(&mut self, session: &ChatSession, update: &SessionUpdate) {
        match update {
            SessionUpdate::Transcript(Applied::Started(id) | Applied::Appended(id)) => {
                if session.answer_finished(*id) {
                    self.finish(session, *id);
                } else if self.format == OutputFormat::Text {
                    self.print_new_text(session, *id);
                }
            }
            SessionUpdate::Transcript(Applied::Completed(id)) => self.finish(session, *id),
            SessionUpdate::Connected => eprintln!("[connected]"),
            SessionUpdate::Disconnected { reason } => eprintln!("[disconnected: {}]", reason),
            SessionUpdate::Reconnecting { attempt, delay } => {
                eprintln!("[reconnecting in {:.1}s, attempt {}]", delay.as_secs_f32(), attempt)
            }
            SessionUpdate::GaveUp { attempts } => {
                eprintln!("[gave up after {} reconnect attempts]", attempts)
            }
            SessionUpdate::Transcript(Applied::Ignored) | SessionUpdate::Error(_) => {}
        }
    }

    fn print_new_text(&mut self, session: &ChatSession, id: MessageId) {
        let Some(message) = session.transcript().get(id) else {
            return;
        };

        let printed = match self.current {
            Some((current, printed)) if current == id => printed,
            _ => {
                if self.current.is_some() {
                    println!();
                }
                0
            }
        };

        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(message.text[printed..].as_bytes());
        let _ = stdout.flush();
        self.current = Some((id, message.text.len()));
    }

    fn finish(&mut self, session: &ChatSession, id: MessageId) {
        let Some(message) = session.transcript().get(id) else {
            return;
        };

        match self.format {
            OutputFormat::Text => {
                self.print_new_text(session, id);
                println!();
            }
            OutputFormat::Html => print!("{}", self.renderer.render(&message.text)),
            OutputFormat::Json => {}
        }
        self.current = None;
    }
}

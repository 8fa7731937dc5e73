use std::io::{Stdout, stdout};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use primer::ai::AiClient;
use primer::app::App;
use primer::db::Database;
use primer::dispatch::Dispatcher;
use primer::input::handle_events;
use primer::seed::SeedLoader;
use primer::theme::Theme;
use primer::{app::AppEvent, ui};

const DEFAULT_DATABASE_URL: &str = "postgres://localhost:5432/primer";
const SEED_DIR: &str = "seed";

#[derive(Parser)]
#[command(name = "primer", about = "Co-author illustrated stories with an AI tutor")]
struct Cli {
    /// Load seed data from the seed/ directory
    #[arg(long)]
    seed: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

/// Raw mode + alternate screen, restored on drop even when the loop errors.
struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSession {
    fn new() -> Result<Self> {
        enable_raw_mode()?;

        let mut out = stdout();
        if let Err(err) = execute!(out, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(err.into());
        }

        let backend = CrosstermBackend::new(out);
        let terminal = match Terminal::new(backend) {
            Ok(t) => t,
            Err(err) => {
                let _ = disable_raw_mode();
                let mut out = stdout();
                let _ = execute!(out, LeaveAlternateScreen);
                return Err(err.into());
            }
        };

        Ok(Self { terminal })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Log to a timestamped file, never to the terminal the TUI owns. If the
/// file cannot be created, prefer no logs over corrupting the screen.
fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("primer={default_level}")));

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let log_path = format!("logs/primer_{timestamp}.log");
    let file = std::fs::create_dir_all("logs")
        .and_then(|()| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
        })
        .ok();

    match file {
        Some(file) => {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .with(env_filter)
                .init();
            tracing::info!(path = %log_path, "=== Illustrated Primer TUI starting ===");
        }
        None => {
            tracing_subscriber::registry().with(env_filter).init();
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(err) = run(cli).await {
        tracing::error!(?err, "fatal error");
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }

    tracing::info!("application exited successfully");
}

async fn run(cli: Cli) -> Result<()> {
    let api_key =
        std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set in environment")?;
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

    let db = Database::connect(&database_url)
        .await
        .context("connect to database")?;
    db.migrate().await.context("run migrations")?;

    if cli.seed {
        let seed_dir = Path::new(SEED_DIR);
        if seed_dir.is_dir() {
            // Seed data is optional; a failed import should not stop startup.
            if let Err(err) = SeedLoader::new(db.clone()).load_from_directory(seed_dir).await {
                tracing::error!(?err, "failed to load seed data");
            }
        } else {
            tracing::warn!(dir = SEED_DIR, "seed directory not found");
        }
    }

    let ai = build_ai_client(api_key);
    tracing::info!(model = ai.model(), "OpenAI client initialized");

    let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();
    let dispatcher = Dispatcher::new(db, ai, tx);

    let mut session = TerminalSession::new()?;
    let mut app = App::new();
    let theme = Theme::default();

    for intent in app.on_start() {
        dispatcher.run(intent);
    }

    run_app(&mut session.terminal, &mut app, &theme, &dispatcher, &mut rx).await
}

fn build_ai_client(api_key: String) -> AiClient {
    let mut ai = AiClient::new(api_key);

    if let Ok(model) = std::env::var("OPENAI_MODEL")
        && !model.is_empty()
    {
        ai = ai.with_model(model);
    }

    if let Ok(raw) = std::env::var("OPENAI_MAX_TOKENS") {
        match raw.parse::<u32>() {
            Ok(tokens) if tokens > 0 => ai = ai.with_max_tokens(tokens),
            _ => tracing::warn!(value = %raw, "invalid OPENAI_MAX_TOKENS value, using default"),
        }
    }

    if let Ok(org_id) = std::env::var("OPENAI_ORG_ID")
        && !org_id.is_empty()
    {
        ai = ai.with_org_id(org_id);
    }

    ai
}

async fn run_app<B>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    theme: &Theme,
    dispatcher: &Dispatcher,
    rx: &mut mpsc::UnboundedReceiver<AppEvent>,
) -> Result<()>
where
    B: Backend,
    B::Error: Send + Sync + 'static,
{
    loop {
        app.tick();

        // crossterm's event::poll blocks without yielding to the runtime, so
        // give spawned tasks a chance to make progress each frame.
        tokio::task::yield_now().await;

        while let Ok(event) = rx.try_recv() {
            for intent in app.handle_event(event) {
                dispatcher.run(intent);
            }
        }

        terminal.draw(|frame| ui::draw(frame, app, theme))?;

        for intent in handle_events(app)? {
            dispatcher.run(intent);
        }

        if app.should_quit() {
            return Ok(());
        }
    }
}

mod cli;
mod prompt;

use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use storm_proto::config::Config;
use storm_sync::{
    Affordance, AutoEnable, HostEvent, HttpTransport, LabelEditor, LabelSuggestionEngine,
    PluginPrompt, Snapshot, SyncEngine, Transport, ViewFetch, VisibilityTracker,
};

use cli::{Cli, Command, SuggestArgs, WatchArgs};
use prompt::{StdinCredentials, StdinPlugins};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_stderr)?;
    tracing::info!("storm-watch starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config, using defaults: {:#}", e);
        Config::default()
    });
    cli.apply_overrides(&mut config);

    // ── Transport ────────────────────────────────────────────────────────────
    let transport = HttpTransport::new(&config.daemon.base_url, config.daemon.request_timeout())
        .context("invalid daemon base URL")?
        .with_api_key(config.daemon.api_key.clone())
        .with_prompt(Arc::new(StdinCredentials));
    tracing::info!("Daemon API at {}", transport.base_url());
    let transport: Arc<dyn Transport> = Arc::new(transport);

    match cli.command {
        Command::Watch(args) => watch(config, args, transport).await,
        Command::Suggest(args) => suggest(config, args, transport).await,
    }
}

fn init_logging(to_stderr: bool) -> anyhow::Result<()> {
    // Allow RUST_LOG override; keep HTTP client internals quiet by default.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,hyper_util=warn,reqwest=warn,hyper=warn".to_string());

    if to_stderr {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(log_filter.as_str())
            .init();
        return Ok(());
    }

    let data_dir = storm_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("storm-watch.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("storm-watch log: {}", log_path.display());
    Ok(())
}

// ── watch ────────────────────────────────────────────────────────────────────

async fn watch(config: Config, args: WatchArgs, transport: Arc<dyn Transport>) -> anyhow::Result<()> {
    let plugin_prompt: Arc<dyn PluginPrompt> = if args.yes {
        Arc::new(AutoEnable)
    } else {
        Arc::new(StdinPlugins)
    };

    let engine = SyncEngine::start(transport, &config, plugin_prompt, args.state);
    forward_visibility_signals(engine.visibility().clone())?;

    let mut snapshots = engine.view().subscribe_snapshot();
    let mut affordance = engine.affordance();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted, shutting down");
                engine.visibility().handle(HostEvent::PageHide);
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    print_snapshot(&snapshot);
                }
            }
            changed = affordance.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *affordance.borrow_and_update();
                print_affordance(state);
            }
        }
    }

    engine.shutdown().await;
    Ok(())
}

/// SIGUSR1 pauses polling, SIGUSR2 resumes it.
#[cfg(unix)]
fn forward_visibility_signals(tracker: VisibilityTracker) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hide = signal(SignalKind::user_defined1())?;
    let mut show = signal(SignalKind::user_defined2())?;
    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(()) = hide.recv() => tracker.handle(HostEvent::Hidden),
                Some(()) = show.recv() => tracker.handle(HostEvent::Visible),
                else => break,
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn forward_visibility_signals(_tracker: VisibilityTracker) -> anyhow::Result<()> {
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot) {
    let state = snapshot
        .unique_state()
        .map(|s| format!(" [{s}]"))
        .unwrap_or_default();
    let session = snapshot.session();
    println!(
        "{} {} torrents{}  free {}  down {}/s  up {}/s  peers {}",
        snapshot.fetched_at().format("%H:%M:%S"),
        snapshot.len(),
        state,
        format_bytes(snapshot.free_space() as f64),
        format_bytes(session.payload_download_rate),
        format_bytes(session.payload_upload_rate),
        session.num_peers,
    );
    for (id, torrent, label) in snapshot.rows() {
        let short: String = id.chars().take(8).collect();
        println!(
            "  {short}  {:<11} {:>5.1}%  {:<12} {}",
            torrent.state.to_string(),
            torrent.progress,
            label,
            torrent.name
        );
    }
}

fn print_affordance(state: Affordance) {
    match state {
        Affordance::ShowingSteady => println!("!! daemon unreachable, showing last known state"),
        Affordance::ClosingAnimated => println!("-- connection restored"),
        Affordance::Hidden => {}
    }
}

fn format_bytes(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes.max(0.0);
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{value:.0} {}", UNITS[unit])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

// ── suggest ──────────────────────────────────────────────────────────────────

async fn suggest(
    config: Config,
    args: SuggestArgs,
    transport: Arc<dyn Transport>,
) -> anyhow::Result<()> {
    let current = match transport.fetch_view(None, None).await? {
        ViewFetch::Modified { view, .. } => view
            .torrents
            .into_iter()
            .find(|t| t.hash == args.id)
            .map(|t| t.label),
        ViewFetch::Unchanged => None,
    }
    .ok_or_else(|| anyhow!("torrent {} not found", args.id))?;

    let corpus = transport.fetch_label_corpus().await?;
    let engine = LabelSuggestionEngine::new(corpus, current);
    engine.set_query(args.query);
    let suggestions = engine.suggestions();

    for (n, suggestion) in suggestions.iter().enumerate() {
        let note = if suggestion.is_clear {
            "(clear label)".to_string()
        } else if suggestion.is_new {
            format!("{} (new)", suggestion.value)
        } else {
            suggestion.value.clone()
        };
        println!("{:>3}. {}", n + 1, note);
    }

    let Some(choice) = args.apply else {
        return Ok(());
    };
    let suggestion = choice
        .checked_sub(1)
        .and_then(|i| suggestions.get(i))
        .ok_or_else(|| anyhow!("no suggestion numbered {choice}"))?;

    let editor = LabelEditor::new(transport, config.labels.settle_delay());
    let change = editor.apply(&args.id, &engine, suggestion).await?;
    println!("{:?}", change);
    Ok(())
}

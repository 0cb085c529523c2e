use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand, ValueEnum};
use sleep_decibel::session::{
    format_duration, format_night, format_time_of_day, QualityBand, Session,
};
use sleep_decibel::{
    create_router, AppState, AudioProviderFactory, AudioSource, Config, Sampler, SessionStore,
    SleepTracker, SystemClock,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sleep-decibel", version, about = "Sleep environment noise logger")]
struct Cli {
    /// Config file, without extension
    #[arg(long, default_value = "config/sleep-decibel")]
    config: String,

    /// Override the configured audio source
    #[arg(long, value_enum)]
    source: Option<SourceArg>,

    /// WAV file to replay (implies --source file)
    #[arg(long)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceArg {
    Microphone,
    File,
    Scripted,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Track a night in the terminal until Ctrl-C
    Track {
        /// Stop automatically after this many seconds
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Ask for microphone access
    Permission,
    /// List recorded nights
    History,
    /// Show one night in detail
    Show { id: String },
    /// Delete a recorded night
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let mut tracker = build_tracker(&cfg, &cli)?;

    match cli.command {
        Command::Serve => serve(&cfg, tracker).await,
        Command::Track { duration } => track(&mut tracker, duration.map(Duration::from_secs)).await,
        Command::Permission => {
            if tracker.request_access().await? {
                println!("Microphone access granted!");
            } else {
                println!("Microphone access is required to track sleep noise");
            }
            Ok(())
        }
        Command::History => {
            print_history(&tracker);
            Ok(())
        }
        Command::Show { id } => {
            let session = tracker
                .session(&id)
                .with_context(|| format!("Session {id} not found"))?;
            print_summary(session);
            print_timeline(session);
            Ok(())
        }
        Command::Delete { id } => {
            tracker.delete_session(&id)?;
            println!("Session deleted");
            Ok(())
        }
    }
}

fn build_tracker(cfg: &Config, cli: &Cli) -> Result<SleepTracker> {
    let source = match (cli.source, &cli.file) {
        (Some(SourceArg::Microphone), _) => AudioSource::Microphone,
        (Some(SourceArg::Scripted), _) => AudioSource::Scripted(cfg.audio.scripted_levels.clone()),
        (Some(SourceArg::File) | None, Some(path)) => AudioSource::File(path.clone()),
        (Some(SourceArg::File), None) => match cfg.audio_source()? {
            file @ AudioSource::File(_) => file,
            _ => bail!("--source file needs --file or audio.file_path"),
        },
        (None, None) => cfg.audio_source()?,
    };

    let provider = AudioProviderFactory::create(source).context("Failed to create audio provider")?;
    info!("Audio provider: {}", provider.name());

    let clock = Arc::new(SystemClock);
    let sampler = Sampler::new(provider, clock.clone(), cfg.sampler_config());
    let store = SessionStore::open(cfg.store_path()?);

    Ok(SleepTracker::new(sampler, store, clock))
}

async fn serve(cfg: &Config, tracker: SleepTracker) -> Result<()> {
    let state = AppState::new(tracker);
    let app = create_router(state.clone());

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    // Keep a night in progress rather than dropping it
    let mut tracker = state.tracker.lock().await;
    if tracker.is_tracking() {
        match tracker.stop_tracking().await {
            Ok(session) => info!("Saved open session {} on shutdown", session.id()),
            Err(e) => error!("Failed to save open session on shutdown: {}", e),
        }
    }
    tracker.shutdown();

    Ok(())
}

async fn track(tracker: &mut SleepTracker, duration: Option<Duration>) -> Result<()> {
    if tracker.needs_onboarding() && !tracker.request_access().await? {
        bail!("Microphone access is required to track sleep noise");
    }

    let session = tracker.start_tracking().await?;
    println!(
        "Sleep tracking started at {} (Ctrl-C to stop)",
        format_time_of_day(session.start_time())
    );

    let mut level_rx = tracker.subscribe_level();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = &mut deadline => break,
            changed = level_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let level = *level_rx.borrow_and_update();
                let status = tracker.status();
                println!("{}  {:>3} dB  {}", status.elapsed, level, QualityBand::for_level(level));
            }
        }
    }

    let session = tracker.stop_tracking().await?;
    println!();
    print_summary(&session);

    Ok(())
}

fn print_summary(session: &Session) {
    println!("{}", format_night(session.start_time()));
    println!(
        "{} night: {}",
        capitalize(session.quality_band().as_str()),
        session.quality_band().message()
    );
    println!(
        "  Duration   {}",
        format_duration(session.start_time(), session.end_time())
    );
    println!("  Avg noise  {} dB", session.average_level());
    println!("  Peak       {} dB", session.peak_level());
    println!("  Spikes     {}", session.spike_count());
}

fn print_timeline(session: &Session) {
    if session.readings().is_empty() {
        println!("No data available");
        return;
    }

    println!();
    for reading in session.readings() {
        let time = Local
            .timestamp_millis_opt(reading.timestamp)
            .single()
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--".to_string());
        println!(
            "{}  {:>3}  {:<8}  {}",
            time,
            reading.level,
            QualityBand::for_level(reading.level),
            "#".repeat(usize::from(reading.level / 5))
        );
    }
}

fn print_history(tracker: &SleepTracker) {
    let sessions = tracker.sessions();
    if sessions.is_empty() {
        println!("No sessions yet. Start your first sleep tracking session to see your history here.");
        return;
    }

    for session in sessions {
        let end = session
            .end_time()
            .map(format_time_of_day)
            .unwrap_or_else(|| "--".to_string());
        println!(
            "{}  {}  {} - {}  {:<8}  {:>7}  {} dB avg",
            session.id(),
            format_night(session.start_time()),
            format_time_of_day(session.start_time()),
            end,
            session.quality_band(),
            format_duration(session.start_time(), session.end_time()),
            session.average_level()
        );
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

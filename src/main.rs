use clap::{error::ErrorKind, Args, CommandFactory, Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use keydyn::{
    analysis::{analyze, AnalysisError, AnalysisResult},
    config::{Config, ConfigStore, FileConfigStore, PrivacySettings},
    history::SessionHistory,
    notify::{format_summary, DeliveryStatus, HttpTransport, NotificationHandler},
    report::{read_events, ReportGenerator},
    runtime::{CrosstermEventSource, FixedTicker, Runner},
    session::{CaptureOutcome, CaptureSession, SessionEnd},
    ui::CaptureView,
    TICK_RATE_MS,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    error::Error,
    io::{self, stdin, BufRead},
    path::{Path, PathBuf},
    process,
    time::Duration,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use webbrowser::Browser;

const RULE: &str = "============================================================";

/// keystroke dynamics analyzer: typing rhythm statistics from a terminal session
#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    long_about = "Records key timing in the terminal for a bounded session, then reports interval statistics, estimated WPM, rhythm consistency and burst typing as JSON and HTML."
)]
pub struct Cli {
    /// configuration file (default: ./config.json, then the platform config dir)
    #[clap(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// increase log output (-v debug, -vv trace)
    #[clap(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[clap(subcommand)]
    command: Option<Command>,

    #[clap(flatten)]
    record: RecordArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// record a typing session (default)
    Record(RecordArgs),
    /// analyze keystrokes from a saved JSON report or event array
    Analyze {
        file: PathBuf,

        /// print the analysis as JSON
        #[clap(long)]
        json: bool,
    },
    /// show recent sessions
    History {
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
    /// write a default configuration file
    Init {
        /// overwrite an existing file
        #[clap(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct RecordArgs {
    /// session length in minutes
    #[clap(short = 'd', long)]
    duration: Option<f64>,

    /// log which keys are pressed, not only their timing
    #[clap(long)]
    log_keys: bool,

    /// skip chat notifications for this run
    #[clap(long)]
    no_notify: bool,

    /// accept the ethical use agreement without prompting
    #[clap(short = 'y', long)]
    yes: bool,

    /// open the HTML report when done
    #[clap(long)]
    open: bool,
}

impl RecordArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(minutes) = self.duration {
            config.session.duration_minutes = minutes;
        }
        if self.log_keys {
            config.privacy.log_actual_keys = true;
        }
        if self.no_notify {
            config.notifications.enabled = false;
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let store = cli
        .config
        .as_ref()
        .map(FileConfigStore::with_path)
        .unwrap_or_default();

    match cli.command {
        Some(Command::Init { force }) => init_config(&store, force),
        Some(Command::Analyze { file, json }) => analyze_file(&store.load()?, &file, json),
        Some(Command::History { limit }) => show_history(&store.load()?, limit),
        Some(Command::Record(args)) => record(store.load()?, &args),
        None => record(store.load()?, &cli.record),
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn init_config(store: &FileConfigStore, force: bool) -> Result<(), Box<dyn Error>> {
    if store.path().exists() && !force {
        println!(
            "Config already exists at {} (use --force to overwrite)",
            store.path().display()
        );
        return Ok(());
    }
    store.save(&Config::default())?;
    println!("Wrote default config to {}", store.path().display());
    Ok(())
}

fn record(mut config: Config, args: &RecordArgs) -> Result<(), Box<dyn Error>> {
    args.apply(&mut config);

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    print_banner();

    if !args.yes && !confirm_consent(&config.privacy)? {
        println!("\nExiting. Thank you for using responsibly.");
        return Ok(());
    }

    let duration = config.session.duration();
    println!(
        "\n🎯 Starting {:.1}-minute session...",
        duration.as_secs_f64() / 60.0
    );
    println!("📊 Collecting keystroke dynamics data...");
    if config.privacy.log_actual_keys {
        println!("🔍 Logging actual keys pressed...");
    }

    let outcome = capture(&config, duration)?;
    debug!(end = ?outcome.end, keystrokes = outcome.events.len(), "session ended");

    if outcome.end == SessionEnd::Cancelled {
        println!("\nSession cancelled. Nothing was saved.");
        return Ok(());
    }

    let min_keystrokes = config.session.min_keystrokes;
    if outcome.events.is_empty() || outcome.events.len() < min_keystrokes {
        eprintln!(
            "\n⚠️  Insufficient data collected (minimum {min_keystrokes} keystrokes required)"
        );
        process::exit(1);
    }

    println!(
        "\n✅ Session complete! Collected {} keystrokes",
        outcome.events.len()
    );

    let typed_text = if config.privacy.save_typed_text {
        println!(
            "📝 Captured {} characters of text",
            outcome.typed_text.chars().count()
        );
        outcome.typed_text.as_str()
    } else {
        ""
    };

    println!("🔬 Analyzing keystroke patterns...");
    let analysis =
        analyze(&outcome.events, &config.analysis).unwrap_or_else(|e| exit_insufficient(&e));

    println!("📄 Generating reports...");
    let reports = ReportGenerator::new(config.privacy.clone(), config.output.clone());
    let json_path = reports.generate_json(&outcome.events, &analysis, typed_text)?;
    let html_path = reports.generate_html(&outcome.events, &analysis, typed_text)?;

    println!("\n✨ Reports generated successfully!");
    println!("   📊 JSON: {}", json_path.display());
    println!("   🌐 HTML: {}", html_path.display());

    if config.privacy.log_actual_keys {
        println!("\n⚠️  Remember: Your reports contain actual keystroke data!");
        println!("   Keep them secure and delete when no longer needed.");
    }

    let history = SessionHistory::with_path(config.output.history_path());
    if let Err(e) = history.append(&analysis) {
        warn!(error = %e, path = %history.path().display(), "could not update session history");
    }

    if config.notifications.enabled {
        println!("\n📤 Sending notifications...");
        send_notifications(&config, &analysis);
    }

    print_summary(&analysis, typed_text);

    if args.open {
        open_report(&html_path);
    }

    Ok(())
}

fn capture(config: &Config, duration: Duration) -> Result<CaptureOutcome, Box<dyn Error>> {
    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let session = CaptureSession::new(runner, duration, config.privacy.log_actual_keys);
    let outcome = session.run(|progress| {
        terminal
            .draw(|f| f.render_widget(&CaptureView { progress }, f.area()))
            .map(|_| ())
    });

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    Ok(outcome?)
}

fn analyze_file(config: &Config, path: &Path, as_json: bool) -> Result<(), Box<dyn Error>> {
    let events = read_events(path)?;
    let analysis =
        analyze(&events, &config.analysis).unwrap_or_else(|e| exit_insufficient(&e));

    if as_json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print_summary(&analysis, "");
    }
    Ok(())
}

fn show_history(config: &Config, limit: usize) -> Result<(), Box<dyn Error>> {
    let history = SessionHistory::with_path(config.output.history_path());
    let records = history.recent(limit)?;

    if records.is_empty() {
        println!("No sessions recorded yet ({}).", history.path().display());
        return Ok(());
    }

    println!(
        "{:<19}  {:>6}  {:>9}  {:>6}  {:>8}  {:>11}  {:>5}",
        "date", "keys", "duration", "wpm", "avg int", "consistency", "burst"
    );
    for record in records {
        println!(
            "{:<19}  {:>6}  {:>8.1}s  {:>6.1}  {:>7.3}s  {:>10.1}%  {:>5}",
            record.date.format("%Y-%m-%d %H:%M:%S"),
            record.total_keystrokes,
            record.session_duration,
            record.typing_speed,
            record.avg_interval,
            record.rhythm_consistency * 100.0,
            if record.burst_typing_detected { "yes" } else { "no" },
        );
    }
    Ok(())
}

fn send_notifications(config: &Config, analysis: &AnalysisResult) {
    let transport = match HttpTransport::new() {
        Ok(transport) => transport,
        Err(e) => {
            println!("❌ Notifications unavailable: {e}");
            return;
        }
    };
    let notifier = NotificationHandler::new(config.notifications.clone(), transport);

    for delivery in notifier.send_summary(analysis) {
        match delivery.status {
            DeliveryStatus::Sent => println!("✅ {} notification sent", delivery.platform),
            DeliveryStatus::Rejected(code) => {
                println!("⚠️  {} error: {code}", delivery.platform)
            }
            DeliveryStatus::Failed(reason) => {
                println!("❌ {} failed: {reason}", delivery.platform)
            }
        }
    }
}

fn exit_insufficient(error: &AnalysisError) -> ! {
    eprintln!("\n⚠️  Insufficient data: {error}. No statistics were produced.");
    process::exit(1);
}

fn open_report(path: &Path) {
    if !Browser::is_available() {
        println!("No browser available to open {}", path.display());
        return;
    }
    let target = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf());
    if let Err(e) = webbrowser::open(&target.to_string_lossy()) {
        warn!(error = %e, "could not open report");
    }
}

fn confirm_consent(privacy: &PrivacySettings) -> io::Result<bool> {
    println!("\n{RULE}");
    println!("ETHICAL USE AGREEMENT");
    println!("{RULE}");
    println!("\nThis tool collects keystroke timing data for analysis.");

    if privacy.log_actual_keys {
        println!("\n⚠️  WARNING: You have enabled actual key logging!");
        println!("   The tool will record WHAT you type, not just timing.");
        println!("   This data will be saved in the reports.\n");
    }

    println!("By continuing, you confirm that:");
    println!("  1. You are analyzing your OWN typing behavior");
    println!("  2. You have consent if analyzing others");
    println!("  3. You will use this tool ethically and legally");
    println!("\nPress ENTER to continue or CTRL+C to exit...");
    println!("{RULE}\n");

    let mut line = String::new();
    let read = stdin().lock().read_line(&mut line)?;
    Ok(read > 0)
}

fn print_banner() {
    println!(
        r#"
    ╔══════════════════════════════════════════════════════╗
    ║                                                      ║
    ║        ⌨️  KEYSTROKE DYNAMICS ANALYZER  ⌨️           ║
    ║                                                      ║
    ║     Privacy-Respecting | Ethical Use Only            ║
    ║                                                      ║
    ╚══════════════════════════════════════════════════════╝
    "#
    );
}

fn print_summary(analysis: &AnalysisResult, typed_text: &str) {
    println!("\n{RULE}");
    println!("Session Summary:");
    println!("{RULE}");
    print!("{}", format_summary(analysis));
    println!(
        "Burst Typing: {}",
        if analysis.burst_typing_detected {
            "detected"
        } else {
            "not detected"
        }
    );
    if !typed_text.is_empty() {
        println!("Text Length: {} characters", typed_text.chars().count());
    }
    println!("{RULE}\n");
}

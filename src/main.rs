//! # Mediafetch CLI
//!
//! Command-line interface for the mediafetch library.
//! Downloads one video, escalating to browser or cookie-file credentials only
//! when the site asks for a signed-in session.

use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::debug;
use mediafetch::{CredentialPreference, ExitStatus, FetchConfig, FetchPlan, FetchReport, Orchestrator};

mod cli;

/// Command-line interface for mediafetch
#[derive(Parser, Debug)]
#[command(name = "mediafetch")]
#[command(about = "Video downloader that signs in with your cookies only when it has to")]
#[command(long_about = "Downloads a single video with yt-dlp:
  mediafetch https://www.youtube.com/watch?v=ID      # Anonymous first, cookies if required
  mediafetch                                         # Prompt for the URL
  mediafetch URL --cookies-from-browser firefox      # Use browser cookies when needed
  mediafetch URL --cookies ~/cookies.txt --json      # Machine-readable report

Credentials can also come from the environment or a .env file:
  YT_COOKIES_FILE, YT_COOKIES_BROWSER, YT_COOKIES_PROFILE

Exit status:
  0 saved, 1 invalid input or download error, 2 sign-in required but no
  cookies configured, 3 download with cookies failed")]
#[command(version = env!("MEDIAFETCH_VERSION"))]
struct Cli {
    /// Video URL; read from stdin when omitted
    url: Option<String>,

    /// Exported cookies.txt to use when sign-in is required
    #[arg(long, value_name = "PATH")]
    cookies: Option<String>,

    /// Browser to read cookies from when sign-in is required
    #[arg(long, value_name = "BROWSER")]
    cookies_from_browser: Option<String>,

    /// Browser profile to read cookies from (e.g. "Profile 1")
    #[arg(long, value_name = "PROFILE")]
    browser_profile: Option<String>,

    /// Try browser cookies before the cookie file, keeping the file as fallback
    #[arg(long)]
    prefer_browser: bool,

    /// Directory to save into (default: Desktop)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Additional allowed host, exact or "*.example.com" (repeatable)
    #[arg(long = "allow-host", value_name = "HOST")]
    allow_host: Vec<String>,

    /// Path to the yt-dlp binary
    #[arg(long, value_name = "PATH")]
    engine: Option<PathBuf>,

    /// Retry network failures up to N times with backoff (max 5)
    #[arg(long, value_name = "N")]
    transient_retries: Option<u32>,

    /// Overwrite an existing file with the same name
    #[arg(short, long)]
    force: bool,

    /// Print the fetch report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Show which credentials would be used without downloading
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("❌ Error: {e:#}");
            std::process::exit(ExitStatus::InvalidInput.code());
        }
    }
}

async fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();

    // .env next to the working directory, never overriding real variables
    dotenvy::dotenv().ok();

    // Initialize logging to stderr
    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    if cli.verbose {
        eprintln!("🎬 Mediafetch v{} starting...", env!("MEDIAFETCH_VERSION"));
    }

    let mut config = build_config(&cli, |key| std::env::var(key).ok())?;
    let locator = read_locator(cli.url.as_deref())?;

    if cli.dry_run {
        let plan = Orchestrator::with_ytdlp(config).plan(&locator)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            show_plan(&plan);
        }
        return Ok(ExitStatus::Success.code());
    }

    config.prepare_destination().await.with_context(|| {
        format!(
            "cannot create output directory {}",
            config.fetch.destination.display()
        )
    })?;
    eprintln!("📁 Saving to: {}", config.fetch.destination.display());

    let progress = if cli.json || !std::io::stderr().is_terminal() {
        cli::ProgressManager::hidden()
    } else {
        cli::ProgressManager::new("🌐 Starting")
    };
    config.fetch.progress = Some(progress.progress_callback());

    let orchestrator = Orchestrator::with_ytdlp(config).with_state_callback(progress.state_callback());
    let report = orchestrator.run(&locator).await;
    progress.finish();
    let report = report?;

    debug!("Transitions: {:?}", report.transitions);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        show_report(&report);
    }

    Ok(report.exit_status.code())
}

/// Environment first, then flags on top
fn build_config<F>(cli: &Cli, lookup: F) -> mediafetch::Result<FetchConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = FetchConfig::from_lookup(lookup)?;

    if let Some(ref path) = cli.cookies {
        config = config.with_cookie_file(path)?;
    }
    if let Some(ref browser) = cli.cookies_from_browser {
        config = config.with_browser(browser, cli.browser_profile.as_deref())?;
    } else if let Some(profile) = cli.browser_profile.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        config.credentials.browser_profile = Some(profile.to_string());
    }
    if cli.prefer_browser {
        config.credentials.preference = CredentialPreference::BrowserFirst;
    }
    if let Some(ref dir) = cli.output_dir {
        config = config.with_destination(dir);
    }
    config.allowed_hosts = cli
        .allow_host
        .iter()
        .fold(config.allowed_hosts, |allowed, host| allowed.allow(host));
    if let Some(ref engine) = cli.engine {
        config.engine_path = engine.clone();
    }
    if let Some(retries) = cli.transient_retries {
        config = config.with_transient_retries(retries)?;
    }
    config.fetch.force_overwrite = cli.force;

    Ok(config)
}

/// URL from the argument, or a single line from stdin
fn read_locator(arg: Option<&str>) -> anyhow::Result<String> {
    if let Some(url) = arg {
        return Ok(url.trim().to_string());
    }

    if std::io::stdin().is_terminal() {
        eprint!("🔗 Video URL: ");
        std::io::stderr().flush()?;
    }
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read URL from stdin")?;
    Ok(line.trim().to_string())
}

fn show_plan(plan: &FetchPlan) {
    eprintln!("🔍 [DRY RUN] Would download: {}", plan.locator);
    eprintln!("📁 Into: {}", plan.destination.display());
    match plan.escalation_source {
        Some(ref source) => eprintln!("🔐 If sign-in is required: {}", source.describe()),
        None => eprintln!("⚠️  If sign-in is required: no credentials configured"),
    }
    if let Some(ref fallback) = plan.fallback_source {
        eprintln!("↪️  If browser cookies cannot be read: {}", fallback.describe());
    }
}

fn show_report(report: &FetchReport) {
    for line in report_lines(report) {
        eprintln!("{line}");
    }
}

/// Status lines for a finished run; cookie warnings come first
fn report_lines(report: &FetchReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .warnings
        .iter()
        .map(|warning| format!("⚠️  {warning}"))
        .collect();

    if let Some(ref saved) = report.saved_location {
        lines.push(match report.credential_source {
            Some(ref source) => format!("🔐 Signed in with {}", source.describe()),
            None => "🌐 No sign-in needed".to_string(),
        });
        lines.push(format!("✅ Saved: {}", saved.display()));
        return lines;
    }

    if let Some(kind) = report.error_kind {
        lines.push(format!("❌ Download failed: {kind}"));
    }
    if let Some(ref raw) = report.raw_message {
        lines.push(raw.clone());
    }
    if let Some(ref guidance) = report.guidance {
        lines.push(String::new());
        lines.push(guidance.clone());
    }
    lines
}

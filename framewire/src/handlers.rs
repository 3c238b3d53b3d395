use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use clap::ArgMatches;
use colored::Colorize;
use framewire_core::{
    DeploymentState, FlagStore, FrameDocuments, FrameHost, FrameId, Orchestrator,
    OrchestratorConfig, OriginPolicy, ResultsView, SessionStats, SimOptions, SimulatedFrames,
};
use framewire_fetch::{DatasetSource, FixtureSource, GraphFetcher};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::commands::DEFAULT_STATE_DIR;

pub const DATABASE_FILE: &str = "framewire.db";

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> String {
    print!("{} ", msg.bright_cyan().bold());
    let _ = io::stdout().flush();
    let mut response = String::new();
    if io::stdin().read_line(&mut response).is_err() {
        return String::new();
    }
    response.trim().to_lowercase()
}

fn fail(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "✗".red().bold(), err);
    std::process::exit(1);
}

/// Expand `~` in a user supplied state directory.
pub fn resolve_state_dir(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

pub fn database_path(state_dir: &Path) -> PathBuf {
    state_dir.join(DATABASE_FILE)
}

/// Create the state directory and database, optionally discarding an existing one.
pub fn init_state(state_dir: &Path, overwrite: bool) -> anyhow::Result<PathBuf> {
    let db_path = database_path(state_dir);
    if overwrite && FlagStore::exists(&db_path) {
        FlagStore::drop(&db_path)
            .with_context(|| format!("failed to remove {}", db_path.display()))?;
    }

    fs::create_dir_all(state_dir)
        .with_context(|| format!("failed to create {}", state_dir.display()))?;
    FlagStore::open(&db_path).with_context(|| format!("failed to open {}", db_path.display()))?;
    Ok(db_path)
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub state: DeploymentState,
    pub updated: Option<DateTime<Utc>>,
}

/// Current deployment flag, or `None` when no database exists yet.
pub fn read_status(state_dir: &Path) -> anyhow::Result<Option<StatusReport>> {
    let db_path = database_path(state_dir);
    if !FlagStore::exists(&db_path) {
        return Ok(None);
    }
    let store = FlagStore::open(&db_path)?;
    Ok(Some(StatusReport {
        state: store.read(),
        updated: store.last_updated(),
    }))
}

pub fn handle_init(args: &ArgMatches) {
    print_divider();
    println!("{}", "  FRAMEWIRE INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let raw = args
        .get_one::<String>("PATH")
        .map(String::as_str)
        .unwrap_or(DEFAULT_STATE_DIR);
    let force = args.get_flag("force");
    let state_dir = resolve_state_dir(raw);
    let db_path = database_path(&state_dir);

    println!(
        "{} Target: {}",
        "→".blue(),
        state_dir.display().to_string().bright_white()
    );
    println!();

    let mut overwrite = force;
    if FlagStore::exists(&db_path) && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("Database already exists at:");
        println!("  {} {}", "•".yellow(), db_path.display().to_string().bright_white());
        println!();
        let answer = print_prompt("Reset the deployment state? [y/N]:");
        println!();
        overwrite = answer == "y" || answer == "yes";
        if !overwrite {
            println!("{} Keeping existing database", "→".blue());
            println!();
        }
    }

    match init_state(&state_dir, overwrite) {
        Ok(path) => {
            println!(
                "{} Database ready: {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        Err(e) => fail(e),
    }

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "Run {} to open a page session.",
        "framewire run --fixture".bright_cyan()
    );
    println!();
}

pub fn handle_status(args: &ArgMatches) {
    let raw = args
        .get_one::<String>("state")
        .map(String::as_str)
        .unwrap_or(DEFAULT_STATE_DIR);
    let state_dir = resolve_state_dir(raw);

    match read_status(&state_dir) {
        Ok(None) => {
            println!(
                "{} No state at {}. Run {} first.",
                "→".yellow().bold(),
                state_dir.display(),
                "framewire init".bright_cyan()
            );
        }
        Ok(Some(report)) => {
            let label = match report.state {
                DeploymentState::Deployed => "deployed".green().bold(),
                DeploymentState::NotDeployed => "not deployed".yellow().bold(),
            };
            println!("{} Configuration: {}", "✓".green().bold(), label);
            if let Some(updated) = report.updated {
                println!(
                    "{} Last changed: {}",
                    "→".blue(),
                    updated.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
        }
        Err(e) => fail(e),
    }
}

/// Parsed arguments of the `run` subcommand.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub state_dir: PathBuf,
    pub endpoint: Url,
    pub fixture: bool,
    pub documents: Url,
    pub deploy: bool,
    pub refresh: u32,
    pub settle_ms: u64,
    pub allow_origins: Vec<String>,
    pub timeout_secs: u64,
    pub wait: Duration,
    pub quiet: bool,
}

impl RunOptions {
    pub fn from_matches(args: &ArgMatches, quiet: bool) -> anyhow::Result<Self> {
        let state = args
            .get_one::<String>("state")
            .map(String::as_str)
            .unwrap_or(DEFAULT_STATE_DIR);

        Ok(Self {
            state_dir: resolve_state_dir(state),
            endpoint: args
                .get_one::<Url>("endpoint")
                .cloned()
                .context("missing --endpoint")?,
            fixture: args.get_flag("fixture"),
            documents: args
                .get_one::<Url>("documents")
                .cloned()
                .context("missing --documents")?,
            deploy: args.get_flag("deploy"),
            refresh: args.get_one::<u32>("refresh").copied().unwrap_or(0),
            settle_ms: args.get_one::<u64>("settle-ms").copied().unwrap_or(100),
            allow_origins: args
                .get_many::<String>("allow-origin")
                .map(|values| values.cloned().collect())
                .unwrap_or_default(),
            timeout_secs: args.get_one::<u64>("timeout").copied().unwrap_or(10),
            wait: Duration::from_secs(args.get_one::<u64>("wait").copied().unwrap_or(5)),
            quiet,
        })
    }

    pub fn orchestrator_config(&self) -> anyhow::Result<OrchestratorConfig> {
        let documents = FrameDocuments::new(&self.documents)?;
        let origins = OriginPolicy::parse_list(&self.allow_origins)?;
        let settle = (self.settle_ms > 0).then(|| Duration::from_millis(self.settle_ms));

        Ok(OrchestratorConfig::new(documents)
            .with_settle_delay(settle)
            .with_origins(origins))
    }

    pub fn dataset_source(&self) -> anyhow::Result<Arc<dyn DatasetSource>> {
        if self.fixture {
            return Ok(Arc::new(FixtureSource::sample()));
        }
        let fetcher = GraphFetcher::with_timeout(self.endpoint.clone(), self.timeout_secs)?;
        Ok(Arc::new(fetcher))
    }
}

/// What a finished session left behind.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub initial: DeploymentState,
    pub routes: Vec<(FrameId, Option<Url>)>,
    pub view: ResultsView,
    pub stats: SessionStats,
    pub timed_out: bool,
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Run one page session against simulated frames.
///
/// Steps are sequential: each waits until the results frame has received the
/// deliveries it produces before the next user action is simulated.
pub async fn run_session(options: &RunOptions) -> anyhow::Result<SessionReport> {
    let config = options.orchestrator_config()?;
    let source = options.dataset_source()?;
    let deploy_control = config.deploy_control.clone();

    fs::create_dir_all(&options.state_dir)
        .with_context(|| format!("failed to create {}", options.state_dir.display()))?;
    let store = FlagStore::open(&database_path(&options.state_dir))?;
    let initial = store.read();

    let sim_options = SimOptions {
        origin: config.documents.results_origin(),
        ..SimOptions::default()
    };
    let (frames, events) = SimulatedFrames::new(sim_options);
    let frames = Arc::new(frames);
    let host: Arc<dyn FrameHost> = frames.clone();

    tracing::info!(source = %source.describe(), state = %initial, "starting page session");
    let session = tokio::spawn(Orchestrator::new(config, store, host, source).run(events));

    let progress = spinner(options.quiet);
    let mut timed_out = false;

    // Readiness null, plus the fetched payload when already deployed.
    let mut expected = if initial.is_deployed() { 2 } else { 1 };
    progress.set_message("Loading frames...");
    timed_out |= !frames.wait_for_deliveries(expected, options.wait).await;

    if options.deploy && !timed_out {
        progress.set_message("Deploying configuration...");
        if !frames
            .wait_for_binding(FrameId::Config, &deploy_control, options.wait)
            .await
        {
            frames.unload();
            progress.finish_and_clear();
            let _ = session.await;
            bail!("deploy control '{}' never became available", deploy_control);
        }
        frames.click(FrameId::Config, &deploy_control);
        expected += 2;
        timed_out |= !frames.wait_for_deliveries(expected, options.wait).await;
    }

    for round in 1..=options.refresh {
        if timed_out {
            break;
        }
        progress.set_message(format!("Refreshing ({}/{})...", round, options.refresh));
        frames.request_refresh();
        // Refresh only produces a delivery once deployed.
        if initial.is_deployed() || options.deploy {
            expected += 1;
            timed_out |= !frames.wait_for_deliveries(expected, options.wait).await;
        }
    }

    progress.finish_and_clear();
    if timed_out {
        tracing::warn!(waited = ?options.wait, "timed out waiting for results");
    }

    frames.unload();
    let stats = session.await.context("session task failed")??;

    let routes = [FrameId::Config, FrameId::Graph, FrameId::Results]
        .into_iter()
        .map(|frame| (frame, frames.current(frame)))
        .collect();

    Ok(SessionReport {
        initial,
        routes,
        view: frames.view(),
        stats,
        timed_out,
    })
}

/// Plain-text rendering of the results frame.
pub fn render_results(view: &ResultsView) -> String {
    let dataset = match view {
        ResultsView::Blank => return "no results delivered".to_string(),
        ResultsView::Loading => return "loading: no graph data yet".to_string(),
        ResultsView::Populated(dataset) => dataset,
    };

    let mut out = format!(
        "{} nodes, {} edges\n",
        dataset.nodes.len(),
        dataset.edges.len()
    );
    for node in &dataset.nodes {
        let value = node
            .value
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "  {:<12} {:<6} {}\n",
            node.id,
            node.kind.as_str(),
            value
        ));
    }
    match dataset.evaluation_order() {
        Some(order) => out.push_str(&format!("order: {}", order.join(" → "))),
        None => out.push_str("order: graph contains a cycle"),
    }
    out
}

fn print_report(report: &SessionReport) {
    println!();
    print_divider();
    println!("{}", "  PAGE SESSION".bright_white().bold());
    print_divider();
    println!();

    println!("{}", "FRAMES".bright_blue().bold());
    for (frame, url) in &report.routes {
        let url = url
            .as_ref()
            .map(Url::to_string)
            .unwrap_or_else(|| "(not routed)".to_string());
        println!("  {} {:<12} {}", "•".blue(), frame.element_id(), url.bright_white());
    }
    println!();

    println!("{}", "RESULTS".bright_blue().bold());
    for line in render_results(&report.view).lines() {
        println!("  {}", line);
    }
    println!();

    let stats = &report.stats;
    println!(
        "{} deploys: {}  refreshes: {}  fetches: {} ({} failed)  deliveries: {}",
        "→".blue(),
        stats.deploys,
        stats.refreshes,
        stats.fetches_started,
        stats.fetches_failed,
        stats.deliveries
    );
    if report.timed_out {
        println!(
            "{} Timed out waiting for the results frame",
            "⚠".yellow().bold()
        );
    }
    println!();
}

pub async fn handle_run(args: &ArgMatches, quiet: bool) {
    let options = match RunOptions::from_matches(args, quiet) {
        Ok(options) => options,
        Err(e) => fail(e),
    };

    match run_session(&options).await {
        Ok(report) => print_report(&report),
        Err(e) => fail(e),
    }
}

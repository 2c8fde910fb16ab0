use anyhow::Context;
use clap::Parser;
use sensetop::{
    app::App,
    config::AppConfig,
    data::collector::in_probe_call,
    error::StartupError,
    probes::{self, ProbeContext},
    sampler::SamplingLoop,
    tui::{self, Tui},
};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Terminal dashboard for CPU, voltage, thermal, fan and GPU sensors
#[derive(Parser, Debug)]
#[command(name = "sensetop", version, about)]
struct Cli {
    /// Config file (default: <config dir>/sensetop/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log file (default: <cache dir>/sensetop/sensetop.log)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Override the sampling interval in milliseconds
    #[arg(long)]
    sample_interval_ms: Option<u64>,

    /// Override the render interval in milliseconds
    #[arg(long)]
    render_interval_ms: Option<u64>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("fatal: {:#}", err);
            eprintln!("sensetop: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli).map_err(StartupError::Config)?;

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let ctx = ProbeContext::detect(config.blacklist.clone());
    info!(can_elevate = ctx.can_elevate, "detected probe context");
    let sampling = SamplingLoop::from_config(&config, probes::register_all(&config.probes, &ctx))?;

    let host = hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(StartupError::Runtime)?;

    install_panic_hook();
    let tui = Tui::new().map_err(StartupError::Terminal)?;

    runtime.block_on(async {
        let mut app = App::new(tui, sampling, &config, host);
        app.run().await
    })
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(ms) = cli.sample_interval_ms {
        config.sample_interval_ms = ms;
    }
    if let Some(ms) = cli.render_interval_ms {
        config.render_interval_ms = ms;
    }
    config.validate().context("invalid command line override")?;
    Ok(config)
}

/// Logs go to a file since the terminal belongs to the UI. If the file cannot
/// be opened, logging stays off.
fn init_logging(path: Option<&Path>) {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match dirs::cache_dir() {
            Some(dir) => dir.join("sensetop").join("sensetop.log"),
            None => return,
        },
    };

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let file = match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("sensetop: logging disabled, cannot open {}: {}", path.display(), err);
            return;
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        // Probe panics are caught by the aggregator; the UI keeps running.
        if in_probe_call() {
            error!("probe panicked: {}", panic_info);
            return;
        }

        tui::restore_terminal();
        error!("panic: {}", panic_info);
        eprintln!("{}", panic_info);
    }));
}

//! xramfs command-line harness.
//!
//! Mounts an engine from a TOML config and runs filesystem scripts against
//! it. Nothing persists between runs.
//!
//! Usage:
//!   xramfs run boot.script
//!   xramfs --config board.toml run boot.script --keep-going
//!   xramfs --profile constrained df
//!
//! Set `RUST_LOG=xramfs_kernel=debug` to watch slot allocation and growth.

mod script;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use xramfs_kernel::{Engine, MountConfig};

/// Preset used when no config file is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Profile {
    Ample,
    Constrained,
}

#[derive(Parser, Debug)]
#[command(name = "xramfs")]
#[command(about = "Run filesystem scripts against an in-memory xramfs mount")]
struct Args {
    /// Mount configuration (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Preset to mount with when --config is absent
    #[arg(long, value_enum, default_value_t = Profile::Ample, global = true)]
    profile: Profile,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Execute a script file ("-" reads stdin)
    Run {
        script: PathBuf,

        /// Report failing commands and continue
        #[arg(long)]
        keep_going: bool,
    },
    /// Print usage of a freshly mounted filesystem
    Df,
}

fn load_config(path: Option<&Path>, profile: Profile) -> Result<MountConfig> {
    match path {
        Some(path) => MountConfig::load(path)
            .with_context(|| format!("loading mount config {}", path.display())),
        None => Ok(match profile {
            Profile::Ample => MountConfig::ample(),
            Profile::Constrained => MountConfig::constrained(),
        }),
    }
}

fn read_script(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        return io::read_to_string(io::stdin()).context("reading script from stdin");
    }
    std::fs::read_to_string(path).with_context(|| format!("reading script {}", path.display()))
}

fn run(args: Args) -> Result<ExitCode> {
    let config = load_config(args.config.as_deref(), args.profile)?;
    let mut fs = Engine::mount(config).context("mounting")?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let code = match args.command {
        Cmd::Run { script, keep_going } => {
            let text = read_script(&script)?;
            let summary = script::run(&mut fs, &text, keep_going, &mut out)?;
            if summary.failed > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Cmd::Df => {
            script::print_statfs(&mut out, &fs.statfs())?;
            ExitCode::SUCCESS
        }
    };
    out.flush()?;
    fs.unmount();
    Ok(code)
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

//! assetcat: print assets resolved through an assetfs mount table.
//!
//! Usage:
//!   assetcat --mount shaders=path:/usr/share/foo shaders/sdr.glsl
//!   assetcat --mount data=archive:data.tar data/img/foo.jpg | display -
//!   assetcat --mount gnu=url:http://www.gnu.org/licenses/ gnu/lgpl.txt
//!
//! Later `--mount`s take priority over earlier ones. Logging goes to stderr
//! and is controlled by `RUST_LOG` (default `warn`); `ASSETFS_VERBOSE=1`
//! raises routing diagnostics to `info`.

mod mount_arg;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use assetfs_vfs::{MountTable, VfsConfig};
use mount_arg::MountArg;

/// Print assets resolved through an assetfs mount table.
#[derive(Parser, Debug)]
#[command(name = "assetcat")]
#[command(about = "Print assets from directories, tar archives and URLs")]
struct Args {
    /// Mount a source: [PREFIX=]KIND:SOURCE, KIND is path, archive or url
    #[arg(short, long = "mount", value_name = "MOUNT")]
    mounts: Vec<MountArg>,

    /// Fail as soon as a matching mount can't open a file
    #[arg(long)]
    no_fallthrough: bool,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Download worker threads (0 = one per processor)
    #[arg(long)]
    threads: Option<usize>,

    /// Download cache directory (relative paths go under the temp directory)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Assets to print, in order
    #[arg(required = true)]
    files: Vec<String>,
}

fn main() -> ExitCode {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("assetcat: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => VfsConfig::load(path)?,
        None => VfsConfig::default(),
    };
    if args.no_fallthrough {
        config.fallthrough = false;
    }
    if let Some(threads) = args.threads {
        config.remote.max_threads = threads;
    }
    if let Some(dir) = &args.cache_dir {
        config.remote.cache_dir = dir.clone();
    }

    let table = MountTable::with_config(config);
    for mount in &args.mounts {
        mount
            .mount(&table)
            .with_context(|| format!("failed to mount {mount}"))?;
    }
    tracing::debug!(mounts = ?table.list_mounts(), "mount table ready");

    let mut out = io::stdout().lock();
    for name in &args.files {
        let mut file = table
            .open(name)
            .with_context(|| format!("failed to open asset: {name}"))?;
        io::copy(&mut file, &mut out).with_context(|| format!("failed to read asset: {name}"))?;
        file.close()
            .with_context(|| format!("failed to close asset: {name}"))?;
    }
    out.flush()?;
    Ok(())
}

use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use game_bundler::bundle::{format_size, BuildReport};
use game_bundler::config::BundleConfig;
use game_bundler::runtime_blob::FetchPolicy;

#[derive(Parser)]
#[command(name = "game-bundle", version = "1.0.0")]
#[command(about = "Package a game directory into a browser-playable web build")]
struct Cli {
    /// Log every directory, file and patch
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the bundle and its bootstrap pages
    Build {
        /// Build configuration (defaults apply when the file is missing)
        #[arg(long, default_value = "bundle.toml")]
        config: PathBuf,

        /// Output directory (overrides `out_dir`)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Page title (overrides `page.title`)
        #[arg(long)]
        title: Option<String>,

        /// Never download the runtime; require the cache
        #[arg(long)]
        offline: bool,

        /// Print the build report as JSON
        #[arg(long)]
        json: bool,

        /// Rebuild whenever an included file changes
        #[arg(long)]
        watch: bool,
    },

    /// List the files that would be embedded
    Manifest {
        #[arg(long, default_value = "bundle.toml")]
        config: PathBuf,

        /// Print the manifest as JSON
        #[arg(long)]
        json: bool,
    },

    /// Serve a built output directory for local testing
    Serve {
        /// Directory to serve (default: `out_dir` from the config)
        dir: Option<PathBuf>,

        #[arg(long, default_value = "bundle.toml")]
        config: PathBuf,

        /// Server port
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "game_bundler=debug" } else { "game_bundler=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Build {
            config,
            out_dir,
            title,
            offline,
            json,
            watch,
        } => {
            let mut cfg = load_config(&config)?;
            if let Some(dir) = out_dir {
                cfg.out_dir = dir;
            }
            if let Some(title) = title {
                cfg.page.title = title;
            }
            let policy = if offline {
                FetchPolicy::Offline
            } else {
                FetchPolicy::CacheOrDownload
            };

            let report = game_bundler::bundle::build(&cfg, policy).context("build failed")?;
            print_report(&report, json)?;

            if watch {
                game_bundler::watch::watch_and_rebuild(&cfg, || {
                    match game_bundler::bundle::build(&cfg, FetchPolicy::Offline) {
                        Ok(report) => {
                            if let Err(e) = print_report(&report, json) {
                                eprintln!("error: {e:#}");
                            }
                        }
                        Err(e) => eprintln!("error: build failed: {e}"),
                    }
                })
                .map_err(|e| anyhow::anyhow!("watch failed: {e}"))?;
            }
        }

        Commands::Manifest { config, json } => {
            let cfg = load_config(&config)?;
            let manifest = cfg.collect_manifest()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&manifest)?);
            } else {
                for entry in &manifest {
                    println!("{}\t{}", entry.virtual_path, entry.source_path.display());
                }
                eprintln!("{} files", manifest.len());
            }
        }

        Commands::Serve { dir, config, port } => {
            let dir = match dir {
                Some(d) => d,
                None => load_config(&config)?.out_dir,
            };
            if !dir.is_dir() {
                anyhow::bail!("'{}' is not a directory (run `game-bundle build` first)", dir.display());
            }
            game_bundler::serve::run_preview_server(&dir, port)
                .map_err(|e| anyhow::anyhow!("preview server failed: {e}"))?;
        }
    }
    Ok(())
}

/// Load `path`, or fall back to defaults rooted at the current directory
/// when the file does not exist.
fn load_config(path: &Path) -> anyhow::Result<BundleConfig> {
    if path.exists() {
        return BundleConfig::load(path).with_context(|| format!("cannot load {}", path.display()));
    }
    tracing::info!(config = %path.display(), "config not found, using defaults");
    let mut cfg = BundleConfig::default();
    cfg.rebase(&std::env::current_dir().context("cannot read current directory")?);
    Ok(cfg)
}

fn print_report(report: &BuildReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    eprintln!(
        "embedded {} files, {} directories ({} patched)",
        report.stats.files, report.stats.directories, report.stats.patched
    );
    eprintln!(
        "wrote {} ({}, runtime {} {})",
        report.bundle_path.display(),
        format_size(report.bundle_bytes),
        format_size(report.runtime_bytes),
        if report.runtime_from_cache { "cached" } else { "downloaded" }
    );
    for page in &report.page_paths {
        eprintln!("wrote {} ({})", page.display(), format_size(report.page_bytes));
    }
    eprintln!("done in {} ms", report.elapsed_ms);
    Ok(())
}

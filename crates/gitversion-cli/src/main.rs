mod version;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use gitversion_core::cache::{write_atomic, CacheStore};
use gitversion_core::config::load_describe_options;
use gitversion_core::describe::{parse_describe_args, DescribeOptions, DescribeOverrides};
use gitversion_core::emit::{render, EmitFormat};
use gitversion_core::resolver::{Resolution, Resolver, VersionSource};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "gitversion",
    version = version::FULL,
    about = "Resolve a project version and commit sha from git tags, with a cached fallback"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve Version and CommitSha for a project or subproject directory
    Resolve(ResolveArgs),
    /// Inspect or remove the cached version record of an output directory
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
    /// Print version information
    Version,
}

#[derive(Args)]
struct ResolveArgs {
    /// Directory inside the checkout to resolve
    #[arg(long, default_value = ".")]
    source: PathBuf,
    /// Output directory owning the cached record (defaults to --source)
    #[arg(long)]
    build: Option<PathBuf>,
    /// Only consider tags matching this glob
    #[arg(long = "match", value_name = "PATTERN")]
    match_pattern: Option<String>,
    /// Consider lightweight tags as well as annotated ones
    #[arg(long)]
    tags: bool,
    /// Length of the abbreviated commit hash
    #[arg(long, value_name = "N")]
    abbrev: Option<u8>,
    /// Raw describe arguments, e.g. "--abbrev=4;--tags"
    #[arg(
        long,
        env = "GIT_VERSION_DESCRIBE_ARGS",
        value_name = "ARGS",
        allow_hyphen_values = true
    )]
    describe_args: Option<String>,
    /// Output format: kv, json or cargo
    #[arg(long, default_value = "kv", value_parser = parse_format)]
    format: EmitFormat,
    /// Write the rendered values to this file instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Print the cached record
    Show {
        #[arg(long, default_value = ".")]
        build: PathBuf,
        #[arg(long, default_value = "kv", value_parser = parse_format)]
        format: EmitFormat,
    },
    /// Remove the cached record
    Clear {
        #[arg(long, default_value = ".")]
        build: PathBuf,
    },
}

fn parse_format(value: &str) -> std::result::Result<EmitFormat, String> {
    EmitFormat::parse(value)
        .ok_or_else(|| format!("unknown format '{value}' (expected kv, json or cargo)"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Some(Command::Resolve(args)) => run_resolve(args),
        Some(Command::Cache { command }) => run_cache(command),
        Some(Command::Version) => {
            println!("gitversion {}", version::FULL);
            println!("commit {}", version::COMMIT_SHA);
            Ok(())
        }
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn run_resolve(args: ResolveArgs) -> Result<()> {
    let build = args.build.clone().unwrap_or_else(|| args.source.clone());
    let options = describe_options(&args)?;
    debug!(?options, "effective describe options");
    let resolution = Resolver::new()
        .resolve(&args.source, &build, &options)
        .with_context(|| format!("resolve version for {}", args.source.display()))?;
    emit(&resolution, args.format, args.output.as_deref())
}

/// Defaults, then `.gitversion.toml`, then raw describe args, then explicit flags.
fn describe_options(args: &ResolveArgs) -> Result<DescribeOptions> {
    let mut options = load_describe_options(&args.source)?;
    if let Some(raw) = &args.describe_args {
        let overrides = parse_describe_args(raw)
            .with_context(|| format!("parse describe arguments {raw:?}"))?;
        options = options.with_overrides(&overrides);
    }
    Ok(options.with_overrides(&DescribeOverrides {
        match_pattern: args.match_pattern.clone(),
        include_lightweight_tags: args.tags.then_some(true),
        abbreviation_length: args.abbrev,
    }))
}

fn run_cache(command: CacheCommand) -> Result<()> {
    match command {
        CacheCommand::Show { build, format } => {
            let store = CacheStore::new(&build);
            let resolved = store.load()?.ok_or_else(|| {
                anyhow!("no usable cached version at {}", store.path().display())
            })?;
            let resolution = Resolution {
                resolved,
                source: VersionSource::Cache,
            };
            emit(&resolution, format, None)
        }
        CacheCommand::Clear { build } => {
            let store = CacheStore::new(&build);
            if store.clear()? {
                println!("removed {}", store.path().display());
            } else {
                println!("no cached version at {}", store.path().display());
            }
            Ok(())
        }
    }
}

fn emit(resolution: &Resolution, format: EmitFormat, output: Option<&Path>) -> Result<()> {
    let rendered = render(resolution, format)?;
    match output {
        Some(path) => {
            write_atomic(path, rendered.as_bytes())
                .with_context(|| format!("write {}", path.display()))?;
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

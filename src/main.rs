use anyhow::Result;
use clap::Parser;
use std::io;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

use pkg_imports::{CollectOptions, GoContext, GoResolver, ImportsExecutor, OutputFormat};

/// Print the name, directory and imports of Go packages.
#[derive(Parser, Debug)]
#[command(name = "pkg-imports", version)]
struct Cli {
    /// Directories or import paths to inspect (default: current directory)
    paths: Vec<String>,

    /// Walk each path and report every directory containing source files
    #[arg(short = 'r', long = "walk", visible_alias = "recursive")]
    walk: bool,

    /// Treat arguments strictly as directories and omit the ImportPath line
    #[arg(long)]
    literal: bool,

    /// Emit one JSON object per package instead of text blocks
    #[arg(long)]
    json: bool,

    /// File extension marking a source file during the walk
    #[arg(long, value_name = "EXT", default_value = "go")]
    ext: String,

    /// Extra build tags considered satisfied (comma separated)
    #[arg(long, value_delimiter = ',')]
    tags: Vec<String>,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "pkg_imports=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let options = CollectOptions::default()
        .with_recursive(cli.walk)
        .with_identifier_lookup(!cli.literal)
        .with_source_extension(cli.ext);
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text {
            show_import_path: !cli.literal,
        }
    };
    let resolver = GoResolver::new(GoContext::from_env().with_build_tags(cli.tags));

    let executor = ImportsExecutor::new(options, format);
    executor.execute(&cli.paths, &resolver, io::stdout().lock())?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

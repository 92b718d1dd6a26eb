//! `docnorm` - normalize one document from the command line

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use document_normalizer::{AnyDocument, BridgeOptions, DocumentError, DocumentServices, supported_formats};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "docnorm", version, about = "Normalize DocBook and RTF documents into HTML")]
struct Cli {
    #[command(flatten)]
    bridge: BridgeArgs,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Overrides for the `DOCNORM_*` environment
#[derive(Args, Debug)]
struct BridgeArgs {
    /// Converter executable
    #[arg(long, global = true, value_name = "PATH")]
    converter: Option<PathBuf>,

    /// Converter memory ceiling in MB (0 disables it)
    #[arg(long, global = true, value_name = "MB")]
    memory_limit: Option<u64>,

    /// Conversion timeout in seconds (0 waits indefinitely)
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Language used when detection has nothing to work with
    #[arg(long, global = true, value_name = "TAG")]
    default_language: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the canonical HTML
    Html { path: PathBuf },
    /// Print metadata as JSON
    Metadata { path: PathBuf },
    /// Print the resolved language tag
    Language { path: PathBuf },
    /// Print full-text segments as JSON
    Segments { path: PathBuf },
    /// List supported formats and their file patterns
    Formats,
}

impl BridgeArgs {
    fn apply(&self, mut options: BridgeOptions) -> BridgeOptions {
        if let Some(path) = &self.converter {
            options.executable = Some(path.clone());
        }
        if let Some(limit) = self.memory_limit {
            options.memory_limit_mb = limit;
        }
        if let Some(secs) = self.timeout {
            options.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(lang) = &self.default_language {
            options.default_language = lang.clone();
        }
        options
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let path = match &cli.command {
        Command::Formats => {
            for (format, patterns) in supported_formats() {
                writeln!(out, "{format}\t{}", patterns.join(" "))?;
            }
            return Ok(());
        }
        Command::Html { path }
        | Command::Metadata { path }
        | Command::Language { path }
        | Command::Segments { path } => path,
    };

    let services = DocumentServices::from_options(cli.bridge.apply(BridgeOptions::from_env()));
    let doc = AnyDocument::open(path, &services)
        .with_context(|| format!("failed to open {}", path.display()))?;

    match &cli.command {
        Command::Html { .. } => {
            let html = doc.get_html().context("conversion to HTML failed")?;
            out.write_all(html.as_bytes())?;
        }
        Command::Metadata { .. } => {
            serde_json::to_writer_pretty(&mut out, doc.metadata())?;
            writeln!(out)?;
        }
        Command::Language { .. } => {
            writeln!(out, "{}", doc.language())?;
        }
        Command::Segments { .. } => {
            let segments = doc.parse_html().context("full-text extraction failed")?;
            serde_json::to_writer_pretty(&mut out, &segments)?;
            writeln!(out)?;
        }
        Command::Formats => {}
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("docnorm: {err:#}");
            let code = err
                .downcast_ref::<DocumentError>()
                .map_or(1, DocumentError::code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

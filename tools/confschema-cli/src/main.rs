// confschema command line tool
//
// Loads framework configuration files in precedence order, normalizes their
// `framework` sections and prints the result or every validation error.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use confschema::{framework, section, Normalizer, NormalizerConfig, SourceLoader};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "confschema", version, about = "Normalize and validate framework configuration")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the normalized configuration
    Normalize {
        #[command(flatten)]
        sources: SourceArgs,

        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },
    /// Only report whether the configuration is valid
    Check {
        #[command(flatten)]
        sources: SourceArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Configuration files, lowest precedence first
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Use debug-kernel defaults
    #[arg(long)]
    debug: bool,

    /// Overlay environment variables with this prefix (e.g. APP_)
    #[arg(long)]
    env_prefix: Option<String>,

    /// Drop unknown keys instead of rejecting them
    #[arg(long)]
    allow_unknown: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Command) -> anyhow::Result<ExitCode> {
    let (args, format) = match command {
        Command::Normalize { sources, format } => (sources, Some(format)),
        Command::Check { sources } => (sources, None),
    };

    let schema = framework::configuration(args.debug)
        .context("building the framework configuration tree")?;

    let mut loader = SourceLoader::new();
    if let Some(prefix) = &args.env_prefix {
        loader = loader.with_env_prefix(prefix);
    }
    let documents = loader
        .load_all(args.files.as_slice())
        .context("loading configuration sources")?;
    let sources: Vec<Value> = documents
        .iter()
        .filter_map(|document| section(document, framework::ROOT))
        .collect();
    info!(files = args.files.len(), sections = sources.len(), "processing configuration");

    let normalizer = Normalizer::with_config(NormalizerConfig {
        allow_unknown_fields: args.allow_unknown,
        ..NormalizerConfig::default()
    });

    match normalizer.process(&schema, &sources) {
        Ok(config) => {
            match format {
                Some(OutputFormat::Json) => println!("{}", config.to_json_pretty()?),
                Some(OutputFormat::Yaml) => print!("{}", config.to_yaml()?),
                None => println!("OK"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            for error in err.errors() {
                eprintln!("{}", error);
                let info = error
                    .path()
                    .and_then(|path| schema.node_at(path))
                    .and_then(|node| node.info.as_deref());
                if let Some(info) = info {
                    eprintln!("  hint: {}", info);
                }
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

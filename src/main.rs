use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use gremlin_translator::{config, gremlin_ast::Traversal, query_planner, ToSql};
use log::{debug, info};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    /// The query block tree as JSON
    Json,
    /// Rendered SQL-like text
    Sql,
}

/// Gremlin translator - compiles a traversal (JSON step descriptors) into a relational query block
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Traversal JSON file; reads stdin when omitted or `-`
    #[arg(long)]
    input: Option<PathBuf>,

    /// YAML compiler configuration, applied over environment variables
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Sql)]
    format: OutputFormat,

    /// Emit every expansion as a table-valued call instead of MATCH fragments
    #[arg(long)]
    no_match_paths: bool,

    /// Iteration cap for unbounded repeat loops
    #[arg(long)]
    max_repeat_depth: Option<u32>,
}

impl From<&Cli> for config::CliConfig {
    fn from(cli: &Cli) -> Self {
        config::CliConfig {
            max_repeat_depth: cli.max_repeat_depth,
            no_match_paths: cli.no_match_paths,
        }
    }
}

fn read_input(path: Option<&PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(p) if p.as_os_str() != "-" => std::fs::read_to_string(p)
            .with_context(|| format!("failed to read traversal from {}", p.display())),
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read traversal from stdin")?;
            Ok(buf)
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<config::CompilerConfig> {
    let mut compiler_config = config::CompilerConfig::from_env()?;
    if let Some(path) = &cli.config {
        let overlay = config::ConfigOverlay::from_yaml_file(path)
            .with_context(|| format!("invalid configuration file {}", path.display()))?;
        compiler_config
            .merge(overlay)
            .with_context(|| format!("invalid configuration file {}", path.display()))?;
    }
    Ok(compiler_config.with_cli_overrides(cli.into())?)
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    // Initialize logger - defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let compiler_config = load_config(&cli)?;
    debug!("compiler configuration: {:?}", compiler_config);

    let raw = read_input(cli.input.as_ref())?;
    let traversal: Traversal =
        serde_json::from_str(&raw).context("input is not a valid traversal")?;
    info!("compiling traversal of {} steps", traversal.steps.len());

    let block = query_planner::compile_traversal(&traversal, &compiler_config)?;
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&block)?),
        OutputFormat::Sql => println!("{}", block.to_sql()),
    }
    Ok(())
}

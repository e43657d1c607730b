//! `quill`: inspect provider resolution, syntax checks and build policy

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use quill_providers::{BuildConfig, ModelRole, PlanSettings, ProviderResolver};
use quill_syntax::{SyntaxCheck, SyntaxParser, SyntaxValidator, TreeSitterValidator};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Plan-build developer tool")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the ranked providers of a role
    Resolve {
        /// Plan settings (TOML)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Role of the model pack to resolve
        #[arg(short, long, value_enum, default_value = "builder")]
        role: RoleArg,
    },

    /// Syntax-check a file
    Check {
        /// File to check
        file: PathBuf,

        /// Timeout in milliseconds (default: build policy)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Print the effective build policy
    Config {
        /// Build policy overrides (TOML)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Builder,
    WholeFileBuilder,
    PlanSummary,
}

impl From<RoleArg> for ModelRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Builder => ModelRole::Builder,
            RoleArg::WholeFileBuilder => ModelRole::WholeFileBuilder,
            RoleArg::PlanSummary => ModelRole::PlanSummary,
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run_resolve(settings: Option<PathBuf>, role: ModelRole) -> Result<()> {
    let settings = match settings {
        Some(path) => PlanSettings::load(&path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => PlanSettings::default(),
    };
    let Some(config) = settings.model_pack.role(role) else {
        bail!("model pack has no {role} role");
    };

    let options = ProviderResolver::builtin().resolve(config, Some(&settings));
    if options.is_empty() {
        bail!("no provider can serve {} ({})", role, config.model_id);
    }

    println!("{} {} via pack {}", role, config.model_id, settings.model_pack.name);
    for (composite, option) in options.ranked() {
        let publishers: Vec<_> = option.publishers.iter().map(ToString::to_string).collect();
        println!(
            "  {:>2}  {:<24} {:<36} [{}]",
            option.priority,
            composite.to_string(),
            option.config.base_url,
            publishers.join(", ")
        );
    }

    let missing = options.missing_credentials(|var| std::env::var_os(var).is_some());
    if !missing.is_empty() {
        let missing: Vec<_> = missing.into_iter().collect();
        println!("missing credentials: {}", missing.join(", "));
    }
    Ok(())
}

async fn run_check(file: PathBuf, timeout_ms: Option<u64>) -> Result<()> {
    let Some(parser) = SyntaxParser::for_path(&file)? else {
        println!("{}: no grammar for this file type", file.display());
        return Ok(());
    };
    let content = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let timeout = timeout_ms.map_or_else(
        || BuildConfig::default().syntax_check_timeout(),
        std::time::Duration::from_millis,
    );

    match TreeSitterValidator::new().check(&parser, &content, timeout).await {
        SyntaxCheck::Valid => {
            println!("{}: valid {}", file.display(), parser.language());
            Ok(())
        }
        check => {
            print!("{}: {}", file.display(), check.feedback().unwrap_or_default());
            bail!("syntax check failed")
        }
    }
}

fn run_config(file: Option<PathBuf>) -> Result<()> {
    let config = match file {
        Some(path) => BuildConfig::load(&path)
            .with_context(|| format!("loading build policy from {}", path.display()))?,
        None => BuildConfig::default(),
    };
    println!("{}", serde_json::to_string_pretty(&config)?);
    println!("whole-file retries: {}", config.max_whole_file_retries());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Resolve { settings, role } => run_resolve(settings, role.into()),
        Commands::Check { file, timeout_ms } => run_check(file, timeout_ms).await,
        Commands::Config { file } => run_config(file),
    }
}

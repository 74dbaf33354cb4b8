//! reqsuite CLI - Run declarative HTTP endpoint test suites

mod discover;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use reqsuite_core::plan::validate_config;
use reqsuite_core::{Config, ParseOptions, Registry, generate_schema};
use reqsuite_runner::Runner;

/// Exit code for tool errors (config, client, no tests).
const TOOL_ERROR: u8 = 3;

#[derive(Parser)]
#[command(name = "reqsuite")]
#[command(about = "Run declarative HTTP endpoint test suites")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Verbose logging (debug level; RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run test suites
    Run(RunArgs),

    /// Initialize config file
    Init,

    /// Export JSON Schema for test documents
    Schema,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Test directories (default: `tests` from config)
    dirs: Vec<PathBuf>,

    /// Config file (default: .reqsuite.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL for tests without `request.base`
    #[arg(long)]
    base_url: Option<String>,

    /// Maximum tests executing at once
    #[arg(short = 'j', long)]
    max_concurrent_tests: Option<usize>,

    /// HTTP client timeout in seconds
    #[arg(long)]
    http_timeout: Option<u64>,

    /// Only run these groups (repeatable)
    #[arg(short, long = "group")]
    groups: Vec<String>,

    /// Never run these groups (repeatable)
    #[arg(long = "ignore-group")]
    ignore_groups: Vec<String>,

    /// Skip the rest of a group once one of its tests fails
    #[arg(long)]
    ignore_group_on_failure: bool,

    /// Skip all remaining tests once any test fails
    #[arg(long)]
    ignore_all_on_failure: bool,

    /// Show the execution plan without sending requests
    #[arg(long)]
    dry_run: bool,

    /// Show sensitive header values in failure output
    #[arg(long)]
    no_mask: bool,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(TOOL_ERROR)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<u8> {
    match cli.command {
        Commands::Run(args) => run_tests(args, cli.output),

        Commands::Init => {
            let config_path = ".reqsuite.toml";
            if Path::new(config_path).exists() {
                eprintln!("{config_path} already exists");
                return Ok(1);
            }

            std::fs::write(config_path, Config::example())?;
            println!("Created {config_path}");
            println!("\nEdit the file to configure:");
            println!("  - base_url: server to test");
            println!("  - tests: directories holding test documents");
            println!("  - max_concurrent_tests, http_timeout_secs");
            println!("  - groups / ignore_groups and failure policies");
            Ok(0)
        }

        Commands::Schema => {
            println!("{}", generate_schema());
            Ok(0)
        }
    }
}

/// Load config and apply command-line overrides.
fn resolve_config(args: &RunArgs) -> Result<Config> {
    let mut cfg = if let Some(path) = &args.config {
        Config::load(path)?
    } else {
        Config::load_default()?
    };

    if !args.dirs.is_empty() {
        cfg.tests.clone_from(&args.dirs);
    }
    if let Some(base_url) = &args.base_url {
        cfg.base_url.clone_from(base_url);
    }
    if let Some(max) = args.max_concurrent_tests {
        cfg.max_concurrent_tests = max;
    }
    if let Some(timeout) = args.http_timeout {
        cfg.http_timeout_secs = timeout;
    }
    if !args.groups.is_empty() {
        cfg.groups.clone_from(&args.groups);
    }
    if !args.ignore_groups.is_empty() {
        cfg.ignore_groups.clone_from(&args.ignore_groups);
    }
    cfg.ignore_group_on_failure |= args.ignore_group_on_failure;
    cfg.ignore_all_on_failure |= args.ignore_all_on_failure;
    Ok(cfg)
}

fn run_tests(args: RunArgs, output: OutputFormat) -> Result<u8> {
    let cfg = resolve_config(&args)?;

    let registry = Registry::with_builtin_hooks();
    let options = ParseOptions {
        base_url: &cfg.base_url,
        registry: &registry,
    };

    // Dry run: show plan and exit
    if args.dry_run {
        let mut validations = validate_config(&cfg);
        let existing: Vec<PathBuf> = cfg.tests.iter().filter(|d| d.is_dir()).cloned().collect();
        let loaded = discover::load_tests(&existing, &options)?;
        let runner = Runner::from_config(&cfg)?;

        let mut plan = runner.plan(&loaded.tests);
        for (path, error) in &loaded.rejected {
            validations.push(reqsuite_core::Validation {
                check: "test_file".into(),
                status: reqsuite_core::ValidationStatus::Error,
                message: format!("{}: {error}", path.display()),
            });
        }
        plan.validations = validations;

        match output {
            OutputFormat::Terminal => println!("{}", plan.to_terminal()),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
            OutputFormat::Silent => {}
        }
        return Ok(u8::from(plan.has_errors()));
    }

    let loaded = discover::load_tests(&cfg.tests, &options)?;
    if loaded.tests.is_empty() {
        eprintln!(
            "Error: no tests found in {}",
            cfg.tests
                .iter()
                .map(|d| d.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        return Ok(TOOL_ERROR);
    }

    let runner = Runner::from_config(&cfg)
        .context("cannot build HTTP client")?
        .with_mask_headers(!args.no_mask);

    let started = Instant::now();
    let summary = runner.run_all(loaded.tests, None);
    let duration_secs = started.elapsed().as_secs_f64();

    match output {
        OutputFormat::Terminal => {
            println!("{}", summary.to_terminal());
            if !loaded.rejected.is_empty() {
                println!("\nInvalid test files ({}):", loaded.rejected.len());
                for (path, error) in &loaded.rejected {
                    println!("  {}: {error}", path.display());
                }
            }
            let icon = if summary.totals.is_success() { "PASS" } else { "FAIL" };
            println!("\n{icon} in {duration_secs:.2}s");
        }
        OutputFormat::Json => {
            let json_output = serde_json::json!({
                "summary": summary,
                "invalid_files": loaded
                    .rejected
                    .iter()
                    .map(|(path, error)| serde_json::json!({
                        "file": path.display().to_string(),
                        "error": error,
                    }))
                    .collect::<Vec<_>>(),
                "duration_secs": duration_secs,
            });
            println!("{}", serde_json::to_string_pretty(&json_output)?);
        }
        OutputFormat::Silent => {}
    }

    Ok(u8::from(!summary.totals.is_success()))
}

//! PlanTopo CLI entry point.
//!
//! This binary provides the command-line interface for PlanTopo.

use clap::Parser;
use plantopo::cli::{AuditArgs, Cli, Commands, GraphArgs, ImportArgs};
use plantopo::error::ErrorCollector;
use plantopo::reporter::{Report, Reporter};
use plantopo::{AuditStatus, Config, Importer, Plan, PlanTopoError, Topology, TopologyFile, TopologySource};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");

            eprintln!("Error: {e}");

            let mut source = e.source();
            if source.is_some() {
                eprintln!("\nCaused by:");
                let mut i = 0;
                while let Some(cause) = source {
                    eprintln!("  {i}: {cause}");
                    source = cause.source();
                    i += 1;
                }
            }

            let backtrace = e.backtrace();
            if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
                eprintln!("\nStack backtrace:");
                for line in backtrace.to_string().lines().filter(|l| l.contains("plantopo")) {
                    eprintln!("{line}");
                }
            }

            let code = e
                .downcast_ref::<PlanTopoError>()
                .map_or(1, PlanTopoError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        // RUST_LOG wins over -v
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = match verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            };
            EnvFilter::new(format!("warn,plantopo={level}"))
        })
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    tracing::debug!("Loading configuration");
    let mut config = Config::discover(cli.config.as_deref(), Path::new("."))?;

    match cli.command {
        Commands::Import(args) => {
            config.merge_cli_args(&args);
            run_import(config, args).await
        }
        Commands::Audit(args) => run_audit(config, &args),
        Commands::Graph(args) => run_graph(config, &args),

        Commands::Init => {
            let config_path = Path::new("plantopo.yaml");
            if config_path.exists() {
                anyhow::bail!("Configuration file already exists: {}", config_path.display());
            }
            std::fs::write(config_path, Config::example_yaml())?;
            println!("Created example configuration: plantopo.yaml");
            Ok(ExitCode::from(0))
        }

        Commands::Validate(args) => match Config::from_path(&args.config) {
            Ok(_) => {
                println!("Configuration is valid: {}", args.config.display());
                Ok(ExitCode::from(0))
            }
            Err(e) => {
                eprintln!("Configuration error: {e}");
                Ok(ExitCode::from(1))
            }
        },
    }
}

async fn run_import(config: Config, args: ImportArgs) -> anyhow::Result<ExitCode> {
    let files = plantopo::plan::find_plans(&args.paths, args.max_depth)?;
    if files.is_empty() {
        anyhow::bail!("No plan files found");
    }

    let plans = load_plans(&files, args.continue_on_error)?;
    if plans.is_empty() {
        anyhow::bail!("None of the {} plan files could be loaded", files.len());
    }

    let existing = match &args.existing {
        Some(path) => TopologyFile::new(path).snapshot()?,
        None => Topology::default(),
    };

    let importer = Arc::new(Importer::new(config)?);
    let chained = args.topology_out.is_some();

    // Plans are independent unless their merged topology is kept.
    let worker = Arc::clone(&importer);
    let results = tokio::task::spawn_blocking(move || {
        if chained {
            worker.import_chain(&plans, &existing)
        } else {
            worker.import_batch(&plans, &existing)
        }
    })
    .await?;

    let reports: Vec<Report<'_>> = results.iter().map(Report::for_import).collect();
    let rendered = Reporter::new(importer.config()).generate_all(&reports, args.format)?;
    emit(&rendered, args.output.as_deref())?;

    if let (Some(path), Some(last)) = (&args.topology_out, results.last()) {
        TopologyFile::new(path).save(&last.topology)?;
    }

    let statuses: Vec<AuditStatus> = results.iter().map(|r| r.report.status).collect();
    Ok(exit_code(&statuses, args.strict))
}

fn run_audit(config: Config, args: &AuditArgs) -> anyhow::Result<ExitCode> {
    let topology = TopologyFile::new(&args.topology).snapshot()?;
    let importer = Importer::new(config)?;
    let audit = importer.audit(&topology);

    let source = args.topology.display().to_string();
    let report = Report::audit_only(&source, &audit);
    let rendered = Reporter::new(importer.config()).generate(&report, args.format)?;
    emit(&rendered, args.output.as_deref())?;

    Ok(exit_code(&[audit.status], args.strict))
}

fn run_graph(config: Config, args: &GraphArgs) -> anyhow::Result<ExitCode> {
    let plan = Plan::from_path(&args.plan)?;
    let importer = Importer::new(config)?;
    let result = importer.import(&args.plan.display().to_string(), &plan, &Topology::default());

    let graph_output = plantopo::graph::export_graph(&result.topology, args.format)?;
    emit(&graph_output, args.output.as_deref())?;
    Ok(ExitCode::from(0))
}

/// Load every plan, stopping at the first failure unless `keep_going`.
fn load_plans(files: &[PathBuf], keep_going: bool) -> anyhow::Result<Vec<(String, Plan)>> {
    let mut plans = Vec::with_capacity(files.len());
    let mut errors = ErrorCollector::new();

    for file in files {
        match Plan::from_path(file) {
            Ok(plan) => plans.push((file.display().to_string(), plan)),
            Err(e) if keep_going && e.is_recoverable() => {
                tracing::warn!(path = %file.display(), error = %e, "Skipping plan");
                errors.add(e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    if !errors.is_empty() {
        tracing::warn!(failed = errors.count(), loaded = plans.len(), "Some plans could not be loaded");
        if plans.is_empty() {
            errors.into_result()?;
        }
    }
    Ok(plans)
}

fn emit(content: &str, output: Option<&Path>) -> anyhow::Result<()> {
    if let Some(path) = output {
        std::fs::write(path, content)?;
        tracing::info!(path = %path.display(), "Report written");
    } else {
        println!("{content}");
    }
    Ok(())
}

fn exit_code(statuses: &[AuditStatus], strict: bool) -> ExitCode {
    if statuses.contains(&AuditStatus::Fail) {
        ExitCode::from(2)
    } else if strict && statuses.contains(&AuditStatus::Warning) {
        ExitCode::from(1)
    } else {
        ExitCode::from(0)
    }
}

//! SymForge CLI - Symbol Library Compiler
//!
//! Commands: validate, generate, templates
//! Reports go to stdout, logs to stderr
//! Returns non-zero when any error diagnostic or generation failure occurs

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use symforge_core::{
    DefinitionSet, FootprintDirectory, FootprintSource, GenerationPipeline, GlobalConfig,
    TemplateRegistry, Validator, YamlLibraryWriter,
};

#[derive(Parser)]
#[command(name = "symforge-cli")]
#[command(about = "SymForge CLI - Symbol Library Compiler", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate component definitions
    Validate {
        /// Directory of library definition files
        #[arg(short, long, default_value = "symbols")]
        sources: PathBuf,

        /// Base symbol template file
        #[arg(short, long, default_value = "7Sigma_Base.yaml")]
        templates: PathBuf,

        /// Footprint library directory
        #[arg(short, long, default_value = "7Sigma.pretty")]
        footprints: PathBuf,

        /// Global validation config
        #[arg(short, long, default_value = "tests/test_config.yaml")]
        config: PathBuf,

        /// Also write the report as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Only print errors and warnings
        #[arg(short, long)]
        quiet: bool,
    },

    /// Generate derived symbol libraries
    Generate {
        #[arg(short, long, default_value = "symbols")]
        sources: PathBuf,

        #[arg(short, long, default_value = "7Sigma_Base.yaml")]
        templates: PathBuf,

        /// Output directory for generated libraries
        #[arg(short, long, default_value = "generated")]
        output: PathBuf,

        /// Footprint library directory, reported in the summary
        #[arg(short, long)]
        footprints: Option<PathBuf>,
    },

    /// List available base templates
    Templates {
        #[arg(short, long, default_value = "7Sigma_Base.yaml")]
        templates: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

fn load_registry(path: &Path) -> Result<TemplateRegistry, ExitCode> {
    TemplateRegistry::load_from_file(path).map_err(|e| {
        eprintln!("Failed to load templates: {}", e);
        ExitCode::FAILURE
    })
}

fn load_definitions(dir: &Path) -> Result<DefinitionSet, ExitCode> {
    DefinitionSet::load_from_dir(dir).map_err(|e| {
        eprintln!("Failed to load definitions: {}", e);
        ExitCode::FAILURE
    })
}

fn run_validate(
    sources: &Path,
    templates: &Path,
    footprints: &Path,
    config: &Path,
    json: Option<&Path>,
    quiet: bool,
) -> Result<ExitCode, ExitCode> {
    let config = GlobalConfig::load(config).map_err(|e| {
        eprintln!("Failed to load config: {}", e);
        ExitCode::FAILURE
    })?;
    let registry = load_registry(templates)?;
    let definitions = load_definitions(sources)?;
    let footprints = FootprintDirectory::scan(footprints).map_err(|e| {
        eprintln!("Failed to scan footprints: {}", e);
        ExitCode::FAILURE
    })?;

    let report = Validator::new().validate_all(&definitions, &registry, &footprints, &config);

    if quiet {
        for d in &report.diagnostics {
            println!("{:?}: {} ({})", d.severity, d.message, d.location());
        }
    } else {
        print!("{}", report.render_text());
    }

    if let Some(path) = json {
        let content = serde_json::to_string_pretty(&report.to_export_json()).map_err(|e| {
            eprintln!("Failed to serialize report: {}", e);
            ExitCode::FAILURE
        })?;
        fs::write(path, content).map_err(|e| {
            eprintln!("Failed to write {}: {}", path.display(), e);
            ExitCode::FAILURE
        })?;
    }

    Ok(if report.passed { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Footprints available for the summary. An unreadable directory counts as none.
fn count_footprints(dir: Option<&Path>) -> usize {
    match dir.map(FootprintDirectory::scan) {
        Some(Ok(found)) => found.available().len(),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "could not scan footprints, reporting 0");
            0
        }
        None => 0,
    }
}

fn run_generate(
    sources: &Path,
    templates: &Path,
    output: &Path,
    footprints: Option<&Path>,
) -> Result<ExitCode, ExitCode> {
    let registry = load_registry(templates)?;
    let definitions = load_definitions(sources)?;
    let pipeline = GenerationPipeline::new(registry);

    let mut writer = YamlLibraryWriter::new(output);
    let summary = pipeline.generate_all(&definitions, &mut writer).map_err(|e| {
        eprintln!("Generation failed: {}", e);
        ExitCode::FAILURE
    })?;

    let footprint_count = count_footprints(footprints);

    print_json(&serde_json::json!({
        "success": summary.succeeded(),
        "libraries_written": summary.libraries_written,
        "components_generated": summary.components_generated,
        "footprints_available": footprint_count,
        "failures": summary.failures,
        "skipped": summary.skipped,
    }));

    Ok(if summary.succeeded() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Validate {
            sources,
            templates,
            footprints,
            config,
            json,
            quiet,
        } => run_validate(&sources, &templates, &footprints, &config, json.as_deref(), quiet),

        Commands::Generate {
            sources,
            templates,
            output,
            footprints,
        } => run_generate(&sources, &templates, &output, footprints.as_deref()),

        Commands::Templates { templates } => load_registry(&templates).map(|registry| {
            let names: Vec<_> = registry
                .list()
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "units": t.units.len(),
                        "fields": t.fields.len(),
                    })
                })
                .collect();
            print_json(&serde_json::Value::Array(names));
            ExitCode::SUCCESS
        }),
    };

    result.unwrap_or_else(|code| code)
}

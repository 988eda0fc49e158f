//! Cubist CLI - compile cube and view definitions
//!
//! Usage:
//!   cubist validate <files...>
//!   cubist compile <files...> [--format text|json]
//!   cubist meta <files...>
//!   cubist join <files...> --cube <Cube> [--cube <Cube.Path> ...]
//!   cubist sql <files...> <Cube.member>
//!
//! Examples:
//!   cubist validate model/orders.json model/users.json
//!   cubist join model/*.json --cube Orders --cube Users
//!   cubist sql model/*.json Orders.total_amount

use clap::{Parser, Subcommand, ValueEnum};
use cubist::compile::{compile, CompileOptions, CompiledSchema};
use cubist::config::Settings;
use cubist::model::{cubes_from_json, CubeDefinition, RefPath};
use cubist::semantic::symbols::InlineSqlResolver;
use cubist::semantic::JoinHint;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cubist")]
#[command(about = "Cubist - compile semantic cube and view definitions")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to CUBIST_CONFIG, ./cubist.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log compile phases and join building
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Keep going when the model has errors
    #[arg(long, global = true)]
    omit_errors: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check definitions and report errors and warnings
    Validate {
        /// JSON files with one cube or an array of cubes
        files: Vec<PathBuf>,
    },

    /// Compile definitions and print a summary or the evaluated model
    Compile {
        files: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print client-facing metadata as JSON
    Meta { files: Vec<PathBuf> },

    /// Build the join tree for a set of cubes
    Join {
        files: Vec<PathBuf>,

        /// Cube to join, or a dotted path of cubes (repeatable)
        #[arg(long = "cube", required = true)]
        cubes: Vec<String>,
    },

    /// Expand a member's SQL with all references inlined
    Sql {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Member path, `Cube.member`
        member: String,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable summary
    Text,
    /// Evaluated cubes and views as JSON
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = match load_options(cli.config.as_ref()) {
        Ok(options) => {
            let omit_errors = options.omit_errors || cli.omit_errors;
            options.with_omit_errors(omit_errors)
        }
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Validate { files } => cmd_validate(&files, options.with_omit_errors(true)),
        Commands::Compile { files, format } => cmd_compile(&files, options, format),
        Commands::Meta { files } => cmd_meta(&files, options),
        Commands::Join { files, cubes } => cmd_join(&files, options, &cubes),
        Commands::Sql { files, member } => cmd_sql(&files, options, &member),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "cubist=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn load_options(config: Option<&PathBuf>) -> Result<CompileOptions, String> {
    let settings = match config {
        Some(path) => Settings::from_file(path).and_then(|mut s| {
            s.apply_env_overrides()?;
            Ok(s)
        }),
        None => Settings::load(),
    };
    settings
        .map(|s| CompileOptions::from_settings(&s))
        .map_err(|e| format!("Error loading settings: {}", e))
}

fn read_definitions(files: &[PathBuf]) -> Result<Vec<CubeDefinition>, String> {
    let mut cubes = Vec::new();
    for file in files {
        let source = fs::read_to_string(file)
            .map_err(|e| format!("Error reading file '{}': {}", file.display(), e))?;
        let name = file.display().to_string();
        let parsed = cubes_from_json(&source, &name)
            .map_err(|e| format!("Error parsing '{}': {}", file.display(), e))?;
        cubes.extend(parsed);
    }
    Ok(cubes)
}

/// Read and compile, printing warnings; `None` when anything failed.
fn load_schema(files: &[PathBuf], options: CompileOptions) -> Option<CompiledSchema> {
    if files.is_empty() {
        eprintln!("No definition files given");
        return None;
    }

    let cubes = match read_definitions(files) {
        Ok(cubes) => cubes,
        Err(message) => {
            eprintln!("{}", message);
            return None;
        }
    };

    match compile(&cubes, options) {
        Ok(schema) => {
            for warning in schema.report.warnings() {
                eprintln!("warning: {}", warning.rendered());
            }
            Some(schema)
        }
        Err(e) => {
            for warning in e.warnings() {
                eprintln!("warning: {}", warning.rendered());
            }
            eprintln!("{}", e);
            None
        }
    }
}

fn cmd_validate(files: &[PathBuf], options: CompileOptions) -> ExitCode {
    let Some(schema) = load_schema(files, options) else {
        return ExitCode::FAILURE;
    };

    for error in schema.report.errors() {
        eprintln!("error: {}", error.rendered());
    }
    if schema.report.has_errors() {
        eprintln!("{} errors", schema.report.errors().len());
        return ExitCode::FAILURE;
    }

    let (views, cubes): (Vec<_>, Vec<_>) = schema.symbols.cube_list().into_iter().partition(|c| c.is_view);
    println!("OK: {} cubes, {} views", cubes.len(), views.len());
    ExitCode::SUCCESS
}

fn cmd_compile(files: &[PathBuf], options: CompileOptions, format: OutputFormat) -> ExitCode {
    let Some(schema) = load_schema(files, options) else {
        return ExitCode::FAILURE;
    };

    match format {
        OutputFormat::Json => print_json(&schema.evaluator.cubes().collect::<Vec<_>>()),
        OutputFormat::Text => {
            for cube in &schema.meta {
                let component = cube
                    .connected_component
                    .map(|c| format!(" [component {}]", c))
                    .unwrap_or_default();
                println!("{} {}{}", cube.cube_type, cube.name, component);
                println!("  measures:   {}", cube.measures.len());
                println!("  dimensions: {}", cube.dimensions.len());
                println!("  segments:   {}", cube.segments.len());
                if let Some(evaluated) = schema.evaluator.cube(&cube.name) {
                    for pre_aggregation in evaluated.pre_aggregations.keys() {
                        println!("  pre-aggregation: {}", pre_aggregation);
                    }
                }
            }
            println!();
            println!("{} joins", schema.join_graph.edges().count());
            ExitCode::SUCCESS
        }
    }
}

fn cmd_meta(files: &[PathBuf], options: CompileOptions) -> ExitCode {
    let Some(schema) = load_schema(files, options) else {
        return ExitCode::FAILURE;
    };
    print_json(&schema.meta)
}

fn cmd_join(files: &[PathBuf], options: CompileOptions, cubes: &[String]) -> ExitCode {
    let Some(schema) = load_schema(files, options) else {
        return ExitCode::FAILURE;
    };

    let hints: Vec<JoinHint> = cubes.iter().map(|c| JoinHint::parse(c)).collect();
    match schema.join_graph.build_join(&hints) {
        Ok(Some(tree)) => print_json(&tree),
        Ok(None) => {
            eprintln!("Nothing to join");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_sql(files: &[PathBuf], options: CompileOptions, member: &str) -> ExitCode {
    let Some(schema) = load_schema(files, options) else {
        return ExitCode::FAILURE;
    };

    let path = match RefPath::parse(member) {
        Ok(path) if path.len() == 2 => path,
        _ => {
            eprintln!("Expected a member path like Cube.member, got '{}'", member);
            return ExitCode::FAILURE;
        }
    };
    let (cube, name) = (path.head(), path.last());

    let Some((_, definition)) = schema.symbols.member(cube, name) else {
        eprintln!("Member '{}' not found", member);
        return ExitCode::FAILURE;
    };
    let Some(sql) = &definition.sql else {
        println!("*");
        return ExitCode::SUCCESS;
    };

    let mut resolver = InlineSqlResolver::new();
    match schema.symbols.resolve_to_sql(cube, sql, &mut resolver) {
        Ok(rendered) => {
            println!("{}", rendered);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            ExitCode::FAILURE
        }
    }
}

//! Weir command line.
//!
//! Emits AsyncAPI 3.0.0 documents from annotated host programs and
//! validates existing documents.

use std::path::Path;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::Instrument;
use uuid::Uuid;

use weir_emitter::{
    read_document, render, write_document, EmitError, EmitOutput, Emitter, EmitterConfig,
    OutputFormat, ValidationResult, ValidationService,
};
use weir_telemetry::{LogFormat, Telemetry, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(name = "weir", about = "AsyncAPI 3.0 document emitter", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Emit an AsyncAPI document from a host program.
    Emit {
        /// Host program (YAML or JSON).
        #[arg(short, long)]
        source: String,

        /// Emitter configuration file.
        #[arg(short, long, env = "WEIR_CONFIG")]
        config: Option<String>,

        /// Output file. Prints to stdout when omitted.
        #[arg(short, long)]
        output: Option<String>,

        /// Output format (json or yaml). Defaults to the output file
        /// extension, then to the configured format.
        #[arg(long)]
        format: Option<String>,

        /// Exit with an error when the generated document is invalid.
        #[arg(long)]
        fail_on_invalid: bool,

        /// Log level.
        #[arg(long, default_value = "warn", env = "WEIR_LOG_LEVEL")]
        log_level: String,

        /// Log format (pretty or json).
        #[arg(long, default_value = "pretty")]
        log_format: String,
    },

    /// Validate an existing AsyncAPI 3.0.0 document.
    ///
    /// Checks structure (E2061-E2069) and one-hop references (E2065, E2066).
    Validate {
        /// Document to validate (YAML or JSON).
        #[arg(short, long)]
        document: String,

        /// Output format (text or json).
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn init_telemetry(log_level: &str, log_format: &str) -> Telemetry {
    let format = LogFormat::parse(log_format).unwrap_or_else(|| {
        eprintln!("warning: unknown log format '{}', using pretty", log_format);
        LogFormat::Pretty
    });
    let config = TelemetryConfig::new()
        .with_log_level(log_level)
        .with_log_format(format);

    match Telemetry::init(config.clone()) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            eprintln!("warning: {}", e);
            Telemetry::init_without_logging(config)
        }
    }
}

/// Resolve config: file, then command-line overrides.
fn load_config(
    config: Option<&str>,
    fail_on_invalid: bool,
    output: Option<&str>,
    format: Option<&str>,
) -> Result<EmitterConfig, EmitError> {
    let mut config = match config {
        Some(path) => EmitterConfig::load(Path::new(path))?,
        None => EmitterConfig::default(),
    };
    if fail_on_invalid {
        config.fail_on_invalid = true;
    }

    let format = match format {
        Some(name) => Some(OutputFormat::parse(name).ok_or_else(|| {
            EmitError::configuration(
                weir_emitter::codes::CONFIG_INVALID,
                format!("unknown output format '{}', expected json or yaml", name),
            )
        })?),
        None => output.and_then(|path| OutputFormat::from_path(Path::new(path))),
    };
    if let Some(format) = format {
        config.output.format = format;
    }
    Ok(config)
}

fn print_report(output: &EmitOutput) {
    for report in &output.reports {
        for warning in &report.warnings {
            eprintln!("  {} (warning)", warning);
        }
        for failure in &report.failures {
            eprintln!("  {} (skipped)", failure);
        }
    }
    print_validation(&output.validation);
}

fn print_validation(result: &ValidationResult) {
    for err in &result.errors {
        eprintln!("  {} [{}]: {}", err.code, err.path, err.message);
    }
    for warn in &result.warnings {
        eprintln!("  {} [{}]: {} (warning)", warn.code, warn.path, warn.message);
    }
}

/// Run the emit command.
async fn run_emit(
    telemetry: &Telemetry,
    source: &str,
    config: Option<&str>,
    output: Option<&str>,
    format: Option<&str>,
    fail_on_invalid: bool,
) -> ExitCode {
    let source_path = Path::new(source);
    if !source_path.exists() {
        eprintln!("error: source file not found: {}", source);
        return ExitCode::from(1);
    }

    let config = match load_config(config, fail_on_invalid, output, format) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(1);
        }
    };
    let format = config.output.format;

    let program = match weir_ast::parse_program_file(source_path) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("error: {}", EmitError::from(e));
            return ExitCode::from(1);
        }
    };

    let run_id = Uuid::new_v4().to_string();
    let span = telemetry.run_span(&run_id);
    let emitter = Emitter::new(config);
    let result = emitter
        .emit_with_run_id(&program, run_id)
        .instrument(span)
        .await;

    let emitted = match result {
        Ok(emitted) => emitted,
        Err(e) => {
            eprintln!("error: {}", e);
            if let Some(details) = &e.details {
                if let Ok(result) = serde_json::from_value::<ValidationResult>(details.clone()) {
                    print_validation(&result);
                }
            }
            return ExitCode::from(1);
        }
    };

    print_report(&emitted);

    match output {
        Some(path) => {
            if let Err(e) = write_document(Path::new(path), &emitted.document, format) {
                eprintln!("error: {}", e);
                return ExitCode::from(1);
            }
            eprintln!(
                "emitted {} ({} channel(s), {} operation(s), {} message(s))",
                path,
                emitted.document.channels.len(),
                emitted.document.operations.len(),
                emitted.document.components.messages.len()
            );
        }
        None => match render(&emitted.document, format) {
            Ok(rendered) => print!("{}", rendered),
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::from(1);
            }
        },
    }

    if !emitted.validation.valid {
        eprintln!("warning: {}", emitted.validation.summary);
    }
    ExitCode::SUCCESS
}

/// Run the validate command.
fn run_validate(document: &str, output_format: &str) -> ExitCode {
    let path = Path::new(document);
    if !path.exists() {
        eprintln!("error: file not found: {}", document);
        return ExitCode::from(1);
    }

    let value = match read_document(path) {
        Ok(value) => value,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(1);
        }
    };
    let result = ValidationService::new().validate(&value);

    if output_format == "json" {
        let output = serde_json::json!({
            "file": document,
            "result": result,
        });
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::from(1);
            }
        }
    } else {
        if result.valid && result.warnings.is_empty() {
            eprintln!("✓ {} is valid", document);
        } else if result.valid {
            eprintln!(
                "✓ {} is valid (with {} warning(s))",
                document,
                result.warnings.len()
            );
        } else {
            eprintln!("✗ {} has {} error(s)", document, result.errors.len());
        }
        print_validation(&result);
        eprintln!();
        eprintln!("{}", result.summary);
    }

    if result.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Emit {
            source,
            config,
            output,
            format,
            fail_on_invalid,
            log_level,
            log_format,
        } => {
            let telemetry = init_telemetry(&log_level, &log_format);
            run_emit(
                &telemetry,
                &source,
                config.as_deref(),
                output.as_deref(),
                format.as_deref(),
                fail_on_invalid,
            )
            .await
        }
        Commands::Validate { document, format } => run_validate(&document, &format),
    }
}

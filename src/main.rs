//! HCP Registrar CLI
//!
//! Entry point for the `hcp-registrar` command-line tool.

use clap::{Parser, Subcommand};
use hcp_registrar::bucket::MemoryBucketFactory;
use hcp_registrar::cancel::{install_interrupt_handler, EXIT_CODE_CANCELLED};
use hcp_registrar::{
    run_builds, Artifact, BucketError, BuildError, CancelToken, Diagnostics, EffectiveRegistryConfig,
    JsonMetadataRegistry, MetadataRegistry, NullRegistry, RunSummary,
};
use legacy_template::{BuildSelector, Template};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

/// Exit code when construction reported diagnostics
const EXIT_CODE_DIAGNOSTICS: i32 = 2;

#[derive(Parser)]
#[command(name = "hcp-registrar")]
#[command(about = "Track legacy JSON template builds in the HCP Packer registry", version)]
struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List selected builds with their registry names
    Builds {
        /// Path to the JSON template
        template: PathBuf,

        /// Only builds matching these glob patterns
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,

        /// Skip builds matching these glob patterns
        #[arg(long, value_delimiter = ',')]
        except: Vec<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Run the registry lifecycle against an in-memory bucket
    DryRun {
        /// Path to the JSON template
        template: PathBuf,

        /// Only run builds matching these glob patterns
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,

        /// Skip builds matching these glob patterns
        #[arg(long, value_delimiter = ',')]
        except: Vec<String>,

        /// Builds to report as failed
        #[arg(long)]
        fail: Vec<String>,

        /// Bucket name (overrides HCP_PACKER_BUCKET_NAME)
        #[arg(long)]
        bucket: Option<String>,

        /// Build fingerprint (overrides HCP_PACKER_BUILD_FINGERPRINT)
        #[arg(long)]
        fingerprint: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Builds {
            template,
            only,
            except,
            json,
        } => run_builds_list(&template, &only, &except, json),
        Commands::DryRun {
            template,
            only,
            except,
            fail,
            bucket,
            fingerprint,
        } => run_dry_run(&template, &only, &except, &fail, bucket, fingerprint),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_template(path: &Path) -> Template {
    match Template::from_file(path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error loading template: {}", e);
            process::exit(1);
        }
    }
}

fn selected_builds(template: &Template, only: &[String], except: &[String]) -> Vec<String> {
    match BuildSelector::new(only, except) {
        Ok(selector) => template.build_names(&selector),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn report_diagnostics(diags: &Diagnostics) -> ! {
    eprintln!("{}", diags);
    process::exit(EXIT_CODE_DIAGNOSTICS);
}

fn run_builds_list(path: &Path, only: &[String], except: &[String], json: bool) {
    let template = load_template(path);
    let builds = selected_builds(&template, only, except);

    let mut failed = false;
    let mut entries = Vec::new();
    for build in &builds {
        match template.hcp_name(build) {
            Ok(name) => {
                if !json {
                    println!("{} -> {}", build, name);
                }
                entries.push(json!({"build": build, "hcp_name": name}));
            }
            Err(e) => {
                failed = true;
                if !json {
                    println!("{} -> error: {}", build, e);
                }
                entries.push(json!({"build": build, "error": e.to_string()}));
            }
        }
    }

    if json {
        match serde_json::to_string_pretty(&entries) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    }

    if failed {
        process::exit(EXIT_CODE_DIAGNOSTICS);
    }
}

fn run_dry_run(
    path: &Path,
    only: &[String],
    except: &[String],
    fail: &[String],
    bucket: Option<String>,
    fingerprint: Option<String>,
) {
    let template = load_template(path);
    let builds = selected_builds(&template, only, except);

    let mut overrides = serde_json::Map::new();
    if let Some(name) = bucket {
        overrides.insert("bucket_name".into(), json!(name));
    }
    if let Some(fp) = fingerprint {
        overrides.insert("fingerprint".into(), json!(fp));
    }
    let overrides = (!overrides.is_empty()).then(|| serde_json::Value::Object(overrides));

    let effective = match EffectiveRegistryConfig::load(overrides) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    let cancel = CancelToken::new();
    if let Err(e) = install_interrupt_handler(cancel.clone()) {
        tracing::warn!(error = %e, "Could not install interrupt handler");
    }

    let execute = |build: &str, cancel: &CancelToken| -> Result<Vec<Artifact>, BuildError> {
        cancel.check()?;
        if fail.iter().any(|f| f == build) {
            return Err(format!("simulated failure of build {:?}", build).into());
        }
        let builder_type = template
            .builders()
            .iter()
            .find(|b| b.name == build)
            .map_or("null", |b| b.builder_type.as_str());
        Ok(vec![Artifact::new(
            format!("packer.{}", builder_type),
            format!("{}-{}", build, uuid::Uuid::new_v4().simple()),
        )
        .with_metadata("dry_run", "true")])
    };

    let (summary, bucket) = if effective.config.is_enabled() {
        let factory = MemoryBucketFactory::new(effective.config.clone());
        let mut registry = match JsonMetadataRegistry::new(&template, &factory) {
            Ok(r) => r,
            Err(diags) => report_diagnostics(&diags),
        };
        let summary = drive(&mut registry, &cancel, &builds, execute);
        (summary, Some(registry.bucket().snapshot()))
    } else {
        tracing::info!("Registry tracking disabled; builds are not recorded");
        (drive(&mut NullRegistry, &cancel, &builds, execute), None)
    };

    let output = json!({
        "config": effective,
        "summary": summary,
        "bucket": bucket,
    });
    match serde_json::to_string_pretty(&output) {
        Ok(out) => println!("{}", out),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }

    process::exit(summary.exit_code);
}

fn drive<R, E>(registry: &mut R, cancel: &CancelToken, builds: &[String], execute: E) -> RunSummary
where
    R: MetadataRegistry,
    E: Fn(&str, &CancelToken) -> Result<Vec<Artifact>, BuildError> + Sync,
{
    if let Err(e) = registry.populate_iteration(cancel) {
        eprintln!("Error: {}", e);
        if matches!(e.bucket_error(), Some(BucketError::Cancelled(_))) {
            process::exit(EXIT_CODE_CANCELLED);
        }
        process::exit(1);
    }
    run_builds(registry, cancel, builds, execute)
}

//! Workerbox CLI - run a worker project in the sandbox
//!
//! Project-based execution - all configuration comes from the project file.

use anyhow::{bail, Context as _};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use workerbox_config::WorkerConfig;
use workerbox_core::{
    build_linker, Blueprint, Globals, LogicalPath, ModuleRules, SandboxError, SandboxOptions,
};
use workerbox_vfs::{NativeFileSystem, RecordingFileSystem};

mod config;
mod logging;

use config::{parse_level, LogConfig};
use logging::LogFormat;

#[derive(Parser)]
#[command(
    name = "workerbox",
    about = "Run a worker entry inside an isolated sandbox",
    version
)]
struct Cli {
    /// Project file path
    #[arg(value_name = "PROJECT", default_value = "workerbox.json")]
    project: PathBuf,

    /// Print every path the linker touched, sorted
    #[arg(long)]
    list_referenced: bool,

    /// Print sandbox errors as JSON reports
    #[arg(long)]
    json_errors: bool,

    /// Log level: silent, error, warn, info, debug, trace
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log level override for module linking
    #[arg(long)]
    linker_log_level: Option<String>,

    #[arg(long, value_enum, default_value = "compact")]
    log_format: LogFormat,

    /// Also append JSON logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// What a successful run produced
struct Outcome {
    default_export: Option<String>,
    referenced: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logging(&cli) {
        eprintln!("Error: {err:#}");
        return ExitCode::FAILURE;
    }

    match execute(&cli) {
        Ok(outcome) => {
            if let Some(value) = outcome.default_export {
                println!("{value}");
            }
            if cli.list_referenced {
                for path in outcome.referenced {
                    println!("{}", path.display());
                }
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            match err.downcast_ref::<SandboxError>() {
                Some(sandbox) if cli.json_errors => {
                    let report = sandbox.to_report();
                    match serde_json::to_string_pretty(&report) {
                        Ok(json) => eprintln!("{json}"),
                        Err(_) => eprintln!("{report}"),
                    }
                }
                Some(sandbox) => eprintln!("{sandbox}"),
                None => eprintln!("Error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let Some(global) = parse_level(&cli.log_level) else {
        bail!("unknown log level '{}'", cli.log_level);
    };
    let mut log_config = LogConfig::new(global);
    if let Some(level) = &cli.linker_log_level {
        log_config.linker =
            Some(parse_level(level).with_context(|| format!("unknown log level '{level}'"))?);
    }
    logging::init(&log_config, cli.log_format, cli.log_file.as_deref())
}

/// Read the project file
fn read_project(path: &Path) -> anyhow::Result<WorkerConfig> {
    let text = std::fs::read_to_string(path).with_context(|| {
        format!(
            "cannot read project file '{}' (create it with an \"entry\" field)",
            path.display()
        )
    })?;
    WorkerConfig::from_json(&text).with_context(|| format!("invalid project file '{}'", path.display()))
}

/// Entry path relative to the project file's directory, made absolute
fn resolve_entry(project: &Path, entry: &Path) -> anyhow::Result<PathBuf> {
    let base = project.parent().unwrap_or_else(|| Path::new("."));
    let joined = base.join(entry);
    std::fs::canonicalize(&joined)
        .with_context(|| format!("cannot find entry '{}'", joined.display()))
}

fn execute(cli: &Cli) -> anyhow::Result<Outcome> {
    let project = read_project(&cli.project)?;
    let entry = resolve_entry(&cli.project, &project.entry)?;
    let source = std::fs::read_to_string(&entry)
        .with_context(|| format!("cannot read entry '{}'", entry.display()))?;
    info!(target: "workerbox::cli", entry = %entry.display(), modules = project.modules, "running worker");

    let options = SandboxOptions::new()
        .with_policy(project.policy)
        .with_limits(project.limits);
    let blueprint = Blueprint::new(source, LogicalPath::File(entry)).with_options(options);
    let globals = Globals::new();

    if !project.modules {
        let mut script = blueprint.build_script(&globals)?;
        let value = script.run()?;
        return Ok(Outcome {
            default_export: (!value.is_undefined()).then(|| value.display().to_string()),
            referenced: Vec::new(),
        });
    }

    let rules = ModuleRules::compile(&project.effective_rules())?;
    let fs = RecordingFileSystem::new(NativeFileSystem::new());
    let (linker, referenced) = build_linker(&rules, Arc::new(fs.clone()));
    let mut module = blueprint.build_module(&globals, &linker)?;
    module.run()?;
    debug!(target: "workerbox::cli", reads = fs.total_reads(), "worker finished");

    let default_export = match module.export_json("default")? {
        Some(json) => Some(serde_json::to_string_pretty(&json)?),
        None => module
            .exports()?
            .get("default")
            .filter(|value| !value.is_undefined())
            .map(|value| value.display().to_string()),
    };
    Ok(Outcome {
        default_export,
        referenced: referenced.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn cli(project: PathBuf) -> Cli {
        Cli {
            project,
            list_referenced: true,
            json_errors: false,
            log_level: "warn".into(),
            linker_log_level: None,
            log_format: LogFormat::Compact,
            log_file: None,
        }
    }

    #[test]
    fn test_runs_module_project() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("workerbox.json"),
            r#"{ "entry": "index.mjs", "rules": [{ "type": "Text", "include": ["**/*.txt"] }] }"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("index.mjs"),
            r#"import greeting from "./greeting.txt"; export default { greeting };"#,
        )
        .unwrap();
        fs::write(dir.path().join("greeting.txt"), "hi\n").unwrap();

        let outcome = execute(&cli(dir.path().join("workerbox.json"))).unwrap();
        let printed: serde_json::Value =
            serde_json::from_str(outcome.default_export.as_deref().unwrap()).unwrap();
        assert_eq!(printed["greeting"], "hi\n");
        assert_eq!(outcome.referenced.len(), 1);
        assert!(outcome.referenced[0].ends_with("greeting.txt"));
    }

    #[test]
    fn test_runs_script_project() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("workerbox.json"),
            r#"{ "entry": "main.js", "modules": false }"#,
        )
        .unwrap();
        fs::write(dir.path().join("main.js"), "6 * 7").unwrap();

        let outcome = execute(&cli(dir.path().join("workerbox.json"))).unwrap();
        assert_eq!(outcome.default_export.as_deref(), Some("42"));
        assert!(outcome.referenced.is_empty());
    }

    #[test]
    fn test_sandbox_error_is_downcastable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("workerbox.json"), r#"{ "entry": "index.mjs" }"#).unwrap();
        fs::write(dir.path().join("index.mjs"), r#"import p from "./photo.jpg";"#).unwrap();

        let err = execute(&cli(dir.path().join("workerbox.json"))).err().unwrap();
        let sandbox = err.downcast_ref::<SandboxError>().unwrap();
        assert_eq!(sandbox.kind(), workerbox_core::ErrorKind::NoMatchingModuleRule);
    }

    #[test]
    fn test_missing_project_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = execute(&cli(dir.path().join("workerbox.json"))).err().unwrap();
        assert!(err.to_string().contains("cannot read project file"));
    }
}

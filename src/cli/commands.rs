//! Command dispatch

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::application::ArbitraryBuilder;
use crate::cli::args::{Cli, Commands, ConfigCommands, ManipulatorArgs, ShapeArgs};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{self, Settings};
use crate::domain::{PathExpression, TreeNodeConvert};
use crate::infrastructure::{InfraError, ShapeFile};

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Sample {
            shape,
            manipulators,
            count,
            seed,
        }) => {
            let settings = load_settings(cli.config_dir.as_deref(), *seed)?;
            _sample(shape, manipulators, *count, settings)
        }
        Some(Commands::Tree {
            shape,
            manipulators,
            seed,
        }) => {
            let settings = load_settings(cli.config_dir.as_deref(), *seed)?;
            _tree(shape, manipulators, settings)
        }
        Some(Commands::Parse { expression }) => _parse(expression),
        Some(Commands::Config { command }) => _config(command, cli.config_dir.as_deref()),
        // completion is handled in main, it needs the clap command
        Some(Commands::Completion { .. }) | None => Ok(()),
    }
}

/// Layered settings; a command line seed wins over every file.
pub fn load_settings(config_dir: Option<&Path>, seed: Option<u64>) -> CliResult<Settings> {
    let local_dir = match config_dir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()
            .map_err(|e| InfraError::io("resolve current directory", e))?,
    };
    let mut settings = Settings::load(Some(&local_dir))?;
    if seed.is_some() {
        settings.generation.seed = seed;
    }
    Ok(settings)
}

/// Builder for the shape file's root (or `--type`) with every manipulator flag applied.
#[instrument(level = "debug", skip(settings))]
pub fn builder_from_args(
    shape: &ShapeArgs,
    manipulators: &ManipulatorArgs,
    settings: Settings,
) -> CliResult<ArbitraryBuilder> {
    let file = ShapeFile::load(&shape.shape)?;
    let root = file.root_shape(shape.type_name.as_deref())?;
    let mut builder =
        ArbitraryBuilder::new(root, Arc::new(file.types)).with_settings(settings)?;

    for arg in &manipulators.size {
        let (expression, min, max) = parse_size(arg)?;
        builder.size(&expression, min, max)?;
    }
    for expression in &manipulators.null {
        builder.set_null(expression)?;
    }
    for expression in &manipulators.not_null {
        builder.set_not_null(expression)?;
    }
    for arg in &manipulators.set {
        let (expression, value) = parse_assignment(arg)?;
        builder.set(&expression, value)?;
    }
    debug!(manipulators = builder.manipulators().len(), "builder ready");
    Ok(builder)
}

/// Splits `EXPR=JSON`; the value must be valid JSON (quote strings).
pub fn parse_assignment(arg: &str) -> CliResult<(String, Value)> {
    let (expression, raw) = split_expression(arg, "EXPR=JSON")?;
    let value = serde_json::from_str(raw).map_err(|e| {
        CliError::InvalidArgs(format!(
            "'{arg}': value is not JSON ({e}), strings need quotes: {expression}='\"text\"'"
        ))
    })?;
    Ok((expression, value))
}

/// Splits `EXPR=MIN..MAX` or `EXPR=N`.
pub fn parse_size(arg: &str) -> CliResult<(String, usize, usize)> {
    let (expression, raw) = split_expression(arg, "EXPR=MIN..MAX")?;
    let number = |s: &str| {
        s.trim()
            .parse::<usize>()
            .map_err(|e| CliError::InvalidArgs(format!("'{arg}': bad size '{s}': {e}")))
    };
    let (min, max) = match raw.split_once("..") {
        Some((lo, hi)) => (number(lo)?, number(hi)?),
        None => {
            let n = number(raw)?;
            (n, n)
        }
    };
    if min > max {
        return Err(CliError::InvalidArgs(format!(
            "'{arg}': min {min} exceeds max {max}"
        )));
    }
    Ok((expression, min, max))
}

fn split_expression<'a>(arg: &'a str, form: &str) -> CliResult<(String, &'a str)> {
    let Some((expression, raw)) = arg.split_once('=') else {
        return Err(CliError::InvalidArgs(format!("'{arg}': expected {form}")));
    };
    let expression = expression.trim();
    // reject early so the message names the flag value, not a later pull
    PathExpression::from(expression)?;
    Ok((expression.to_string(), raw))
}

#[instrument(level = "debug", skip(manipulators, settings))]
fn _sample(
    shape: &ShapeArgs,
    manipulators: &ManipulatorArgs,
    count: usize,
    settings: Settings,
) -> CliResult<()> {
    if count == 0 {
        output::warning("count is 0, nothing to sample");
    }
    let builder = builder_from_args(shape, manipulators, settings)?;
    for value in builder.sample_list(count)? {
        output::sample(&value);
    }
    Ok(())
}

#[instrument(level = "debug", skip(manipulators, settings))]
fn _tree(shape: &ShapeArgs, manipulators: &ManipulatorArgs, settings: Settings) -> CliResult<()> {
    let builder = builder_from_args(shape, manipulators, settings)?;
    for manipulator in builder.manipulators() {
        output::detail(manipulator);
    }
    let tree = builder.prepared_tree()?;
    output::info(&tree.to_tree_string());
    Ok(())
}

fn _parse(expression: &str) -> CliResult<()> {
    let parsed = PathExpression::from(expression)?;
    output::header(&parsed);
    for segment in parsed.segments() {
        let indices = segment
            .indices()
            .iter()
            .map(|i| format!("[{i}]"))
            .collect::<String>();
        output::action(segment.name(), &indices);
    }
    Ok(())
}

fn _config(command: &ConfigCommands, config_dir: Option<&Path>) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings(config_dir, None)?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Template => output::info(&Settings::template()),
        ConfigCommands::Path => {
            let global = config::global_config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<no config directory>".to_string());
            output::action("global", &global);
            let local: PathBuf = match config_dir {
                Some(dir) => config::local_config_path(dir),
                None => config::local_config_path(Path::new(".")),
            };
            output::action("local", &local.display());
        }
    }
    Ok(())
}

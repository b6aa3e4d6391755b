//! `config` subcommands.

use std::path::Path;

use anyhow::Context;

use snap_config::{Config, ConfigLoader, ConfigValidator};

use crate::cli::ConfigAction;

pub fn handle(action: ConfigAction, path: Option<&Path>) -> anyhow::Result<()> {
    match action {
        ConfigAction::Check => check(path),
        ConfigAction::Show => show(path),
    }
}

fn check(path: Option<&Path>) -> anyhow::Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => ConfigLoader::default_path().context("No platform config directory")?,
    };
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config = ConfigLoader::load_str(&raw)?;
    let result = ConfigValidator::validate(&config, Some(&raw))?;

    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("error: {}: {}", error.path, error.message);
    }

    if !result.is_valid() {
        anyhow::bail!("{} has {} error(s)", path.display(), result.errors.len());
    }
    println!("{} is valid", path.display());
    Ok(())
}

fn show(path: Option<&Path>) -> anyhow::Result<()> {
    let config: Config = ConfigLoader::load_or_default(path)?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

use anyhow::{Context, Result};
use colored::*;
use kbchat_core::config::{get_default_config_file, mask_secret, KbChatConfig};
use kbchat_core::errors::KbChatResult;
use std::path::{Path, PathBuf};

use crate::cli::Args;

pub const APP_NAME: &str = "kbchat";

/// Config file named on the command line, or the per-user default
pub fn config_file_path(args: &Args) -> Result<PathBuf> {
    match &args.config {
        Some(path) => Ok(path.clone()),
        None => get_default_config_file(APP_NAME).context("Failed to locate config directory"),
    }
}

/// Outcome of layering: the merged config plus the layers that failed to load
#[derive(Debug)]
pub struct ResolvedConfig {
    pub config: KbChatConfig,
    pub problems: Vec<String>,
}

/// Merges defaults, file, environment and flags, later layers winning.
///
/// A layer that fails to load is skipped and reported in `problems`; the
/// session then validates whatever did load.
pub fn resolve_config(
    file_path: &Path,
    env: KbChatResult<KbChatConfig>,
    overrides: &KbChatConfig,
) -> ResolvedConfig {
    let mut problems = Vec::new();

    let file = KbChatConfig::load_from_file(file_path).unwrap_or_else(|e| {
        problems.push(format!("Ignoring config file {}: {}", file_path.display(), e));
        KbChatConfig::default()
    });
    let env = env.unwrap_or_else(|e| {
        problems.push(format!("Ignoring environment configuration: {}", e));
        KbChatConfig::default()
    });

    ResolvedConfig {
        config: KbChatConfig::with_defaults()
            .merge(&file)
            .merge(&env)
            .merge(overrides),
        problems,
    }
}

/// Prints the resolved configuration with secrets masked
pub fn print_config(cfg: &KbChatConfig, file_path: &Path) {
    fn show(value: Option<&str>) -> ColoredString {
        value.map_or("Not Set".yellow(), |v| v.normal())
    }

    println!(
        "{} ({})",
        "Current Configuration".cyan().bold(),
        file_path.display()
    );
    println!("  {}: {}", "Region".blue(), show(cfg.region.as_deref()));
    println!(
        "  {}: {}",
        "Access Key ID".blue(),
        cfg.access_key_id
            .as_deref()
            .map_or("Not Set".yellow(), |k| mask_secret(k).bright_black())
    );
    println!(
        "  {}: {}",
        "Secret Access Key".blue(),
        if cfg.secret_access_key.is_some() { "Set".green() } else { "Not Set".yellow() }
    );
    println!(
        "  {}: {}",
        "Session Token".blue(),
        if cfg.session_token.is_some() { "Set".green() } else { "Not Set".bright_black() }
    );
    println!(
        "  {}: {}",
        "Knowledge Base".blue(),
        show(cfg.knowledge_base_id.as_deref())
    );
    println!("  {}: {}", "Model ARN".blue(), show(cfg.model_arn.as_deref()));
    println!(
        "  {}: {}",
        "Temperature".blue(),
        show(cfg.temperature.map(|t| t.to_string()).as_deref())
    );
    println!(
        "  {}: {}",
        "Max Tokens".blue(),
        show(cfg.max_tokens.map(|t| t.to_string()).as_deref())
    );
    println!(
        "  {}: {}",
        "Endpoint".blue(),
        cfg.endpoint_url
            .as_deref()
            .map_or("Regional default".bright_black(), |e| e.normal())
    );

    if let Err(e) = cfg.validate() {
        println!("\n{} {}", "Invalid:".red().bold(), e);
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use kbchat_core::config::KbChatConfig;
use kbchat_core::session::ChatSession;
use tracing::{error, info};

mod app;
mod cli;
mod config;
mod logging;
mod output;

use crate::cli::Args;
use crate::config::{config_file_path, print_config, resolve_config};
use crate::logging::init_logging;
use crate::output::{print_banner, print_usage_instructions};

/// Main function - Resolves configuration and runs the chat session
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before reading the environment
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let file_path = config_file_path(&args)?;
    let resolved = resolve_config(
        &file_path,
        KbChatConfig::from_env(),
        &args.config_overrides(),
    );
    let cfg = resolved.config;

    init_logging(cfg.log_level.as_deref().unwrap_or("warn"));
    for problem in &resolved.problems {
        error!("{}", problem);
        eprintln!("{}", problem.red());
    }
    info!(config_file = %file_path.display(), "Configuration resolved");

    if args.show_config {
        print_config(&cfg, &file_path);
        return Ok(());
    }

    if args.prompt.is_none() && !args.interactive {
        print_usage_instructions();
        return Ok(());
    }

    let mut session = ChatSession::connect(&cfg);
    if !session.is_client_ready() {
        eprintln!(
            "{}",
            "Knowledge base client is not configured; answers will report the error. Run with --show-config for details."
                .red()
        );
    }

    print_banner();
    let outcome = if args.interactive {
        app::run_interactive_chat(&mut session).await
    } else if let Some(prompt) = args.prompt.as_deref() {
        app::run_single_query(prompt, &mut session).await
    } else {
        Ok(())
    };

    if let Err(e) = &outcome {
        error!(error = %e, "Chat session failed");
    }

    if let Some(path) = &args.save_transcript {
        session
            .save_transcript(path)
            .with_context(|| format!("Failed to save transcript to {}", path.display()))?;
        println!("{} {}", "Transcript saved to".green(), path.display());
    }

    outcome
}

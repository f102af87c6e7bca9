use clap::Parser;
use kbchat_core::config::KbChatConfig;
use std::path::PathBuf;

/// Ask questions to a Bedrock knowledge base from the terminal
#[derive(Parser, Debug)]
#[command(name = "kbchat", author, version, about, long_about = None)]
pub struct Args {
    /// The question to ask
    #[arg(index = 1)] // Positional argument
    pub prompt: Option<String>,

    /// Enter interactive chat mode
    #[arg(short, long, default_value_t = false)]
    pub interactive: bool,

    /// Path to the config file (defaults to ~/.config/kbchat/config.toml)
    #[arg(short, long, env = "KBCHAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// AWS region of the knowledge base
    #[arg(long)]
    pub region: Option<String>,

    /// Knowledge base identifier
    #[arg(long)]
    pub knowledge_base_id: Option<String>,

    /// ARN of the generation model
    #[arg(long)]
    pub model_arn: Option<String>,

    /// Sampling temperature (0-1)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Upper bound on generated tokens
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Override the service endpoint (e.g. a VPC endpoint or proxy)
    #[arg(long)]
    pub endpoint_url: Option<String>,

    /// Write the transcript as JSON to this path when the session ends
    #[arg(long)]
    pub save_transcript: Option<PathBuf>,

    /// Print the resolved configuration and exit
    #[arg(long, default_value_t = false)]
    pub show_config: bool,

    /// Enable verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    /// Configuration overrides given on the command line
    pub fn config_overrides(&self) -> KbChatConfig {
        KbChatConfig {
            region: self.region.clone(),
            knowledge_base_id: self.knowledge_base_id.clone(),
            model_arn: self.model_arn.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            endpoint_url: self.endpoint_url.clone(),
            log_level: self.verbose.then(|| "debug".to_string()),
            ..KbChatConfig::default()
        }
    }
}

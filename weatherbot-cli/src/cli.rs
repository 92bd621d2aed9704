use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode};
use std::process::ExitCode;
use tracing::info;
use weatherbot_core::{
    Config, ConversationOrchestrator, OpenAiClient, ServiceId, WeatherLookupPipeline,
};

use crate::console::StdConsole;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherbot", version, about = "Ask about the weather in plain language")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the interactive weather chat (the default).
    Chat,

    /// Store the API key for a service.
    Configure {
        /// Service short name: "meteoblue" or "openai".
        service: String,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        match self.command.unwrap_or(Command::Chat) {
            Command::Configure { service } => {
                configure(&service)?;
                Ok(ExitCode::SUCCESS)
            }
            Command::Chat => chat().await,
        }
    }
}

fn configure(service: &str) -> anyhow::Result<()> {
    let id = ServiceId::try_from(service)?;
    let mut config = Config::load()?;

    let api_key = Password::new(&format!("{id} API key:"))
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let api_key = api_key.trim();
    if api_key.is_empty() {
        bail!("API key for '{id}' must not be empty");
    }

    config.upsert_api_key(id, api_key.to_string());
    config.save()?;

    println!("Saved {id} API key to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn chat() -> anyhow::Result<ExitCode> {
    let mut config = Config::load()?;
    config.apply_env_overrides();

    let chat = OpenAiClient::from_config(&config)?;
    let pipeline = WeatherLookupPipeline::from_config(&config)?;
    info!(model = %config.openai.model, "Starting weather chat");

    let mut bot = ConversationOrchestrator::new(chat, pipeline, &config.openai.system_prompt);
    let mut console = StdConsole::stdio();

    // The orchestrator has already shown the diagnostic by the time it returns an error.
    match bot.run(&mut console).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

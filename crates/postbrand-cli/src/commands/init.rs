//! `postbrand init` — interactive setup wizard or template copy.
//!
//! Walks new users through Threads API credentials, chat notification
//! settings, and the LLM provider in a handful of guided steps, then
//! writes the TOML config and runs database migrations so `postbrand run`
//! has a ready-to-use store on first launch.

use std::fs;
use std::io::IsTerminal;
use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use console::Style;
use dialoguer::{Confirm, Input};
use rand::RngCore;

use postbrand_core::config::{expand_tilde, Config};
use postbrand_core::store;

/// Run the init command.
pub async fn execute(config_path: &str, force: bool, non_interactive: bool) -> Result<()> {
    let path = expand_tilde(config_path);

    if path.exists() && !force {
        eprintln!(
            "Configuration already exists at {}\nUse --force to overwrite.",
            path.display()
        );
        return Ok(());
    }

    let config = if non_interactive {
        Config::default()
    } else {
        if !std::io::stdin().is_terminal() {
            bail!("Interactive wizard requires a terminal.\nUse --non-interactive to write a default configuration instead.");
        }
        run_wizard()?
    };

    write_config(&path, &config)?;
    eprintln!("Wrote {}", path.display());

    let db_path = expand_tilde(&config.store.dsn);
    store::init_db(&db_path.to_string_lossy())
        .await
        .context("running database migrations")?;
    eprintln!("Database ready at {}", db_path.display());

    eprintln!();
    eprintln!("Next steps:");
    eprintln!("  1. postbrand settings   — review or adjust configuration");
    eprintln!("  2. postbrand run        — start the daemon");

    Ok(())
}

fn write_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let toml = toml::to_string_pretty(config).context("rendering configuration as TOML")?;
    fs::write(path, toml).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn run_wizard() -> Result<Config> {
    print_welcome_banner();
    let mut config = Config::default();

    // Step 1/4: Threads API credentials.
    let bold = Style::new().bold();
    eprintln!("{}", bold.apply_to("Step 1/4: Threads API Credentials"));
    eprintln!();

    config.social.client_id = Input::new()
        .with_prompt("OAuth client ID")
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            if input.trim().is_empty() {
                Err("client ID cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let has_secret = Confirm::new()
        .with_prompt("Do you have a client secret?")
        .default(true)
        .interact()?;
    config.social.client_secret = if has_secret {
        Some(Input::new().with_prompt("Client secret").interact_text()?)
    } else {
        None
    };

    config.social.redirect_uri = Input::new()
        .with_prompt("OAuth redirect URI")
        .default(format!(
            "http://{}:{}/api/threads/oauth/callback",
            config.server.host, config.server.port
        ))
        .interact_text()?;

    eprintln!();

    // Step 2/4: Chat notifications (optional but required for the review workflow).
    eprintln!("{}", bold.apply_to("Step 2/4: Chat Notifications"));
    eprintln!();
    let dim = Style::new().dim();
    eprintln!(
        "{}",
        dim.apply_to("Review cards and reminders are pushed over this channel. Skip to run without human review.")
    );

    let enable_chat = Confirm::new()
        .with_prompt("Configure chat notifications now?")
        .default(true)
        .interact()?;

    if enable_chat {
        config.chat.access_token = Some(Input::new().with_prompt("Chat channel access token").interact_text()?);
        config.chat.signing_secret = Some(Input::new().with_prompt("Webhook signing secret").interact_text()?);
        config.chat.admin_user_id = Some(Input::new().with_prompt("Reviewer user id").interact_text()?);
    }

    eprintln!();

    // Step 3/4: LLM provider.
    eprintln!("{}", bold.apply_to("Step 3/4: LLM Provider"));
    eprintln!();

    config.llm.primary.provider = Input::new()
        .with_prompt("Primary provider (openai, anthropic, ollama)")
        .default("openai".to_string())
        .interact_text()?;
    config.llm.primary.model = Input::new()
        .with_prompt("Model name")
        .default(default_model_for(&config.llm.primary.provider))
        .interact_text()?;
    if config.llm.primary.provider != "ollama" {
        config.llm.primary.api_key = Some(
            Input::new()
                .with_prompt(format!("{} API key", config.llm.primary.provider))
                .interact_text()?,
        );
    }

    eprintln!();

    // Step 4/4: Secrets.
    eprintln!("{}", bold.apply_to("Step 4/4: Secrets"));
    eprintln!();
    eprintln!(
        "{}",
        dim.apply_to("Leaving these blank generates random values now.")
    );

    let encryption_key: String = Input::new()
        .with_prompt("Base64 encryption key for stored access tokens (Enter to generate)")
        .allow_empty(true)
        .interact_text()?;
    config.secrets.encryption_key = Some(non_empty(encryption_key).unwrap_or_else(|| generate_base64_key(32)));

    let jwt_signing_secret: String = Input::new()
        .with_prompt("Admin API JWT signing secret (Enter to generate)")
        .allow_empty(true)
        .interact_text()?;
    config.secrets.jwt_signing_secret = Some(non_empty(jwt_signing_secret).unwrap_or_else(|| generate_base64_key(32)));

    eprintln!();

    Ok(config)
}

fn print_welcome_banner() {
    let bold = Style::new().bold();
    let dim = Style::new().dim();
    eprintln!();
    eprintln!("{}", bold.apply_to("Welcome to postbrand setup"));
    eprintln!("{}", dim.apply_to("This wizard will create your configuration in 4 steps."));
    eprintln!();
}

fn default_model_for(provider: &str) -> String {
    match provider {
        "anthropic" => "claude-sonnet-4-6".to_string(),
        "ollama" => "llama3.2".to_string(),
        _ => "gpt-4o-mini".to_string(),
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn generate_base64_key(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    STANDARD.encode(buf)
}

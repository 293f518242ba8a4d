use std::path::Path;

use anyhow::{bail, Context, Result};
use console::Style;
use postbrand_core::config::Config;

/// One field change applied by `--set`, recorded for the summary printed
/// after the config file is rewritten.
pub(super) struct Change {
    section: String,
    field: String,
    old_value: String,
    new_value: String,
}

#[derive(Default)]
pub(super) struct ChangeTracker {
    pub changes: Vec<Change>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, section: &str, field: &str, old_value: &str, new_value: &str) {
        self.changes.push(Change {
            section: section.to_string(),
            field: field.to_string(),
            old_value: old_value.to_string(),
            new_value: new_value.to_string(),
        });
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => bail!("expected true/false, got {other:?}"),
    }
}

fn set_string(tracker: &mut ChangeTracker, field: &mut String, section: &str, name: &str, value: &str) {
    tracker.record(section, name, field, value);
    *field = value.to_string();
}

fn set_opt_string(tracker: &mut ChangeTracker, field: &mut Option<String>, section: &str, name: &str, value: &str) {
    let old = field.as_deref().unwrap_or("(none)").to_string();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        *field = None;
        tracker.record(section, name, &old, "(none)");
    } else {
        *field = Some(value.to_string());
        tracker.record(section, name, &old, value);
    }
}

fn set_secret(tracker: &mut ChangeTracker, field: &mut Option<String>, section: &str, name: &str, value: &str) {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        *field = None;
        tracker.record(section, name, "(hidden)", "(none)");
    } else {
        *field = Some(value.to_string());
        tracker.record(section, name, "(hidden)", "(updated)");
    }
}

fn set_u32(tracker: &mut ChangeTracker, field: &mut u32, section: &str, name: &str, value: &str) -> Result<()> {
    let v: u32 = value.parse().context("must be a positive number")?;
    tracker.record(section, name, &field.to_string(), value);
    *field = v;
    Ok(())
}

fn set_usize(tracker: &mut ChangeTracker, field: &mut usize, section: &str, name: &str, value: &str) -> Result<()> {
    let v: usize = value.parse().context("must be a positive number")?;
    tracker.record(section, name, &field.to_string(), value);
    *field = v;
    Ok(())
}

fn set_i64(tracker: &mut ChangeTracker, field: &mut i64, section: &str, name: &str, value: &str) -> Result<()> {
    let v: i64 = value.parse().context("must be a whole number")?;
    tracker.record(section, name, &field.to_string(), value);
    *field = v;
    Ok(())
}

fn set_u64(tracker: &mut ChangeTracker, field: &mut u64, section: &str, name: &str, value: &str) -> Result<()> {
    let v: u64 = value.parse().context("must be a positive number")?;
    tracker.record(section, name, &field.to_string(), value);
    *field = v;
    Ok(())
}

fn set_f32(tracker: &mut ChangeTracker, field: &mut f32, section: &str, name: &str, value: &str) -> Result<()> {
    let v: f32 = value.parse().context("must be a number")?;
    tracker.record(section, name, &format!("{:.2}", *field), value);
    *field = v;
    Ok(())
}

fn set_bool(tracker: &mut ChangeTracker, field: &mut bool, section: &str, name: &str, value: &str) -> Result<()> {
    let v = parse_bool(value)?;
    tracker.record(section, name, &field.to_string(), value);
    *field = v;
    Ok(())
}

pub(super) fn set_direct(config: &mut Config, kv: &str, config_path: &Path) -> Result<()> {
    let (key, value) = kv
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Invalid format. Use --set KEY=VALUE (e.g., --set pipeline.similarity_threshold=0.85)"))?;
    let key = key.trim();
    let value = value.trim();

    let mut tracker = ChangeTracker::new();

    match key {
        "store.dsn" => set_string(&mut tracker, &mut config.store.dsn, "store", "dsn", value),
        "store.timeout_secs" => set_u64(&mut tracker, &mut config.store.timeout_secs, "store", "timeout_secs", value)?,

        "queue.generate_concurrency" => {
            set_usize(&mut tracker, &mut config.queue.generate_concurrency, "queue", "generate_concurrency", value)?
        }
        "queue.publish_concurrency" => {
            set_usize(&mut tracker, &mut config.queue.publish_concurrency, "queue", "publish_concurrency", value)?
        }
        "queue.token_refresh_concurrency" => set_usize(
            &mut tracker,
            &mut config.queue.token_refresh_concurrency,
            "queue",
            "token_refresh_concurrency",
            value,
        )?,
        "queue.lease_ms" => set_u64(&mut tracker, &mut config.queue.lease_ms, "queue", "lease_ms", value)?,

        "llm.primary.provider" => set_string(&mut tracker, &mut config.llm.primary.provider, "llm", "primary.provider", value),
        "llm.primary.model" => set_string(&mut tracker, &mut config.llm.primary.model, "llm", "primary.model", value),
        "llm.primary.api_key" => set_secret(&mut tracker, &mut config.llm.primary.api_key, "llm", "primary.api_key", value),
        "llm.primary.base_url" => set_opt_string(&mut tracker, &mut config.llm.primary.base_url, "llm", "primary.base_url", value),
        "llm.timeout_secs" => set_u64(&mut tracker, &mut config.llm.timeout_secs, "llm", "timeout_secs", value)?,

        "social.client_id" => set_string(&mut tracker, &mut config.social.client_id, "social", "client_id", value),
        "social.client_secret" => set_secret(&mut tracker, &mut config.social.client_secret, "social", "client_secret", value),
        "social.redirect_uri" => set_string(&mut tracker, &mut config.social.redirect_uri, "social", "redirect_uri", value),
        "social.base_url" => set_string(&mut tracker, &mut config.social.base_url, "social", "base_url", value),
        "social.timeout_secs" => set_u64(&mut tracker, &mut config.social.timeout_secs, "social", "timeout_secs", value)?,

        "chat.access_token" => set_secret(&mut tracker, &mut config.chat.access_token, "chat", "access_token", value),
        "chat.signing_secret" => set_secret(&mut tracker, &mut config.chat.signing_secret, "chat", "signing_secret", value),
        "chat.admin_user_id" => set_opt_string(&mut tracker, &mut config.chat.admin_user_id, "chat", "admin_user_id", value),

        "pipeline.similarity_threshold" => set_f32(
            &mut tracker,
            &mut config.pipeline.similarity_threshold,
            "pipeline",
            "similarity_threshold",
            value,
        )?,
        "pipeline.similarity_recent_n" => {
            set_u32(&mut tracker, &mut config.pipeline.similarity_recent_n, "pipeline", "similarity_recent_n", value)?
        }
        "pipeline.max_attempts" => set_u32(&mut tracker, &mut config.pipeline.max_attempts, "pipeline", "max_attempts", value)?,
        "pipeline.content_max_len" => {
            set_usize(&mut tracker, &mut config.pipeline.content_max_len, "pipeline", "content_max_len", value)?
        }
        "pipeline.review_ttl_hours" => {
            set_i64(&mut tracker, &mut config.pipeline.review_ttl_hours, "pipeline", "review_ttl_hours", value)?
        }
        "pipeline.fail_on_similarity_exhausted" => set_bool(
            &mut tracker,
            &mut config.pipeline.fail_on_similarity_exhausted,
            "pipeline",
            "fail_on_similarity_exhausted",
            value,
        )?,

        "runtime.timezone" => {
            value
                .parse::<chrono_tz::Tz>()
                .map_err(|_| anyhow::anyhow!("Unknown timezone: {value}"))?;
            set_string(&mut tracker, &mut config.runtime.timezone, "runtime", "timezone", value);
        }
        "runtime.review_sweep_interval_secs" => set_u64(
            &mut tracker,
            &mut config.runtime.review_sweep_interval_secs,
            "runtime",
            "review_sweep_interval_secs",
            value,
        )?,
        "runtime.dispatch_interval_secs" => set_u64(
            &mut tracker,
            &mut config.runtime.dispatch_interval_secs,
            "runtime",
            "dispatch_interval_secs",
            value,
        )?,
        "runtime.token_scan_interval_secs" => set_u64(
            &mut tracker,
            &mut config.runtime.token_scan_interval_secs,
            "runtime",
            "token_scan_interval_secs",
            value,
        )?,
        "runtime.insights_interval_secs" => set_u64(
            &mut tracker,
            &mut config.runtime.insights_interval_secs,
            "runtime",
            "insights_interval_secs",
            value,
        )?,
        "runtime.ensure_schedule_interval_secs" => set_u64(
            &mut tracker,
            &mut config.runtime.ensure_schedule_interval_secs,
            "runtime",
            "ensure_schedule_interval_secs",
            value,
        )?,
        "runtime.reminder_interval_secs" => set_u64(
            &mut tracker,
            &mut config.runtime.reminder_interval_secs,
            "runtime",
            "reminder_interval_secs",
            value,
        )?,
        "runtime.shutdown_grace_secs" => set_u64(
            &mut tracker,
            &mut config.runtime.shutdown_grace_secs,
            "runtime",
            "shutdown_grace_secs",
            value,
        )?,

        "secrets.encryption_key" => {
            set_secret(&mut tracker, &mut config.secrets.encryption_key, "secrets", "encryption_key", value)
        }
        "secrets.jwt_signing_secret" => {
            set_secret(&mut tracker, &mut config.secrets.jwt_signing_secret, "secrets", "jwt_signing_secret", value)
        }

        "server.host" => set_string(&mut tracker, &mut config.server.host, "server", "host", value),
        "server.port" => {
            let v: u16 = value.parse().context("must be a valid port number")?;
            tracker.record("server", "port", &config.server.port.to_string(), value);
            config.server.port = v;
        }
        "server.base_url" => set_opt_string(&mut tracker, &mut config.server.base_url, "server", "base_url", value),

        "logging.level" => set_string(&mut tracker, &mut config.logging.level, "logging", "level", value),

        _ => bail!("Unknown setting: {key}\nUse 'postbrand settings --show' to see all available settings."),
    }

    config
        .validate()
        .map_err(|errors| anyhow::anyhow!("configuration is invalid after this change: {errors:?}"))?;

    write_config(config, config_path)?;

    let bold = Style::new().bold();
    eprintln!("{}", bold.apply_to("Updated:"));
    for change in &tracker.changes {
        eprintln!(
            "  {}.{}: \"{}\" -> \"{}\"",
            change.section, change.field, change.old_value, change.new_value
        );
    }

    Ok(())
}

fn write_config(config: &Config, path: &Path) -> Result<()> {
    let toml = toml::to_string_pretty(config).context("rendering configuration as TOML")?;
    if path.exists() {
        let backup_path = path.with_extension("toml.bak");
        std::fs::copy(path, &backup_path).with_context(|| format!("backing up {}", path.display()))?;
    }
    std::fs::write(path, toml).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

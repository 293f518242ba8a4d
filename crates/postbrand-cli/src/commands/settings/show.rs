use anyhow::Result;
use console::Style;
use postbrand_core::config::Config;

pub(super) fn show_config(config: &Config) {
    let bold = Style::new().bold();
    let dim = Style::new().dim();

    eprintln!();
    eprintln!("{}", bold.apply_to("Postbrand Configuration"));
    eprintln!("{}", dim.apply_to("════════════════════════"));

    eprintln!();
    eprintln!("{}", bold.apply_to("Store"));
    eprintln!("  Database path:       {}", config.store.dsn);
    eprintln!("  Connect timeout:     {}", format_duration(config.store.timeout_secs));

    eprintln!();
    eprintln!("{}", bold.apply_to("Queue"));
    eprintln!("  Generate workers:    {}", config.queue.generate_concurrency);
    eprintln!("  Publish workers:     {}", config.queue.publish_concurrency);
    eprintln!("  Token refresh workers: {}", config.queue.token_refresh_concurrency);
    eprintln!("  Lease:               {}", format_duration(config.queue.lease_ms / 1000));
    eprintln!(
        "  Backoff schedule:    {}",
        format_list(&config.queue.backoff_schedule_ms.iter().map(|ms| format!("{ms}ms")).collect::<Vec<_>>())
    );

    eprintln!();
    eprintln!("{}", bold.apply_to("LLM"));
    eprintln!("  Primary provider:    {}", config.llm.primary.provider);
    eprintln!("  Primary model:       {}", config.llm.primary.model);
    eprintln!("  Primary API key:     {}", mask_secret(&config.llm.primary.api_key));
    eprintln!(
        "  Primary base URL:    {}",
        config.llm.primary.base_url.as_deref().unwrap_or("(default)")
    );
    match &config.llm.fallback {
        Some(fallback) => {
            eprintln!("  Fallback provider:   {}", fallback.provider);
            eprintln!("  Fallback model:      {}", fallback.model);
            eprintln!("  Fallback API key:    {}", mask_secret(&fallback.api_key));
        }
        None => eprintln!("  Fallback:            (not set)"),
    }
    match &config.llm.embedding {
        Some(embedding) => {
            eprintln!("  Embedding provider:  {}", embedding.provider);
            eprintln!("  Embedding model:     {}", embedding.model);
            eprintln!("  Embedding API key:   {}", mask_secret(&embedding.api_key));
        }
        None => eprintln!("  Embedding:           (not set)"),
    }
    eprintln!("  Request timeout:     {}", format_duration(config.llm.timeout_secs));

    eprintln!();
    eprintln!("{}", bold.apply_to("Social (Threads)"));
    eprintln!("  Client ID:           {}", config.social.client_id);
    eprintln!("  Client secret:       {}", mask_secret(&config.social.client_secret));
    eprintln!("  Redirect URI:        {}", config.social.redirect_uri);
    eprintln!("  Base URL:            {}", config.social.base_url);
    eprintln!("  Request timeout:     {}", format_duration(config.social.timeout_secs));

    eprintln!();
    eprintln!("{}", bold.apply_to("Chat Notifications"));
    eprintln!("  Access token:        {}", mask_secret(&config.chat.access_token));
    eprintln!("  Signing secret:      {}", mask_secret(&config.chat.signing_secret));
    eprintln!(
        "  Reviewer user id:    {}",
        config.chat.admin_user_id.as_deref().unwrap_or("(not set)")
    );

    eprintln!();
    eprintln!("{}", bold.apply_to("Pipeline"));
    eprintln!("  Similarity threshold: {:.2}", config.pipeline.similarity_threshold);
    eprintln!("  Similarity window:    {} recent posts", config.pipeline.similarity_recent_n);
    eprintln!("  Max generation attempts: {}", config.pipeline.max_attempts);
    eprintln!("  Content max length:   {} chars", config.pipeline.content_max_len);
    eprintln!("  Review TTL:           {} hours", config.pipeline.review_ttl_hours);
    eprintln!(
        "  Fail on similarity exhausted: {}",
        config.pipeline.fail_on_similarity_exhausted
    );

    eprintln!();
    eprintln!("{}", bold.apply_to("Runtime"));
    eprintln!("  Timezone:            {}", config.runtime.timezone);
    eprintln!(
        "  Review sweep every:  {}",
        format_duration(config.runtime.review_sweep_interval_secs)
    );
    eprintln!("  Dispatch every:      {}", format_duration(config.runtime.dispatch_interval_secs));
    eprintln!(
        "  Token scan every:    {}",
        format_duration(config.runtime.token_scan_interval_secs)
    );
    eprintln!("  Insights sync every: {}", format_duration(config.runtime.insights_interval_secs));
    eprintln!(
        "  Ensure schedule every: {}",
        format_duration(config.runtime.ensure_schedule_interval_secs)
    );
    eprintln!("  Reminder every:      {}", format_duration(config.runtime.reminder_interval_secs));
    eprintln!(
        "  Shutdown grace:      {}",
        format_duration(config.runtime.shutdown_grace_secs)
    );

    eprintln!();
    eprintln!("{}", bold.apply_to("Server"));
    eprintln!("  Host:                {}", config.server.host);
    eprintln!("  Port:                {}", config.server.port);
    eprintln!(
        "  Base URL:            {}",
        config.server.base_url.as_deref().unwrap_or("(not set)")
    );

    eprintln!();
    eprintln!("{}", bold.apply_to("Secrets"));
    eprintln!("  Encryption key:      {}", mask_secret(&config.secrets.encryption_key));
    eprintln!("  JWT signing secret:  {}", mask_secret(&config.secrets.jwt_signing_secret));

    eprintln!();
    eprintln!("{}", bold.apply_to("Logging"));
    eprintln!("  Level:               {}", config.logging.level);
    eprintln!();
}

/// Output configuration as JSON with secrets redacted.
pub(super) fn show_config_json(config: &Config) -> Result<()> {
    let mut config = config.clone();
    let redact = |s: Option<String>| s.map(|_| "***REDACTED***".to_string());
    config.llm.primary.api_key = redact(config.llm.primary.api_key);
    if let Some(fallback) = config.llm.fallback.as_mut() {
        fallback.api_key = redact(fallback.api_key.take());
    }
    if let Some(embedding) = config.llm.embedding.as_mut() {
        embedding.api_key = redact(embedding.api_key.take());
    }
    config.social.client_secret = redact(config.social.client_secret);
    config.chat.access_token = redact(config.chat.access_token);
    config.chat.signing_secret = redact(config.chat.signing_secret);
    config.secrets.encryption_key = redact(config.secrets.encryption_key);
    config.secrets.jwt_signing_secret = redact(config.secrets.jwt_signing_secret);
    println!("{}", serde_json::to_string(&config)?);
    Ok(())
}

pub(super) fn mask_secret(secret: &Option<String>) -> String {
    match secret {
        Some(s) if s.len() > 8 => {
            format!("{}...{}", &s[..4], &s[s.len() - 4..])
        }
        Some(s) if !s.is_empty() => "****".to_string(),
        Some(_) => "(empty)".to_string(),
        None => "(not set)".to_string(),
    }
}

pub(super) fn format_list(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

pub(super) fn format_duration(seconds: u64) -> String {
    if seconds == 0 {
        "0 seconds".to_string()
    } else if seconds < 60 {
        format!("{seconds} seconds")
    } else if seconds < 3600 {
        let mins = seconds / 60;
        let remaining = seconds % 60;
        if remaining == 0 {
            format!("{mins} min")
        } else {
            format!("{mins} min {remaining} sec")
        }
    } else if seconds < 86400 {
        let hours = seconds / 3600;
        let remaining_mins = (seconds % 3600) / 60;
        if remaining_mins == 0 {
            format!("{hours} hour{}", if hours == 1 { "" } else { "s" })
        } else {
            format!(
                "{hours} hour{} {remaining_mins} min",
                if hours == 1 { "" } else { "s" }
            )
        }
    } else {
        let days = seconds / 86400;
        let remaining_hours = (seconds % 86400) / 3600;
        if remaining_hours == 0 {
            format!("{days} day{}", if days == 1 { "" } else { "s" })
        } else {
            format!(
                "{days} day{} {remaining_hours} hour{}",
                if days == 1 { "" } else { "s" },
                if remaining_hours == 1 { "" } else { "s" }
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_secret_short_shows_stars() {
        assert_eq!(mask_secret(&Some("abc".to_string())), "****");
    }

    #[test]
    fn mask_secret_long_shows_prefix_suffix() {
        assert_eq!(mask_secret(&Some("sk-1234567890abcdef".to_string())), "sk-1...cdef");
    }

    #[test]
    fn mask_secret_none_and_empty() {
        assert_eq!(mask_secret(&None), "(not set)");
        assert_eq!(mask_secret(&Some(String::new())), "(empty)");
    }

    #[test]
    fn format_duration_buckets() {
        assert_eq!(format_duration(0), "0 seconds");
        assert_eq!(format_duration(45), "45 seconds");
        assert_eq!(format_duration(90), "1 min 30 sec");
        assert_eq!(format_duration(3600), "1 hour");
        assert_eq!(format_duration(90000), "1 day 1 hour");
    }

    #[test]
    fn format_list_empty_and_joined() {
        assert_eq!(format_list(&[]), "(none)");
        assert_eq!(format_list(&["a".to_string(), "b".to_string()]), "a, b");
    }
}

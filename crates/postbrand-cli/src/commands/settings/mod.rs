//! `postbrand settings` — inspect or edit the running configuration.

mod set;
mod show;

use anyhow::Result;
use postbrand_core::config::{expand_tilde, Config};

use crate::commands::SettingsArgs;

pub async fn execute(config_path: &str, args: SettingsArgs) -> Result<()> {
    let path = expand_tilde(config_path);
    let mut config = Config::load(Some(config_path)).map_err(|e| anyhow::anyhow!(e))?;

    if let Some(kv) = args.set.as_deref() {
        return set::set_direct(&mut config, kv, &path);
    }

    if args.json {
        return show::show_config_json(&config);
    }

    show::show_config(&config);
    Ok(())
}

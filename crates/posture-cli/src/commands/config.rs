// Effective configuration: file, then environment, then validation

use std::path::Path;

use anyhow::Context;
use posture_sync::SyncConfig;
use tracing::debug;

/// Load the config file if given, apply environment overrides and validate.
pub fn load(path: Option<&Path>) -> anyhow::Result<SyncConfig> {
    let mut config = match path {
        Some(path) => {
            debug!(path = %path.display(), "Loading config file");
            SyncConfig::load_from_file(path)?
        }
        None => SyncConfig::default(),
    };
    config
        .merge_with_env()
        .context("invalid environment override")?;
    config.validate()?;
    Ok(config)
}

/// Print the effective configuration as TOML.
pub fn show_config(path: Option<&Path>) -> anyhow::Result<()> {
    let config = load(path)?;
    let rendered = toml::to_string_pretty(&config).context("failed to render config")?;
    print!("{rendered}");
    println!("# compliance stream: {}", config.compliance_stream().url);
    println!("# fleet stream:      {}", config.fleet_stream().url);
    Ok(())
}

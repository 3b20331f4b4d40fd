//! Startup configuration.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use camstream_ipc::{QualitySelection, StreamConfig};

/// Load a JSON configuration file. Missing fields take their defaults.
pub fn load_config(path: &Path) -> Result<StreamConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config: StreamConfig = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("Invalid config file {}", path.display()))?;

    Ok(config)
}

/// Build the configuration the manager starts with.
///
/// A configuration file replaces the quality preset. Destination values
/// given on the command line win over either.
pub fn initial_config(
    quality: &str,
    file: Option<&Path>,
    rtmp_url: Option<&str>,
    stream_key: Option<&str>,
) -> Result<StreamConfig> {
    let base = match file {
        Some(path) => load_config(path)?,
        None => QualitySelection::from_name(quality).resolve(&StreamConfig::default()),
    };

    let rtmp_url = rtmp_url.unwrap_or(base.rtmp_url.as_str()).to_string();
    let stream_key = stream_key.unwrap_or(base.stream_key.as_str()).to_string();
    Ok(base.with_destination(rtmp_url, stream_key))
}

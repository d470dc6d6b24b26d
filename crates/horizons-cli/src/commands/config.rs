//! Config command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use horizons_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => output.json(&config),
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            let sync = &config.sync;
            println!("Configuration:");
            println!("  data_dir:                  {}", config.data_dir.display());
            println!(
                "  log_file:                  {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("  sync.primary:              {}", sync.primary);
            println!("  sync.secondary:            {}", sync.secondary);
            println!("  sync.pantry_url:           {}", sync.pantry_url);
            println!("  sync.jsonbin_url:          {}", sync.jsonbin_url);
            println!("  sync.kvdb_url:             {}", sync.kvdb_url);
            println!("  sync.basket:               {}", sync.basket);
            println!("  sync.poll_interval_secs:   {}", sync.poll_interval_secs);
            println!("  sync.request_timeout_secs: {}", sync.request_timeout_secs);
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    config.set_value(&key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

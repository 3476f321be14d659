//! Configuration display, validation and scaffolding.

use std::path::Path;

use console::style;

use speechcorpus::Config;

use crate::cli::icons::{dim_arrow, error, success, warn};

/// Print the effective configuration as YAML.
pub fn cmd_config_show(config: &Config) -> anyhow::Result<()> {
    let source = config
        .source_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "built-in defaults".to_string());

    eprintln!("{} Source: {}", dim_arrow(), source);
    eprintln!("{} Hash: {}", dim_arrow(), style(config.short_hash()).cyan());
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}

/// Load and validate a config file, then summarize what it selects.
pub async fn cmd_config_validate(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        eprintln!("{} Config file not found: {}", error(), path.display());
        std::process::exit(1);
    }

    let config = match Config::load_from_path(path).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", error(), e);
            std::process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("{} {}", error(), e);
        std::process::exit(1);
    }

    println!("{} Configuration is valid", success());
    let range = config.pipeline.date_range;
    let sources: Vec<&str> = config.enabled_sources().iter().map(|s| s.as_str()).collect();
    println!("  {:<20} {} to {}", "Date range", range.start, range.end);
    println!("  {:<20} {}", "Output directory", config.pipeline.output_dir);
    println!("  {:<20} {}", "Enabled sources", sources.join(", "));
    println!(
        "  {:<20} {:?}",
        "Unicode normalize", config.processing.unicode_normalize
    );
    println!(
        "  {:<20} {}",
        "Min text length", config.processing.min_text_length
    );
    println!("  {:<20} {}", "Export JSONL", config.export.jsonl);
    println!("  {:<20} {}", "Hash", style(config.short_hash()).cyan());
    Ok(())
}

/// Write the default configuration to `path`.
pub async fn cmd_config_init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        eprintln!("{} Config file already exists: {}", warn(), path.display());
        eprintln!("  Use --force to overwrite");
        std::process::exit(1);
    }

    Config::default().save_to_path(path).await?;
    println!("{} Default config written to {}", success(), path.display());
    Ok(())
}

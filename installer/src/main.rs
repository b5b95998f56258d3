// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kea-Installer: cluster manifest generation for the Kea ecosystem

use std::path::PathBuf;

use anyhow::Context;
use asset_graph::Asset;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use kea_installer::{pipeline, Config};

/// Kea-Installer: The Manifest Forge
///
/// Generates the common manifests of a cluster from an install config,
/// restoring whatever a previous run left in the output directory.
#[derive(Parser, Debug)]
#[command(name = "installer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "installer.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate manifests into the output directory
    #[command(alias = "gen")]
    Generate {
        /// Regenerate manifests even if a previous run left them behind
        #[arg(short, long)]
        force: bool,
    },

    /// Load manifests left by a previous run
    Load,

    /// Show configuration
    Config,

    /// Initialize a new installer configuration
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.command {
        Commands::Init { .. } | Commands::Version => Config::default(),
        _ => Config::from_file_or_default(&cli.config)
            .with_context(|| format!("Failed to load config from {}", cli.config.display()))?,
    };

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.debug)
        .with_writer(std::io::stderr);
    if config.logging.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Version => {
            println!("Kea-Installer v{}", env!("CARGO_PKG_VERSION"));
            println!("The Manifest Forge for the Kea Ecosystem");
            Ok(())
        }

        Commands::Init { force } => init_config(&cli.config, force).await,

        Commands::Config => show_config(&cli.config, &config).await,

        Commands::Generate { force } => generate(&config, force).await,

        Commands::Load => load(&config).await,
    }
}

/// Initialize a new configuration file
async fn init_config(config_path: &PathBuf, force: bool) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let default_config = r#"# SPDX-License-Identifier: AGPL-3.0-or-later
# Kea-Installer Configuration

name = "installer"
version = "1.0"
output_dir = "cluster"
install_config = "install-config.yaml"

[logging]
level = "info"
format = "text"
"#;

    std::fs::write(config_path, default_config)?;
    info!("Created configuration file: {}", config_path.display());
    println!("Created configuration file: {}", config_path.display());
    Ok(())
}

/// Show the current configuration
async fn show_config(config_path: &PathBuf, config: &Config) -> anyhow::Result<()> {
    if !config_path.exists() {
        println!("No configuration file found. Using defaults:");
        println!();
    }

    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Generate manifests and persist them
async fn generate(config: &Config, force: bool) -> anyhow::Result<()> {
    let report = pipeline::generate(config, force)
        .await
        .with_context(|| format!("Failed to generate manifests in {}", config.output_dir.display()))?;

    if report.restored {
        println!("Manifests restored from {}", config.output_dir.display());
    } else {
        println!("Manifests generated in {}", config.output_dir.display());
    }
    println!();
    println!("  Files: {}", report.files.len());
    println!("  Digest: {}", report.digest);

    Ok(())
}

/// Load and list manifests from a previous run
async fn load(config: &Config) -> anyhow::Result<()> {
    let manifests = pipeline::load(config)
        .await
        .with_context(|| format!("Failed to load manifests from {}", config.output_dir.display()))?;

    let Some(manifests) = manifests else {
        println!("No manifests found in {}", config.output_dir.display());
        return Ok(());
    };

    println!("Manifests in {}:", config.output_dir.display());
    println!();
    for file in manifests.files() {
        println!("  - {}", file.path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["installer", "version"]).unwrap();
        match cli.command {
            Commands::Version => {}
            _ => panic!("Expected Version command"),
        }
    }

    #[test]
    fn test_cli_generate_force() {
        let cli = Cli::try_parse_from(["installer", "generate", "--force"]).unwrap();
        match cli.command {
            Commands::Generate { force } => assert!(force),
            _ => panic!("Expected Generate command"),
        }
    }

    #[test]
    fn test_cli_gen_alias() {
        let cli = Cli::try_parse_from(["installer", "gen"]).unwrap();
        assert!(matches!(cli.command, Commands::Generate { force: false }));
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["installer", "-v", "load"]).unwrap();
        assert!(cli.verbose);
    }
}

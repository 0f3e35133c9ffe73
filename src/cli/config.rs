use crate::config::generate::generate_starter_config;
use crate::config::load_config;
use std::fs;
use std::path::{Path, PathBuf};

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();

    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    let config_path = default_config_path();
    if config_path.exists() {
        return Err(format!(
            "config file already exists at {}; remove it first or use --stdout",
            config_path.display()
        )
        .into());
    }

    write_config(&config_content, &config_path)?;
    println!("Config file written to {}", config_path.display());
    Ok(())
}

pub fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = match config_path {
        Some(path) => path,
        None => {
            return Err("config not found; searched ~/.config/spiketrace/config.yml and \
                        /etc/spiketrace/config.yml (use --config <path>)"
                .into())
        }
    };

    let config = load_config(path)?;
    println!(
        "{} is valid: {} services, {} regions, {} scenarios",
        path.display(),
        config.services.len(),
        config.regions.len(),
        config.scenarios.len()
    );
    Ok(())
}

/// `~/.config/spiketrace/config.yml`, or `/etc/spiketrace/config.yml` without a home directory.
fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".config/spiketrace/config.yml"))
        .unwrap_or_else(|| PathBuf::from("/etc/spiketrace/config.yml"))
}

fn write_config(config_content: &str, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, config_content)
}

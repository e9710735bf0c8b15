//! Configuration and device commands.

use std::path::Path;

use crate::config::{self, Config};
use crate::player::{current_audio_device, list_audio_devices};

/// Print the effective configuration, or write the defaults with `--init`.
pub fn cmd_config(config: &Config, explicit: Option<&Path>, init: bool) -> anyhow::Result<()> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => config::config_path(),
    };

    if init {
        let Some(path) = path else {
            anyhow::bail!("no config directory available on this system");
        };
        if path.exists() {
            println!("Config already exists at {}", path.display());
            return Ok(());
        }
        let written = match explicit {
            Some(_) => {
                config::save_to(&Config::default(), &path)?;
                path
            }
            None => config::save(&Config::default())?,
        };
        println!("Wrote default config to {}", written.display());
        return Ok(());
    }

    match &path {
        Some(path) if path.exists() => println!("# {}", path.display()),
        Some(path) => println!("# {} (not present, showing defaults)", path.display()),
        None => println!("# no config directory, showing defaults"),
    }
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// List audio output devices, marking the default.
pub fn cmd_devices() -> anyhow::Result<()> {
    let current = current_audio_device();
    let devices = list_audio_devices();
    if devices.is_empty() {
        println!("No audio output devices found.");
        return Ok(());
    }
    for device in devices {
        let marker = if device == current { "*" } else { " " };
        println!("{} {}", marker, device);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_writes_defaults_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        cmd_config(&Config::default(), Some(&path), true).unwrap();
        assert!(path.exists());
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[playback]"));

        // Existing files are left alone
        std::fs::write(&path, "# mine\n").unwrap();
        cmd_config(&Config::default(), Some(&path), true).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine\n");
    }
}

use std::fs;
use std::path::PathBuf;

/// Bundled starter config written by `wen config init`
pub const SAMPLE_CONFIG: &str = include_str!("../../samples/sample-config.yml");

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    if stdout {
        print!("{}", SAMPLE_CONFIG);
        return Ok(());
    }

    // Try ~/.config/wen/config.yml first
    let config_path = if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".config/wen/config.yml");

        match user_config.parent().map(fs::create_dir_all) {
            Some(Ok(())) => Some(user_config),
            Some(Err(_)) => {
                eprintln!("Warning: Could not create ~/.config/wen");
                eprintln!("Falling back to /etc/wen/config.yml");
                None
            }
            None => None,
        }
    } else {
        None
    };

    let config_path = config_path.unwrap_or_else(|| PathBuf::from("/etc/wen/config.yml"));
    write_new_config(&config_path, SAMPLE_CONFIG)?;

    println!("Config file written to {}", config_path.display());
    Ok(())
}

/// Write `content` to `path`, refusing to replace an existing file
fn write_new_config(path: &std::path::Path, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        return Err(format!(
            "Config file already exists at {}. Remove it first or use --stdout to print the config",
            path.display()
        )
        .into());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use tempfile::TempDir;

    #[test]
    fn test_sample_config_is_valid() {
        let config = parse_config(SAMPLE_CONFIG).unwrap();
        assert_eq!(config.targets.curated_fids.len(), 25);
        assert_eq!(config.targets.max_fids, 30);
        assert!(config.posting.publisher.is_none());
        assert!(config.web.is_some());
    }

    #[test]
    fn test_write_refuses_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.yml");

        write_new_config(&path, "hub: {}\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hub: {}\n");

        assert!(write_new_config(&path, "other").is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "hub: {}\n");
    }
}

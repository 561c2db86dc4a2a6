use std::path::PathBuf;

/// Runtime configuration, resolved once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    /// Base data directory for the projects/providers store (`~/.dockhand` by default).
    pub data_dir: PathBuf,
}

fn default_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(9110)
}

fn default_environment() -> String {
    std::env::var("DOCKHAND_ENV").unwrap_or_else(|_| "local".to_string())
}

/// Resolve the base data directory, honoring `HOME`/`APPDATA`/`LOCALAPPDATA`
/// the way the archive scanner's platform-specific roots do.
pub fn default_data_dir() -> PathBuf {
    if let Ok(explicit) = std::env::var("DOCKHAND_DATA_DIR") {
        return PathBuf::from(explicit);
    }
    dirs::data_dir()
        .map(|d| d.join("dockhand"))
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".dockhand")
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: default_port(),
            environment: default_environment(),
            data_dir: default_data_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_environment_is_local_without_env() {
        // SAFETY: test-only env mutation, single-threaded within this test.
        unsafe {
            std::env::remove_var("DOCKHAND_ENV");
        }
        assert_eq!(default_environment(), "local");
    }

    #[test]
    fn data_dir_honors_explicit_override() {
        unsafe {
            std::env::set_var("DOCKHAND_DATA_DIR", "/tmp/dockhand-test-dir");
        }
        assert_eq!(default_data_dir(), PathBuf::from("/tmp/dockhand-test-dir"));
        unsafe {
            std::env::remove_var("DOCKHAND_DATA_DIR");
        }
    }
}

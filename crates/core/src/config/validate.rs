use std::collections::HashSet;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Download tool program is set
/// - Runner makes at least one attempt and has a non-zero idle timeout
/// - Progress reset window is well formed
/// - Library names are unique and roots are set
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.download.program.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "download.program cannot be empty".to_string(),
        ));
    }

    if config.runner.retries == 0 {
        return Err(ConfigError::ValidationError(
            "runner.retries must be at least 1".to_string(),
        ));
    }

    if config.runner.idle_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "runner.idle_timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.progress.reset_floor >= config.progress.reset_ceiling {
        return Err(ConfigError::ValidationError(format!(
            "progress.reset_floor ({}) must be below progress.reset_ceiling ({})",
            config.progress.reset_floor, config.progress.reset_ceiling
        )));
    }

    let mut names = HashSet::new();
    for lib in &config.libraries {
        if lib.root.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "library '{}' has an empty root",
                lib.name
            )));
        }
        if !names.insert(lib.name.to_lowercase()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate library name '{}'",
                lib.name
            )));
        }
    }

    Ok(())
}

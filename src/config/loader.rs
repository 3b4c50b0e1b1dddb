//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::BridgeConfig;
use crate::config::secret_string;
use crate::domain::errors::BridgeError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into BridgeConfig
/// 4. Applies environment variable overrides (BRIDGE_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if the file cannot be read, a referenced environment
/// variable is missing, TOML parsing fails or validation fails.
///
/// # Examples
///
/// ```no_run
/// use smart_bridge::config::loader::load_config;
///
/// let config = load_config("bridge.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<BridgeConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(BridgeError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        BridgeError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: BridgeConfig = toml::from_str(&contents)
        .map_err(|e| BridgeError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        BridgeError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| BridgeError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        // Comment lines are copied verbatim
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(BridgeError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using the BRIDGE_* prefix
///
/// Environment variables follow the pattern: BRIDGE_<SECTION>_<KEY>
/// For example: BRIDGE_UCS_BASE_URL, BRIDGE_SYNC_MODE
fn apply_env_overrides(config: &mut BridgeConfig) {
    // Application overrides
    if let Ok(val) = std::env::var("BRIDGE_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("BRIDGE_APPLICATION_DRY_RUN") {
        config.application.dry_run = val.parse().unwrap_or(false);
    }

    // UCS overrides
    if let Ok(val) = std::env::var("BRIDGE_UCS_BASE_URL") {
        config.ucs.base_url = val;
    }
    if let Ok(val) = std::env::var("BRIDGE_UCS_USERNAME") {
        config.ucs.username = Some(val);
    }
    if let Ok(val) = std::env::var("BRIDGE_UCS_PASSWORD") {
        config.ucs.password = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("BRIDGE_UCS_TLS_VERIFY") {
        config.ucs.tls_verify = val.parse().unwrap_or(true);
    }

    // FHIR overrides
    if let Ok(val) = std::env::var("BRIDGE_FHIR_BASE_URL") {
        config.fhir.base_url = val;
    }
    if let Ok(val) = std::env::var("BRIDGE_FHIR_AUTH_TYPE") {
        config.fhir.auth_type = val;
    }
    if let Ok(val) = std::env::var("BRIDGE_FHIR_USERNAME") {
        config.fhir.username = Some(val);
    }
    if let Ok(val) = std::env::var("BRIDGE_FHIR_PASSWORD") {
        config.fhir.password = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("BRIDGE_FHIR_TOKEN") {
        config.fhir.token = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("BRIDGE_FHIR_TLS_VERIFY") {
        config.fhir.tls_verify = val.parse().unwrap_or(true);
    }

    // Sync overrides
    if let Ok(val) = std::env::var("BRIDGE_SYNC_MODE") {
        config.sync.mode = val;
    }
    if let Ok(val) = std::env::var("BRIDGE_SYNC_PAGE_SIZE") {
        if let Ok(size) = val.parse() {
            config.sync.page_size = size;
        }
    }
    if let Ok(val) = std::env::var("BRIDGE_SYNC_CURSOR_PATH") {
        config.sync.cursor_path = val;
    }
    if let Ok(val) = std::env::var("BRIDGE_SYNC_POLL_INTERVAL_SECONDS") {
        if let Ok(interval) = val.parse() {
            config.sync.poll_interval_seconds = interval;
        }
    }

    // Executor overrides
    if let Ok(val) = std::env::var("BRIDGE_EXECUTOR_BATCH_TIMEOUT_MS") {
        if let Ok(timeout) = val.parse() {
            config.executor.batch_timeout_ms = timeout;
        }
    }
    if let Ok(val) = std::env::var("BRIDGE_EXECUTOR_FORWARD_WORKERS") {
        if let Ok(workers) = val.parse() {
            config.executor.forward_pool.workers = workers;
        }
    }
    if let Ok(val) = std::env::var("BRIDGE_EXECUTOR_REVERSE_WORKERS") {
        if let Ok(workers) = val.parse() {
            config.executor.reverse_pool.workers = workers;
        }
    }

    // Audit overrides
    if let Ok(val) = std::env::var("BRIDGE_AUDIT_ENABLED") {
        config.audit.enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("BRIDGE_AUDIT_PATH") {
        config.audit.path = val;
    }

    // Logging overrides
    if let Ok(val) = std::env::var("BRIDGE_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("BRIDGE_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("BRIDGE_LOADER_TEST_VAR", "test_value");
        let input = "password = \"${BRIDGE_LOADER_TEST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "password = \"test_value\"\n");
        std::env::remove_var("BRIDGE_LOADER_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("BRIDGE_LOADER_MISSING_VAR");
        let input = "password = \"${BRIDGE_LOADER_MISSING_VAR}\"";
        let result = substitute_env_vars(input);
        assert!(result.is_err());
    }

    #[test]
    fn test_substitute_env_vars_skips_comments() {
        std::env::remove_var("BRIDGE_LOADER_COMMENTED_VAR");
        let input = "# password = \"${BRIDGE_LOADER_COMMENTED_VAR}\"";
        assert!(substitute_env_vars(input).is_ok());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_valid() {
        let toml_content = r#"
[application]
log_level = "info"

[ucs]
base_url = "https://ucs.example.org/opensrp/rest"
username = "bridge"
password = "pass"

[fhir]
base_url = "https://fhir.example.org/fhir"

[sync]
mode = "incremental"
page_size = 50
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.ucs.base_url, "https://ucs.example.org/opensrp/rest");
        assert_eq!(config.sync.page_size, 50);
        assert_eq!(config.executor.forward_pool.overflow_policy, "run_inline");
    }
}

//! `validate-config`: load the bridge configuration and print what it resolves to

use super::EXIT_CONFIG;
use crate::config::{load_config, BridgeConfig, PoolConfig};
use clap::Args;

#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Returns 0 for a usable configuration, [`EXIT_CONFIG`] otherwise
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        // load_config applies env overrides and runs validate()
        match load_config(config_path) {
            Ok(config) => {
                println!("✅ {config_path} is valid");
                println!();
                for (key, value) in summary(&config) {
                    println!("  {key:<14} {value}");
                }
                Ok(0)
            }
            Err(e) => {
                println!("❌ {config_path} is not usable");
                println!("   {e}");
                Ok(EXIT_CONFIG)
            }
        }
    }
}

fn describe_pool(pool: &PoolConfig) -> String {
    format!(
        "{} workers, queue {}, on overflow {}",
        pool.workers, pool.queue_capacity, pool.overflow_policy
    )
}

/// Effective settings worth eyeballing before a run; never includes secrets
fn summary(config: &BridgeConfig) -> Vec<(&'static str, String)> {
    let audit = if config.audit.enabled {
        config.audit.path.clone()
    } else {
        "disabled".to_string()
    };

    vec![
        ("environment", format!("{:?}", config.environment)),
        ("log level", config.application.log_level.clone()),
        ("dry run", config.application.dry_run.to_string()),
        ("ucs", config.ucs.base_url.clone()),
        ("fhir", format!("{} ({})", config.fhir.base_url, config.fhir.auth_type)),
        (
            "sync",
            format!("{} mode, page size {}", config.sync.mode, config.sync.page_size),
        ),
        ("cursor", config.sync.cursor_path.clone()),
        ("forward pool", describe_pool(&config.executor.forward_pool)),
        ("reverse pool", describe_pool(&config.executor.reverse_pool)),
        ("audit", audit),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_validate_missing_file() {
        let code = ValidateArgs {}.execute("nope.toml").await.unwrap();
        assert_eq!(code, EXIT_CONFIG);
    }

    #[test]
    fn test_summary_lists_pools_without_secrets() {
        let config = BridgeConfig::default();
        let lines = summary(&config);

        let forward = lines.iter().find(|(k, _)| *k == "forward pool").unwrap();
        assert!(forward.1.contains("workers"));
        assert!(lines.iter().all(|(_, v)| !v.to_lowercase().contains("password")));
    }
}

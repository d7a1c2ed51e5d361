//! Dashboard configuration — loaded from environment variables.

use std::time::Duration;

const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Clone, Debug)]
pub struct DashboardConfig {
    /// GitHub webhook secret for HMAC validation.
    pub github_webhook_secret: String,
    /// GitHub token for the Actions jobs API.
    pub github_token: String,
    /// Base URL of the GitHub REST API.
    pub github_api_url: String,
    /// Upper bound on one jobs API call.
    pub job_fetch_timeout: Duration,
    /// Maximum pooled database connections.
    pub database_max_connections: usize,
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        let config = Self::from_lookup(|key| std::env::var(key).ok());

        if config.github_webhook_secret.is_empty() {
            tracing::warn!("GITHUB_WEBHOOK_SECRET not set -- every webhook will be rejected");
        }
        if config.github_token.is_empty() {
            tracing::warn!("GITHUB_TOKEN not set -- job details will not be fetched");
        }

        config
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let github_webhook_secret = lookup("GITHUB_WEBHOOK_SECRET").unwrap_or_default();
        let github_token = lookup("GITHUB_TOKEN").unwrap_or_default();
        let github_api_url = lookup("GITHUB_API_URL")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let job_fetch_timeout_secs = lookup("JOB_FETCH_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .filter(|secs: &u64| *secs > 0)
            .unwrap_or(15);
        let database_max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(8);

        Self {
            github_webhook_secret,
            github_token,
            github_api_url,
            job_fetch_timeout: Duration::from_secs(job_fetch_timeout_secs),
            database_max_connections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> DashboardConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DashboardConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config_from(&[]);
        assert_eq!(config.github_webhook_secret, "");
        assert_eq!(config.github_token, "");
        assert_eq!(config.github_api_url, "https://api.github.com");
        assert_eq!(config.job_fetch_timeout, Duration::from_secs(15));
        assert_eq!(config.database_max_connections, 8);
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("GITHUB_WEBHOOK_SECRET", "s3cret"),
            ("GITHUB_TOKEN", "ghp_x"),
            ("GITHUB_API_URL", "https://ghe.example.com/api/v3"),
            ("JOB_FETCH_TIMEOUT_SECS", "30"),
            ("DATABASE_MAX_CONNECTIONS", "2"),
        ]);
        assert_eq!(config.github_webhook_secret, "s3cret");
        assert_eq!(config.github_token, "ghp_x");
        assert_eq!(config.github_api_url, "https://ghe.example.com/api/v3");
        assert_eq!(config.job_fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.database_max_connections, 2);
    }

    #[test]
    fn invalid_or_zero_timeout_falls_back() {
        assert_eq!(
            config_from(&[("JOB_FETCH_TIMEOUT_SECS", "soon")]).job_fetch_timeout,
            Duration::from_secs(15)
        );
        assert_eq!(
            config_from(&[("JOB_FETCH_TIMEOUT_SECS", "0")]).job_fetch_timeout,
            Duration::from_secs(15)
        );
    }

    #[test]
    fn zero_pool_size_falls_back() {
        assert_eq!(
            config_from(&[("DATABASE_MAX_CONNECTIONS", "0")]).database_max_connections,
            8
        );
        assert_eq!(
            config_from(&[("DATABASE_MAX_CONNECTIONS", "many")]).database_max_connections,
            8
        );
    }
}

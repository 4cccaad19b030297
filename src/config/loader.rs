use std::path::Path;

use super::{AppConfig, ConfigError};

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_yaml::from_str(&content)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_missing_config() {
        let result = load_config("/nonexistent/config.yaml");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_config_invalid_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "invalid: yaml: content: [").unwrap();

        let result = load_config(file.path());
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_valid() {
        let config_content = r#"
server:
  port: 3000
  host: "0.0.0.0"

upstream:
  url: "https://api.openai.com/v1"
  api_key: "sk-test"
  timeout_seconds: 15

retry:
  max_attempts: 3
  base_delay_ms: 2000

models:
  chain:
    - gpt-4o-mini
    - gpt-4o
    - gpt-3.5-turbo
  default_model: gpt-4o-mini
  cooldown_hours: 24
  sweep_interval_minutes: 60

telemetry:
  enabled: true
  thresholds: [1, 10, 50, 100]
  alert_on: requests
  top_routes: 5

notifier:
  telegram:
    enabled: false
    bot_token: ""
    chat_id: ""
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", config_content).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.upstream.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.models.chain.len(), 3);
        assert_eq!(config.telemetry.thresholds, vec![1, 10, 50, 100]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_minimal() {
        // Only the server section is required; everything else has defaults
        let config_content = r#"
server:
  port: 3000
  host: "127.0.0.1"
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", config_content).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.upstream.base_url(), "https://api.openai.com/v1");
        assert_eq!(config.models.chain.len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_file() {
        let result = AppConfig::from_file("/nonexistent/path.yaml");
        assert!(result.is_err());
    }
}

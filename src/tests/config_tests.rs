#[cfg(test)]
mod tests {
    use crate::config::{self, AppConfig};
    use std::env;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_config(content: &str) -> NamedTempFile {
        let mut temp_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.environment, "development");
        assert!(config.limiter.enabled);
        assert_eq!(config.limiter.rps, 2.0);
        assert_eq!(config.limiter.burst, 5);
        assert!(!config.limiter.trust_proxy_headers);
        assert_eq!(config.store_timeout(), std::time::Duration::from_secs(3));
        assert_eq!(config.shutdown_grace(), std::time::Duration::from_secs(30));
        assert!(config::validate(&config).is_ok());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = write_temp_config(
            r#"
[server]
port = 4000
environment = "production"

[limiter]
enabled = false
rps = 0.0
burst = 0
"#,
        );
        let config = config::load_from(file.path().to_str()).unwrap();

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.environment, "production");
        assert_eq!(config.server.host, "127.0.0.1");
        // Zero rate/burst is fine while the limiter is off.
        assert!(!config.limiter.enabled);
        assert_eq!(config.store.query_timeout_ms, 3000);
    }

    #[test]
    fn test_invalid_port_in_file() {
        let file = write_temp_config("[server]\nport = 0\n");
        let err = config::load_from(file.path().to_str()).unwrap_err();
        assert!(err.to_string().contains("invalid server.port"));
    }

    #[test]
    fn test_missing_custom_file_is_ignored() {
        let config = config::load_from(Some("/nonexistent/tapir-test-config")).unwrap();
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_env_overrides_file() {
        env::set_var("TAPIR__MAIL__SENDER", "ops@bookclub.test");
        let file = write_temp_config("[mail]\nsender = \"file@bookclub.test\"\n");
        let result = config::load_from(file.path().to_str());
        env::remove_var("TAPIR__MAIL__SENDER");

        assert_eq!(result.unwrap().mail.sender, "ops@bookclub.test");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.server.environment = "qa".to_string();
        assert!(config::validate(&config).unwrap_err().to_string().contains("invalid server.environment"));

        let mut config = AppConfig::default();
        config.limiter.rps = 0.0;
        assert!(config::validate(&config).is_err());
        config.limiter.rps = f64::NAN;
        assert!(config::validate(&config).is_err());

        let mut config = AppConfig::default();
        config.limiter.burst = 0;
        assert!(config::validate(&config).is_err());

        let mut config = AppConfig::default();
        config.store.query_timeout_ms = 0;
        assert!(config::validate(&config).is_err());
    }
}

// ABOUTME: Integration tests for configuration parsing and validation.
// ABOUTME: Tests YAML parsing, humantime durations, discovery, and init templates.

use pulley::config::*;
use pulley::error::{Error, SetupError};
use pulley::runtime::RuntimeType;
use std::fs;
use std::time::Duration;

mod parsing {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let config = Config::from_yaml("images:\n  - redis:latest\n").unwrap();
        assert_eq!(config.images.len(), 1);
        assert_eq!(config.pull, PullConfig::default());
        assert!(config.runtime.runtime.is_none());
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert!(config.images.is_empty());
        assert_eq!(config.pull.concurrency, 4);
        assert_eq!(config.pull.attempt_timeout, Duration::from_secs(300));
        assert_eq!(config.pull.retry.max_attempts, 3);
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
images:
  - redis:latest
  - ghcr.io/org/app@sha256:abc

concurrency: 8
attempt_timeout: 90s
timeout: 10m
cancel_grace: 500ms

retry:
  max_attempts: 5
  base_delay: 2s
  max_delay: 1m
  multiplier: 3.0
  jitter: 0.1

runtime: podman
socket: /run/podman/podman.sock
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.images.len(), 2);
        assert_eq!(config.pull.concurrency, 8);
        assert_eq!(config.pull.attempt_timeout, Duration::from_secs(90));
        assert_eq!(config.pull.timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.pull.cancel_grace, Duration::from_millis(500));
        assert_eq!(config.pull.retry.max_attempts, 5);
        assert_eq!(config.pull.retry.max_delay, Duration::from_secs(60));
        assert_eq!(config.runtime.runtime, Some(RuntimeType::Podman));
        assert_eq!(
            config.runtime.socket.as_deref(),
            Some("/run/podman/podman.sock")
        );
        assert!(config.pull.validate().is_ok());
    }

    #[test]
    fn unknown_retry_field_is_rejected() {
        let result = Config::from_yaml("retry:\n  attempts: 3\n");
        assert!(matches!(result, Err(Error::Yaml(_))));
    }

    #[test]
    fn bad_duration_is_rejected() {
        assert!(Config::from_yaml("attempt_timeout: soon\n").is_err());
    }

    #[test]
    fn bad_image_is_rejected() {
        assert!(Config::from_yaml("images:\n  - \"two words\"\n").is_err());
    }
}

mod validation {
    use super::*;

    fn invalid(config: PullConfig) -> String {
        match config.validate() {
            Err(SetupError::InvalidConfig(message)) => message,
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(PullConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_concurrency() {
        let config = PullConfig {
            concurrency: 0,
            ..PullConfig::default()
        };
        assert!(invalid(config).contains("concurrency"));
    }

    #[test]
    fn zero_attempt_timeout() {
        let config = PullConfig {
            attempt_timeout: Duration::ZERO,
            ..PullConfig::default()
        };
        assert!(invalid(config).contains("attempt_timeout"));
    }

    #[test]
    fn zero_overall_timeout() {
        let config = PullConfig {
            timeout: Some(Duration::ZERO),
            ..PullConfig::default()
        };
        assert!(invalid(config).contains("timeout"));
    }

    #[test]
    fn retry_settings_are_checked() {
        let mut config = PullConfig::default();
        config.retry.max_attempts = 0;
        assert!(invalid(config.clone()).contains("max_attempts"));

        config.retry.max_attempts = 3;
        config.retry.base_delay = Duration::from_secs(60);
        config.retry.max_delay = Duration::from_secs(1);
        assert!(invalid(config.clone()).contains("base_delay"));

        config.retry.base_delay = Duration::from_millis(100);
        config.retry.jitter = 1.5;
        assert!(invalid(config).contains("jitter"));
    }
}

mod discovery {
    use super::*;

    #[test]
    fn finds_primary_filename() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "concurrency: 2\n").unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.pull.concurrency, 2);
    }

    #[test]
    fn finds_config_in_dot_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".pulley")).unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_DIR), "concurrency: 6\n").unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.pull.concurrency, 6);
    }

    #[test]
    fn missing_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::discover(dir.path()),
            Err(Error::ConfigNotFound(_))
        ));
    }
}

mod init {
    use super::*;

    #[test]
    fn writes_parseable_template() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), false).unwrap();

        let config = Config::load(&dir.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config.images.len(), 2);
        assert!(config.pull.validate().is_ok());
    }

    #[test]
    fn refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "images: []\n").unwrap();

        assert!(matches!(
            init_config(dir.path(), false),
            Err(Error::AlreadyExists(_))
        ));
        init_config(dir.path(), true).unwrap();
        let content = fs::read_to_string(dir.path().join(CONFIG_FILENAME)).unwrap();
        assert!(content.contains("redis:latest"));
    }
}

mod image_lists {
    use super::*;

    #[test]
    fn reads_list_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.txt");
        fs::write(&path, "# base\nredis:latest\n\nnginx:latest # web\n").unwrap();

        let images = read_image_list(&path).unwrap();
        let names: Vec<&str> = images.iter().map(|i| i.as_str()).collect();
        assert_eq!(names, ["redis:latest", "nginx:latest"]);
    }

    #[test]
    fn reports_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.txt");
        fs::write(&path, "redis\nbad entry\n").unwrap();

        match read_image_list(&path) {
            Err(Error::ImageList { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected ImageList error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_image_list(&dir.path().join("nope.txt")),
            Err(Error::Io(_))
        ));
    }
}

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tabula_executor::DEFAULT_CONCURRENCY;
use tabula_layout::LayoutConfig;
use tabula_resource::{RetryPolicy, parse_base_url};
use url::Url;

/// Name of the optional configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "tabula";
/// Prefix of environment overrides, e.g. `TABULA__CONCURRENCY=4` or
/// `TABULA__LAYOUT__FONT_SIZE=16`.
pub const ENV_PREFIX: &str = "TABULA";

/// Session configuration. Every field has a default, so an empty file (or no
/// file at all) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Maximum number of concurrent resource fetches.
    pub concurrency: usize,
    /// Per-attempt fetch timeout.
    pub fetch_timeout_ms: u64,
    /// Retries after the first failed attempt.
    pub fetch_retries: u32,
    /// Backoff after attempt `n` is `n × retry_base_delay_ms`.
    pub retry_base_delay_ms: u64,
    /// Paint cycles to wait for regions that still report zero height.
    pub measure_retry_ceiling: u32,
    /// How long a new total height must hold before it is reported.
    pub stabilization_window_ms: u64,
    /// Height changes at or below this are not re-reported.
    pub height_tolerance_px: f32,
    /// Base for relative resource paths.
    pub base_url: Option<String>,
    /// Directory `file://` resources may be read from. Disabled when unset.
    pub resource_root: Option<PathBuf>,
    pub layout: LayoutConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            fetch_timeout_ms: 10_000,
            fetch_retries: 3,
            retry_base_delay_ms: 500,
            measure_retry_ceiling: 5,
            stabilization_window_ms: 80,
            height_tolerance_px: 1.0,
            base_url: None,
            resource_root: None,
            layout: LayoutConfig::default(),
        }
    }
}

impl RenderConfig {
    /// Loads `tabula.toml` from the working directory if present, then
    /// layers `TABULA__*` environment variables on top.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Like [`load`](Self::load) but reads the given file, which must exist.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        builder = match path {
            Some(path) => builder.add_source(config::File::from(path)),
            None => builder.add_source(config::File::with_name(CONFIG_FILE).required(false)),
        };
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"));

        let config: RenderConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.height_tolerance_px >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "height_tolerance_px",
                message: format!("must be a non-negative number, got {}", self.height_tolerance_px),
            });
        }
        if self.fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "fetch_timeout_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        self.parsed_base_url()?;
        Ok(())
    }

    pub fn parsed_base_url(&self) -> Result<Option<Url>, ConfigError> {
        self.base_url
            .as_deref()
            .map(parse_base_url)
            .transpose()
            .map_err(ConfigError::BaseUrl)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(self.fetch_timeout_ms),
            retries: self.fetch_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }

    pub fn stabilization_window(&self) -> Duration {
        Duration::from_millis(self.stabilization_window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.concurrency, 6);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.stabilization_window(), Duration::from_millis(80));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_overrides_selected_fields() {
        let file = toml_file(
            r#"
            concurrency = 2
            fetch_retries = 1
            base_url = "https://assets.example.com/media"

            [layout]
            font_size = 18
            "#,
        );
        let config = RenderConfig::load_from(Some(file.path())).unwrap();

        assert_eq!(config.concurrency, 2);
        assert_eq!(config.fetch_retries, 1);
        assert_eq!(config.fetch_timeout_ms, 10_000);
        assert_eq!(config.layout.font_size, 18.0);
        assert_eq!(config.layout.cell_padding, LayoutConfig::default().cell_padding);
        assert_eq!(
            config.parsed_base_url().unwrap().unwrap().as_str(),
            "https://assets.example.com/media/"
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let file = toml_file("height_tolerance_px = -1.0");
        assert!(matches!(
            RenderConfig::load_from(Some(file.path())),
            Err(ConfigError::Invalid { field: "height_tolerance_px", .. })
        ));

        let config = RenderConfig::default().with_base_url("not a url");
        assert!(matches!(config.validate(), Err(ConfigError::BaseUrl(_))));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = RenderConfig::load_from(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}

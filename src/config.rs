//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MBOXCLOG_CONFIG` (environment variable)
//! 2. `~/.config/mboxclog/config.toml` (Linux/macOS)
//!    `%APPDATA%\mboxclog\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ClogError, Result};
use crate::export::csv::CsvOptions;
use crate::parser::date::DateFormat;
use crate::parser::mbox::DEFAULT_READ_BUFFER_SIZE;
use crate::pipeline::processor::DEFAULT_BATCH_SIZE;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// CSV output settings.
    pub export: ExportConfig,
    /// Additional `Date:` formats.
    pub dates: DatesConfig,
    /// Performance tuning.
    pub performance: PerformanceConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level when no `-v` is given: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Also write the log to `<cache_dir>/mboxclog.log`.
    pub log_to_file: bool,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// CSV output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// CSV field separator character.
    pub delimiter: char,
    /// Output text encoding, any WHATWG label ("utf-8", "windows-1252", …).
    pub encoding: String,
    /// Write a UTF-8 BOM (Excel compatibility).
    pub bom: bool,
}

/// Extra `Date:` patterns merged into the built-in table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatesConfig {
    pub extra_formats: Vec<DateFormat>,
}

/// Performance tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Read buffer size in bytes (default: 1048576 = 1 MB).
    pub read_buffer_size: usize,
    /// Messages normalized together on the thread pool.
    pub batch_size: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_to_file: true,
            cache_dir: None,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            encoding: platform_encoding().to_string(),
            bom: false,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ExportConfig {
    /// Validate the settings and turn them into writer options.
    pub fn csv_options(&self) -> Result<CsvOptions> {
        if !self.delimiter.is_ascii() || matches!(self.delimiter, '"' | '\r' | '\n') {
            return Err(ClogError::InvalidDelimiter(self.delimiter));
        }
        let encoding = encoding_rs::Encoding::for_label(self.encoding.trim().as_bytes())
            .ok_or_else(|| ClogError::UnsupportedEncoding(self.encoding.clone()))?;
        Ok(CsvOptions {
            delimiter: self.delimiter as u8,
            encoding: encoding.output_encoding(),
            bom: self.bom,
        })
    }
}

/// Default output encoding: Windows-1252 on Windows, UTF-8 elsewhere.
pub fn platform_encoding() -> &'static str {
    if cfg!(windows) {
        "windows-1252"
    } else {
        "utf-8"
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MBOXCLOG_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mboxclog").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mboxclog")
}

/// Default CSV destination: the archive path with its extension replaced.
///
/// Example: `/data/lab.mbox` → `/data/lab.csv`
pub fn default_output_path(source: &Path) -> PathBuf {
    source.with_extension("csv")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.export.delimiter, ',');
        assert_eq!(cfg.export.encoding, platform_encoding());
        assert!(cfg.dates.extra_formats.is_empty());
        assert_eq!(cfg.performance.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.dates
            .extra_formats
            .push(DateFormat::new("%Y-%m-%d %H:%M:%S %z", 100));
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.export.encoding, cfg.export.encoding);
        assert_eq!(parsed.dates.extra_formats, cfg.dates.extra_formats);
        assert_eq!(
            parsed.performance.read_buffer_size,
            cfg.performance.read_buffer_size
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[export]
delimiter = ";"

[[dates.extra_formats]]
pattern = "%d.%m.%Y %H:%M"
priority = 200
assume_utc = true
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.export.delimiter, ';');
        assert_eq!(cfg.export.encoding, platform_encoding());
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.dates.extra_formats.len(), 1);
        assert!(cfg.dates.extra_formats[0].assume_utc);
    }

    #[test]
    fn test_csv_options_validation() {
        let mut export = ExportConfig {
            encoding: "utf-8".to_string(),
            ..ExportConfig::default()
        };
        let options = export.csv_options().unwrap();
        assert_eq!(options.delimiter, b',');
        assert_eq!(options.encoding, encoding_rs::UTF_8);

        export.encoding = "latin1".to_string();
        assert_eq!(
            export.csv_options().unwrap().encoding,
            encoding_rs::WINDOWS_1252
        );

        export.encoding = "klingon".to_string();
        assert!(matches!(
            export.csv_options(),
            Err(ClogError::UnsupportedEncoding(_))
        ));

        export.encoding = "utf-8".to_string();
        export.delimiter = '§';
        assert!(matches!(
            export.csv_options(),
            Err(ClogError::InvalidDelimiter('§'))
        ));
    }

    #[test]
    fn test_default_encoding_follows_platform() {
        let options = ExportConfig::default().csv_options().unwrap();
        if cfg!(windows) {
            assert_eq!(options.encoding, encoding_rs::WINDOWS_1252);
        } else {
            assert_eq!(options.encoding, encoding_rs::UTF_8);
        }
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/data/lab.mbox")),
            PathBuf::from("/data/lab.csv")
        );
        assert_eq!(
            default_output_path(Path::new("archive")),
            PathBuf::from("archive.csv")
        );
    }
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::matrix::TieBreak;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub comparison: ComparisonConfig,
    pub import: ImportConfig,
    pub export: ExportConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComparisonConfig {
    pub tie_break: TieBreak,
    /// VAT applied to import rows that leave the rate blank.
    pub default_vat_pct: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImportConfig {
    pub allow_overwrite: bool,
    pub max_files_per_batch: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportConfig {
    /// `#RRGGBB` fill for the best-priced cell of each row.
    pub best_price_color: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub tie_break: Option<TieBreak>,
    pub allow_overwrite: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://procura.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            comparison: ComparisonConfig {
                tie_break: TieBreak::LowestSupplierCode,
                default_vat_pct: Decimal::ZERO,
            },
            import: ImportConfig { allow_overwrite: false, max_files_per_batch: 50 },
            export: ExportConfig { best_price_color: "#C6EFCE".to_string() },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("procura.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(comparison) = patch.comparison {
            if let Some(tie_break) = comparison.tie_break {
                self.comparison.tie_break = tie_break;
            }
            if let Some(default_vat_pct) = comparison.default_vat_pct {
                self.comparison.default_vat_pct = default_vat_pct;
            }
        }

        if let Some(import) = patch.import {
            if let Some(allow_overwrite) = import.allow_overwrite {
                self.import.allow_overwrite = allow_overwrite;
            }
            if let Some(max_files_per_batch) = import.max_files_per_batch {
                self.import.max_files_per_batch = max_files_per_batch;
            }
        }

        if let Some(export) = patch.export {
            if let Some(best_price_color) = export.best_price_color {
                self.export.best_price_color = best_price_color;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PROCURA_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("PROCURA_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("PROCURA_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("PROCURA_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("PROCURA_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let log_level = read_env("PROCURA_LOGGING_LEVEL").or_else(|| read_env("PROCURA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PROCURA_LOGGING_FORMAT").or_else(|| read_env("PROCURA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        if let Some(value) = read_env("PROCURA_COMPARISON_TIE_BREAK") {
            self.comparison.tie_break = value.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "PROCURA_COMPARISON_TIE_BREAK".to_string(),
                    value: value.clone(),
                }
            })?;
        }
        if let Some(value) = read_env("PROCURA_COMPARISON_DEFAULT_VAT_PCT") {
            self.comparison.default_vat_pct =
                parse_decimal("PROCURA_COMPARISON_DEFAULT_VAT_PCT", &value)?;
        }

        if let Some(value) = read_env("PROCURA_IMPORT_ALLOW_OVERWRITE") {
            self.import.allow_overwrite = parse_bool("PROCURA_IMPORT_ALLOW_OVERWRITE", &value)?;
        }
        if let Some(value) = read_env("PROCURA_IMPORT_MAX_FILES_PER_BATCH") {
            self.import.max_files_per_batch =
                parse_u32("PROCURA_IMPORT_MAX_FILES_PER_BATCH", &value)? as usize;
        }

        if let Some(value) = read_env("PROCURA_EXPORT_BEST_PRICE_COLOR") {
            self.export.best_price_color = value;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(tie_break) = overrides.tie_break {
            self.comparison.tie_break = tie_break;
        }
        if let Some(allow_overwrite) = overrides.allow_overwrite {
            self.import.allow_overwrite = allow_overwrite;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_logging(&self.logging)?;
        validate_comparison(&self.comparison)?;
        validate_import(&self.import)?;
        validate_export(&self.export)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("procura.toml"), PathBuf::from("config/procura.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_comparison(comparison: &ComparisonConfig) -> Result<(), ConfigError> {
    let vat = comparison.default_vat_pct;
    if vat < Decimal::ZERO || vat > Decimal::ONE_HUNDRED {
        return Err(ConfigError::Validation(format!(
            "comparison.default_vat_pct must be in range 0..=100, got {vat}"
        )));
    }
    Ok(())
}

fn validate_import(import: &ImportConfig) -> Result<(), ConfigError> {
    if import.max_files_per_batch == 0 {
        return Err(ConfigError::Validation(
            "import.max_files_per_batch must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_export(export: &ExportConfig) -> Result<(), ConfigError> {
    let color = export.best_price_color.trim();
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|ch| ch.is_ascii_hexdigit());
    if !valid {
        return Err(ConfigError::Validation(format!(
            "export.best_price_color must be a `#RRGGBB` hex color, got `{color}`"
        )));
    }
    Ok(())
}

impl ExportConfig {
    /// The configured color as a packed `0xRRGGBB` value.
    pub fn best_price_rgb(&self) -> u32 {
        u32::from_str_radix(self.best_price_color.trim().trim_start_matches('#'), 16)
            .unwrap_or(0xC6EFCE)
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value.trim().parse::<Decimal>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    logging: Option<LoggingPatch>,
    comparison: Option<ComparisonPatch>,
    import: Option<ImportPatch>,
    export: Option<ExportPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct ComparisonPatch {
    tie_break: Option<TieBreak>,
    default_vat_pct: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct ImportPatch {
    allow_overwrite: Option<bool>,
    max_files_per_batch: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ExportPatch {
    best_price_color: Option<String>,
}

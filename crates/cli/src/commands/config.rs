use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use procura_core::config::{AppConfig, LoadOptions, LogFormat};
use procura_core::pricing::TieBreak;
use toml::Value;

/// Renders the effective configuration, one line per field with the layer it
/// came from.
pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value) in effective_values(&config) {
        let source =
            field_source(key_path, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key_path, &value, source));
    }
    lines.join("\n")
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String)> {
    vec![
        ("database.url", config.database.url.clone()),
        ("database.max_connections", config.database.max_connections.to_string()),
        ("database.timeout_secs", config.database.timeout_secs.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", log_format_label(config.logging.format).to_string()),
        ("comparison.tie_break", tie_break_label(config.comparison.tie_break).to_string()),
        ("comparison.default_vat_pct", config.comparison.default_vat_pct.to_string()),
        ("import.allow_overwrite", config.import.allow_overwrite.to_string()),
        ("import.max_files_per_batch", config.import.max_files_per_batch.to_string()),
        ("export.best_price_color", config.export.best_price_color.clone()),
    ]
}

fn log_format_label(format: LogFormat) -> &'static str {
    match format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    }
}

fn tie_break_label(tie_break: TieBreak) -> &'static str {
    match tie_break {
        TieBreak::LowestSupplierCode => "lowest_supplier_code",
        TieBreak::LastEncountered => "last_encountered",
    }
}

/// `database.max_connections` -> `PROCURA_DATABASE_MAX_CONNECTIONS`.
fn env_key(key_path: &str) -> String {
    format!("PROCURA_{}", key_path.replace('.', "_").to_ascii_uppercase())
}

fn detect_config_path() -> Option<PathBuf> {
    ["procura.toml", "config/procura.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let env_key = env_key(key_path);
    if env::var_os(&env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

pub mod compare;
pub mod config;
pub mod export;
pub mod import;
pub mod migrate;
pub mod price_list;
pub mod seed;
pub mod set_prices;
pub mod transition;

use std::future::Future;

use serde::Serialize;
use serde_json::Value;

use procura_core::config::{AppConfig, LoadOptions};
use procura_core::errors::{ApplicationError, InterfaceError};
use procura_core::Period;
use procura_db::{connect_with_settings, migrations, DbPool, ServiceError};

use crate::logging;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

/// `(error_class, message, exit_code)` carried out of a failed command body.
pub(crate) type Failure = (&'static str, String, u8);

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::ok_with_status(command, "ok", message, None, 0)
    }

    pub fn success_with_data(command: &str, message: impl Into<String>, data: impl Serialize) -> Self {
        Self::ok_with_status(command, "ok", message, serde_json::to_value(data).ok(), 0)
    }

    /// Some inputs were processed, some were rejected.
    pub fn partial(command: &str, message: impl Into<String>, data: impl Serialize) -> Self {
        Self::ok_with_status(command, "partial", message, serde_json::to_value(data).ok(), 1)
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    fn ok_with_status(
        command: &str,
        status: &str,
        message: impl Into<String>,
        data: Option<Value>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: status.to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Loads config, initialises logging, opens the database with migrations
/// applied and runs `work` against it on a current-thread runtime.
pub(crate) fn with_database<F, Fut>(command: &'static str, work: F) -> CommandResult
where
    F: FnOnce(AppConfig, DbPool) -> Fut,
    Fut: Future<Output = Result<CommandResult, Failure>>,
{
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    logging::init(&config.logging);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async move {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let outcome = work(config, pool.clone()).await;
        pool.close().await;
        outcome
    });

    result.unwrap_or_else(|(error_class, message, exit_code)| {
        CommandResult::failure(command, error_class, message, exit_code)
    })
}

/// Projects a service error onto the CLI's error classes and exit codes.
pub(crate) fn service_failure(error: ServiceError, correlation_id: &str) -> Failure {
    let interface = ApplicationError::from(error).into_interface(correlation_id);
    let (error_class, exit_code) = match &interface {
        InterfaceError::BadRequest { .. } => ("validation", 6),
        InterfaceError::NotFound { .. } => ("not_found", 7),
        InterfaceError::Conflict { .. } => ("conflict", 8),
        InterfaceError::Forbidden { .. } => ("forbidden", 9),
        InterfaceError::ServiceUnavailable { .. } => ("persistence", 4),
        InterfaceError::Internal { .. } => ("internal", 10),
    };
    (error_class, interface.to_string(), exit_code)
}

pub(crate) fn parse_period(value: &str) -> Result<Period, Failure> {
    value.parse::<Period>().map_err(|error| ("validation", error.to_string(), 6u8))
}

pub(crate) fn correlation_id(command: &str) -> String {
    format!("cli-{command}-{}", uuid::Uuid::new_v4())
}

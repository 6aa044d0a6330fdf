//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses
//! the relay-core engine through `AppState`.

pub mod agent;
pub mod automation;
pub mod credential;
pub mod run;
pub mod server;

use std::sync::Arc;

use relay_core::integration::PlatformCatalog;
use relay_core::state::AppState;

/// Initialize a shared `AppState` from the given SQLite database path.
///
/// This mirrors `relay_server::create_app_state` but exits the process on
/// failure, which is what every CLI command wants.
pub async fn init_state(db_path: &str, platform_catalog: Option<&str>) -> AppState {
    let db = relay_core::Database::open(db_path).unwrap_or_else(|e| {
        eprintln!("Failed to open database '{}': {}", db_path, e);
        std::process::exit(1);
    });

    let catalog = match platform_catalog {
        Some(path) => PlatformCatalog::from_file(path).unwrap_or_else(|e| {
            eprintln!("{}", e);
            std::process::exit(1);
        }),
        None => PlatformCatalog::new(),
    };

    Arc::new(relay_core::AppStateInner::with_config(
        db,
        relay_core::EngineConfig::from_env(),
        catalog,
    ))
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

/// Parse a JSON object argument.
pub(crate) fn parse_json_object(raw: &str, what: &str) -> Result<serde_json::Map<String, serde_json::Value>, String> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(format!("{} must be a JSON object", what)),
        Err(e) => Err(format!("Invalid {} JSON: {}", what, e)),
    }
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "SchoolHealth";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Overrides the data directory (database lives here).
pub const DATA_DIR_ENV: &str = "SCHOOL_HEALTH_DATA_DIR";
/// Overrides the HTTP bind address, e.g. `0.0.0.0:8080`.
pub const BIND_ENV: &str = "SCHOOL_HEALTH_BIND";

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DATABASE_FILE: &str = "school_health.db";

/// Pending parent notifications buffered between the lifecycle and the dispatcher.
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 256;

/// Buffered audit entries before they are flushed to SQLite.
pub const AUDIT_BUFFER_CAPACITY: usize = 100;
/// Audit rows older than this are pruned on flush.
pub const AUDIT_RETENTION_DAYS: i64 = 90;

/// How long a writer waits on a locked database before giving up.
pub const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default `EnvFilter` directive when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "school_health_lib=info,school_health=info,tower_http=warn"
}

/// Get the application data directory.
/// `$SCHOOL_HEALTH_DATA_DIR` if set, otherwise ~/SchoolHealth/
/// (current directory when no home directory can be determined).
pub fn app_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Get the SQLite database path
pub fn database_path() -> PathBuf {
    app_data_dir().join(DATABASE_FILE)
}

/// Resolve the API bind address from `$SCHOOL_HEALTH_BIND`.
pub fn bind_addr() -> Result<SocketAddr, String> {
    let raw = std::env::var(BIND_ENV).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    parse_bind_addr(&raw)
}

fn parse_bind_addr(raw: &str) -> Result<SocketAddr, String> {
    raw.trim()
        .parse()
        .map_err(|e| format!("Invalid bind address '{raw}': {e}"))
}

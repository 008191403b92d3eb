// Global variables and configuration for the application

use once_cell::sync::Lazy;
use std::path::PathBuf;

// Application name from environment or default
pub static APP_NAME: Lazy<String> =
    Lazy::new(|| std::env::var("APP_NAME").unwrap_or_else(|_| "lumen".to_string()));

// Application data directory, resolved once at startup
pub static APP_DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("APP_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            // {homedir}/.lumen
            let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            home_dir.join(format!(".{}", APP_NAME.as_str()))
        })
});

/// Get the current application data directory
pub fn get_app_data_dir() -> PathBuf {
    APP_DATA_DIR.clone()
}

/// HTTP port for the API server.
/// Tries the PORT environment variable first, then the default.
pub fn get_http_port() -> u16 {
    if let Ok(port_str) = std::env::var("PORT") {
        if let Ok(port) = port_str.parse::<u16>() {
            return port;
        }
    }
    8386
}

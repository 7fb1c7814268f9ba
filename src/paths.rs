use std::path::PathBuf;
use std::sync::OnceLock;

static APP_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the app data directory: `~/.forger-companion/`
///
/// Falls back to the working directory when no home directory is known.
pub fn get_app_dir() -> &'static PathBuf {
    APP_DIR.get_or_init(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".forger-companion")
    })
}

/// Returns the settings file: `<app_dir>/settings.json`
pub fn get_settings_path() -> PathBuf {
    get_app_dir().join("settings.json")
}

/// Returns the logs directory: `<app_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_app_dir().join("logs")
}

/// Returns the tesseract directory: `<app_dir>/tesseract/`
pub fn get_tesseract_dir() -> PathBuf {
    get_app_dir().join("tesseract")
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(get_tesseract_dir().join("tessdata"))?;
    Ok(())
}

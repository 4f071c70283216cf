pub mod doctor;
pub mod init;
pub mod knowledge;
pub mod scan;

use loglens_config::AppConfig;
use std::path::Path;

pub(crate) fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load(path).map_err(|e| format!("Failed to load config: {e}"))?)
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const HELPER_NAME: &str = "dnsunleak";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LeakGuardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Helper executable; defaults to `dnsunleak` beside the running binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl LeakGuardConfig {
    pub fn helper_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        let file_name = if cfg!(windows) {
            format!("{}.exe", HELPER_NAME)
        } else {
            HELPER_NAME.to_string()
        };
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(&file_name)))
            .unwrap_or_else(|| PathBuf::from(file_name))
    }
}

impl Default for LeakGuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

use std::sync::LazyLock;

use serde::Deserialize;

use crate::env::get_app_config;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

// gunicorn's default bind port
fn default_port() -> u16 {
    8000
}

pub static APP_CONFIG: LazyLock<AppConfig> = LazyLock::new(get_app_config);

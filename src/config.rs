//! Configuration loading: a one-shot layered load (defaults, then an
//! optional `config.toml`, then `CAPTURE_`-prefixed environment
//! variables). No hot-reload or file watching — a camera's resolution is
//! fixed at worker startup.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::record::CameraSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    pub setting: CameraSettingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraSettingConfig {
    #[serde(rename = "CAP_PROP_FRAME_WIDTH")]
    pub width: usize,
    #[serde(rename = "CAP_PROP_FRAME_HEIGHT")]
    pub height: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_ipv4")]
    pub ipv4: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub camera: BTreeMap<String, CameraConfig>,
}

fn default_ipv4() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut camera = BTreeMap::new();
        camera.insert(
            "0".to_string(),
            CameraConfig { setting: CameraSettingConfig { width: 1024, height: 768 } },
        );
        Self { ipv4: default_ipv4(), port: default_port(), camera }
    }
}

impl AppConfig {
    /// Load defaults, then overlay an optional config file at `path`
    /// (TOML), then environment variables prefixed `CAPTURE_` (e.g.
    /// `CAPTURE_PORT=5050`).
    pub fn load(path: Option<&str>) -> Result<Self, ::config::ConfigError> {
        let defaults = AppConfig::default();
        let mut builder = ::config::Config::builder()
            .set_default("ipv4", defaults.ipv4.clone())?
            .set_default("port", defaults.port as i64)?;

        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path).required(false));
        } else {
            builder = builder.add_source(::config::File::with_name("config").required(false));
        }
        builder = builder.add_source(::config::Environment::with_prefix("CAPTURE").separator("__"));

        let built = builder.build()?;

        // `camera` has no universal default representable by the `config`
        // crate's flat key/value model; fall back to the built-in default
        // mapping when the source tree doesn't define one.
        let camera = built
            .get::<BTreeMap<String, CameraConfig>>("camera")
            .unwrap_or(defaults.camera);

        Ok(AppConfig {
            ipv4: built.get_string("ipv4").unwrap_or(defaults.ipv4),
            port: built.get_int("port").map(|p| p as u16).unwrap_or(defaults.port),
            camera,
        })
    }

    pub fn camera_settings(&self) -> Vec<(String, CameraSettings)> {
        self.camera
            .iter()
            .map(|(id, cfg)| {
                (
                    id.clone(),
                    CameraSettings { width: cfg.setting.width, height: cfg.setting.height },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.ipv4, "0.0.0.0");
        assert_eq!(cfg.port, 5000);
    }

    #[test]
    fn load_with_missing_file_falls_back_to_defaults() {
        let cfg = AppConfig::load(Some("/nonexistent/path/does/not/exist")).unwrap();
        assert_eq!(cfg.ipv4, "0.0.0.0");
        assert_eq!(cfg.port, 5000);
        assert!(!cfg.camera.is_empty());
    }
}

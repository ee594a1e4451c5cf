//! Runner configuration: the director pipeline config plus the IO-adapter
//! settings (model path, encoder knobs, output destination) that only the
//! CLI layer needs to know about.
//!
//! Loaded in layers, lowest to highest precedence: built-in defaults, an
//! optional config file, then `DIRECTOR_*` environment variables (so a
//! production deploy can override a handful of knobs without a file edit).

use std::path::PathBuf;

use config::{Config, ConfigError as LayeredConfigError, Environment, File};
use match_models::DirectorConfig;
use serde::Deserialize;

fn default_nms_threshold() -> f32 {
    0.45
}

fn default_input_size() -> u32 {
    640
}

fn default_crf() -> u8 {
    20
}

fn default_preset() -> String {
    "veryfast".to_string()
}

/// Everything `directorctl run` needs: the pipeline config plus the
/// adapter-level settings for the ONNX model and the FFmpeg encoder.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub director: DirectorConfig,

    /// Path to the YOLOv8 ONNX ball-detection model.
    pub model_path: String,

    #[serde(default = "default_nms_threshold")]
    pub nms_threshold: f32,

    #[serde(default = "default_input_size")]
    pub input_size: u32,

    /// Destination MP4 path for the rendered output.
    pub output_path: PathBuf,

    #[serde(default = "default_crf")]
    pub crf: u8,

    #[serde(default = "default_preset")]
    pub preset: String,
}

impl RunnerConfig {
    /// Load from an optional config file (TOML/YAML/JSON, detected by
    /// extension) layered under `DIRECTOR_*` environment variables.
    ///
    /// Nested fields use `__` as the env-var separator, e.g.
    /// `DIRECTOR_DIRECTOR__TAU_CONF=0.3` overrides `director.tau_conf`.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, LayeredConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(Environment::with_prefix("DIRECTOR").separator("__").try_parsing(true));
        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_fields_fail_to_deserialize() {
        std::env::remove_var("DIRECTOR_MODEL_PATH");
        std::env::remove_var("DIRECTOR_OUTPUT_PATH");
        let result = RunnerConfig::load(None);
        assert!(result.is_err());
    }

    #[test]
    fn env_vars_supply_required_fields() {
        std::env::set_var("DIRECTOR_MODEL_PATH", "models/ball.onnx");
        std::env::set_var("DIRECTOR_OUTPUT_PATH", "/tmp/out.mp4");
        let cfg = RunnerConfig::load(None).unwrap();
        assert_eq!(cfg.model_path, "models/ball.onnx");
        assert_eq!(cfg.nms_threshold, default_nms_threshold());
        std::env::remove_var("DIRECTOR_MODEL_PATH");
        std::env::remove_var("DIRECTOR_OUTPUT_PATH");
    }
}

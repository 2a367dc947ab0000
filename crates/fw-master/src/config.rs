//! YAML configuration.
//!
//! Every section falls back to its defaults field by field, so a partial
//! file only overrides what it names.

use std::path::Path;

use fw_engine::{JudgeConfig, PcmFormat, BYTES_PER_SAMPLE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("audio geometry: {0}")]
    InvalidAudio(&'static str),
    #[error("failed to write config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FretworkConfig {
    /// Default `env_logger` filter; `RUST_LOG` overrides it
    pub log_level: String,
    pub audio: AudioConfig,
    pub gameplay: GameplayConfig,
}

impl Default for FretworkConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            audio: AudioConfig::default(),
            gameplay: GameplayConfig::default(),
        }
    }
}

/// Mixer output geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub channels: u16,
    pub sample_rate: u32,
    pub frames_per_write: usize,
    /// Only 2 (16-bit) is supported
    pub bytes_per_sample: usize,
    /// Global gain on top of clip volumes
    pub mix_amp: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        let format = PcmFormat::default();
        Self {
            channels: format.channels,
            sample_rate: format.sample_rate,
            frames_per_write: format.frames_per_write,
            bytes_per_sample: BYTES_PER_SAMPLE,
            mix_amp: fw_engine::DEFAULT_MIX_AMP,
        }
    }
}

impl AudioConfig {
    /// Validated mixer geometry.
    pub fn pcm_format(&self) -> Result<PcmFormat, ConfigError> {
        if self.bytes_per_sample != BYTES_PER_SAMPLE {
            return Err(ConfigError::InvalidAudio("only 16-bit samples are supported"));
        }
        let format = PcmFormat::new(self.channels, self.sample_rate, self.frames_per_write);
        format.validate().map_err(ConfigError::InvalidAudio)?;
        Ok(format)
    }
}

/// Track selection, music volume and judge constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameplayConfig {
    /// Chart section to play
    pub track: String,
    pub music_volume: f64,
    pub spawn_position: f64,
    pub target_position: f64,
    pub scroll_speed: f64,
    pub hit_radius: f64,
    pub hit_points_per_unit: f64,
    pub hold_points_per_second: f64,
    pub miss_penalty: f64,
}

impl Default for GameplayConfig {
    fn default() -> Self {
        let judge = JudgeConfig::default();
        Self {
            track: "ExpertSingle".to_string(),
            music_volume: 1.0,
            spawn_position: judge.spawn_position,
            target_position: judge.target_position,
            scroll_speed: judge.scroll_speed,
            hit_radius: judge.hit_radius,
            hit_points_per_unit: judge.hit_points_per_unit,
            hold_points_per_second: judge.hold_points_per_second,
            miss_penalty: judge.miss_penalty,
        }
    }
}

impl GameplayConfig {
    pub fn judge_config(&self) -> JudgeConfig {
        JudgeConfig {
            spawn_position: self.spawn_position,
            target_position: self.target_position,
            scroll_speed: self.scroll_speed,
            hit_radius: self.hit_radius,
            hit_points_per_unit: self.hit_points_per_unit,
            hold_points_per_second: self.hold_points_per_second,
            miss_penalty: self.miss_penalty,
        }
    }
}

/// Load configuration, falling back to defaults if the file is missing or
/// unreadable.
pub fn load_config(path: &Path) -> FretworkConfig {
    log::info!("load_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_config: Config file doesn't exist, using defaults");
        return FretworkConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<FretworkConfig>(&contents) {
            Ok(config) => {
                log::info!(
                    "load_config: Loaded config - {} Hz, {} frames/write, track {}",
                    config.audio.sample_rate,
                    config.audio.frames_per_write,
                    config.gameplay.track
                );
                config
            }
            Err(e) => {
                log::warn!("load_config: Failed to parse config: {}, using defaults", e);
                FretworkConfig::default()
            }
        },
        Err(e) => {
            log::warn!("load_config: Failed to read config file: {}, using defaults", e);
            FretworkConfig::default()
        }
    }
}

/// Save configuration as YAML, creating parent directories.
pub fn save_config(config: &FretworkConfig, path: &Path) -> Result<(), ConfigError> {
    log::info!("save_config: Saving to {:?}", path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(path, yaml)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine() {
        let config = FretworkConfig::default();
        assert_eq!(config.audio.pcm_format().unwrap(), PcmFormat::default());
        assert_eq!(config.gameplay.judge_config(), JudgeConfig::default());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = "audio:\n  frames_per_write: 256\ngameplay:\n  track: EasySingle\n";
        let config: FretworkConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.audio.frames_per_write, 256);
        assert_eq!(config.audio.sample_rate, 44100);
        assert_eq!(config.gameplay.track, "EasySingle");
        assert_eq!(config.gameplay.scroll_speed, 200.0);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn rejects_unsupported_geometry() {
        let audio = AudioConfig {
            bytes_per_sample: 3,
            ..AudioConfig::default()
        };
        assert!(matches!(audio.pcm_format(), Err(ConfigError::InvalidAudio(_))));
        let audio = AudioConfig {
            frames_per_write: 0,
            ..AudioConfig::default()
        };
        assert!(audio.pcm_format().is_err());
        let audio = AudioConfig {
            channels: 0,
            ..AudioConfig::default()
        };
        assert!(matches!(
            audio.pcm_format(),
            Err(ConfigError::InvalidAudio("channels must be at least 1"))
        ));
    }

    #[test]
    fn yaml_round_trip() {
        let mut config = FretworkConfig::default();
        config.gameplay.miss_penalty = 10.0;
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: FretworkConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn missing_or_broken_file_gives_defaults() {
        let dir = std::env::temp_dir().join(format!("fretwork-config-{}", std::process::id()));
        let missing = dir.join("missing.yaml");
        assert_eq!(load_config(&missing), FretworkConfig::default());

        let broken = dir.join("broken.yaml");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(&broken, "audio: [not, a, map").unwrap();
        assert_eq!(load_config(&broken), FretworkConfig::default());

        let saved = dir.join("nested/saved.yaml");
        let mut config = FretworkConfig::default();
        config.audio.mix_amp = 0.5;
        save_config(&config, &saved).unwrap();
        assert_eq!(load_config(&saved), config);
        let _ = std::fs::remove_dir_all(&dir);
    }
}

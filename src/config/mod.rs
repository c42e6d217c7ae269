use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::ConfigError;

/// Usage attribute attached to builder-style focus requests
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FocusUsage {
    Media,
    VoiceCommunication,
    Alarm,
    Notification,
}

/// Content type attribute attached to builder-style focus requests
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Speech,
    Music,
    Movie,
    Sonification,
}

/// Stream used by the legacy focus call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    VoiceCall,
    Music,
    Ring,
}

/// Focus gain requested by the legacy focus call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FocusGain {
    Gain,
    GainTransient,
    GainTransientMayDuck,
    GainTransientExclusive,
}

/// Attributes for audio-focus requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FocusConfig {
    pub usage: FocusUsage,
    pub content_type: ContentType,
    pub accepts_delayed_focus_gain: bool,
    pub legacy_stream: StreamType,
    pub legacy_duration_hint: FocusGain,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            usage: FocusUsage::VoiceCommunication,
            content_type: ContentType::Speech,
            accepts_delayed_focus_gain: false,
            legacy_stream: StreamType::VoiceCall,
            legacy_duration_hint: FocusGain::GainTransient,
        }
    }
}

/// Coordinator configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Hosts at or above this API level get the builder focus mechanism
    pub builder_focus_min_api_level: u32,
    /// Below this API level the wired-headset flag replaces device enumeration
    pub wired_query_min_api_level: u32,
    pub unmute_microphone_on_start: bool,
    pub sco_poll_interval_ms: Option<u64>,
    pub event_history_size: usize,
    pub focus: FocusConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            builder_focus_min_api_level: 26,
            wired_query_min_api_level: 23,
            unmute_microphone_on_start: true,
            sco_poll_interval_ms: None,
            event_history_size: 1000,
            focus: FocusConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn sco_poll_interval(&self) -> Option<Duration> {
        self.sco_poll_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config: CoordinatorConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        let config = Self::load_config(&config_path).unwrap_or_default();

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Open a manager backed by an explicit file
    pub fn with_path(config_path: PathBuf) -> Result<Self, ConfigError> {
        let config = Self::load_config(&config_path)?;
        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn get_config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update_config<F>(&mut self, updater: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut CoordinatorConfig),
    {
        updater(&mut self.config);
        self.save_config()
    }

    pub fn set_sco_poll_interval(&mut self, interval_ms: Option<u64>) -> Result<(), ConfigError> {
        self.config.sco_poll_interval_ms = interval_ms;
        self.save_config()
    }

    pub fn set_unmute_microphone_on_start(&mut self, enabled: bool) -> Result<(), ConfigError> {
        self.config.unmute_microphone_on_start = enabled;
        self.save_config()
    }

    pub fn set_accepts_delayed_focus_gain(&mut self, enabled: bool) -> Result<(), ConfigError> {
        self.config.focus.accepts_delayed_focus_gain = enabled;
        self.save_config()
    }

    pub fn set_event_history_size(&mut self, size: usize) -> Result<(), ConfigError> {
        self.config.event_history_size = size.max(1);
        self.save_config()
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.config = CoordinatorConfig::default();
        self.save_config()
    }

    fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::home_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join(".config")
            .join("audio-route-manager");

        std::fs::create_dir_all(&config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<CoordinatorConfig, ConfigError> {
        if !path.exists() {
            return Ok(CoordinatorConfig::default());
        }

        let config_content = std::fs::read_to_string(path)?;
        let config: CoordinatorConfig = toml::from_str(&config_content)?;

        Ok(config)
    }

    fn save_config(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config_content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, config_content)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config_manager = ConfigManager {
            config: CoordinatorConfig::default(),
            config_path,
        };

        (config_manager, temp_dir)
    }

    #[test]
    fn test_coordinator_config_default() {
        let config = CoordinatorConfig::default();

        assert_eq!(config.focus.usage, FocusUsage::VoiceCommunication);
        assert_eq!(config.focus.content_type, ContentType::Speech);
        assert!(!config.focus.accepts_delayed_focus_gain);
        assert_eq!(config.focus.legacy_stream, StreamType::VoiceCall);
        assert_eq!(config.focus.legacy_duration_hint, FocusGain::GainTransient);
        assert_eq!(config.builder_focus_min_api_level, 26);
        assert_eq!(config.wired_query_min_api_level, 23);
        assert!(config.unmute_microphone_on_start);
        assert_eq!(config.sco_poll_interval_ms, None);
        assert_eq!(config.event_history_size, 1000);
    }

    #[test]
    fn test_sco_poll_interval() {
        let mut config = CoordinatorConfig::default();
        assert_eq!(config.sco_poll_interval(), None);

        config.sco_poll_interval_ms = Some(0);
        assert_eq!(config.sco_poll_interval(), None);

        config.sco_poll_interval_ms = Some(1000);
        assert_eq!(config.sco_poll_interval(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_config_serialization() {
        let mut config = CoordinatorConfig::default();
        config.sco_poll_interval_ms = Some(500);
        config.focus.usage = FocusUsage::Media;

        let serialized = toml::to_string(&config).unwrap();
        let deserialized: CoordinatorConfig = toml::from_str(&serialized).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: CoordinatorConfig = toml::from_str("unmute_microphone_on_start = false\n").unwrap();

        assert!(!config.unmute_microphone_on_start);
        assert_eq!(config.builder_focus_min_api_level, 26);
        assert_eq!(config.focus, FocusConfig::default());
    }

    #[test]
    fn test_save_and_load_config() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager.config.sco_poll_interval_ms = Some(250);
        config_manager.config.event_history_size = 50;
        config_manager.save_config().unwrap();

        let loaded_config = ConfigManager::load_config(&config_manager.config_path).unwrap();

        assert_eq!(loaded_config.sco_poll_interval_ms, Some(250));
        assert_eq!(loaded_config.event_history_size, 50);
    }

    #[test]
    fn test_load_nonexistent_config() {
        let temp_dir = TempDir::new().unwrap();
        let nonexistent_path = temp_dir.path().join("nonexistent.toml");

        let config = ConfigManager::load_config(&nonexistent_path).unwrap();

        assert_eq!(config, CoordinatorConfig::default());
    }

    #[test]
    fn test_load_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");

        fs::write(&config_path, "invalid toml content [[[").unwrap();

        match ConfigManager::load_config(&config_path) {
            Err(ConfigError::DeserializationError(_)) => {}
            other => panic!("Expected DeserializationError, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_update_config() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager
            .update_config(|config| {
                config.wired_query_min_api_level = 21;
                config.focus.legacy_stream = StreamType::Music;
            })
            .unwrap();

        let loaded_config = ConfigManager::load_config(&config_manager.config_path).unwrap();
        assert_eq!(loaded_config.wired_query_min_api_level, 21);
        assert_eq!(loaded_config.focus.legacy_stream, StreamType::Music);
    }

    #[test]
    fn test_typed_setters() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager.set_sco_poll_interval(Some(1000)).unwrap();
        config_manager.set_unmute_microphone_on_start(false).unwrap();
        config_manager.set_accepts_delayed_focus_gain(true).unwrap();
        config_manager.set_event_history_size(0).unwrap();

        let config = config_manager.get_config();
        assert_eq!(config.sco_poll_interval_ms, Some(1000));
        assert!(!config.unmute_microphone_on_start);
        assert!(config.focus.accepts_delayed_focus_gain);
        assert_eq!(config.event_history_size, 1);
    }

    #[test]
    fn test_reset_to_defaults() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager.config.builder_focus_min_api_level = 30;
        config_manager.reset_to_defaults().unwrap();

        assert_eq!(config_manager.config, CoordinatorConfig::default());
    }

    #[test]
    fn test_with_path_creates_nested_directories_on_save() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir.path().join("nested").join("config").join("config.toml");

        let mut config_manager = ConfigManager::with_path(nested_path.clone()).unwrap();
        config_manager.set_unmute_microphone_on_start(false).unwrap();

        assert!(nested_path.exists());
        assert_eq!(config_manager.config_path(), nested_path.as_path());
    }

    #[test]
    fn test_toml_format() {
        let config = CoordinatorConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("builder_focus_min_api_level"));
        assert!(toml_string.contains("unmute_microphone_on_start"));
        assert!(toml_string.contains("[focus]"));
        assert!(toml_string.contains("voice_communication"));
    }
}

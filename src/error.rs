use thiserror::Error;

/// Host permissions the coordinator needs before it can subscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    BluetoothConnect,
    ModifyAudioSettings,
    RecordAudio,
}

impl Permission {
    pub const REQUIRED: [Permission; 3] = [
        Permission::BluetoothConnect,
        Permission::ModifyAudioSettings,
        Permission::RecordAudio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::BluetoothConnect => "BLUETOOTH_CONNECT",
            Permission::ModifyAudioSettings => "MODIFY_AUDIO_SETTINGS",
            Permission::RecordAudio => "RECORD_AUDIO",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main coordinator error type
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Permission denied: {permission}")]
    PermissionDenied { permission: Permission },

    #[error("Unknown audio route: {name}")]
    UnknownRoute { name: String },

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RouteError {
    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            RouteError::PermissionDenied { permission } => {
                format!("The app is not allowed to use {} - audio routing cannot start", permission)
            }
            RouteError::UnknownRoute { name } => {
                format!("'{}' is not an audio route", name)
            }
            RouteError::WorkerSpawn(err) => {
                format!("Could not start the audio routing worker: {}", err)
            }
            RouteError::Config(err) => err.user_message(),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            RouteError::PermissionDenied { permission } => vec![
                format!("Grant the {} permission in the system settings", permission),
                "Call start again once the permission has been granted".to_string(),
            ],
            RouteError::UnknownRoute { .. } => vec![
                "Valid routes: SPEAKER_PHONE, WIRED_HEADSET, EARPIECE, BLUETOOTH".to_string(),
                "Use 'routes' to see the routes the system currently offers".to_string(),
            ],
            RouteError::WorkerSpawn(_) => vec![
                "Close other applications to free system resources".to_string(),
                "Restart the application".to_string(),
            ],
            RouteError::Config(err) => err.recovery_suggestions(),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            RouteError::PermissionDenied { .. } => true, // Retry after the user grants it
            RouteError::UnknownRoute { .. } => false,
            RouteError::WorkerSpawn(_) => false,
            RouteError::Config(err) => err.is_recoverable(),
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RouteError::PermissionDenied { .. } => ErrorSeverity::Error,
            RouteError::UnknownRoute { .. } => ErrorSeverity::Info,
            RouteError::WorkerSpawn(_) => ErrorSeverity::Critical,
            RouteError::Config(_) => ErrorSeverity::Warning,
        }
    }
}

/// Failures while handing work to a background context. These are logged and absorbed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("main thread looper has shut down")]
    LooperClosed,

    #[error("notification worker has shut down")]
    WorkerClosed,

    #[error("event receiver was dropped")]
    ReceiverClosed,
}

/// Error severity levels for logging and user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
            ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "Cannot find or create configuration directory".to_string()
            }
            ConfigError::IoError(err) => {
                format!("Cannot access configuration file: {}", err)
            }
            ConfigError::SerializationError(_) => {
                "Failed to save configuration settings".to_string()
            }
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted or has invalid format".to_string()
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::ConfigDirNotFound => vec![
                "Check that you have write permissions to your home directory".to_string(),
                "Try creating the directory manually: ~/.config/audio-route-manager/".to_string(),
            ],
            ConfigError::IoError(_) => vec![
                "Check file permissions for the configuration directory".to_string(),
                "Ensure the disk is not full".to_string(),
            ],
            ConfigError::SerializationError(_) => vec![
                "Configuration will use default values".to_string(),
                "Try resetting configuration to defaults".to_string(),
            ],
            ConfigError::DeserializationError(_) => vec![
                "Delete the configuration file to reset to defaults".to_string(),
                "Check the configuration file format manually".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        // Every configuration failure can fall back to defaults
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_permission_denied_display() {
        let error = RouteError::PermissionDenied {
            permission: Permission::BluetoothConnect,
        };
        assert_eq!(format!("{}", error), "Permission denied: BLUETOOTH_CONNECT");
        assert!(error.user_message().contains("BLUETOOTH_CONNECT"));
        assert!(error.is_recoverable());
        assert_eq!(error.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn test_unknown_route_display() {
        let error = RouteError::UnknownRoute {
            name: "HDMI".to_string(),
        };
        assert_eq!(format!("{}", error), "Unknown audio route: HDMI");
        assert!(!error.is_recoverable());
        assert!(error.recovery_suggestions()[0].contains("SPEAKER_PHONE"));
    }

    #[test]
    fn test_route_error_from_config_error() {
        let route_error: RouteError = ConfigError::ConfigDirNotFound.into();

        match route_error {
            RouteError::Config(ConfigError::ConfigDirNotFound) => {}
            _ => panic!("Expected Config error variant"),
        }
    }

    #[test]
    fn test_config_error_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied");
        let config_error: ConfigError = io_error.into();

        assert!(matches!(config_error, ConfigError::IoError(_)));
        assert!(format!("{}", config_error).contains("IO error"));
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;

        let io_error = io::Error::new(io::ErrorKind::Other, "thread limit");
        let route_error = RouteError::WorkerSpawn(io_error);

        assert!(route_error.source().is_some());
        assert_eq!(route_error.severity().log_level(), log::Level::Error);
    }

    #[test]
    fn test_dispatch_error_display() {
        assert_eq!(DispatchError::LooperClosed.to_string(), "main thread looper has shut down");
        assert_eq!(DispatchError::ReceiverClosed.to_string(), "event receiver was dropped");
    }

    #[test]
    fn test_severity_strings() {
        assert_eq!(ErrorSeverity::Info.as_str(), "INFO");
        assert_eq!(ErrorSeverity::Critical.as_str(), "CRITICAL");
        assert_eq!(ErrorSeverity::Warning.log_level(), log::Level::Warn);
    }
}

use log::{info, warn, debug};
use std::sync::{Arc, Mutex};
use std::collections::VecDeque;
use chrono::{DateTime, Utc};

/// Environment variable that selects the log level
pub const LOG_LEVEL_ENV: &str = "AUDIO_ROUTE_LOG_LEVEL";

/// Diagnostic entry recorded by the coordinator
#[derive(Debug, Clone)]
pub struct RouteLogEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: RouteLogKind,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteLogKind {
    RouteAdded,
    RouteRemoved,
    RouteSelected,
    RouteUnselected,
    DevicesChanged,
    FocusRequested,
    FocusAbandoned,
    FocusChanged,
    HeadsetPlug,
    BluetoothConnection,
    BluetoothService,
    ScoStatus,
    PlatformError,
}

impl RouteLogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteLogKind::RouteAdded => "ROUTE_ADDED",
            RouteLogKind::RouteRemoved => "ROUTE_REMOVED",
            RouteLogKind::RouteSelected => "ROUTE_SELECTED",
            RouteLogKind::RouteUnselected => "ROUTE_UNSELECTED",
            RouteLogKind::DevicesChanged => "DEVICES_CHANGED",
            RouteLogKind::FocusRequested => "FOCUS_REQUESTED",
            RouteLogKind::FocusAbandoned => "FOCUS_ABANDONED",
            RouteLogKind::FocusChanged => "FOCUS_CHANGED",
            RouteLogKind::HeadsetPlug => "HEADSET_PLUG",
            RouteLogKind::BluetoothConnection => "BLUETOOTH_CONNECTION",
            RouteLogKind::BluetoothService => "BLUETOOTH_SERVICE",
            RouteLogKind::ScoStatus => "SCO_STATUS",
            RouteLogKind::PlatformError => "PLATFORM_ERROR",
        }
    }
}

/// Logger for routing decisions and platform notifications
#[derive(Clone)]
pub struct RouteLogger {
    events: Arc<Mutex<VecDeque<RouteLogEvent>>>,
    max_events: usize,
}

impl Default for RouteLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteLogger {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            max_events: max_events.max(1),
        }
    }

    /// Initialize the `log` backend with the level from `AUDIO_ROUTE_LOG_LEVEL`
    pub fn init() -> Result<(), Box<dyn std::error::Error>> {
        let log_level = std::env::var(LOG_LEVEL_ENV)
            .unwrap_or_else(|_| "info".to_string());

        let mut builder = env_logger::Builder::new();

        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] [{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        });

        match log_level.to_lowercase().as_str() {
            "trace" => builder.filter_level(log::LevelFilter::Trace),
            "debug" => builder.filter_level(log::LevelFilter::Debug),
            "info" => builder.filter_level(log::LevelFilter::Info),
            "warn" => builder.filter_level(log::LevelFilter::Warn),
            "error" => builder.filter_level(log::LevelFilter::Error),
            _ => builder.filter_level(log::LevelFilter::Info),
        };

        builder.try_init()?;

        info!("Audio route logging initialized with level: {}", log_level);
        Ok(())
    }

    pub fn log_event(&self, kind: RouteLogKind, details: String) {
        let event = RouteLogEvent {
            timestamp: Utc::now(),
            kind,
            details: details.clone(),
        };

        if let Ok(mut events) = self.events.lock() {
            events.push_back(event);
            while events.len() > self.max_events {
                events.pop_front();
            }
        }

        match kind {
            RouteLogKind::PlatformError => warn!("[{}] {}", kind.as_str(), details),
            RouteLogKind::ScoStatus | RouteLogKind::FocusChanged => {
                debug!("[{}] {}", kind.as_str(), details)
            }
            _ => info!("[{}] {}", kind.as_str(), details),
        }
    }

    pub fn log_platform_error(&self, context: &str, error: &str) {
        self.log_event(
            RouteLogKind::PlatformError,
            format!("{} failed: {} (absorbed)", context, error),
        );
    }

    /// Last `count` entries, oldest first
    pub fn recent(&self, count: usize) -> Vec<RouteLogEvent> {
        let events = match self.events.lock() {
            Ok(events) => events,
            Err(_) => return Vec::new(),
        };
        let skip = events.len().saturating_sub(count);
        events.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    pub fn statistics(&self) -> EventStatistics {
        let mut stats = EventStatistics::default();
        let events = match self.events.lock() {
            Ok(events) => events,
            Err(_) => return stats,
        };

        for event in events.iter() {
            match event.kind {
                RouteLogKind::RouteAdded
                | RouteLogKind::RouteRemoved
                | RouteLogKind::RouteSelected
                | RouteLogKind::RouteUnselected => stats.route_changes += 1,
                RouteLogKind::DevicesChanged => stats.device_changes += 1,
                RouteLogKind::FocusRequested
                | RouteLogKind::FocusAbandoned
                | RouteLogKind::FocusChanged => stats.focus_events += 1,
                RouteLogKind::PlatformError => stats.platform_errors += 1,
                _ => {}
            }
        }

        stats.total_events = events.len();
        stats
    }
}

/// Counts of logged events per area
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStatistics {
    pub total_events: usize,
    pub route_changes: usize,
    pub device_changes: usize,
    pub focus_events: usize,
    pub platform_errors: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_logger_creation() {
        let logger = RouteLogger::new();
        assert_eq!(logger.max_events, 1000);
        assert!(logger.recent(10).is_empty());
    }

    #[test]
    fn test_log_event() {
        let logger = RouteLogger::new();

        logger.log_event(RouteLogKind::RouteAdded, "Headset".to_string());

        let events = logger.recent(1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details, "Headset");
        assert_eq!(events[0].kind, RouteLogKind::RouteAdded);
    }

    #[test]
    fn test_event_history_limit() {
        let logger = RouteLogger::with_capacity(3);

        for i in 0..5 {
            logger.log_event(RouteLogKind::ScoStatus, format!("Event {}", i));
        }

        let events = logger.recent(10);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].details, "Event 2");
        assert_eq!(events[2].details, "Event 4");
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let logger = RouteLogger::with_capacity(0);
        logger.log_event(RouteLogKind::HeadsetPlug, "a".to_string());
        logger.log_event(RouteLogKind::HeadsetPlug, "b".to_string());

        let events = logger.recent(5);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details, "b");
    }

    #[test]
    fn test_event_statistics() {
        let logger = RouteLogger::new();

        logger.log_event(RouteLogKind::RouteAdded, "r".to_string());
        logger.log_event(RouteLogKind::RouteSelected, "r".to_string());
        logger.log_event(RouteLogKind::DevicesChanged, "d".to_string());
        logger.log_event(RouteLogKind::FocusChanged, "f".to_string());
        logger.log_platform_error("select route", "looper gone");

        let stats = logger.statistics();
        assert_eq!(stats.total_events, 5);
        assert_eq!(stats.route_changes, 2);
        assert_eq!(stats.device_changes, 1);
        assert_eq!(stats.focus_events, 1);
        assert_eq!(stats.platform_errors, 1);
    }

    #[test]
    fn test_clear() {
        let logger = RouteLogger::new();
        logger.log_event(RouteLogKind::BluetoothService, "connected".to_string());
        logger.clear();
        assert!(logger.recent(10).is_empty());
    }

    #[test]
    fn test_platform_error_details() {
        let logger = RouteLogger::new();
        logger.log_platform_error("emit onRouteAdded", "channel closed");

        let events = logger.recent(1);
        assert!(events[0].details.contains("emit onRouteAdded"));
        assert!(events[0].details.contains("absorbed"));
    }

    #[test]
    fn test_kind_as_str() {
        assert_eq!(RouteLogKind::RouteAdded.as_str(), "ROUTE_ADDED");
        assert_eq!(RouteLogKind::FocusChanged.as_str(), "FOCUS_CHANGED");
        assert_eq!(RouteLogKind::PlatformError.as_str(), "PLATFORM_ERROR");
    }
}

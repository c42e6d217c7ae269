use crate::config::CoordinatorConfig;
use crate::coordinator::{AudioRouteCoordinator, BluetoothScoState};
use crate::error::{ErrorSeverity, RouteError};
use crate::events::RouteEvent;
use crate::focus::FocusMechanism;
use crate::logging::{EventStatistics, RouteLogEvent};
use crate::models::{AudioDevice, DeviceDescriptor, FocusChange, FocusState, RouteDescriptor, StartResult};
use std::path::Path;

/// Point-in-time view of the coordinator for the status box
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub started: bool,
    pub selected_device: AudioDevice,
    pub focus_state: FocusState,
    pub last_focus_change: Option<FocusChange>,
    pub focus_mechanism: FocusMechanism,
    pub sco: BluetoothScoState,
    pub wired_plugged_in: bool,
    pub device_count: usize,
    pub route_count: usize,
    pub statistics: EventStatistics,
}

impl StatusSnapshot {
    pub fn capture(coordinator: &AudioRouteCoordinator) -> Self {
        Self {
            started: coordinator.is_started(),
            selected_device: coordinator.current_selected_device(),
            focus_state: coordinator.focus_state(),
            last_focus_change: coordinator.last_focus_change(),
            focus_mechanism: coordinator.focus_mechanism(),
            sco: coordinator.bluetooth_sco_state(),
            wired_plugged_in: coordinator.is_wired_headset_plugged_in(),
            device_count: coordinator.get_devices().len(),
            route_count: coordinator.get_routes().len(),
            statistics: coordinator.logger().statistics(),
        }
    }
}

/// Status display formatter for the CLI
pub struct StatusDisplay;

impl StatusDisplay {
    /// Display the coordinator status box
    pub fn display_status(status: &StatusSnapshot) {
        println!("┌─ Audio Route Status ────────────────────────────────────┐");
        println!("│ State: {}", if status.started { "Started" } else { "Stopped" });
        println!("│ Selected device: {}", status.selected_device);
        println!("│ Wired headset: {}", Self::yes_no(status.wired_plugged_in));
        println!("│");
        println!("│ Focus: {} ({} requests)", status.focus_state, status.focus_mechanism.as_str());
        match status.last_focus_change {
            Some(change) => println!("│ Last focus change: {} ({})", change.as_str(), change.code()),
            None => println!("│ Last focus change: none"),
        }
        println!("│");
        println!("│ SCO requested: {}", Self::yes_no(status.sco.requested));
        println!("│ Headset service: {}", if status.sco.service_connected { "Connected" } else { "Disconnected" });
        println!("│");
        println!("│ Devices: {} | Routes: {}", status.device_count, status.route_count);
        println!(
            "│ Logged: {} events ({} route, {} device, {} focus, {} errors)",
            status.statistics.total_events,
            status.statistics.route_changes,
            status.statistics.device_changes,
            status.statistics.focus_events,
            status.statistics.platform_errors
        );
        println!("└─────────────────────────────────────────────────────────┘");
    }

    /// Display what `start` returned
    pub fn display_start_result(result: &StartResult) {
        println!("Started. Selected device: {}", result.selected_device);
        Self::display_devices(&result.devices);
    }

    pub fn display_devices(devices: &[DeviceDescriptor]) {
        println!("┌─ Output Devices ────────────────────────────────────────┐");
        if devices.is_empty() {
            println!("│ No output devices");
        }
        for device in devices {
            println!(
                "│ {:>4}  {:<14} {}",
                device.id,
                device.device_type.as_str(),
                Self::truncate(&device.name, 34)
            );
        }
        println!("└─────────────────────────────────────────────────────────┘");
    }

    pub fn display_routes(routes: &[RouteDescriptor]) {
        println!("┌─ Routes ────────────────────────────────────────────────┐");
        if routes.is_empty() {
            println!("│ No routes");
        }
        for route in routes {
            println!(
                "│ {} {:<14} {}",
                if route.is_selected { "▶" } else { " " },
                route.route_type.as_str(),
                Self::truncate(&route.name, 38)
            );
        }
        println!("└─────────────────────────────────────────────────────────┘");
    }

    /// One line per outbound event, name followed by its JSON payload
    pub fn display_event(event: &RouteEvent) {
        println!("→ {} {}", event.name(), event.payload());
    }

    pub fn display_log_events(events: &[RouteLogEvent]) {
        if events.is_empty() {
            println!("No events recorded");
            return;
        }
        for event in events {
            println!(
                "{} {:<20} {}",
                event.timestamp.format("%H:%M:%S%.3f"),
                event.kind.as_str(),
                event.details
            );
        }
    }

    pub fn display_config(config: &CoordinatorConfig, path: &Path) {
        println!("# {}", path.display());
        match toml::to_string_pretty(config) {
            Ok(text) => println!("{}", text),
            Err(err) => eprintln!("Cannot render configuration: {}", err),
        }
    }

    /// Display error message with formatting and recovery suggestions
    pub fn display_error(error: &RouteError) {
        let severity = error.severity();
        let severity_icon = match severity {
            ErrorSeverity::Info => "ℹ",
            ErrorSeverity::Warning => "⚠",
            ErrorSeverity::Error => "✗",
            ErrorSeverity::Critical => "🔥",
        };

        eprintln!("┌─ {} {} ─────────────────────────────────────────────────┐",
            severity_icon, severity.as_str());

        for line in Self::wrap_text(&error.user_message(), 55) {
            eprintln!("│ {}", line);
        }

        let suggestions = error.recovery_suggestions();
        if !suggestions.is_empty() {
            eprintln!("│");
            eprintln!("│ Suggestions:");
            for suggestion in suggestions.iter().take(3) {
                for line in Self::wrap_text(&format!("• {}", suggestion), 53) {
                    eprintln!("│   {}", line);
                }
            }
        }

        if let RouteError::Config(_) = error {
            eprintln!("│");
            eprintln!("│ Configuration will use default values");
        }

        eprintln!("└─────────────────────────────────────────────────────────┘");
    }

    /// Display a simple error message for non-interactive contexts
    pub fn display_simple_error(error: &RouteError) {
        eprintln!("[{}] {}", error.severity().as_str(), error.user_message());

        if let Some(suggestion) = error.recovery_suggestions().first() {
            eprintln!("Suggestion: {}", suggestion);
        }
    }

    /// Wrap text to fit within specified width
    fn wrap_text(text: &str, width: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current_line = String::new();

        for word in text.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.len() + word.len() < width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(current_line);
                current_line = word.to_string();
            }
        }

        if !current_line.is_empty() {
            lines.push(current_line);
        }

        lines
    }

    pub fn truncate(text: &str, max_chars: usize) -> String {
        if text.chars().count() <= max_chars {
            text.to_string()
        } else {
            let kept: String = text.chars().take(max_chars.saturating_sub(1)).collect();
            format!("{}…", kept)
        }
    }

    fn yes_no(value: bool) -> &'static str {
        if value { "Yes" } else { "No" }
    }
}

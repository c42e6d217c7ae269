use crate::models::AudioDevice;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod status;
pub use status::{StatusDisplay, StatusSnapshot};

/// Audio route coordinator CLI
#[derive(Parser)]
#[command(name = "routectl")]
#[command(about = "Drive the audio route coordinator against a simulated host")]
#[command(version = "0.1.0")]
pub struct CliApp {
    /// API level reported by the simulated host
    #[arg(long, default_value_t = 33)]
    pub api_level: u32,

    /// Use this configuration file instead of the one in the home directory
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Subscribe to notifications, request focus and show the selected device
    Start,
    /// Unsubscribe everything and abandon focus
    Stop,
    /// List reported output devices
    Devices,
    /// List selectable routes
    Routes,
    /// Select an output route (SPEAKER_PHONE, WIRED_HEADSET, EARPIECE, BLUETOOTH)
    Choose {
        /// Route name
        route: String,
        /// Toggle speakerphone and SCO directly instead of selecting a route
        #[arg(long)]
        sco: bool,
    },
    /// Audio focus control
    Focus {
        #[command(subcommand)]
        action: FocusAction,
    },
    /// Report whether a wired headset is plugged in
    Wired,
    /// Show coordinator status
    Status,
    /// Show recent diagnostic events
    Events {
        /// Number of entries to show
        #[arg(default_value_t = 20)]
        count: usize,
    },
    /// Change the simulated host
    Host {
        #[command(subcommand)]
        action: HostAction,
    },
    /// Run a scripted sequence and print every event
    Scenario {
        #[arg(value_enum)]
        name: ScenarioName,
    },
    /// Print events until Ctrl-C
    Monitor {
        /// Connect and disconnect a bluetooth headset in the background
        #[arg(long)]
        simulate: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Focus subcommands
#[derive(Debug, Subcommand)]
pub enum FocusAction {
    /// Request audio focus
    Request,
    /// Abandon audio focus
    Abandon,
}

/// Simulated host subcommands
#[derive(Debug, Subcommand)]
pub enum HostAction {
    /// Plug in a wired headset
    Plug {
        #[arg(default_value = "Wired headset")]
        name: String,
    },
    /// Unplug every wired headset
    Unplug,
    /// Connect a bluetooth headset
    BtConnect {
        #[arg(default_value = "Bluetooth headset")]
        name: String,
    },
    /// Disconnect the bluetooth headset
    BtDisconnect,
    /// Deliver a raw focus-change code
    FocusChange {
        #[arg(allow_negative_numbers = true)]
        code: i32,
    },
    /// Connect the bluetooth headset profile service
    ServiceConnect,
    /// Disconnect the bluetooth headset profile service
    ServiceDisconnect,
}

/// Scripted host sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScenarioName {
    /// Plug and unplug a wired headset
    WiredHeadset,
    /// Connect a bluetooth headset and route audio over SCO
    BluetoothHeadset,
    /// Lose the bluetooth headset with nothing wired plugged in
    BluetoothDropout,
    /// Transient loss, permanent loss and regain of focus
    FocusLoss,
}

impl ScenarioName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioName::WiredHeadset => "wired-headset",
            ScenarioName::BluetoothHeadset => "bluetooth-headset",
            ScenarioName::BluetoothDropout => "bluetooth-dropout",
            ScenarioName::FocusLoss => "focus-loss",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            ScenarioName::WiredHeadset,
            ScenarioName::BluetoothHeadset,
            ScenarioName::BluetoothDropout,
            ScenarioName::FocusLoss,
        ]
        .into_iter()
        .find(|scenario| scenario.as_str() == name)
    }
}

/// Configuration subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the active configuration
    Show,
    /// Restore defaults
    Reset,
    /// Change one setting
    Set {
        /// Setting name
        key: String,
        /// New value
        value: String,
    },
}

/// A validated `config set` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSetting {
    ScoPollInterval(Option<u64>),
    UnmuteMicrophoneOnStart(bool),
    AcceptsDelayedFocusGain(bool),
    EventHistorySize(usize),
    BuilderFocusMinApiLevel(u32),
    WiredQueryMinApiLevel(u32),
}

impl CliApp {
    /// Parse command line arguments
    pub fn parse() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Parse command from string (for interactive mode)
    pub fn parse_command(input: &str) -> Result<Commands, ParseError> {
        let args: Vec<&str> = input.split_whitespace().collect();
        if args.is_empty() {
            return Err(ParseError::EmptyCommand);
        }

        match args[0] {
            "start" => Ok(Commands::Start),
            "stop" => Ok(Commands::Stop),
            "devices" => Ok(Commands::Devices),
            "routes" => Ok(Commands::Routes),
            "wired" => Ok(Commands::Wired),
            "status" => Ok(Commands::Status),
            "help" | "?" => Err(ParseError::HelpRequested),
            "choose" => {
                let sco = args[1..].contains(&"--sco");
                let route = args[1..].iter().find(|arg| **arg != "--sco").ok_or_else(|| {
                    ParseError::MissingArgument {
                        command: "choose".to_string(),
                        argument: "route".to_string(),
                    }
                })?;
                Self::validate_route(route)?;
                Ok(Commands::Choose {
                    route: route.to_string(),
                    sco,
                })
            }
            "events" => match args.get(1) {
                Some(count) => {
                    let count = count.parse::<usize>().map_err(|_| ParseError::InvalidArgument {
                        argument: "count".to_string(),
                        value: count.to_string(),
                        expected: "a positive number".to_string(),
                    })?;
                    Ok(Commands::Events { count })
                }
                None => Ok(Commands::Events { count: 20 }),
            },
            "focus" => match args.get(1) {
                Some(&"request") => Ok(Commands::Focus {
                    action: FocusAction::Request,
                }),
                Some(&"abandon") => Ok(Commands::Focus {
                    action: FocusAction::Abandon,
                }),
                Some(other) => Err(ParseError::UnknownCommand {
                    command: format!("focus {}", other),
                }),
                None => Err(ParseError::MissingArgument {
                    command: "focus".to_string(),
                    argument: "request|abandon".to_string(),
                }),
            },
            "host" => Self::parse_host_action(&args[1..]).map(|action| Commands::Host { action }),
            "scenario" => {
                let name = args.get(1).ok_or_else(|| ParseError::MissingArgument {
                    command: "scenario".to_string(),
                    argument: "name".to_string(),
                })?;
                let name = ScenarioName::from_name(name).ok_or_else(|| ParseError::InvalidArgument {
                    argument: "scenario".to_string(),
                    value: name.to_string(),
                    expected: "wired-headset, bluetooth-headset, bluetooth-dropout or focus-loss"
                        .to_string(),
                })?;
                Ok(Commands::Scenario { name })
            }
            "monitor" => Ok(Commands::Monitor {
                simulate: args[1..].contains(&"--simulate"),
            }),
            "config" => match args.get(1) {
                Some(&"show") => Ok(Commands::Config {
                    action: ConfigAction::Show,
                }),
                Some(&"reset") => Ok(Commands::Config {
                    action: ConfigAction::Reset,
                }),
                Some(&"set") => {
                    if args.len() < 4 {
                        return Err(ParseError::MissingArgument {
                            command: "config set".to_string(),
                            argument: "key and value".to_string(),
                        });
                    }
                    Ok(Commands::Config {
                        action: ConfigAction::Set {
                            key: args[2].to_string(),
                            value: args[3..].join(" "),
                        },
                    })
                }
                Some(other) => Err(ParseError::UnknownCommand {
                    command: format!("config {}", other),
                }),
                None => Err(ParseError::MissingArgument {
                    command: "config".to_string(),
                    argument: "show|reset|set".to_string(),
                }),
            },
            other => Err(ParseError::UnknownCommand {
                command: other.to_string(),
            }),
        }
    }

    fn parse_host_action(args: &[&str]) -> Result<HostAction, ParseError> {
        let name_or = |default: &str| {
            if args.len() > 1 {
                args[1..].join(" ")
            } else {
                default.to_string()
            }
        };

        match args.first() {
            Some(&"plug") => Ok(HostAction::Plug {
                name: name_or("Wired headset"),
            }),
            Some(&"unplug") => Ok(HostAction::Unplug),
            Some(&"bt-connect") => Ok(HostAction::BtConnect {
                name: name_or("Bluetooth headset"),
            }),
            Some(&"bt-disconnect") => Ok(HostAction::BtDisconnect),
            Some(&"service-connect") => Ok(HostAction::ServiceConnect),
            Some(&"service-disconnect") => Ok(HostAction::ServiceDisconnect),
            Some(&"focus-change") => {
                let code = args.get(1).ok_or_else(|| ParseError::MissingArgument {
                    command: "host focus-change".to_string(),
                    argument: "code".to_string(),
                })?;
                let code = code.parse::<i32>().map_err(|_| ParseError::InvalidArgument {
                    argument: "focus-change code".to_string(),
                    value: code.to_string(),
                    expected: "an integer".to_string(),
                })?;
                Ok(HostAction::FocusChange { code })
            }
            Some(other) => Err(ParseError::UnknownCommand {
                command: format!("host {}", other),
            }),
            None => Err(ParseError::MissingArgument {
                command: "host".to_string(),
                argument: "action".to_string(),
            }),
        }
    }

    /// Check a route name without choosing it
    pub fn validate_route(route: &str) -> Result<AudioDevice, ParseError> {
        route.parse::<AudioDevice>().map_err(|_| ParseError::InvalidArgument {
            argument: "route".to_string(),
            value: route.to_string(),
            expected: "SPEAKER_PHONE, WIRED_HEADSET, EARPIECE or BLUETOOTH".to_string(),
        })
    }

    /// Turn a `config set` key/value pair into a typed setting
    pub fn parse_setting(key: &str, value: &str) -> Result<ConfigSetting, ParseError> {
        let value = value.trim();
        let invalid = |expected: &str| ParseError::InvalidArgument {
            argument: key.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        };

        match key {
            "sco_poll_interval_ms" => match value {
                "off" | "none" | "0" => Ok(ConfigSetting::ScoPollInterval(None)),
                _ => value
                    .parse::<u64>()
                    .map(|ms| ConfigSetting::ScoPollInterval(Some(ms)))
                    .map_err(|_| invalid("milliseconds or 'off'")),
            },
            "unmute_microphone_on_start" => Self::parse_bool(value)
                .map(ConfigSetting::UnmuteMicrophoneOnStart)
                .ok_or_else(|| invalid("true or false")),
            "accepts_delayed_focus_gain" => Self::parse_bool(value)
                .map(ConfigSetting::AcceptsDelayedFocusGain)
                .ok_or_else(|| invalid("true or false")),
            "event_history_size" => match value.parse::<usize>() {
                Ok(size) if size > 0 => Ok(ConfigSetting::EventHistorySize(size)),
                _ => Err(invalid("a number above 0")),
            },
            "builder_focus_min_api_level" => value
                .parse::<u32>()
                .map(ConfigSetting::BuilderFocusMinApiLevel)
                .map_err(|_| invalid("an API level")),
            "wired_query_min_api_level" => value
                .parse::<u32>()
                .map(ConfigSetting::WiredQueryMinApiLevel)
                .map_err(|_| invalid("an API level")),
            _ => Err(ParseError::UnknownSetting {
                key: key.to_string(),
            }),
        }
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => Some(true),
            "false" | "off" | "no" | "0" => Some(false),
            _ => None,
        }
    }

    /// Display help information
    pub fn display_help() {
        println!("Audio Route Coordinator - Available Commands:");
        println!();
        println!("Coordinator:");
        println!("  start                 - Subscribe to notifications and request focus");
        println!("  stop                  - Unsubscribe and abandon focus");
        println!("  choose <route> [--sco] - Select SPEAKER_PHONE, WIRED_HEADSET, EARPIECE or BLUETOOTH");
        println!("  focus request|abandon - Request or abandon audio focus");
        println!();
        println!("Information:");
        println!("  devices               - List reported output devices");
        println!("  routes                - List selectable routes");
        println!("  wired                 - Is a wired headset plugged in");
        println!("  status                - Show coordinator status");
        println!("  events [count]        - Show recent diagnostic events");
        println!();
        println!("Simulated host:");
        println!("  host plug [name]      - Plug in a wired headset");
        println!("  host unplug           - Unplug wired headsets");
        println!("  host bt-connect [name] - Connect a bluetooth headset");
        println!("  host bt-disconnect    - Disconnect the bluetooth headset");
        println!("  host focus-change <code> - Deliver a focus change (e.g. -1)");
        println!("  host service-connect|service-disconnect");
        println!("  scenario <name>       - wired-headset, bluetooth-headset, bluetooth-dropout, focus-loss");
        println!("  monitor [--simulate]  - Print events until Ctrl-C");
        println!();
        println!("Configuration:");
        println!("  config show           - Print configuration");
        println!("  config reset          - Restore defaults");
        println!("  config set <key> <value>");
        println!();
        println!("General:");
        println!("  help                  - Show this help message");
        println!("  exit, quit            - Exit");
    }
}

/// Command parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("Missing argument for {command}: {argument}")]
    MissingArgument { command: String, argument: String },

    #[error("Invalid argument {argument}: got '{value}', expected {expected}")]
    InvalidArgument {
        argument: String,
        value: String,
        expected: String,
    },

    #[error("Unknown setting: {key}")]
    UnknownSetting { key: String },

    #[error("Help requested")]
    HelpRequested,
}

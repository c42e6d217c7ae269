use audio_route_manager::cli::{
    CliApp, Commands, ConfigAction, ConfigSetting, FocusAction, HostAction, ParseError,
    ScenarioName, StatusDisplay, StatusSnapshot,
};
use audio_route_manager::config::ConfigManager;
use audio_route_manager::events::{ChannelEmitter, RouteEvent};
use audio_route_manager::logging::{RouteLogger, LOG_LEVEL_ENV};
use audio_route_manager::platform::{LooperThread, MainThread, Platform, SimulatedHost};
use audio_route_manager::{AudioDevice, AudioRouteCoordinator, ErrorSeverity, RouteError};
use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(1);
const SIMULATED_HEADSET_PERIOD: Duration = Duration::from_secs(3);

/// Drives the coordinator against a simulated host and prints what it emits
pub struct RouteController {
    coordinator: AudioRouteCoordinator,
    host: Arc<SimulatedHost>,
    main_thread: Arc<LooperThread>,
    events: mpsc::UnboundedReceiver<RouteEvent>,
    config_manager: ConfigManager,
    shutdown_flag: Arc<AtomicBool>,
}

impl RouteController {
    pub fn new(cli: &CliApp) -> Result<Self, RouteError> {
        // Initialize logging first (default to 'warn' if unspecified)
        if std::env::var(LOG_LEVEL_ENV).is_err() {
            std::env::set_var(LOG_LEVEL_ENV, "warn");
        }
        if let Err(e) = RouteLogger::init() {
            eprintln!("Warning: Failed to initialize logging: {}", e);
        }

        let config_manager = match &cli.config {
            Some(path) => ConfigManager::with_path(path.clone())?,
            None => ConfigManager::new()?,
        };

        let host = Arc::new(SimulatedHost::with_api_level(cli.api_level));
        let main_thread = Arc::new(LooperThread::spawn()?);
        let (emitter, events) = ChannelEmitter::new();

        let coordinator = AudioRouteCoordinator::new(
            Platform::simulated(host.clone(), main_thread.clone()),
            config_manager.get_config().clone(),
            Arc::new(emitter),
        )?;

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let shutdown_flag_clone = shutdown_flag.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            println!("\nReceived interrupt signal. Shutting down gracefully...");
            shutdown_flag_clone.store(true, Ordering::Relaxed);
        }) {
            warn!("Could not install Ctrl-C handler: {}", e);
        }

        info!("Route controller initialized (API level {})", cli.api_level);

        Ok(Self {
            coordinator,
            host,
            main_thread,
            events,
            config_manager,
            shutdown_flag,
        })
    }

    /// Execute a single command
    pub async fn execute_command(&mut self, command: Commands) -> Result<(), RouteError> {
        match command {
            Commands::Start => {
                let result = self.coordinator.start()?;
                StatusDisplay::display_start_result(&result);
                self.settle();
            }
            Commands::Stop => {
                self.coordinator.stop();
                self.settle();
                println!("Stopped");
            }
            Commands::Devices => {
                StatusDisplay::display_devices(&self.coordinator.get_devices());
            }
            Commands::Routes => {
                StatusDisplay::display_routes(&self.coordinator.get_routes());
            }
            Commands::Choose { route, sco } => {
                if sco {
                    let route = route.parse::<AudioDevice>()?;
                    self.coordinator.choose_route_with_sco(route);
                } else {
                    let before = self.coordinator.choose_route_named(&route)?;
                    info!("Selection before the main thread acted: {}", before);
                }
                self.settle();
                println!("Selected device: {}", self.coordinator.current_selected_device());
            }
            Commands::Focus { action } => {
                let state = match action {
                    FocusAction::Request => self.coordinator.request_audio_focus(),
                    FocusAction::Abandon => self.coordinator.abandon_audio_focus(),
                };
                println!("{}", state);
            }
            Commands::Wired => {
                let plugged = self.coordinator.is_wired_headset_plugged_in();
                println!("Wired headset plugged in: {}", if plugged { "yes" } else { "no" });
            }
            Commands::Status => {
                StatusDisplay::display_status(&StatusSnapshot::capture(&self.coordinator));
            }
            Commands::Events { count } => {
                StatusDisplay::display_log_events(&self.coordinator.logger().recent(count));
            }
            Commands::Host { action } => {
                self.apply_host_action(action);
                self.settle();
            }
            Commands::Scenario { name } => {
                self.run_scenario(name)?;
            }
            Commands::Monitor { simulate } => {
                self.run_monitor(simulate).await?;
            }
            Commands::Config { action } => {
                self.handle_config_action(action)?;
            }
        }

        Ok(())
    }

    fn apply_host_action(&self, action: HostAction) {
        match action {
            HostAction::Plug { name } => {
                let id = self.host.plug_wired_headset(&name);
                println!("Plugged in '{}' (device {})", name, id);
            }
            HostAction::Unplug => {
                self.host.unplug_wired_headset();
                println!("Unplugged wired headsets");
            }
            HostAction::BtConnect { name } => {
                self.host.connect_bluetooth_headset(&name);
                println!("Connected bluetooth headset '{}'", name);
            }
            HostAction::BtDisconnect => {
                self.host.disconnect_bluetooth_headset();
                println!("Disconnected bluetooth headset");
            }
            HostAction::FocusChange { code } => {
                if !self.host.push_focus_change(code) {
                    println!("Nobody holds a focus request; run 'focus request' first");
                }
            }
            HostAction::ServiceConnect => {
                if !self.host.connect_bluetooth_service() {
                    println!("No headset profile proxy was requested");
                }
            }
            HostAction::ServiceDisconnect => {
                if !self.host.disconnect_bluetooth_service() {
                    println!("No headset profile proxy was requested");
                }
            }
        }
    }

    fn run_scenario(&mut self, name: ScenarioName) -> Result<(), RouteError> {
        println!("Scenario: {}", name.as_str());

        if !self.coordinator.is_started() {
            Self::announce("start");
            let result = self.coordinator.start()?;
            self.settle();
            println!("   selected device: {}", result.selected_device);
        }

        match name {
            ScenarioName::WiredHeadset => {
                Self::announce("plug in a wired headset");
                self.host.plug_wired_headset("Wired headset");
                self.settle_and_report();

                Self::announce("unplug it");
                self.host.unplug_wired_headset();
                self.settle_and_report();
            }
            ScenarioName::BluetoothHeadset => {
                Self::announce("connect a bluetooth headset");
                self.host.connect_bluetooth_headset("Car kit");
                self.settle_and_report();

                Self::announce("route audio over SCO");
                self.coordinator.choose_route_with_sco(AudioDevice::Bluetooth);
                self.settle_and_report();

                Self::announce("back to the speaker");
                self.coordinator.choose_route(AudioDevice::SpeakerPhone);
                self.coordinator.stop_bluetooth_sco();
                self.settle_and_report();
            }
            ScenarioName::BluetoothDropout => {
                Self::announce("connect a bluetooth headset");
                self.host.connect_bluetooth_headset("Car kit");
                self.coordinator.choose_route_with_sco(AudioDevice::Bluetooth);
                self.settle_and_report();

                Self::announce("headset drops out");
                self.host.disconnect_bluetooth_headset();
                self.settle_and_report();
            }
            ScenarioName::FocusLoss => {
                for (label, code) in [("transient loss", -2), ("permanent loss", -1), ("regain", 1)] {
                    Self::announce(label);
                    self.host.push_focus_change(code);
                    self.settle();
                    println!("   focus: {}", self.coordinator.focus_state());
                }
            }
        }

        Ok(())
    }

    async fn run_monitor(&mut self, simulate: bool) -> Result<(), RouteError> {
        if !self.coordinator.is_started() {
            let result = self.coordinator.start()?;
            StatusDisplay::display_start_result(&result);
        }

        println!("Monitoring route events. Press Ctrl-C to stop.");
        self.shutdown_flag.store(false, Ordering::Relaxed);

        let simulator = if simulate {
            Some(HeadsetSimulator::spawn(self.host.clone())?)
        } else {
            None
        };

        let mut interval = tokio::time::interval(Duration::from_millis(100));
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => StatusDisplay::display_event(&event),
                    None => break,
                },
                _ = interval.tick() => {
                    if self.shutdown_flag.load(Ordering::Relaxed) {
                        break;
                    }
                }
            }
        }

        if let Some(simulator) = simulator {
            simulator.stop();
        }
        self.settle();
        self.shutdown_flag.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn handle_config_action(&mut self, action: ConfigAction) -> Result<(), RouteError> {
        match action {
            ConfigAction::Show => {
                StatusDisplay::display_config(
                    self.config_manager.get_config(),
                    self.config_manager.config_path(),
                );
            }
            ConfigAction::Reset => {
                self.config_manager.reset_to_defaults()?;
                println!("Configuration reset to defaults");
            }
            ConfigAction::Set { key, value } => {
                let setting = match CliApp::parse_setting(&key, &value) {
                    Ok(setting) => setting,
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        return Ok(());
                    }
                };

                match setting {
                    ConfigSetting::ScoPollInterval(ms) => self.config_manager.set_sco_poll_interval(ms)?,
                    ConfigSetting::UnmuteMicrophoneOnStart(enabled) => {
                        self.config_manager.set_unmute_microphone_on_start(enabled)?
                    }
                    ConfigSetting::AcceptsDelayedFocusGain(enabled) => {
                        self.config_manager.set_accepts_delayed_focus_gain(enabled)?
                    }
                    ConfigSetting::EventHistorySize(size) => self.config_manager.set_event_history_size(size)?,
                    ConfigSetting::BuilderFocusMinApiLevel(level) => self
                        .config_manager
                        .update_config(|config| config.builder_focus_min_api_level = level)?,
                    ConfigSetting::WiredQueryMinApiLevel(level) => self
                        .config_manager
                        .update_config(|config| config.wired_query_min_api_level = level)?,
                }
                println!("Saved {} = {} (applies from the next launch)", key, value);
            }
        }

        Ok(())
    }

    /// Run interactive mode
    pub async fn run_interactive_mode(&mut self) {
        println!("Audio Route Coordinator v0.1.0");
        println!("Type 'help' for available commands, 'exit' or 'quit' to quit.");
        println!();

        let mut interval = tokio::time::interval(Duration::from_millis(100));
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(line.trim().to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        let mut awaiting_input = false;

        loop {
            if self.shutdown_flag.load(Ordering::Relaxed) {
                break;
            }

            if !awaiting_input {
                print!("> ");
                let _ = std::io::Write::flush(&mut std::io::stdout());
                awaiting_input = true;
            }

            tokio::select! {
                biased;

                line = rx.recv() => {
                    awaiting_input = false;
                    match line {
                        Some(line) => {
                            if line.is_empty() {
                                continue;
                            }
                            if line == "exit" || line == "quit" {
                                println!("Goodbye!");
                                break;
                            }
                            match CliApp::parse_command(&line) {
                                Ok(command) => {
                                    if let Err(e) = self.execute_command(command).await {
                                        self.handle_error(&e);
                                    }
                                }
                                Err(ParseError::HelpRequested) => CliApp::display_help(),
                                Err(e) => {
                                    eprintln!("Error: {}", e);
                                    println!("Type 'help' for available commands.");
                                }
                            }
                        }
                        None => {
                            // EOF
                            println!();
                            break;
                        }
                    }
                }

                _ = interval.tick() => {
                    if self.print_pending_events() > 0 {
                        awaiting_input = false;
                    }
                }
            }
        }

        self.shutdown();
    }

    pub fn shutdown(&mut self) {
        println!("Shutting down...");
        self.coordinator.stop();
        self.settle();
        println!("Shutdown complete.");
    }

    fn handle_error(&self, error: &RouteError) {
        match error.severity() {
            ErrorSeverity::Info => info!("{}", error),
            ErrorSeverity::Warning => warn!("{}", error),
            ErrorSeverity::Error | ErrorSeverity::Critical => error!("{}", error),
        }
        StatusDisplay::display_error(error);
    }

    /// Wait for queued main-thread work and notifications, then print what was emitted.
    /// Main-thread tasks and notifications feed each other, so alternate a few rounds.
    fn settle(&mut self) {
        for _ in 0..3 {
            self.wait_for_main_thread();
            if !self.coordinator.flush(SETTLE_TIMEOUT) {
                warn!("Notification worker did not answer within {:?}", SETTLE_TIMEOUT);
            }
        }
        self.print_pending_events();
    }

    fn settle_and_report(&mut self) {
        self.settle();
        println!("   selected device: {}", self.coordinator.current_selected_device());
    }

    fn wait_for_main_thread(&self) {
        let (done, done_rx) = std_mpsc::channel();
        let posted = self.main_thread.post(Box::new(move || {
            let _ = done.send(());
        }));
        if posted.is_err() || done_rx.recv_timeout(SETTLE_TIMEOUT).is_err() {
            warn!("Main looper did not drain within {:?}", SETTLE_TIMEOUT);
        }
    }

    fn print_pending_events(&mut self) -> usize {
        let mut printed = 0;
        while let Ok(event) = self.events.try_recv() {
            StatusDisplay::display_event(&event);
            printed += 1;
        }
        printed
    }

    fn announce(step: &str) {
        println!("── {}", step);
    }
}

/// Connects and disconnects a bluetooth headset on a timer, for `monitor --simulate`
struct HeadsetSimulator {
    stop: std_mpsc::Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl HeadsetSimulator {
    fn spawn(host: Arc<SimulatedHost>) -> Result<Self, RouteError> {
        let (stop, stop_rx) = std_mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("headset-simulator".to_string())
            .spawn(move || {
                let mut connected = false;
                loop {
                    match stop_rx.recv_timeout(SIMULATED_HEADSET_PERIOD) {
                        Err(RecvTimeoutError::Timeout) => {
                            if connected {
                                host.disconnect_bluetooth_headset();
                            } else {
                                host.connect_bluetooth_headset("Simulated headset");
                            }
                            connected = !connected;
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                if connected {
                    host.disconnect_bluetooth_headset();
                }
            })
            .map_err(RouteError::WorkerSpawn)?;

        Ok(Self { stop, handle })
    }

    fn stop(self) {
        drop(self.stop);
        let _ = self.handle.join();
    }
}

#[tokio::main]
async fn main() {
    let cli = CliApp::parse();

    let mut app = match RouteController::new(&cli) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to initialize application: {}", e);
            StatusDisplay::display_simple_error(&e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(command) => {
            // Single command mode
            if let Err(e) = app.execute_command(command).await {
                app.handle_error(&e);
                std::process::exit(1);
            }
        }
        None => app.run_interactive_mode().await,
    }

    info!("Application shutdown complete");
}

use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::CoordinatorConfig;
use crate::error::{Permission, RouteError};
use crate::events::{spawn_notification_worker, EventEmitter, NotificationHandler, RouteEvent};
use crate::focus::{focus_requester_for, FocusMechanism, FocusRequester};
use crate::logging::{RouteLogKind, RouteLogger};
use crate::models::{
    AudioDevice, AudioMode, DeviceCategory, DeviceDescriptor, DevicePresence, FocusChange,
    FocusState, HeadsetPlugState, PlatformDevice, PlatformRoute, RouteDescriptor, StartResult,
};
use crate::platform::{
    BroadcastAction, DeviceFilter, NotificationSink, Platform, PlatformEvent, RouteCategory,
};

/// Which output is currently carrying audio, in priority order:
/// bluetooth with SCO up, then anything wired, then the speaker, then the earpiece.
pub fn select_current_device(presence: DevicePresence) -> AudioDevice {
    if presence.bluetooth_present && presence.sco_active {
        AudioDevice::Bluetooth
    } else if presence.wired_present {
        AudioDevice::WiredHeadset
    } else if presence.speakerphone_on {
        AudioDevice::SpeakerPhone
    } else {
        AudioDevice::Earpiece
    }
}

/// SCO bookkeeping owned by the coordinator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BluetoothScoState {
    /// SCO was last switched on through this coordinator
    pub requested: bool,
    /// The headset profile service is connected
    pub service_connected: bool,
}

struct SessionState {
    started: bool,
    focus_state: FocusState,
    last_focus_change: Option<FocusChange>,
    sco: BluetoothScoState,
    sco_poller: Option<ScoPoller>,
}

/// Periodic SCO status logger, stopped by dropping its sender
struct ScoPoller {
    stop: std_mpsc::Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl ScoPoller {
    fn spawn(interval: Duration, core: Arc<CoordinatorCore>) -> Result<Self, RouteError> {
        let (stop, stop_rx) = std_mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("sco-status-poll".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => core.check_bluetooth_devices(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(RouteError::WorkerSpawn)?;

        Ok(Self { stop, handle })
    }

    fn cancel(self) {
        drop(self.stop);
        if self.handle.thread().id() != thread::current().id() {
            let _ = self.handle.join();
        }
    }
}

struct CoordinatorCore {
    platform: Platform,
    config: CoordinatorConfig,
    focus: Box<dyn FocusRequester>,
    emitter: Arc<dyn EventEmitter>,
    logger: RouteLogger,
    sink: NotificationSink,
    state: Mutex<SessionState>,
    /// Held for the whole of `start` and `stop`
    lifecycle: Mutex<()>,
}

impl CoordinatorCore {
    fn session(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lifecycle(&self) -> MutexGuard<'_, ()> {
        self.lifecycle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_started(&self) -> bool {
        self.session().started
    }

    fn post_to_main<F>(&self, context: &str, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(err) = self.platform.main_thread.post(Box::new(task)) {
            self.logger.log_platform_error(context, &err.to_string());
        }
    }

    fn emit(&self, event: RouteEvent) {
        let name = event.name();
        debug!("Emitting {}", name);
        if let Err(err) = self.emitter.emit(event) {
            self.logger.log_platform_error(&format!("emit {}", name), &err.to_string());
        }
    }

    fn request_focus(&self) -> FocusState {
        let state = self.focus.request(self.platform.audio.as_ref(), &self.sink);
        self.session().focus_state = state;
        self.logger.log_event(
            RouteLogKind::FocusRequested,
            format!("{} ({} request)", state, self.focus.mechanism().as_str()),
        );
        state
    }

    fn abandon_focus(&self) -> FocusState {
        let state = self.focus.abandon(self.platform.audio.as_ref());
        self.session().focus_state = state;
        self.logger.log_event(
            RouteLogKind::FocusAbandoned,
            format!("{} ({} request)", state, self.focus.mechanism().as_str()),
        );
        state
    }

    fn devices(&self) -> Vec<DeviceDescriptor> {
        self.platform
            .audio
            .devices(DeviceFilter::Outputs)
            .iter()
            .filter(|device| device.category.is_reported())
            .map(DeviceDescriptor::from)
            .collect()
    }

    fn has_bluetooth_device(&self) -> bool {
        self.platform
            .audio
            .devices(DeviceFilter::All)
            .iter()
            .any(|device| device.category == DeviceCategory::BluetoothSco)
    }

    fn has_wired_headset(&self) -> bool {
        let audio = &self.platform.audio;
        if audio.api_level() < self.config.wired_query_min_api_level {
            return audio.is_wired_headset_on();
        }

        match audio
            .devices(DeviceFilter::All)
            .into_iter()
            .find(|device| device.category.is_wired())
        {
            Some(device) => {
                debug!("Wired output present: {} ({:?})", device.product_name, device.category);
                true
            }
            None => false,
        }
    }

    fn current_selected_device(&self) -> AudioDevice {
        let audio = &self.platform.audio;
        let presence = DevicePresence {
            bluetooth_present: self.has_bluetooth_device(),
            sco_active: audio.is_bluetooth_sco_on(),
            wired_present: self.has_wired_headset(),
            speakerphone_on: audio.is_speakerphone_on(),
        };
        let selected = select_current_device(presence);
        debug!("Selected device {} from {:?}", selected, presence);
        selected
    }

    /// Main thread only
    fn select_route_for(&self, route: AudioDevice) {
        let routes = self.platform.router.routes();
        let (target, speakerphone) = match route {
            AudioDevice::Bluetooth => (routes.iter().find(|r| r.is_bluetooth), false),
            AudioDevice::SpeakerPhone => (routes.iter().find(|r| r.is_device_speaker), true),
            other => {
                debug!("No route-discovery selection for {}", other);
                return;
            }
        };

        match target {
            Some(target) => {
                info!("Selecting route '{}' for {}", target.name, route);
                self.platform.audio.set_speakerphone_on(speakerphone);
                self.platform.router.select_route(target);
            }
            None => debug!("No route matches {}; leaving selection unchanged", route),
        }
    }

    /// Main thread only
    fn set_bluetooth_sco(&self, enabled: bool) {
        let audio = &self.platform.audio;
        if enabled {
            audio.start_bluetooth_sco();
            audio.set_bluetooth_sco_on(true);
        } else {
            audio.set_bluetooth_sco_on(false);
            audio.stop_bluetooth_sco();
        }
        self.session().sco.requested = enabled;
        self.logger.log_event(
            RouteLogKind::ScoStatus,
            format!("SCO {}", if enabled { "started" } else { "stopped" }),
        );
    }

    fn check_bluetooth_devices(&self) {
        let sco_on = self.platform.audio.is_bluetooth_sco_on();

        if self.session().sco.service_connected {
            match self.platform.bluetooth.connected_devices().first() {
                Some(headset) => self.logger.log_event(
                    RouteLogKind::ScoStatus,
                    format!(
                        "Connected bluetooth headset: name={}, state={}, SCO audio={}",
                        headset.name,
                        headset.connection_state.as_str(),
                        headset.audio_connected
                    ),
                ),
                None => debug!("Headset service connected but no headset is"),
            }
        }

        self.logger
            .log_event(RouteLogKind::ScoStatus, format!("isBluetoothScoOn: {}", sco_on));
    }

    fn on_devices_changed(&self, verb: &str, changed: &[PlatformDevice]) {
        if !self.is_started() {
            debug!("Ignoring device change while stopped");
            return;
        }

        let devices = self.devices();
        self.logger.log_event(
            RouteLogKind::DevicesChanged,
            format!("{} {} device(s); {} reported output(s)", verb, changed.len(), devices.len()),
        );
        self.emit(RouteEvent::AudioDeviceChanged(devices));
    }

    fn on_route_added(self: Arc<Self>, route: PlatformRoute) {
        if !self.is_started() {
            return;
        }
        self.logger.log_event(RouteLogKind::RouteAdded, route.describe());

        if route.is_bluetooth_type() {
            let core = Arc::clone(&self);
            let target = route.clone();
            self.post_to_main("select added bluetooth route", move || {
                core.platform.audio.set_mode(AudioMode::Normal);
                core.request_focus();
                core.platform.router.select_route(&target);
            });
        }

        self.emit(RouteEvent::RouteAdded(RouteDescriptor::from(&route)));
    }

    fn on_route_removed(self: Arc<Self>, route: PlatformRoute) {
        if !self.is_started() {
            return;
        }
        self.logger.log_event(RouteLogKind::RouteRemoved, route.describe());

        if route.is_bluetooth_type() && !self.has_wired_headset() {
            let core = Arc::clone(&self);
            self.post_to_main("fall back to speakerphone", move || {
                core.platform.audio.set_mode(AudioMode::Normal);
                core.request_focus();
                core.platform.audio.set_speakerphone_on(true);
            });
        }

        self.emit(RouteEvent::RouteRemoved(RouteDescriptor::from(&route)));
    }

    fn on_route_selection(&self, route: PlatformRoute, selected: bool) {
        if !self.is_started() {
            return;
        }
        let descriptor = RouteDescriptor::from(&route);
        if selected {
            self.logger.log_event(RouteLogKind::RouteSelected, route.describe());
            self.emit(RouteEvent::RouteSelected(descriptor));
        } else {
            self.logger.log_event(RouteLogKind::RouteUnselected, route.describe());
            self.emit(RouteEvent::RouteUnselected(descriptor));
        }
    }

    fn on_focus_changed(&self, code: i32) {
        let change = FocusChange::from_code(code);
        {
            let mut session = self.session();
            session.last_focus_change = Some(change);
            if let Some(state) = change.resulting_state() {
                session.focus_state = state;
            }
        }
        self.logger
            .log_event(RouteLogKind::FocusChanged, format!("{} - {}", code, change.as_str()));
    }
}

impl NotificationHandler for CoordinatorCore {
    fn handle(self: Arc<Self>, event: PlatformEvent) {
        match event {
            PlatformEvent::DevicesAdded(devices) => self.on_devices_changed("added", &devices),
            PlatformEvent::DevicesRemoved(devices) => self.on_devices_changed("removed", &devices),
            PlatformEvent::RouteAdded(route) => self.on_route_added(route),
            PlatformEvent::RouteRemoved(route) => self.on_route_removed(route),
            PlatformEvent::RouteSelected(route) => self.on_route_selection(route, true),
            PlatformEvent::RouteUnselected(route) => self.on_route_selection(route, false),
            PlatformEvent::FocusChanged(code) => self.on_focus_changed(code),
            PlatformEvent::HeadsetPlug { state, name } => {
                let name = name.unwrap_or_else(|| "unknown".to_string());
                let details = match HeadsetPlugState::from_code(state) {
                    HeadsetPlugState::Plugged => format!("Wired headset plugged: {}", name),
                    HeadsetPlugState::Unplugged => format!("Wired headset unplugged: {}", name),
                    HeadsetPlugState::Unknown(code) => format!("Wired headset state {}", code),
                };
                self.logger.log_event(RouteLogKind::HeadsetPlug, details);
            }
            PlatformEvent::BluetoothConnectionChanged(state) => {
                self.logger.log_event(
                    RouteLogKind::BluetoothConnection,
                    format!("Bluetooth headset {}", state.as_str()),
                );
            }
            PlatformEvent::BluetoothServiceConnected => {
                let newly_connected = {
                    let mut session = self.session();
                    let newly = !session.sco.service_connected;
                    session.sco.service_connected = true;
                    newly
                };
                if newly_connected {
                    self.logger
                        .log_event(RouteLogKind::BluetoothService, "Headset service connected".to_string());
                }
            }
            PlatformEvent::BluetoothServiceDisconnected => {
                let was_connected = {
                    let mut session = self.session();
                    let was = session.sco.service_connected;
                    session.sco = BluetoothScoState::default();
                    was
                };
                if was_connected {
                    self.logger.log_event(
                        RouteLogKind::BluetoothService,
                        "Headset service disconnected".to_string(),
                    );
                }
            }
        }
    }
}

/// Owns the audio-focus grant and mediates route selection against the host.
///
/// Platform notifications are handled on one background worker, which is
/// also the only place outbound events are emitted from. Route, mode,
/// speaker and SCO mutations that the host requires on its main thread are
/// posted there and may not be visible when the call returns.
pub struct AudioRouteCoordinator {
    core: Arc<CoordinatorCore>,
    worker: Option<thread::JoinHandle<()>>,
}

impl AudioRouteCoordinator {
    pub fn new(
        platform: Platform,
        config: CoordinatorConfig,
        emitter: Arc<dyn EventEmitter>,
    ) -> Result<Self, RouteError> {
        let focus = focus_requester_for(
            platform.audio.api_level(),
            config.builder_focus_min_api_level,
            config.focus.clone(),
        );
        let (sink, receiver) = NotificationSink::channel();
        let logger = RouteLogger::with_capacity(config.event_history_size);

        let core = Arc::new(CoordinatorCore {
            platform,
            config,
            focus,
            emitter,
            logger,
            sink,
            state: Mutex::new(SessionState {
                started: false,
                focus_state: FocusState::Unknown,
                last_focus_change: None,
                sco: BluetoothScoState::default(),
                sco_poller: None,
            }),
            lifecycle: Mutex::new(()),
        });

        let worker = spawn_notification_worker(receiver, core.clone())?;
        core.platform.bluetooth.connect_proxy(core.sink.clone());

        info!(
            "Audio route coordinator created (API level {}, {} focus requests)",
            core.platform.audio.api_level(),
            core.focus.mechanism().as_str()
        );

        Ok(Self {
            core,
            worker: Some(worker),
        })
    }

    /// Subscribe to every notification stream, request focus and unmute the
    /// microphone. Repeated calls keep the existing subscriptions.
    pub fn start(&self) -> Result<StartResult, RouteError> {
        let _lifecycle = self.core.lifecycle();
        let audio = &self.core.platform.audio;

        if let Some(permission) = Permission::REQUIRED
            .into_iter()
            .find(|permission| !audio.has_permission(*permission))
        {
            warn!("Cannot start audio routing without {}", permission);
            return Err(RouteError::PermissionDenied { permission });
        }

        let first_start = {
            let mut session = self.core.session();
            let first = !session.started;
            session.started = true;
            first
        };

        if first_start {
            audio.register_receiver(&BroadcastAction::SUBSCRIBED, self.core.sink.clone());
            self.core.request_focus();
            audio.register_device_callback(self.core.sink.clone());

            let router = Arc::clone(&self.core.platform.router);
            let sink = self.core.sink.clone();
            self.core.post_to_main("register route callback", move || {
                router.add_callback(RouteCategory::LiveAudio, sink);
            });

            self.start_sco_poller();
            info!("Audio route coordinator started");
        } else {
            debug!("Already started; keeping existing subscriptions");
            self.core.request_focus();
        }

        if self.core.config.unmute_microphone_on_start {
            audio.set_microphone_mute(false);
        }

        Ok(StartResult {
            selected_device: self.core.current_selected_device(),
            devices: self.core.devices(),
        })
    }

    fn start_sco_poller(&self) {
        if let Some(interval) = self.core.config.sco_poll_interval() {
            match ScoPoller::spawn(interval, Arc::clone(&self.core)) {
                Ok(poller) => self.core.session().sco_poller = Some(poller),
                Err(err) => self
                    .core
                    .logger
                    .log_platform_error("start SCO status poll", &err.to_string()),
            }
        }
    }

    /// Undo everything `start` did. Does nothing when not started.
    pub fn stop(&self) {
        let _lifecycle = self.core.lifecycle();
        let poller = {
            let mut session = self.core.session();
            if !session.started {
                debug!("Stop requested while not started");
                return;
            }
            session.started = false;
            session.sco_poller.take()
        };

        if let Some(poller) = poller {
            poller.cancel();
        }

        self.core.abandon_focus();

        let audio = &self.core.platform.audio;
        audio.unregister_device_callback();
        audio.unregister_receiver();

        let router = Arc::clone(&self.core.platform.router);
        self.core.post_to_main("remove route callback", move || {
            router.remove_callback();
        });

        info!("Audio route coordinator stopped");
    }

    /// Switch to `route` through the route-discovery subsystem. Returns the
    /// selection as it stands now, before the main thread has acted.
    pub fn choose_route(&self, route: AudioDevice) -> AudioDevice {
        info!("Route chosen: {}", route);

        let core = Arc::clone(&self.core);
        self.core.post_to_main("choose route", move || {
            core.platform.audio.set_mode(AudioMode::Normal);
            core.request_focus();
            core.select_route_for(route);
        });

        self.core.current_selected_device()
    }

    /// `choose_route` for a wire name such as `"BLUETOOTH"`
    pub fn choose_route_named(&self, name: &str) -> Result<AudioDevice, RouteError> {
        let route = name.parse::<AudioDevice>()?;
        Ok(self.choose_route(route))
    }

    /// Switch by toggling speakerphone and SCO directly
    pub fn choose_route_with_sco(&self, route: AudioDevice) {
        info!("Route chosen via SCO: {}", route);

        let core = Arc::clone(&self.core);
        self.core.post_to_main("choose route with SCO", move || {
            core.platform
                .audio
                .set_speakerphone_on(route == AudioDevice::SpeakerPhone);
            core.set_bluetooth_sco(route == AudioDevice::Bluetooth);
        });
    }

    pub fn start_bluetooth_sco(&self) {
        let core = Arc::clone(&self.core);
        self.core
            .post_to_main("start bluetooth SCO", move || core.set_bluetooth_sco(true));
    }

    pub fn stop_bluetooth_sco(&self) {
        let core = Arc::clone(&self.core);
        self.core
            .post_to_main("stop bluetooth SCO", move || core.set_bluetooth_sco(false));
    }

    pub fn get_devices(&self) -> Vec<DeviceDescriptor> {
        self.core.devices()
    }

    pub fn get_routes(&self) -> Vec<RouteDescriptor> {
        self.core
            .platform
            .router
            .routes()
            .iter()
            .map(RouteDescriptor::from)
            .collect()
    }

    pub fn request_audio_focus(&self) -> FocusState {
        self.core.request_focus()
    }

    pub fn abandon_audio_focus(&self) -> FocusState {
        self.core.abandon_focus()
    }

    pub fn is_wired_headset_plugged_in(&self) -> bool {
        self.core.has_wired_headset()
    }

    pub fn current_selected_device(&self) -> AudioDevice {
        self.core.current_selected_device()
    }

    pub fn is_started(&self) -> bool {
        self.core.is_started()
    }

    /// Outcome of the last focus call, updated by gain and permanent-loss notifications
    pub fn focus_state(&self) -> FocusState {
        self.core.session().focus_state
    }

    pub fn last_focus_change(&self) -> Option<FocusChange> {
        self.core.session().last_focus_change
    }

    pub fn bluetooth_sco_state(&self) -> BluetoothScoState {
        self.core.session().sco
    }

    pub fn focus_mechanism(&self) -> FocusMechanism {
        self.core.focus.mechanism()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.core.config
    }

    pub fn logger(&self) -> &RouteLogger {
        &self.core.logger
    }

    /// Block until every notification delivered so far has been handled.
    /// Returns false if the worker did not answer within `timeout`.
    pub fn flush(&self, timeout: Duration) -> bool {
        let (ack_tx, ack_rx) = std_mpsc::channel();
        if self.core.sink.flush(ack_tx).is_err() {
            return false;
        }
        ack_rx.recv_timeout(timeout).is_ok()
    }
}

impl Drop for AudioRouteCoordinator {
    fn drop(&mut self) {
        self.stop();

        if let Err(err) = self.core.sink.shutdown() {
            debug!("Notification worker already gone: {}", err);
        }
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FocusGain, StreamType};
    use crate::events::NullEmitter;
    use crate::focus::FocusRequest;
    use crate::platform::{AudioSystem, ManualMainThread, SimulatedHost};

    fn coordinator_on(host: Arc<SimulatedHost>, config: CoordinatorConfig) -> AudioRouteCoordinator {
        let main_thread = Arc::new(ManualMainThread::new());
        AudioRouteCoordinator::new(
            Platform::simulated(host, main_thread),
            config,
            Arc::new(NullEmitter),
        )
        .unwrap()
    }

    #[test]
    fn test_select_current_device_priority() {
        let mut presence = DevicePresence::default();
        assert_eq!(select_current_device(presence), AudioDevice::Earpiece);

        presence.speakerphone_on = true;
        assert_eq!(select_current_device(presence), AudioDevice::SpeakerPhone);

        presence.wired_present = true;
        assert_eq!(select_current_device(presence), AudioDevice::WiredHeadset);

        presence.bluetooth_present = true;
        assert_eq!(select_current_device(presence), AudioDevice::WiredHeadset);

        presence.sco_active = true;
        assert_eq!(select_current_device(presence), AudioDevice::Bluetooth);
    }

    #[test]
    fn test_sco_without_bluetooth_device_is_ignored() {
        let presence = DevicePresence {
            bluetooth_present: false,
            sco_active: true,
            wired_present: false,
            speakerphone_on: false,
        };
        assert_eq!(select_current_device(presence), AudioDevice::Earpiece);
    }

    #[test]
    fn test_focus_mechanism_follows_api_level() {
        let modern = coordinator_on(Arc::new(SimulatedHost::new()), CoordinatorConfig::default());
        assert_eq!(modern.focus_mechanism(), FocusMechanism::Builder);

        let legacy = coordinator_on(
            Arc::new(SimulatedHost::with_api_level(24)),
            CoordinatorConfig::default(),
        );
        assert_eq!(legacy.focus_mechanism(), FocusMechanism::Legacy);
    }

    #[test]
    fn test_bluetooth_proxy_requested_at_construction() {
        let host = Arc::new(SimulatedHost::new());
        let _coordinator = coordinator_on(host.clone(), CoordinatorConfig::default());

        assert_eq!(host.proxy_requests(), 1);
        assert_eq!(host.device_callback_count(), 0);
    }

    #[test]
    fn test_get_devices_filters_categories() {
        let host = Arc::new(SimulatedHost::new());
        host.attach_device(DeviceCategory::BluetoothA2dp, "Car A2DP");
        host.attach_device(DeviceCategory::Hdmi, "TV");
        host.attach_device(DeviceCategory::UsbHeadset, "USB-C buds");
        let coordinator = coordinator_on(host, CoordinatorConfig::default());

        let devices = coordinator.get_devices();
        let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Built-in earpiece", "Built-in speaker", "USB-C buds"]);
        assert_eq!(devices[2].device_type, AudioDevice::None);
    }

    #[test]
    fn test_usb_headset_does_not_count_as_wired() {
        let host = Arc::new(SimulatedHost::new());
        host.attach_device(DeviceCategory::UsbHeadset, "USB-C buds");
        let coordinator = coordinator_on(host, CoordinatorConfig::default());

        assert!(!coordinator.is_wired_headset_plugged_in());
        assert_eq!(coordinator.current_selected_device(), AudioDevice::Earpiece);
    }

    #[test]
    fn test_wired_detection_uses_legacy_flag_on_old_hosts() {
        let host = Arc::new(SimulatedHost::with_api_level(22));
        let coordinator = coordinator_on(host.clone(), CoordinatorConfig::default());

        host.attach_device(DeviceCategory::WiredHeadphones, "Jack");
        assert!(!coordinator.is_wired_headset_plugged_in());

        host.set_wired_headset_flag(true);
        assert!(coordinator.is_wired_headset_plugged_in());
    }

    #[test]
    fn test_wired_detection_enumerates_on_newer_hosts() {
        let host = Arc::new(SimulatedHost::new());
        let coordinator = coordinator_on(host.clone(), CoordinatorConfig::default());

        host.set_wired_headset_flag(true);
        assert!(!coordinator.is_wired_headset_plugged_in());

        host.attach_device(DeviceCategory::UsbDevice, "USB DAC");
        assert!(coordinator.is_wired_headset_plugged_in());
    }

    #[test]
    fn test_focus_calls_update_state() {
        let host = Arc::new(SimulatedHost::new());
        let coordinator = coordinator_on(host.clone(), CoordinatorConfig::default());
        assert_eq!(coordinator.focus_state(), FocusState::Unknown);

        host.set_focus_results(2, 1);
        assert_eq!(coordinator.request_audio_focus(), FocusState::Delayed);
        assert_eq!(coordinator.focus_state(), FocusState::Delayed);

        assert_eq!(coordinator.abandon_audio_focus(), FocusState::Granted);
        assert_eq!(coordinator.logger().statistics().focus_events, 2);
    }

    #[test]
    fn test_choose_route_named_rejects_unknown_names() {
        let coordinator = coordinator_on(Arc::new(SimulatedHost::new()), CoordinatorConfig::default());

        match coordinator.choose_route_named("HDMI") {
            Err(RouteError::UnknownRoute { name }) => assert_eq!(name, "HDMI"),
            other => panic!("Expected UnknownRoute, got {:?}", other),
        }
    }

    /// Simulated audio system whose receiver registration takes a while
    struct SlowRegistration {
        host: Arc<SimulatedHost>,
        delay: Duration,
    }

    impl AudioSystem for SlowRegistration {
        fn api_level(&self) -> u32 {
            self.host.api_level()
        }
        fn has_permission(&self, permission: Permission) -> bool {
            self.host.has_permission(permission)
        }
        fn devices(&self, filter: DeviceFilter) -> Vec<PlatformDevice> {
            self.host.devices(filter)
        }
        fn is_wired_headset_on(&self) -> bool {
            self.host.is_wired_headset_on()
        }
        fn is_speakerphone_on(&self) -> bool {
            self.host.is_speakerphone_on()
        }
        fn set_speakerphone_on(&self, on: bool) {
            self.host.set_speakerphone_on(on)
        }
        fn set_mode(&self, mode: AudioMode) {
            self.host.set_mode(mode)
        }
        fn set_microphone_mute(&self, muted: bool) {
            self.host.set_microphone_mute(muted)
        }
        fn is_bluetooth_sco_on(&self) -> bool {
            self.host.is_bluetooth_sco_on()
        }
        fn set_bluetooth_sco_on(&self, on: bool) {
            self.host.set_bluetooth_sco_on(on)
        }
        fn start_bluetooth_sco(&self) {
            self.host.start_bluetooth_sco()
        }
        fn stop_bluetooth_sco(&self) {
            self.host.stop_bluetooth_sco()
        }
        fn request_focus(&self, request: &FocusRequest, listener: NotificationSink) -> i32 {
            self.host.request_focus(request, listener)
        }
        fn abandon_focus_request(&self, request: &FocusRequest) -> i32 {
            self.host.abandon_focus_request(request)
        }
        fn request_focus_legacy(
            &self,
            stream: StreamType,
            duration_hint: FocusGain,
            listener: NotificationSink,
        ) -> i32 {
            self.host.request_focus_legacy(stream, duration_hint, listener)
        }
        fn abandon_focus_legacy(&self) -> i32 {
            self.host.abandon_focus_legacy()
        }
        fn register_device_callback(&self, sink: NotificationSink) {
            self.host.register_device_callback(sink)
        }
        fn unregister_device_callback(&self) {
            self.host.unregister_device_callback()
        }
        fn register_receiver(&self, actions: &[BroadcastAction], sink: NotificationSink) {
            thread::sleep(self.delay);
            self.host.register_receiver(actions, sink)
        }
        fn unregister_receiver(&self) {
            self.host.unregister_receiver()
        }
    }

    #[test]
    fn test_stop_during_start_leaves_nothing_registered() {
        let host = Arc::new(SimulatedHost::new());
        let main_thread = Arc::new(ManualMainThread::new());
        let platform = Platform {
            audio: Arc::new(SlowRegistration {
                host: host.clone(),
                delay: Duration::from_millis(200),
            }),
            router: host.clone(),
            bluetooth: host.clone(),
            main_thread: main_thread.clone(),
        };
        let coordinator =
            AudioRouteCoordinator::new(platform, CoordinatorConfig::default(), Arc::new(NullEmitter))
                .unwrap();

        thread::scope(|scope| {
            let starter = scope.spawn(|| coordinator.start().unwrap());
            thread::sleep(Duration::from_millis(50));
            coordinator.stop();
            starter.join().unwrap();
        });
        main_thread.run_pending();

        assert!(!coordinator.is_started());
        assert_eq!(host.receiver_count(), 0);
        assert_eq!(host.device_callback_count(), 0);
        assert_eq!(host.route_callback_count(), 0);
        assert_eq!(host.focus_abandons(), 1);

        coordinator.start().unwrap();
        main_thread.run_pending();
        assert_eq!(host.receiver_count(), 1);
        assert_eq!(host.device_callback_count(), 1);
        assert_eq!(host.route_callback_count(), 1);
    }

    #[test]
    fn test_microphone_unmute_is_configurable() {
        let host = Arc::new(SimulatedHost::new());
        let config = CoordinatorConfig {
            unmute_microphone_on_start: false,
            ..CoordinatorConfig::default()
        };
        let coordinator = coordinator_on(host.clone(), config);

        coordinator.start().unwrap();
        assert!(host.microphone_muted());
    }
}

use std::sync::{Mutex, MutexGuard};

use log::{debug, trace};

use super::{
    AudioSystem, BluetoothHeadsetProfile, BroadcastAction, DeviceFilter, MediaRouter,
    NotificationSink, PlatformEvent, RouteCategory,
};
use crate::config::{FocusGain, StreamType};
use crate::error::Permission;
use crate::focus::FocusRequest;
use crate::models::{
    route_type, AudioMode, BluetoothConnectionState, BluetoothHeadsetDevice, DeviceCategory,
    PlatformDevice, PlatformRoute,
};

/// Focus call recorded by the simulated host
#[derive(Debug, Clone, PartialEq)]
pub enum FocusCall {
    Builder(FocusRequest),
    Legacy {
        stream: StreamType,
        duration_hint: FocusGain,
    },
}

struct HostState {
    api_level: u32,
    denied: Vec<Permission>,
    outputs: Vec<PlatformDevice>,
    inputs: Vec<PlatformDevice>,
    next_device_id: i32,
    wired_headset_flag: bool,
    speakerphone_on: bool,
    mode_history: Vec<AudioMode>,
    microphone_muted: bool,
    sco_on: bool,
    sco_started: bool,
    focus_request_result: i32,
    focus_abandon_result: i32,
    focus_listener: Option<NotificationSink>,
    focus_calls: Vec<FocusCall>,
    focus_abandons: usize,
    device_callbacks: Vec<NotificationSink>,
    receivers: Vec<(Vec<BroadcastAction>, NotificationSink)>,
    routes: Vec<PlatformRoute>,
    route_callbacks: Vec<NotificationSink>,
    route_selections: Vec<String>,
    bluetooth_proxy: Option<NotificationSink>,
    proxy_requests: usize,
    headsets: Vec<BluetoothHeadsetDevice>,
}

/// In-memory host used by the CLI and the tests.
///
/// Starts with a built-in earpiece and speaker and a selected phone speaker
/// route. Scripting methods change the host and deliver the matching
/// notifications to whoever is registered at that moment.
pub struct SimulatedHost {
    state: Mutex<HostState>,
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self::with_api_level(33)
    }

    pub fn with_api_level(api_level: u32) -> Self {
        let outputs = vec![
            PlatformDevice::new(1, "Built-in earpiece", DeviceCategory::BuiltinEarpiece),
            PlatformDevice::new(2, "Built-in speaker", DeviceCategory::BuiltinSpeaker),
        ];
        let inputs = vec![PlatformDevice::new(
            3,
            "Built-in microphone",
            DeviceCategory::Other(15),
        )];

        Self {
            state: Mutex::new(HostState {
                api_level,
                denied: Vec::new(),
                outputs,
                inputs,
                next_device_id: 10,
                wired_headset_flag: false,
                speakerphone_on: false,
                mode_history: Vec::new(),
                microphone_muted: true,
                sco_on: false,
                sco_started: false,
                focus_request_result: 1,
                focus_abandon_result: 1,
                focus_listener: None,
                focus_calls: Vec::new(),
                focus_abandons: 0,
                device_callbacks: Vec::new(),
                receivers: Vec::new(),
                routes: vec![Self::speaker_route("Phone")],
                route_callbacks: Vec::new(),
                route_selections: Vec::new(),
                bluetooth_proxy: None,
                proxy_requests: 0,
                headsets: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        // A panicking test thread must not take the host down with it
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn deliver(sinks: Vec<NotificationSink>, event: PlatformEvent) {
        trace!("Simulated host delivering {} to {} listener(s)", event.name(), sinks.len());
        for sink in sinks {
            // Nobody listening is not the host's problem
            let _ = sink.notify(event.clone());
        }
    }

    fn broadcast(&self, action: BroadcastAction, event: PlatformEvent) {
        let sinks = self
            .state()
            .receivers
            .iter()
            .filter(|(actions, _)| actions.contains(&action))
            .map(|(_, sink)| sink.clone())
            .collect();
        Self::deliver(sinks, event);
    }

    pub fn speaker_route(name: &str) -> PlatformRoute {
        PlatformRoute {
            id: format!("speaker:{}", name),
            name: name.to_string(),
            device_type: route_type::SPEAKER,
            is_default: true,
            is_bluetooth: false,
            is_enabled: true,
            is_device_speaker: true,
            is_selected: true,
        }
    }

    pub fn bluetooth_route(name: &str) -> PlatformRoute {
        PlatformRoute {
            id: format!("bluetooth:{}", name),
            name: name.to_string(),
            device_type: route_type::BLUETOOTH,
            is_default: false,
            is_bluetooth: true,
            is_enabled: true,
            is_device_speaker: false,
            is_selected: false,
        }
    }

    // Scripting

    pub fn deny_permission(&self, permission: Permission) {
        let mut state = self.state();
        if !state.denied.contains(&permission) {
            state.denied.push(permission);
        }
    }

    pub fn grant_permission(&self, permission: Permission) {
        self.state().denied.retain(|denied| *denied != permission);
    }

    /// Raw codes returned by the next focus requests and abandons
    pub fn set_focus_results(&self, request: i32, abandon: i32) {
        let mut state = self.state();
        state.focus_request_result = request;
        state.focus_abandon_result = abandon;
    }

    /// Add an output endpoint and tell the device callbacks. Returns its id.
    pub fn attach_device(&self, category: DeviceCategory, name: &str) -> i32 {
        let (device, sinks) = {
            let mut state = self.state();
            let device = PlatformDevice::new(state.next_device_id, name, category);
            state.next_device_id += 1;
            state.outputs.push(device.clone());
            (device, state.device_callbacks.clone())
        };
        let id = device.id;
        Self::deliver(sinks, PlatformEvent::DevicesAdded(vec![device]));
        id
    }

    pub fn detach_device(&self, id: i32) -> bool {
        let (removed, sinks) = {
            let mut state = self.state();
            let removed: Vec<PlatformDevice> =
                state.outputs.iter().filter(|device| device.id == id).cloned().collect();
            state.outputs.retain(|device| device.id != id);
            (removed, state.device_callbacks.clone())
        };
        if removed.is_empty() {
            return false;
        }
        Self::deliver(sinks, PlatformEvent::DevicesRemoved(removed));
        true
    }

    fn detach_category(&self, categories: &[DeviceCategory]) {
        let ids: Vec<i32> = self
            .state()
            .outputs
            .iter()
            .filter(|device| categories.contains(&device.category))
            .map(|device| device.id)
            .collect();
        for id in ids {
            self.detach_device(id);
        }
    }

    pub fn plug_wired_headset(&self, name: &str) -> i32 {
        let id = self.attach_device(DeviceCategory::WiredHeadset, name);
        self.state().wired_headset_flag = true;
        self.broadcast(
            BroadcastAction::HeadsetPlug,
            PlatformEvent::HeadsetPlug {
                state: 1,
                name: Some(name.to_string()),
            },
        );
        id
    }

    pub fn unplug_wired_headset(&self) {
        self.detach_category(&[DeviceCategory::WiredHeadset, DeviceCategory::WiredHeadphones]);
        self.state().wired_headset_flag = false;
        self.broadcast(
            BroadcastAction::HeadsetPlug,
            PlatformEvent::HeadsetPlug { state: 0, name: None },
        );
    }

    /// Only flips the legacy wired flag, as very old hosts report it
    pub fn set_wired_headset_flag(&self, on: bool) {
        self.state().wired_headset_flag = on;
    }

    /// Connect a headset: SCO and A2DP endpoints, a profile device and a route
    pub fn connect_bluetooth_headset(&self, name: &str) {
        self.attach_device(DeviceCategory::BluetoothSco, name);
        self.attach_device(DeviceCategory::BluetoothA2dp, name);
        self.state().headsets.push(BluetoothHeadsetDevice {
            name: name.to_string(),
            connection_state: BluetoothConnectionState::Connected,
            audio_connected: false,
        });
        self.broadcast(
            BroadcastAction::BluetoothHeadsetConnectionState,
            PlatformEvent::BluetoothConnectionChanged(BluetoothConnectionState::Connected),
        );
        self.add_route(Self::bluetooth_route(name));
    }

    pub fn disconnect_bluetooth_headset(&self) {
        self.detach_category(&[DeviceCategory::BluetoothSco, DeviceCategory::BluetoothA2dp]);
        {
            let mut state = self.state();
            state.headsets.clear();
            state.sco_on = false;
            state.sco_started = false;
        }
        self.broadcast(
            BroadcastAction::BluetoothHeadsetConnectionState,
            PlatformEvent::BluetoothConnectionChanged(BluetoothConnectionState::Disconnected),
        );
        let bluetooth_ids: Vec<String> = self
            .state()
            .routes
            .iter()
            .filter(|route| route.is_bluetooth_type())
            .map(|route| route.id.clone())
            .collect();
        for id in bluetooth_ids {
            self.remove_route(&id);
        }
    }

    pub fn add_route(&self, route: PlatformRoute) {
        let sinks = {
            let mut state = self.state();
            state.routes.push(route.clone());
            state.route_callbacks.clone()
        };
        Self::deliver(sinks, PlatformEvent::RouteAdded(route));
    }

    pub fn remove_route(&self, id: &str) -> bool {
        let (removed, sinks) = {
            let mut state = self.state();
            let position = state.routes.iter().position(|route| route.id == id);
            let removed = position.map(|index| state.routes.remove(index));
            (removed, state.route_callbacks.clone())
        };
        match removed {
            Some(route) => {
                Self::deliver(sinks, PlatformEvent::RouteRemoved(route));
                true
            }
            None => false,
        }
    }

    /// Deliver a raw focus-change code to the current focus listener
    pub fn push_focus_change(&self, code: i32) -> bool {
        let listener = self.state().focus_listener.clone();
        match listener {
            Some(sink) => sink.notify(PlatformEvent::FocusChanged(code)).is_ok(),
            None => false,
        }
    }

    pub fn connect_bluetooth_service(&self) -> bool {
        let proxy = self.state().bluetooth_proxy.clone();
        match proxy {
            Some(sink) => sink.notify(PlatformEvent::BluetoothServiceConnected).is_ok(),
            None => false,
        }
    }

    pub fn disconnect_bluetooth_service(&self) -> bool {
        let proxy = self.state().bluetooth_proxy.clone();
        match proxy {
            Some(sink) => sink.notify(PlatformEvent::BluetoothServiceDisconnected).is_ok(),
            None => false,
        }
    }

    // Observation

    pub fn mode(&self) -> AudioMode {
        self.state().mode_history.last().copied().unwrap_or_default()
    }

    pub fn mode_history(&self) -> Vec<AudioMode> {
        self.state().mode_history.clone()
    }

    pub fn microphone_muted(&self) -> bool {
        self.state().microphone_muted
    }

    pub fn sco_started(&self) -> bool {
        self.state().sco_started
    }

    pub fn focus_calls(&self) -> Vec<FocusCall> {
        self.state().focus_calls.clone()
    }

    pub fn focus_abandons(&self) -> usize {
        self.state().focus_abandons
    }

    pub fn device_callback_count(&self) -> usize {
        self.state().device_callbacks.len()
    }

    pub fn receiver_count(&self) -> usize {
        self.state().receivers.len()
    }

    pub fn route_callback_count(&self) -> usize {
        self.state().route_callbacks.len()
    }

    pub fn proxy_requests(&self) -> usize {
        self.state().proxy_requests
    }

    pub fn selected_route(&self) -> Option<PlatformRoute> {
        self.state().routes.iter().find(|route| route.is_selected).cloned()
    }

    /// Ids of every route passed to `select_route`, in order
    pub fn route_selections(&self) -> Vec<String> {
        self.state().route_selections.clone()
    }
}

impl AudioSystem for SimulatedHost {
    fn api_level(&self) -> u32 {
        self.state().api_level
    }

    fn has_permission(&self, permission: Permission) -> bool {
        !self.state().denied.contains(&permission)
    }

    fn devices(&self, filter: DeviceFilter) -> Vec<PlatformDevice> {
        let state = self.state();
        match filter {
            DeviceFilter::Outputs => state.outputs.clone(),
            DeviceFilter::All => state.outputs.iter().chain(state.inputs.iter()).cloned().collect(),
        }
    }

    fn is_wired_headset_on(&self) -> bool {
        self.state().wired_headset_flag
    }

    fn is_speakerphone_on(&self) -> bool {
        self.state().speakerphone_on
    }

    fn set_speakerphone_on(&self, on: bool) {
        debug!("Simulated host: speakerphone {}", if on { "on" } else { "off" });
        self.state().speakerphone_on = on;
    }

    fn set_mode(&self, mode: AudioMode) {
        self.state().mode_history.push(mode);
    }

    fn set_microphone_mute(&self, muted: bool) {
        self.state().microphone_muted = muted;
    }

    fn is_bluetooth_sco_on(&self) -> bool {
        self.state().sco_on
    }

    fn set_bluetooth_sco_on(&self, on: bool) {
        self.state().sco_on = on;
    }

    fn start_bluetooth_sco(&self) {
        let mut state = self.state();
        state.sco_started = true;
        for headset in state.headsets.iter_mut() {
            headset.audio_connected = true;
        }
    }

    fn stop_bluetooth_sco(&self) {
        let mut state = self.state();
        state.sco_started = false;
        for headset in state.headsets.iter_mut() {
            headset.audio_connected = false;
        }
    }

    fn request_focus(&self, request: &FocusRequest, listener: NotificationSink) -> i32 {
        let mut state = self.state();
        state.focus_calls.push(FocusCall::Builder(request.clone()));
        state.focus_listener = Some(listener);
        state.focus_request_result
    }

    fn abandon_focus_request(&self, _request: &FocusRequest) -> i32 {
        let mut state = self.state();
        state.focus_abandons += 1;
        state.focus_listener = None;
        state.focus_abandon_result
    }

    fn request_focus_legacy(
        &self,
        stream: StreamType,
        duration_hint: FocusGain,
        listener: NotificationSink,
    ) -> i32 {
        let mut state = self.state();
        state.focus_calls.push(FocusCall::Legacy { stream, duration_hint });
        state.focus_listener = Some(listener);
        state.focus_request_result
    }

    fn abandon_focus_legacy(&self) -> i32 {
        let mut state = self.state();
        state.focus_abandons += 1;
        state.focus_listener = None;
        state.focus_abandon_result
    }

    fn register_device_callback(&self, sink: NotificationSink) {
        self.state().device_callbacks.push(sink);
    }

    fn unregister_device_callback(&self) {
        self.state().device_callbacks.clear();
    }

    fn register_receiver(&self, actions: &[BroadcastAction], sink: NotificationSink) {
        self.state().receivers.push((actions.to_vec(), sink));
    }

    fn unregister_receiver(&self) {
        self.state().receivers.clear();
    }
}

impl MediaRouter for SimulatedHost {
    fn routes(&self) -> Vec<PlatformRoute> {
        self.state().routes.clone()
    }

    fn select_route(&self, route: &PlatformRoute) {
        let (unselected, selected, sinks) = {
            let mut state = self.state();
            state.route_selections.push(route.id.clone());

            let mut unselected = None;
            let mut selected = None;
            for candidate in state.routes.iter_mut() {
                if candidate.id == route.id {
                    if !candidate.is_selected {
                        candidate.is_selected = true;
                        selected = Some(candidate.clone());
                    }
                } else if candidate.is_selected {
                    candidate.is_selected = false;
                    unselected = Some(candidate.clone());
                }
            }
            (unselected, selected, state.route_callbacks.clone())
        };

        if let Some(route) = unselected {
            Self::deliver(sinks.clone(), PlatformEvent::RouteUnselected(route));
        }
        if let Some(route) = selected {
            Self::deliver(sinks, PlatformEvent::RouteSelected(route));
        }
    }

    fn add_callback(&self, _category: RouteCategory, sink: NotificationSink) {
        self.state().route_callbacks.push(sink);
    }

    fn remove_callback(&self) {
        self.state().route_callbacks.clear();
    }
}

impl BluetoothHeadsetProfile for SimulatedHost {
    fn connect_proxy(&self, sink: NotificationSink) {
        let mut state = self.state();
        state.proxy_requests += 1;
        state.bluetooth_proxy = Some(sink);
    }

    fn connected_devices(&self) -> Vec<BluetoothHeadsetDevice> {
        self.state().headsets.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Notification;

    fn drain(receiver: &mut tokio::sync::mpsc::UnboundedReceiver<Notification>) -> Vec<PlatformEvent> {
        let mut events = Vec::new();
        while let Ok(notification) = receiver.try_recv() {
            if let Notification::Platform(event) = notification {
                events.push(event);
            }
        }
        events
    }

    #[test]
    fn test_default_host() {
        let host = SimulatedHost::new();

        assert_eq!(host.api_level(), 33);
        assert_eq!(host.devices(DeviceFilter::Outputs).len(), 2);
        assert_eq!(host.devices(DeviceFilter::All).len(), 3);
        assert_eq!(host.routes().len(), 1);
        assert!(host.selected_route().unwrap().is_device_speaker);
        assert!(host.has_permission(Permission::RecordAudio));
    }

    #[test]
    fn test_device_callbacks_see_attach_and_detach() {
        let host = SimulatedHost::new();
        let (sink, mut receiver) = NotificationSink::channel();
        host.register_device_callback(sink);

        let id = host.attach_device(DeviceCategory::UsbHeadset, "USB-C buds");
        assert!(host.detach_device(id));
        assert!(!host.detach_device(id));

        let events = drain(&mut receiver);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], PlatformEvent::DevicesAdded(devices) if devices[0].id == id));
        assert!(matches!(&events[1], PlatformEvent::DevicesRemoved(devices) if devices[0].id == id));
    }

    #[test]
    fn test_receivers_filter_by_action() {
        let host = SimulatedHost::new();
        let (sink, mut receiver) = NotificationSink::channel();
        host.register_receiver(&[BroadcastAction::HeadsetPlug], sink);

        host.plug_wired_headset("Jack");
        host.connect_bluetooth_headset("Car kit");

        let events = drain(&mut receiver);
        assert_eq!(
            events,
            vec![PlatformEvent::HeadsetPlug {
                state: 1,
                name: Some("Jack".to_string()),
            }]
        );
        assert!(host.is_wired_headset_on());
    }

    #[test]
    fn test_select_route_reports_transitions() {
        let host = SimulatedHost::new();
        let (sink, mut receiver) = NotificationSink::channel();
        host.add_callback(RouteCategory::LiveAudio, sink);

        host.connect_bluetooth_headset("Car kit");
        let route = SimulatedHost::bluetooth_route("Car kit");
        host.select_route(&route);

        let events = drain(&mut receiver);
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], PlatformEvent::RouteAdded(r) if r.name == "Car kit"));
        assert!(matches!(&events[1], PlatformEvent::RouteUnselected(r) if r.name == "Phone"));
        assert!(matches!(&events[2], PlatformEvent::RouteSelected(r) if r.name == "Car kit"));
        assert_eq!(host.route_selections(), vec!["bluetooth:Car kit".to_string()]);
    }

    #[test]
    fn test_disconnect_bluetooth_headset_removes_everything() {
        let host = SimulatedHost::new();
        host.connect_bluetooth_headset("Car kit");
        host.set_bluetooth_sco_on(true);

        host.disconnect_bluetooth_headset();

        assert!(host.connected_devices().is_empty());
        assert!(!host.is_bluetooth_sco_on());
        assert_eq!(host.routes().len(), 1);
        assert!(host
            .devices(DeviceFilter::All)
            .iter()
            .all(|device| device.category != DeviceCategory::BluetoothSco));
    }

    #[test]
    fn test_focus_listener_lifecycle() {
        let host = SimulatedHost::new();
        assert!(!host.push_focus_change(-1));

        let (sink, mut receiver) = NotificationSink::channel();
        host.request_focus_legacy(StreamType::VoiceCall, FocusGain::GainTransient, sink);
        assert!(host.push_focus_change(-2));
        assert_eq!(drain(&mut receiver), vec![PlatformEvent::FocusChanged(-2)]);

        host.abandon_focus_legacy();
        assert!(!host.push_focus_change(1));
    }

    #[test]
    fn test_sco_marks_headset_audio() {
        let host = SimulatedHost::new();
        host.connect_bluetooth_headset("Buds");

        host.start_bluetooth_sco();
        assert!(host.sco_started());
        assert!(host.connected_devices()[0].audio_connected);

        host.stop_bluetooth_sco();
        assert!(!host.connected_devices()[0].audio_connected);
    }
}

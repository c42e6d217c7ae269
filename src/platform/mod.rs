pub mod looper;
pub mod simulated;

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::{FocusGain, StreamType};
use crate::error::{DispatchError, Permission};
use crate::focus::FocusRequest;
use crate::models::{
    AudioMode, BluetoothConnectionState, BluetoothHeadsetDevice, PlatformDevice, PlatformRoute,
};

pub use looper::{LooperThread, ManualMainThread};
pub use simulated::SimulatedHost;

/// Notifications the host delivers to the coordinator, from any callback thread
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEvent {
    DevicesAdded(Vec<PlatformDevice>),
    DevicesRemoved(Vec<PlatformDevice>),
    RouteAdded(PlatformRoute),
    RouteRemoved(PlatformRoute),
    RouteSelected(PlatformRoute),
    RouteUnselected(PlatformRoute),
    FocusChanged(i32),
    HeadsetPlug { state: i32, name: Option<String> },
    BluetoothConnectionChanged(BluetoothConnectionState),
    BluetoothServiceConnected,
    BluetoothServiceDisconnected,
}

impl PlatformEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PlatformEvent::DevicesAdded(_) => "devices-added",
            PlatformEvent::DevicesRemoved(_) => "devices-removed",
            PlatformEvent::RouteAdded(_) => "route-added",
            PlatformEvent::RouteRemoved(_) => "route-removed",
            PlatformEvent::RouteSelected(_) => "route-selected",
            PlatformEvent::RouteUnselected(_) => "route-unselected",
            PlatformEvent::FocusChanged(_) => "focus-changed",
            PlatformEvent::HeadsetPlug { .. } => "headset-plug",
            PlatformEvent::BluetoothConnectionChanged(_) => "bluetooth-connection",
            PlatformEvent::BluetoothServiceConnected => "bluetooth-service-connected",
            PlatformEvent::BluetoothServiceDisconnected => "bluetooth-service-disconnected",
        }
    }
}

/// Messages consumed by the notification worker
#[derive(Debug)]
pub(crate) enum Notification {
    Platform(PlatformEvent),
    /// Acknowledged once everything queued before it has been handled
    Flush(std::sync::mpsc::Sender<()>),
    Shutdown,
}

/// Handle the host uses to deliver notifications. Cheap to clone.
#[derive(Debug, Clone)]
pub struct NotificationSink {
    sender: mpsc::UnboundedSender<Notification>,
}

impl NotificationSink {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn notify(&self, event: PlatformEvent) -> Result<(), DispatchError> {
        self.sender
            .send(Notification::Platform(event))
            .map_err(|_| DispatchError::WorkerClosed)
    }

    pub(crate) fn flush(&self, ack: std::sync::mpsc::Sender<()>) -> Result<(), DispatchError> {
        self.sender
            .send(Notification::Flush(ack))
            .map_err(|_| DispatchError::WorkerClosed)
    }

    pub(crate) fn shutdown(&self) -> Result<(), DispatchError> {
        self.sender
            .send(Notification::Shutdown)
            .map_err(|_| DispatchError::WorkerClosed)
    }

    /// True when both sinks feed the same worker
    pub fn same_channel(&self, other: &NotificationSink) -> bool {
        self.sender.same_channel(&other.sender)
    }
}

/// Which device list to enumerate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFilter {
    Outputs,
    All,
}

/// Broadcasts the coordinator subscribes to while started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastAction {
    BluetoothHeadsetConnectionState,
    HeadsetPlug,
}

impl BroadcastAction {
    pub const SUBSCRIBED: [BroadcastAction; 2] = [
        BroadcastAction::BluetoothHeadsetConnectionState,
        BroadcastAction::HeadsetPlug,
    ];
}

/// Route category passed to the route-discovery subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteCategory {
    LiveAudio,
}

/// Host audio system: device enumeration, mode, speaker, microphone, SCO and focus
pub trait AudioSystem: Send + Sync {
    fn api_level(&self) -> u32;
    fn has_permission(&self, permission: Permission) -> bool;

    fn devices(&self, filter: DeviceFilter) -> Vec<PlatformDevice>;
    /// Legacy wired-headset flag used on hosts that cannot enumerate devices
    fn is_wired_headset_on(&self) -> bool;

    fn is_speakerphone_on(&self) -> bool;
    fn set_speakerphone_on(&self, on: bool);
    fn set_mode(&self, mode: AudioMode);
    fn set_microphone_mute(&self, muted: bool);

    fn is_bluetooth_sco_on(&self) -> bool;
    fn set_bluetooth_sco_on(&self, on: bool);
    fn start_bluetooth_sco(&self);
    fn stop_bluetooth_sco(&self);

    /// Builder-style request. Returns the raw request result code.
    fn request_focus(&self, request: &FocusRequest, listener: NotificationSink) -> i32;
    fn abandon_focus_request(&self, request: &FocusRequest) -> i32;
    /// Stream-type request used on older hosts
    fn request_focus_legacy(
        &self,
        stream: StreamType,
        duration_hint: FocusGain,
        listener: NotificationSink,
    ) -> i32;
    fn abandon_focus_legacy(&self) -> i32;

    fn register_device_callback(&self, sink: NotificationSink);
    fn unregister_device_callback(&self);
    fn register_receiver(&self, actions: &[BroadcastAction], sink: NotificationSink);
    fn unregister_receiver(&self);
}

/// Host route-discovery subsystem. Mutating calls belong on the main thread.
pub trait MediaRouter: Send + Sync {
    fn routes(&self) -> Vec<PlatformRoute>;
    fn select_route(&self, route: &PlatformRoute);
    fn add_callback(&self, category: RouteCategory, sink: NotificationSink);
    fn remove_callback(&self);
}

/// Host bluetooth headset profile
pub trait BluetoothHeadsetProfile: Send + Sync {
    /// Ask for the profile proxy; service connect and disconnect arrive on `sink`
    fn connect_proxy(&self, sink: NotificationSink);
    fn connected_devices(&self) -> Vec<BluetoothHeadsetDevice>;
}

pub type MainTask = Box<dyn FnOnce() + Send + 'static>;

/// The host's serialized main/UI context
pub trait MainThread: Send + Sync {
    fn post(&self, task: MainTask) -> Result<(), DispatchError>;
}

/// Every host capability the coordinator talks to
#[derive(Clone)]
pub struct Platform {
    pub audio: Arc<dyn AudioSystem>,
    pub router: Arc<dyn MediaRouter>,
    pub bluetooth: Arc<dyn BluetoothHeadsetProfile>,
    pub main_thread: Arc<dyn MainThread>,
}

impl Platform {
    /// Bundle a simulated host with the given main thread
    pub fn simulated(host: Arc<SimulatedHost>, main_thread: Arc<dyn MainThread>) -> Self {
        Self {
            audio: host.clone(),
            router: host.clone(),
            bluetooth: host,
            main_thread,
        }
    }
}

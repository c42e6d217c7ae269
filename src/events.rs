use std::sync::Arc;
use std::thread;

use log::debug;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{DispatchError, RouteError};
use crate::models::{DeviceDescriptor, RouteDescriptor};
use crate::platform::{Notification, PlatformEvent};

pub const ROUTE_ADDED_EVENT: &str = "onRouteAdded";
pub const ROUTE_REMOVED_EVENT: &str = "onRouteRemoved";
pub const ROUTE_SELECTED_EVENT: &str = "onRouteSelected";
pub const ROUTE_UNSELECTED_EVENT: &str = "onRouteUnselected";
pub const DEVICE_CHANGED_EVENT: &str = "onAudioDeviceChanged";

/// Event forwarded to the application layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteEvent {
    RouteAdded(RouteDescriptor),
    RouteRemoved(RouteDescriptor),
    RouteSelected(RouteDescriptor),
    RouteUnselected(RouteDescriptor),
    AudioDeviceChanged(Vec<DeviceDescriptor>),
}

impl RouteEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RouteEvent::RouteAdded(_) => ROUTE_ADDED_EVENT,
            RouteEvent::RouteRemoved(_) => ROUTE_REMOVED_EVENT,
            RouteEvent::RouteSelected(_) => ROUTE_SELECTED_EVENT,
            RouteEvent::RouteUnselected(_) => ROUTE_UNSELECTED_EVENT,
            RouteEvent::AudioDeviceChanged(_) => DEVICE_CHANGED_EVENT,
        }
    }

    /// Payload in the shape the application layer expects
    pub fn payload(&self) -> Value {
        let payload = match self {
            RouteEvent::RouteAdded(route)
            | RouteEvent::RouteRemoved(route)
            | RouteEvent::RouteSelected(route)
            | RouteEvent::RouteUnselected(route) => serde_json::to_value(route),
            RouteEvent::AudioDeviceChanged(devices) => serde_json::to_value(devices),
        };
        payload.unwrap_or(Value::Null)
    }

    pub fn route(&self) -> Option<&RouteDescriptor> {
        match self {
            RouteEvent::RouteAdded(route)
            | RouteEvent::RouteRemoved(route)
            | RouteEvent::RouteSelected(route)
            | RouteEvent::RouteUnselected(route) => Some(route),
            RouteEvent::AudioDeviceChanged(_) => None,
        }
    }
}

/// Outbound message channel to the application layer
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: RouteEvent) -> Result<(), DispatchError>;
}

impl<F> EventEmitter for F
where
    F: Fn(RouteEvent) + Send + Sync,
{
    fn emit(&self, event: RouteEvent) -> Result<(), DispatchError> {
        self(event);
        Ok(())
    }
}

/// Emitter that forwards every event into a tokio channel
pub struct ChannelEmitter {
    sender: mpsc::UnboundedSender<RouteEvent>,
}

impl ChannelEmitter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RouteEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventEmitter for ChannelEmitter {
    fn emit(&self, event: RouteEvent) -> Result<(), DispatchError> {
        self.sender.send(event).map_err(|_| DispatchError::ReceiverClosed)
    }
}

/// Emitter that drops everything
pub struct NullEmitter;

impl EventEmitter for NullEmitter {
    fn emit(&self, _event: RouteEvent) -> Result<(), DispatchError> {
        Ok(())
    }
}

/// Consumer of platform notifications on the notification worker
pub trait NotificationHandler: Send + Sync {
    fn handle(self: Arc<Self>, event: PlatformEvent);
}

/// Spawn the single worker that handles every platform notification in
/// arrival order. All outbound events are emitted from this thread.
pub(crate) fn spawn_notification_worker(
    mut receiver: mpsc::UnboundedReceiver<Notification>,
    handler: Arc<dyn NotificationHandler>,
) -> Result<thread::JoinHandle<()>, RouteError> {
    thread::Builder::new()
        .name("route-events".to_string())
        .spawn(move || {
            while let Some(notification) = receiver.blocking_recv() {
                match notification {
                    Notification::Platform(event) => {
                        debug!("Handling platform notification: {}", event.name());
                        Arc::clone(&handler).handle(event);
                    }
                    Notification::Flush(ack) => {
                        let _ = ack.send(());
                    }
                    Notification::Shutdown => break,
                }
            }
            debug!("Notification worker exited");
        })
        .map_err(RouteError::WorkerSpawn)
}

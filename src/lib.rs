pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod focus;
pub mod logging;
pub mod models;
pub mod platform;


pub use coordinator::{select_current_device, AudioRouteCoordinator, BluetoothScoState};
pub use error::*;
pub use events::{ChannelEmitter, EventEmitter, NullEmitter, RouteEvent};
pub use models::*;
pub use platform::{Platform, PlatformEvent, SimulatedHost};

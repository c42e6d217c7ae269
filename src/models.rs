use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical output category reported to the application layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioDevice {
    SpeakerPhone,
    WiredHeadset,
    Earpiece,
    Bluetooth,
    None,
}

impl AudioDevice {
    /// Wire name used by the application layer
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioDevice::SpeakerPhone => "SPEAKER_PHONE",
            AudioDevice::WiredHeadset => "WIRED_HEADSET",
            AudioDevice::Earpiece => "EARPIECE",
            AudioDevice::Bluetooth => "BLUETOOTH",
            AudioDevice::None => "NONE",
        }
    }

    pub fn all() -> [AudioDevice; 5] {
        [
            AudioDevice::SpeakerPhone,
            AudioDevice::WiredHeadset,
            AudioDevice::Earpiece,
            AudioDevice::Bluetooth,
            AudioDevice::None,
        ]
    }
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioDevice {
    type Err = crate::error::RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(['-', ' '], "_");
        AudioDevice::all()
            .into_iter()
            .find(|device| device.as_str() == normalized)
            .ok_or_else(|| crate::error::RouteError::UnknownRoute { name: s.to_string() })
    }
}

/// Physical output endpoint category as enumerated by the host
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DeviceCategory {
    BuiltinEarpiece,
    BuiltinSpeaker,
    WiredHeadset,
    WiredHeadphones,
    BluetoothSco,
    BluetoothA2dp,
    Hdmi,
    UsbDevice,
    UsbHeadset,
    Other(i32),
}

impl DeviceCategory {
    /// Categories that `get_devices` reports; everything else is dropped.
    pub const REPORTED: [DeviceCategory; 7] = [
        DeviceCategory::BluetoothSco,
        DeviceCategory::BuiltinEarpiece,
        DeviceCategory::BuiltinSpeaker,
        DeviceCategory::WiredHeadphones,
        DeviceCategory::WiredHeadset,
        DeviceCategory::UsbDevice,
        DeviceCategory::UsbHeadset,
    ];

    pub fn from_code(code: i32) -> Self {
        match code {
            1 => DeviceCategory::BuiltinEarpiece,
            2 => DeviceCategory::BuiltinSpeaker,
            3 => DeviceCategory::WiredHeadset,
            4 => DeviceCategory::WiredHeadphones,
            7 => DeviceCategory::BluetoothSco,
            8 => DeviceCategory::BluetoothA2dp,
            9 => DeviceCategory::Hdmi,
            11 => DeviceCategory::UsbDevice,
            22 => DeviceCategory::UsbHeadset,
            other => DeviceCategory::Other(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            DeviceCategory::BuiltinEarpiece => 1,
            DeviceCategory::BuiltinSpeaker => 2,
            DeviceCategory::WiredHeadset => 3,
            DeviceCategory::WiredHeadphones => 4,
            DeviceCategory::BluetoothSco => 7,
            DeviceCategory::BluetoothA2dp => 8,
            DeviceCategory::Hdmi => 9,
            DeviceCategory::UsbDevice => 11,
            DeviceCategory::UsbHeadset => 22,
            DeviceCategory::Other(code) => *code,
        }
    }

    pub fn is_reported(&self) -> bool {
        Self::REPORTED.contains(self)
    }

    /// Wired endpoints that take priority over the earpiece and speaker.
    /// A USB headset is reported but does not count as wired.
    pub fn is_wired(&self) -> bool {
        matches!(
            self,
            DeviceCategory::WiredHeadset
                | DeviceCategory::WiredHeadphones
                | DeviceCategory::UsbDevice
        )
    }

    pub fn classify(&self) -> AudioDevice {
        match self {
            c if c.is_wired() => AudioDevice::WiredHeadset,
            DeviceCategory::BluetoothSco => AudioDevice::Bluetooth,
            DeviceCategory::BuiltinEarpiece => AudioDevice::Earpiece,
            DeviceCategory::BuiltinSpeaker => AudioDevice::SpeakerPhone,
            _ => AudioDevice::None,
        }
    }
}

/// Raw output endpoint as the host reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDevice {
    pub id: i32,
    pub product_name: String,
    pub category: DeviceCategory,
}

impl PlatformDevice {
    pub fn new(id: i32, product_name: impl Into<String>, category: DeviceCategory) -> Self {
        Self {
            id,
            product_name: product_name.into(),
            category,
        }
    }
}

/// Snapshot of one reported output endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceDescriptor {
    #[serde(rename = "type")]
    pub device_type: AudioDevice,
    pub name: String,
    pub id: i32,
}

impl From<&PlatformDevice> for DeviceDescriptor {
    fn from(device: &PlatformDevice) -> Self {
        Self {
            device_type: device.category.classify(),
            name: device.product_name.clone(),
            id: device.id,
        }
    }
}

/// Route device-type codes published by the route-discovery subsystem
pub mod route_type {
    pub const UNKNOWN: i32 = 0;
    pub const TV: i32 = 1;
    pub const SPEAKER: i32 = 2;
    pub const BLUETOOTH: i32 = 3;
}

/// Raw selectable route as the host reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformRoute {
    pub id: String,
    pub name: String,
    pub device_type: i32,
    pub is_default: bool,
    pub is_bluetooth: bool,
    pub is_enabled: bool,
    pub is_device_speaker: bool,
    pub is_selected: bool,
}

impl PlatformRoute {
    pub fn classify(&self) -> AudioDevice {
        match self.device_type {
            route_type::BLUETOOTH => AudioDevice::Bluetooth,
            route_type::SPEAKER => AudioDevice::SpeakerPhone,
            _ => AudioDevice::None,
        }
    }

    pub fn is_bluetooth_type(&self) -> bool {
        self.device_type == route_type::BLUETOOTH
    }

    /// One-line dump of every flag, used in route callbacks
    pub fn describe(&self) -> String {
        format!(
            "NAME={}, DEVICE TYPE={}, isDefault={}, isBluetooth={}, isEnabled={}, isDeviceSpeaker={}, isSelected={}",
            self.name,
            self.device_type,
            self.is_default,
            self.is_bluetooth,
            self.is_enabled,
            self.is_device_speaker,
            self.is_selected
        )
    }
}

/// Snapshot of one selectable route
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RouteDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub route_type: AudioDevice,
    pub is_selected: bool,
}

impl From<&PlatformRoute> for RouteDescriptor {
    fn from(route: &PlatformRoute) -> Self {
        Self {
            name: route.name.clone(),
            route_type: route.classify(),
            is_selected: route.is_selected,
        }
    }
}

/// Outcome of a focus request or abandon
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FocusState {
    Failed,
    Granted,
    Delayed,
    Unknown,
}

impl FocusState {
    pub const REQUEST_FAILED: i32 = 0;
    pub const REQUEST_GRANTED: i32 = 1;
    pub const REQUEST_DELAYED: i32 = 2;

    /// Normalizes a focus-request result code
    pub fn from_request_code(code: i32) -> Self {
        match code {
            Self::REQUEST_FAILED => FocusState::Failed,
            Self::REQUEST_GRANTED => FocusState::Granted,
            Self::REQUEST_DELAYED => FocusState::Delayed,
            _ => FocusState::Unknown,
        }
    }

    /// Normalizes a legacy focus-request result code, which has no delayed grant
    pub fn from_legacy_request_code(code: i32) -> Self {
        Self::from_abandon_code(code)
    }

    /// Normalizes an abandon result code. Abandon never reports a delayed grant.
    pub fn from_abandon_code(code: i32) -> Self {
        match code {
            Self::REQUEST_FAILED => FocusState::Failed,
            Self::REQUEST_GRANTED => FocusState::Granted,
            _ => FocusState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FocusState::Failed => "AUDIOFOCUS_REQUEST_FAILED",
            FocusState::Granted => "AUDIOFOCUS_REQUEST_GRANTED",
            FocusState::Delayed => "AUDIOFOCUS_REQUEST_DELAYED",
            FocusState::Unknown => "AUDIOFOCUS_REQUEST_UNKNOWN",
        }
    }
}

impl fmt::Display for FocusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Focus-change categories delivered asynchronously by the host
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FocusChange {
    Gain,
    GainTransient,
    GainTransientExclusive,
    GainTransientMayDuck,
    Loss,
    LossTransient,
    LossTransientCanDuck,
    None,
    Unknown(i32),
}

impl FocusChange {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => FocusChange::Gain,
            2 => FocusChange::GainTransient,
            3 => FocusChange::GainTransientMayDuck,
            4 => FocusChange::GainTransientExclusive,
            -1 => FocusChange::Loss,
            -2 => FocusChange::LossTransient,
            -3 => FocusChange::LossTransientCanDuck,
            0 => FocusChange::None,
            other => FocusChange::Unknown(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            FocusChange::Gain => 1,
            FocusChange::GainTransient => 2,
            FocusChange::GainTransientMayDuck => 3,
            FocusChange::GainTransientExclusive => 4,
            FocusChange::Loss => -1,
            FocusChange::LossTransient => -2,
            FocusChange::LossTransientCanDuck => -3,
            FocusChange::None => 0,
            FocusChange::Unknown(code) => *code,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FocusChange::Gain => "AUDIOFOCUS_GAIN",
            FocusChange::GainTransient => "AUDIOFOCUS_GAIN_TRANSIENT",
            FocusChange::GainTransientExclusive => "AUDIOFOCUS_GAIN_TRANSIENT_EXCLUSIVE",
            FocusChange::GainTransientMayDuck => "AUDIOFOCUS_GAIN_TRANSIENT_MAY_DUCK",
            FocusChange::Loss => "AUDIOFOCUS_LOSS",
            FocusChange::LossTransient => "AUDIOFOCUS_LOSS_TRANSIENT",
            FocusChange::LossTransientCanDuck => "AUDIOFOCUS_LOSS_TRANSIENT_CAN_DUCK",
            FocusChange::None => "AUDIOFOCUS_NONE",
            FocusChange::Unknown(_) => "AUDIOFOCUS_UNKNOWN",
        }
    }

    pub fn is_gain(&self) -> bool {
        matches!(
            self,
            FocusChange::Gain
                | FocusChange::GainTransient
                | FocusChange::GainTransientExclusive
                | FocusChange::GainTransientMayDuck
        )
    }

    /// Resulting focus state, or `None` when the change leaves it as is
    pub fn resulting_state(&self) -> Option<FocusState> {
        match self {
            c if c.is_gain() => Some(FocusState::Granted),
            FocusChange::Loss => Some(FocusState::Failed),
            _ => None,
        }
    }
}

/// Playback mode of the host audio system
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AudioMode {
    #[default]
    Normal,
    Ringtone,
    InCall,
    InCommunication,
}

/// Wired headset plug transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadsetPlugState {
    Unplugged,
    Plugged,
    Unknown(i32),
}

impl HeadsetPlugState {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => HeadsetPlugState::Unplugged,
            1 => HeadsetPlugState::Plugged,
            other => HeadsetPlugState::Unknown(other),
        }
    }
}

/// Bluetooth headset profile connection states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BluetoothConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl BluetoothConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BluetoothConnectionState::Disconnected => "STATE_DISCONNECTED",
            BluetoothConnectionState::Connecting => "STATE_CONNECTING",
            BluetoothConnectionState::Connected => "STATE_CONNECTED",
            BluetoothConnectionState::Disconnecting => "STATE_DISCONNECTING",
        }
    }
}

/// Headset connected through the bluetooth headset profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BluetoothHeadsetDevice {
    pub name: String,
    pub connection_state: BluetoothConnectionState,
    pub audio_connected: bool,
}

/// Inputs that decide the currently selected output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DevicePresence {
    pub bluetooth_present: bool,
    pub sco_active: bool,
    pub wired_present: bool,
    pub speakerphone_on: bool,
}

/// Map returned by `start`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StartResult {
    pub selected_device: AudioDevice,
    pub devices: Vec<DeviceDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_device_wire_names() {
        assert_eq!(AudioDevice::SpeakerPhone.to_string(), "SPEAKER_PHONE");
        assert_eq!(AudioDevice::WiredHeadset.to_string(), "WIRED_HEADSET");
        assert_eq!(
            serde_json::to_string(&AudioDevice::Bluetooth).unwrap(),
            "\"BLUETOOTH\""
        );
    }

    #[test]
    fn test_audio_device_from_str() {
        assert_eq!("BLUETOOTH".parse::<AudioDevice>().unwrap(), AudioDevice::Bluetooth);
        assert_eq!("speaker-phone".parse::<AudioDevice>().unwrap(), AudioDevice::SpeakerPhone);
        assert_eq!(" earpiece ".parse::<AudioDevice>().unwrap(), AudioDevice::Earpiece);
        assert!("SPEAKERS".parse::<AudioDevice>().is_err());
    }

    #[test]
    fn test_device_category_codes() {
        for code in [1, 2, 3, 4, 7, 8, 9, 11, 22, 42] {
            assert_eq!(DeviceCategory::from_code(code).code(), code);
        }
        assert_eq!(DeviceCategory::from_code(42), DeviceCategory::Other(42));
    }

    #[test]
    fn test_device_category_classification() {
        assert_eq!(DeviceCategory::WiredHeadset.classify(), AudioDevice::WiredHeadset);
        assert_eq!(DeviceCategory::WiredHeadphones.classify(), AudioDevice::WiredHeadset);
        assert_eq!(DeviceCategory::UsbDevice.classify(), AudioDevice::WiredHeadset);
        assert_eq!(DeviceCategory::UsbHeadset.classify(), AudioDevice::None);
        assert!(!DeviceCategory::UsbHeadset.is_wired());
        assert_eq!(DeviceCategory::BluetoothSco.classify(), AudioDevice::Bluetooth);
        assert_eq!(DeviceCategory::BuiltinEarpiece.classify(), AudioDevice::Earpiece);
        assert_eq!(DeviceCategory::BuiltinSpeaker.classify(), AudioDevice::SpeakerPhone);
        assert_eq!(DeviceCategory::BluetoothA2dp.classify(), AudioDevice::None);
        assert_eq!(DeviceCategory::Hdmi.classify(), AudioDevice::None);
    }

    #[test]
    fn test_reported_categories() {
        assert!(DeviceCategory::BluetoothSco.is_reported());
        assert!(DeviceCategory::UsbHeadset.is_reported());
        assert!(!DeviceCategory::BluetoothA2dp.is_reported());
        assert!(!DeviceCategory::Hdmi.is_reported());
        assert!(!DeviceCategory::Other(99).is_reported());
    }

    #[test]
    fn test_route_classification() {
        let mut route = PlatformRoute {
            id: "r1".to_string(),
            name: "Phone".to_string(),
            device_type: route_type::SPEAKER,
            is_default: true,
            is_bluetooth: false,
            is_enabled: true,
            is_device_speaker: true,
            is_selected: true,
        };
        assert_eq!(route.classify(), AudioDevice::SpeakerPhone);

        route.device_type = route_type::BLUETOOTH;
        assert_eq!(route.classify(), AudioDevice::Bluetooth);

        route.device_type = route_type::TV;
        assert_eq!(route.classify(), AudioDevice::None);

        route.device_type = 77;
        assert_eq!(route.classify(), AudioDevice::None);
    }

    #[test]
    fn test_descriptor_serialization_keys() {
        let device = DeviceDescriptor {
            device_type: AudioDevice::Earpiece,
            name: "Handset".to_string(),
            id: 4,
        };
        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["type"], "EARPIECE");
        assert_eq!(json["name"], "Handset");
        assert_eq!(json["id"], 4);

        let route = RouteDescriptor {
            name: "Car".to_string(),
            route_type: AudioDevice::Bluetooth,
            is_selected: false,
        };
        let json = serde_json::to_value(&route).unwrap();
        assert_eq!(json["type"], "BLUETOOTH");
        assert_eq!(json["isSelected"], false);
    }

    #[test]
    fn test_focus_state_normalization() {
        assert_eq!(FocusState::from_request_code(0), FocusState::Failed);
        assert_eq!(FocusState::from_request_code(1), FocusState::Granted);
        assert_eq!(FocusState::from_request_code(2), FocusState::Delayed);
        assert_eq!(FocusState::from_request_code(17), FocusState::Unknown);

        assert_eq!(FocusState::from_abandon_code(0), FocusState::Failed);
        assert_eq!(FocusState::from_abandon_code(1), FocusState::Granted);
        assert_eq!(FocusState::from_abandon_code(2), FocusState::Unknown);
        assert_eq!(FocusState::from_legacy_request_code(1), FocusState::Granted);
        assert_eq!(FocusState::from_legacy_request_code(2), FocusState::Unknown);
    }

    #[test]
    fn test_focus_change_classification() {
        assert_eq!(FocusChange::from_code(1), FocusChange::Gain);
        assert_eq!(FocusChange::from_code(3), FocusChange::GainTransientMayDuck);
        assert_eq!(FocusChange::from_code(4), FocusChange::GainTransientExclusive);
        assert_eq!(FocusChange::from_code(-3), FocusChange::LossTransientCanDuck);
        assert_eq!(FocusChange::from_code(0), FocusChange::None);
        assert_eq!(FocusChange::from_code(9).as_str(), "AUDIOFOCUS_UNKNOWN");
    }

    #[test]
    fn test_focus_change_resulting_state() {
        assert_eq!(FocusChange::GainTransient.resulting_state(), Some(FocusState::Granted));
        assert_eq!(FocusChange::Loss.resulting_state(), Some(FocusState::Failed));
        assert_eq!(FocusChange::LossTransient.resulting_state(), None);
        assert_eq!(FocusChange::None.resulting_state(), None);
        assert_eq!(FocusChange::Unknown(12).resulting_state(), None);
    }

    #[test]
    fn test_start_result_keys() {
        let result = StartResult {
            selected_device: AudioDevice::Earpiece,
            devices: Vec::new(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["selectedDevice"], "EARPIECE");
        assert!(json["devices"].as_array().unwrap().is_empty());
    }
}

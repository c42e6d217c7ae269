use std::sync::OnceLock;

use log::debug;

use crate::config::{ContentType, FocusConfig, FocusGain, FocusUsage};
use crate::models::FocusState;
use crate::platform::{AudioSystem, NotificationSink};

/// Builder-style focus request object handed to the host
#[derive(Debug, Clone, PartialEq)]
pub struct FocusRequest {
    pub gain: FocusGain,
    pub usage: FocusUsage,
    pub content_type: ContentType,
    pub accepts_delayed_focus_gain: bool,
}

impl FocusRequest {
    pub fn from_config(config: &FocusConfig) -> Self {
        Self {
            gain: FocusGain::Gain,
            usage: config.usage,
            content_type: config.content_type,
            accepts_delayed_focus_gain: config.accepts_delayed_focus_gain,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusMechanism {
    Builder,
    Legacy,
}

impl FocusMechanism {
    pub fn as_str(&self) -> &'static str {
        match self {
            FocusMechanism::Builder => "builder",
            FocusMechanism::Legacy => "legacy",
        }
    }
}

/// One way of asking the host for audio focus. Picked once per coordinator.
pub trait FocusRequester: Send + Sync {
    fn mechanism(&self) -> FocusMechanism;

    /// Request focus; `listener` receives the asynchronous focus changes
    fn request(&self, audio: &dyn AudioSystem, listener: &NotificationSink) -> FocusState;

    fn abandon(&self, audio: &dyn AudioSystem) -> FocusState;
}

/// Uses a request object built on first use and reused afterwards
pub struct BuilderFocusRequester {
    config: FocusConfig,
    request: OnceLock<FocusRequest>,
}

impl BuilderFocusRequester {
    pub fn new(config: FocusConfig) -> Self {
        Self {
            config,
            request: OnceLock::new(),
        }
    }

    fn request_object(&self) -> &FocusRequest {
        self.request.get_or_init(|| {
            debug!("Building focus request for {:?}/{:?}", self.config.usage, self.config.content_type);
            FocusRequest::from_config(&self.config)
        })
    }

    /// The request object, if one has been built yet
    pub fn built_request(&self) -> Option<&FocusRequest> {
        self.request.get()
    }
}

impl FocusRequester for BuilderFocusRequester {
    fn mechanism(&self) -> FocusMechanism {
        FocusMechanism::Builder
    }

    fn request(&self, audio: &dyn AudioSystem, listener: &NotificationSink) -> FocusState {
        let code = audio.request_focus(self.request_object(), listener.clone());
        FocusState::from_request_code(code)
    }

    fn abandon(&self, audio: &dyn AudioSystem) -> FocusState {
        let code = audio.abandon_focus_request(self.request_object());
        FocusState::from_abandon_code(code)
    }
}

/// Direct stream-type focus call for hosts without request objects
pub struct LegacyFocusRequester {
    config: FocusConfig,
}

impl LegacyFocusRequester {
    pub fn new(config: FocusConfig) -> Self {
        Self { config }
    }
}

impl FocusRequester for LegacyFocusRequester {
    fn mechanism(&self) -> FocusMechanism {
        FocusMechanism::Legacy
    }

    fn request(&self, audio: &dyn AudioSystem, listener: &NotificationSink) -> FocusState {
        let code = audio.request_focus_legacy(
            self.config.legacy_stream,
            self.config.legacy_duration_hint,
            listener.clone(),
        );
        FocusState::from_legacy_request_code(code)
    }

    fn abandon(&self, audio: &dyn AudioSystem) -> FocusState {
        FocusState::from_abandon_code(audio.abandon_focus_legacy())
    }
}

/// Pick the focus mechanism for a host API level
pub fn focus_requester_for(
    api_level: u32,
    builder_min_api_level: u32,
    config: FocusConfig,
) -> Box<dyn FocusRequester> {
    if api_level >= builder_min_api_level {
        Box::new(BuilderFocusRequester::new(config))
    } else {
        Box::new(LegacyFocusRequester::new(config))
    }
}

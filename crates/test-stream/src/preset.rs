use weft_protocol::{AgentEvent, ErrorKind};

/// One scripted agent turn.
#[derive(Clone, Debug, Default)]
pub struct PresetTurn {
    /// The events to deliver, in order.
    pub events: Vec<AgentEvent>,
    /// When set, the stream terminates with this error after the last
    /// event instead of completing.
    pub error: Option<PresetError>,
}

/// A scripted stream error.
#[derive(Clone, Debug)]
pub struct PresetError {
    pub message: String,
    pub kind: ErrorKind,
}

impl PresetTurn {
    /// A turn that delivers `events` and completes.
    pub fn of(events: Vec<AgentEvent>) -> Self {
        Self {
            events,
            error: None,
        }
    }

    /// A turn that delivers `events` and then fails.
    pub fn failing(events: Vec<AgentEvent>, message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            events,
            error: Some(PresetError {
                message: message.into(),
                kind,
            }),
        }
    }
}

// Progress events emitted by a running operation

use serde::{Deserialize, Serialize};

/// One progress notification.
///
/// Within one flight, fractions never decrease and exactly one terminal
/// event (`Done` or `Cancelled`) closes the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Update {
        message: String,
        fraction: Option<f64>,
    },
    Done,
    Cancelled,
}

impl ProgressEvent {
    pub fn fraction(&self) -> Option<f64> {
        match self {
            ProgressEvent::Update { fraction, .. } => *fraction,
            ProgressEvent::Done => Some(1.0),
            ProgressEvent::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::Update { .. })
    }
}

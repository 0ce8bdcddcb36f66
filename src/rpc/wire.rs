//! JSON events carried inside codec frames.
//!
//! ```text
//!  sorter ──▶ peer   {"event":"classify","id":7,"data":"/currentBlock.jpg"}
//!  peer   ──▶ sorter {"event":"classified","id":7,"data":2}
//!  sorter ──▶ peer   {"event":"log","data":"Capturing image..."}
//! ```

use serde::{Deserialize, Serialize};

use crate::classes::ClassLabel;
use crate::error::LinkError;

/// Identity of one classification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u32);

impl core::fmt::Display for RequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A label as the peer sent it: a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl LabelValue {
    /// Interpret the value as a class label.
    pub fn to_label(&self) -> Result<ClassLabel, LinkError> {
        let parsed = match self {
            Self::Integer(n) => u8::try_from(*n).ok(),
            Self::Float(x) if x.fract() == 0.0 && (0.0..=255.0).contains(x) => Some(*x as u8),
            Self::Float(_) => None,
            Self::Text(s) => s.trim().parse::<u8>().ok(),
        };
        parsed.map(ClassLabel).ok_or_else(|| LinkError::BadLabel(self.to_string()))
    }
}

impl core::fmt::Display for LabelValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "\"{s}\""),
        }
    }
}

/// Every event that crosses the classifier link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WireEvent {
    /// Ask the peer to classify the image at `data`.
    Classify { id: RequestId, data: String },
    /// The peer's answer. Peers that only echo the label omit `id`.
    Classified {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<RequestId>,
        data: LabelValue,
    },
    /// A mirrored log line.
    Log { data: String },
}

impl WireEvent {
    pub fn to_json(&self) -> Result<Vec<u8>, LinkError> {
        serde_json::to_vec(self).map_err(|e| LinkError::Encode(e.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

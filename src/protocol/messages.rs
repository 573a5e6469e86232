//! Wire protocol message types.
//!
//! Control and event traffic is JSON text tagged with `"type"`; audio
//! travels as raw binary WebSocket frames (PCM16 LE, one full frame per
//! message, never partial). Inbound event kinds use the dotted names of
//! the backend protocol (`transcript.partial`, `tool.started`, ...).

use serde::{Deserialize, Serialize};

/// Backend feature flags, reported once per connection right after the
/// handshake and read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub stt: bool,
    pub tts: bool,
    pub streaming: bool,
    #[serde(rename = "wakeWord")]
    pub wake_word: bool,
}

/// Messages sent from the client to the backend.
///
/// Audio frames are not represented here: they are sent as binary
/// WebSocket messages, outside the JSON layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "connect", rename_all = "camelCase")]
    Connect {
        conversation_id: String,
        user_id: String,
        mode: String,
        prefer_local: bool,
        wake_word_enabled: bool,
    },
    #[serde(rename = "text")]
    Text { content: String },
    #[serde(rename = "endAudio")]
    EndAudio,
    #[serde(rename = "cancel")]
    Cancel,
    #[serde(rename = "setMode", rename_all = "camelCase")]
    SetMode { mode_id: String },
    #[serde(rename = "setPreferLocal")]
    SetPreferLocal { enabled: bool },
    #[serde(rename = "toggleWakeWord")]
    ToggleWakeWord,
}

impl ClientMessage {
    /// Serialize to the JSON wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Events received from the backend.
///
/// Turn-scoped events may carry a `turn` sequence number echoing the
/// client's turn counter; events tagged with a stale turn are discarded
/// by the session layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "capabilities")]
    Capabilities {
        #[serde(flatten)]
        capabilities: Capabilities,
    },
    #[serde(rename = "transcript.partial")]
    TranscriptPartial {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        turn: Option<u64>,
    },
    #[serde(rename = "transcript.final")]
    TranscriptFinal {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        turn: Option<u64>,
    },
    #[serde(rename = "response.partial")]
    ResponsePartial {
        delta: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        turn: Option<u64>,
    },
    #[serde(rename = "response.final")]
    ResponseFinal {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tier: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        turn: Option<u64>,
    },
    #[serde(rename = "tool.started")]
    ToolStarted {
        id: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        turn: Option<u64>,
    },
    #[serde(rename = "tool.progress")]
    ToolProgress { id: String },
    #[serde(rename = "tool.completed")]
    ToolCompleted {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
    #[serde(rename = "tool.error")]
    ToolError { id: String, error: String },
    #[serde(rename = "tier")]
    Tier { tier: String },
    #[serde(rename = "error")]
    Error {
        message: String,
        #[serde(default)]
        fatal: bool,
    },
}

impl ServerEvent {
    /// Parse one inbound JSON text message.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

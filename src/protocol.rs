//! Socket message envelope
//!
//! Every socket frame is a JSON object with a `type` discriminator. Inbound
//! objects whose type is outside the known set, or that carry no string type
//! at all, parse as [`ClientMessage::Unrecognized`] and are relayed verbatim
//! to every client.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, Result};
use crate::webrtc::signaling::{IceCandidate, SessionDescription};

/// Active screen on the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Clock,
    Audio,
    Settings,
    Info,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Clock, Tab::Audio, Tab::Settings, Tab::Info];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Clock => "clock",
            Tab::Audio => "audio",
            Tab::Settings => "settings",
            Tab::Info => "info",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tab {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Tab::ALL
            .into_iter()
            .find(|tab| tab.as_str() == s)
            .ok_or_else(|| {
                AppError::BadRequest("Tab must be one of: clock, audio, settings, info".to_string())
            })
    }
}

/// Client-to-server message
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    SetBrightness { brightness: i64 },
    GetBrightness,
    SetTab { tab: Tab },
    GetTab,
    Refresh,
    /// Browser reports its media session is up
    WebrtcConnected,
    /// Browser reports its media session dropped
    WebrtcDisconnected,
    WebrtcOffer { offer: SessionDescription },
    IceCandidate { candidate: IceCandidate },
    #[serde(other)]
    Unrecognized,
}

impl ClientMessage {
    /// Parse one inbound frame
    ///
    /// Non-JSON text and known types with a malformed body are errors.
    pub fn parse(text: &str) -> Result<Self> {
        match serde_json::from_str(text) {
            Ok(message) => Ok(message),
            Err(e) if Self::is_untyped_object(text) => {
                tracing::trace!("Treating untyped message as unrecognized: {}", e);
                Ok(ClientMessage::Unrecognized)
            }
            Err(e) => Err(AppError::Protocol(e.to_string())),
        }
    }

    /// A JSON object whose `type` is missing, null or not a string
    fn is_untyped_object(text: &str) -> bool {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(serde_json::Value::Object(fields)) => {
                !matches!(fields.get("type"), Some(serde_json::Value::String(_)))
            }
            _ => false,
        }
    }
}

/// Server-to-client message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    WebrtcAnswer { answer: SessionDescription },
    IceCandidate { candidate: IceCandidate },
    BrightnessUpdate { brightness: u8 },
    TabUpdate { tab: Tab },
    Refresh,
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Clock tick pushed to every client once per interval
///
/// Sent without a `type` field; the display renders it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockTick {
    /// `HH:MM:SS`
    pub time: String,
    /// `Monday, January 2, 2006`
    pub date: String,
    /// Unix seconds
    pub timestamp: i64,
}

impl ClockTick {
    pub fn now() -> Self {
        Self::at(Local::now())
    }

    pub fn at<Tz: TimeZone>(now: DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self {
            time: now.format("%H:%M:%S").to_string(),
            date: now.format("%A, %B %-d, %Y").to_string(),
            timestamp: now.timestamp(),
        }
    }
}

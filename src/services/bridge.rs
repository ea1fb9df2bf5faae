//! Native app bridge
//!
//! The games run inside an Android/iOS WebView. Messages go out as JSON
//! `{ "type": ..., "data": ... }` and come back through `window.postMessage`.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::Result;

/// Message kinds exchanged with the native app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    GameStartRequest,
    GameStartApproved,
    GamePause,
    GameResume,
    GameEnd,
    ActivateStartButton,
    BackButtonPressed,
}

/// One message on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl NativeMessage {
    pub fn new(kind: MessageKind) -> Self {
        Self { kind, data: None }
    }

    pub fn game_start_request(timestamp: f64) -> Self {
        Self {
            kind: MessageKind::GameStartRequest,
            data: Some(json!({ "timestamp": timestamp })),
        }
    }

    pub fn game_end(score: u32, log_heart_id: Option<&str>, timestamp: f64) -> Self {
        Self {
            kind: MessageKind::GameEnd,
            data: Some(json!({
                "score": score,
                "log_heart_id": log_heart_id,
                "timestamp": timestamp,
            })),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Parse an inbound message. Accepts a JSON string or an already-decoded
/// object; anything without a known `type` is ignored.
pub fn parse_inbound(value: &Value) -> Option<NativeMessage> {
    match value {
        Value::String(s) => {
            let inner: Value = serde_json::from_str(s).ok()?;
            if inner.is_string() {
                return None;
            }
            parse_inbound(&inner)
        }
        Value::Object(map) if map.contains_key("type") => {
            match serde_json::from_value::<NativeMessage>(value.clone()) {
                Ok(msg) => Some(msg),
                Err(e) => {
                    log::debug!("Ignoring native message: {}", e);
                    None
                }
            }
        }
        _ => None,
    }
}

/// Where the page is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    #[default]
    Web,
}

/// Result of native app detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NativeAppInfo {
    pub is_native: bool,
    pub platform: Platform,
    /// Served from a development host (counts as native "web")
    pub local_host: bool,
}

/// Inputs the detection reads from the page
#[derive(Debug, Clone, Default)]
pub struct DetectionInput<'a> {
    pub user_agent: &'a str,
    pub hostname: &'a str,
    /// `window.Android.receiveMessage` exists
    pub has_android_interface: bool,
    /// `window.webkit.messageHandlers.nativeApp` exists
    pub has_ios_handler: bool,
}

pub fn is_local_host(hostname: &str) -> bool {
    hostname == "localhost"
        || hostname == "127.0.0.1"
        || hostname.starts_with("192.168.")
        || hostname.starts_with("10.")
        || hostname.starts_with("172.")
}

/// Detect the native app from the user agent, host and injected interfaces
pub fn detect_native_app(input: &DetectionInput<'_>) -> NativeAppInfo {
    let ua = input.user_agent.to_lowercase();
    let local_host = is_local_host(input.hostname);

    let (is_native, platform) = if ua.contains("wv") && ua.contains("android") {
        (true, Platform::Android)
    } else if ua.contains("iphone") || ua.contains("ipad") {
        (true, Platform::Ios)
    } else if local_host {
        (true, Platform::Web)
    } else if input.has_android_interface {
        (true, Platform::Android)
    } else if input.has_ios_handler {
        (true, Platform::Ios)
    } else {
        (false, Platform::Web)
    };

    NativeAppInfo {
        is_native,
        platform,
        local_host,
    }
}

/// Outbound side of the bridge
pub trait NativeBridge {
    fn info(&self) -> NativeAppInfo;

    /// Deliver a message. Implementations drop it when no app is attached.
    fn send(&mut self, message: &NativeMessage) -> Result<()>;

    fn request_game_start(&mut self, timestamp: f64) -> Result<()> {
        self.send(&NativeMessage::game_start_request(timestamp))
    }

    fn notify_game_end(&mut self, score: u32, log_heart_id: Option<&str>, timestamp: f64) -> Result<()> {
        log::info!("GAME_END score={} log_heart_id={:?}", score, log_heart_id);
        self.send(&NativeMessage::game_end(score, log_heart_id, timestamp))
    }

    fn back_button_pressed(&mut self) -> Result<()> {
        self.send(&NativeMessage::new(MessageKind::BackButtonPressed))
    }
}

impl<T: NativeBridge + ?Sized> NativeBridge for Rc<RefCell<T>> {
    fn info(&self) -> NativeAppInfo {
        self.borrow().info()
    }

    fn send(&mut self, message: &NativeMessage) -> Result<()> {
        self.borrow_mut().send(message)
    }
}

/// Bridge that keeps every message it was asked to send
#[derive(Debug, Clone, Default)]
pub struct RecordingBridge {
    pub info: NativeAppInfo,
    pub sent: Vec<NativeMessage>,
}

impl RecordingBridge {
    pub fn new(info: NativeAppInfo) -> Self {
        Self { info, sent: Vec::new() }
    }

    /// Bridge on a regular browser (no app attached)
    pub fn browser() -> Self {
        Self::new(NativeAppInfo::default())
    }

    pub fn android() -> Self {
        Self::new(NativeAppInfo {
            is_native: true,
            platform: Platform::Android,
            local_host: false,
        })
    }

    pub fn kinds(&self) -> Vec<MessageKind> {
        self.sent.iter().map(|m| m.kind).collect()
    }
}

impl NativeBridge for RecordingBridge {
    fn info(&self) -> NativeAppInfo {
        self.info
    }

    fn send(&mut self, message: &NativeMessage) -> Result<()> {
        if !self.info.is_native {
            log::debug!("No native app, dropping {:?}", message.kind);
            return Ok(());
        }
        self.sent.push(message.clone());
        Ok(())
    }
}

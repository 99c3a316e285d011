//! Shared display state
//!
//! Brightness and active tab each sit behind their own lock. Every write,
//! and every explicit announce, broadcasts the current value to all clients;
//! there is no point-to-point reply.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::hub::Hub;
use crate::protocol::{ServerMessage, Tab};

pub const DEFAULT_BRIGHTNESS: u8 = 50;
pub const MAX_BRIGHTNESS: u8 = 100;

/// Accept a brightness only if it lies in `0..=100`
pub fn validate_brightness(value: i64) -> Option<u8> {
    u8::try_from(value).ok().filter(|v| *v <= MAX_BRIGHTNESS)
}

pub struct DisplayState {
    brightness: RwLock<u8>,
    tab: RwLock<Tab>,
    hub: Arc<Hub>,
}

impl DisplayState {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self {
            brightness: RwLock::new(DEFAULT_BRIGHTNESS),
            tab: RwLock::new(Tab::default()),
            hub,
        }
    }

    pub fn brightness(&self) -> u8 {
        *self.brightness.read()
    }

    /// Store a validated brightness and broadcast it
    pub async fn set_brightness(&self, value: u8) -> Result<()> {
        *self.brightness.write() = value;
        info!("Brightness set to {}", value);
        self.announce_brightness().await
    }

    /// Broadcast the current brightness
    pub async fn announce_brightness(&self) -> Result<()> {
        let brightness = self.brightness();
        self.hub
            .broadcast_message(&ServerMessage::BrightnessUpdate { brightness })
            .await
    }

    pub fn tab(&self) -> Tab {
        *self.tab.read()
    }

    /// Store a tab and broadcast it
    pub async fn set_tab(&self, tab: Tab) -> Result<()> {
        *self.tab.write() = tab;
        info!("Active tab set to {}", tab);
        self.announce_tab().await
    }

    /// Broadcast the current tab
    pub async fn announce_tab(&self) -> Result<()> {
        let tab = self.tab();
        self.hub
            .broadcast_message(&ServerMessage::TabUpdate { tab })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::config::SessionConfig;

    #[test]
    fn test_validate_brightness() {
        assert_eq!(validate_brightness(0), Some(0));
        assert_eq!(validate_brightness(100), Some(100));
        assert_eq!(validate_brightness(101), None);
        assert_eq!(validate_brightness(-1), None);
        assert_eq!(validate_brightness(i64::MAX), None);
    }

    #[tokio::test]
    async fn test_defaults() {
        let display = DisplayState::new(Hub::new());
        assert_eq!(display.brightness(), 50);
        assert_eq!(display.tab(), Tab::Clock);
    }

    #[tokio::test]
    async fn test_writes_broadcast() {
        let hub = Hub::new();
        hub.start();
        let (client, mut rx) = Client::new(&SessionConfig::default());
        hub.register(client).await;
        let display = DisplayState::new(hub);

        display.set_brightness(75).await.unwrap();
        display.set_tab(Tab::Settings).await.unwrap();
        display.announce_tab().await.unwrap();

        assert_eq!(display.brightness(), 75);
        assert_eq!(display.tab(), Tab::Settings);
        assert_eq!(
            rx.recv().await.unwrap(),
            r#"{"type":"brightness-update","brightness":75}"#
        );
        assert_eq!(rx.recv().await.unwrap(), r#"{"type":"tab-update","tab":"settings"}"#);
        assert_eq!(rx.recv().await.unwrap(), r#"{"type":"tab-update","tab":"settings"}"#);
    }
}

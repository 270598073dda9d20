// src/settings.rs
//! Runtime settings consumed by the engine
//!
//! Holds the overrides toggle and the header-overrides flag. Persistence lives
//! elsewhere; this type only carries the current values and announces changes.

use crate::utils::config::OverridesConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::info;

const SETTINGS_CHANNEL_CAPACITY: usize = 64;

/// Change notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsEvent {
    OverridesEnabledChanged(bool),
    HeaderOverridesChanged(bool),
}

/// Shared settings with change notifications
pub struct Settings {
    overrides_enabled: AtomicBool,
    header_overrides: AtomicBool,
    events: broadcast::Sender<SettingsEvent>,
}

impl Settings {
    pub fn new(overrides_enabled: bool, header_overrides: bool) -> Self {
        let (events, _) = broadcast::channel(SETTINGS_CHANNEL_CAPACITY);
        Self {
            overrides_enabled: AtomicBool::new(overrides_enabled),
            header_overrides: AtomicBool::new(header_overrides),
            events,
        }
    }

    pub fn from_config(config: &OverridesConfig) -> Self {
        Self::new(config.enabled, config.header_overrides)
    }

    pub fn overrides_enabled(&self) -> bool {
        self.overrides_enabled.load(Ordering::SeqCst)
    }

    pub fn header_overrides(&self) -> bool {
        self.header_overrides.load(Ordering::SeqCst)
    }

    /// Flip the overrides toggle, announcing it when the value changes
    pub fn set_overrides_enabled(&self, enabled: bool) {
        if self.overrides_enabled.swap(enabled, Ordering::SeqCst) != enabled {
            info!("Local overrides {}", if enabled { "enabled" } else { "disabled" });
            let _ = self
                .events
                .send(SettingsEvent::OverridesEnabledChanged(enabled));
        }
    }

    pub fn set_header_overrides(&self, enabled: bool) {
        if self.header_overrides.swap(enabled, Ordering::SeqCst) != enabled {
            info!("Header overrides {}", if enabled { "enabled" } else { "disabled" });
            let _ = self.events.send(SettingsEvent::HeaderOverridesChanged(enabled));
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SettingsEvent> {
        self.events.subscribe()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&OverridesConfig::default())
    }
}

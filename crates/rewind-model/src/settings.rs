//! User settings as persisted in the key/value store.
//!
//! The store holds flat keys (`enabled`, `showToast`, `toastPosition`, ...).
//! [`Settings`] is the validated view of those keys: absent or malformed
//! entries fall back to their defaults and numeric values are clamped every
//! time the view is built.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw key/value entries as read from or written to the store.
pub type Entries = Map<String, Value>;

pub const KEY_ENABLED: &str = "enabled";
pub const KEY_SHOW_TOAST: &str = "showToast";
pub const KEY_TOAST_POSITION: &str = "toastPosition";
pub const KEY_TOAST_SCALE: &str = "toastScale";
pub const KEY_TOAST_DURATION_MS: &str = "toastDurationMs";
pub const KEY_TOAST_BG_COLOR: &str = "toastBgColor";
pub const KEY_TOAST_TEXT_COLOR: &str = "toastTextColor";
pub const KEY_TOAST_ANIMATION_ENABLED: &str = "toastAnimationEnabled";
pub const KEY_TOAST_ANIMATION_DURATION_MS: &str = "toastAnimationDurationMs";

/// Every key the settings view reads.
pub const KEYS: &[&str] = &[
    KEY_ENABLED,
    KEY_SHOW_TOAST,
    KEY_TOAST_POSITION,
    KEY_TOAST_SCALE,
    KEY_TOAST_DURATION_MS,
    KEY_TOAST_BG_COLOR,
    KEY_TOAST_TEXT_COLOR,
    KEY_TOAST_ANIMATION_ENABLED,
    KEY_TOAST_ANIMATION_DURATION_MS,
];

const MIN_SCALE: f64 = 0.8;
const MAX_SCALE: f64 = 1.5;
const MIN_DURATION_SECS: f64 = 1.0;
const MAX_DURATION_SECS: f64 = 10.0;
const MIN_ANIMATION_MS: f64 = 100.0;
const MAX_ANIMATION_MS: f64 = 1000.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastPosition {
    Left,
    #[default]
    Center,
    Right,
}

/// Drop-in animation of the toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastAnimation {
    pub enabled: bool,
    /// Snapped to 10 ms steps, clamped to 100..=1000.
    pub duration_ms: u64,
}

impl Default for ToastAnimation {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_ms: 500,
        }
    }
}

/// `#rrggbb` colors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToastColors {
    pub background: String,
    pub foreground: String,
}

impl Default for ToastColors {
    fn default() -> Self {
        Self {
            background: "#141414".to_string(),
            foreground: "#ffffff".to_string(),
        }
    }
}

/// How the acknowledgment toast looks and how long it stays up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationStyle {
    pub position: ToastPosition,
    /// Display scale, clamped to 0.8..=1.5.
    pub scale: f64,
    pub colors: ToastColors,
    /// Visible time in whole seconds expressed as ms, clamped to 1000..=10000.
    pub duration_ms: u64,
    pub animation: ToastAnimation,
}

impl Default for NotificationStyle {
    fn default() -> Self {
        Self {
            position: ToastPosition::Center,
            scale: 1.0,
            colors: ToastColors::default(),
            duration_ms: 2000,
            animation: ToastAnimation::default(),
        }
    }
}

/// Immutable, validated settings view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub enabled: bool,
    pub show_notification: bool,
    pub notification: NotificationStyle,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            show_notification: true,
            notification: NotificationStyle::default(),
        }
    }
}

impl Settings {
    /// Build the view from raw store entries, applying defaults for absent
    /// keys. Unknown keys are ignored.
    pub fn from_entries(entries: &Entries) -> Self {
        let mut settings = Settings::default();
        for key in KEYS {
            settings.set_entry(key, entries.get(*key));
        }
        settings
    }

    /// A copy with the given keys replaced. `None` means the key was removed
    /// from the store and reverts to its default.
    pub fn with_changes<'a, I>(&self, changes: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<&'a Value>)>,
    {
        let mut next = self.clone();
        for (key, value) in changes {
            next.set_entry(key, value);
        }
        next
    }

    /// The store representation of this view.
    pub fn to_entries(&self) -> Entries {
        let style = &self.notification;
        let mut entries = Entries::new();
        entries.insert(KEY_ENABLED.into(), Value::Bool(self.enabled));
        entries.insert(KEY_SHOW_TOAST.into(), Value::Bool(self.show_notification));
        entries.insert(
            KEY_TOAST_POSITION.into(),
            serde_json::to_value(style.position).unwrap_or(Value::Null),
        );
        entries.insert(KEY_TOAST_SCALE.into(), Value::from(style.scale));
        entries.insert(KEY_TOAST_DURATION_MS.into(), Value::from(style.duration_ms));
        entries.insert(
            KEY_TOAST_BG_COLOR.into(),
            Value::String(style.colors.background.clone()),
        );
        entries.insert(
            KEY_TOAST_TEXT_COLOR.into(),
            Value::String(style.colors.foreground.clone()),
        );
        entries.insert(
            KEY_TOAST_ANIMATION_ENABLED.into(),
            Value::Bool(style.animation.enabled),
        );
        entries.insert(
            KEY_TOAST_ANIMATION_DURATION_MS.into(),
            Value::from(style.animation.duration_ms),
        );
        entries
    }

    pub fn is_known_key(key: &str) -> bool {
        KEYS.contains(&key)
    }

    fn set_entry(&mut self, key: &str, value: Option<&Value>) {
        let defaults = Settings::default();
        let style = &mut self.notification;
        match key {
            KEY_ENABLED => {
                self.enabled = value.and_then(Value::as_bool).unwrap_or(defaults.enabled);
            }
            KEY_SHOW_TOAST => {
                self.show_notification = value
                    .and_then(Value::as_bool)
                    .unwrap_or(defaults.show_notification);
            }
            KEY_TOAST_POSITION => {
                style.position = parse_enum(value).unwrap_or(defaults.notification.position);
            }
            KEY_TOAST_SCALE => {
                style.scale = value
                    .and_then(Value::as_f64)
                    .filter(|s| s.is_finite())
                    .map(|s| s.clamp(MIN_SCALE, MAX_SCALE))
                    .unwrap_or(defaults.notification.scale);
            }
            KEY_TOAST_DURATION_MS => {
                style.duration_ms = value
                    .and_then(Value::as_f64)
                    .and_then(clamp_duration_ms)
                    .unwrap_or(defaults.notification.duration_ms);
            }
            KEY_TOAST_BG_COLOR => {
                style.colors.background =
                    hex_color(value).unwrap_or(defaults.notification.colors.background);
            }
            KEY_TOAST_TEXT_COLOR => {
                style.colors.foreground =
                    hex_color(value).unwrap_or(defaults.notification.colors.foreground);
            }
            KEY_TOAST_ANIMATION_ENABLED => {
                style.animation.enabled = value
                    .and_then(Value::as_bool)
                    .unwrap_or(defaults.notification.animation.enabled);
            }
            KEY_TOAST_ANIMATION_DURATION_MS => {
                style.animation.duration_ms = value
                    .and_then(Value::as_f64)
                    .and_then(snap_animation_ms)
                    .unwrap_or(defaults.notification.animation.duration_ms);
            }
            _ => {}
        }
    }
}

/// Round to whole seconds, clamp to 1..=10 s, return milliseconds.
fn clamp_duration_ms(ms: f64) -> Option<u64> {
    if !ms.is_finite() {
        return None;
    }
    let secs = (ms / 1000.0)
        .round()
        .clamp(MIN_DURATION_SECS, MAX_DURATION_SECS);
    Some(secs as u64 * 1000)
}

/// Snap to 10 ms steps, clamp to 100..=1000 ms.
fn snap_animation_ms(ms: f64) -> Option<u64> {
    if !ms.is_finite() {
        return None;
    }
    let snapped = (ms / 10.0).round() * 10.0;
    Some(snapped.clamp(MIN_ANIMATION_MS, MAX_ANIMATION_MS) as u64)
}

fn parse_enum<T: serde::de::DeserializeOwned>(value: Option<&Value>) -> Option<T> {
    value.and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Accepts `#rrggbb` only.
fn hex_color(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| {
            s.len() == 7
                && s.starts_with('#')
                && s[1..].bytes().all(|b| b.is_ascii_hexdigit())
        })
        .map(str::to_string)
}

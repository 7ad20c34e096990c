//! Rich Presence Activity
//!
//! The activity is the value a client publishes: what the user is doing,
//! since when, and the images and buttons shown on their profile. It
//! serializes to the JSON layout the desktop client expects, with absent
//! fields omitted.
//!
//! # Example
//!
//! ```
//! use presence_core::activity::{Activity, ActivityType};
//!
//! let activity = Activity::builder()
//!     .kind(ActivityType::Listening)
//!     .details("Lo-fi beats")
//!     .state("Track 3 of 12")
//!     .started_now()
//!     .large_image("cover", "Album")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(activity.details.as_deref(), Some("Lo-fi beats"));
//! ```

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Accepted length of free-text fields (details, state, asset texts)
pub const TEXT_LEN: RangeInclusive<usize> = 1..=128;

/// Accepted length of asset keys and URLs
pub const ASSET_KEY_LEN: RangeInclusive<usize> = 1..=256;

/// Accepted length of party ids, secrets and emoji names
pub const ID_LEN: RangeInclusive<usize> = 1..=128;

/// Accepted length of button labels
pub const BUTTON_LABEL_LEN: RangeInclusive<usize> = 1..=32;

/// Accepted length of button and stream URLs
pub const BUTTON_URL_LEN: RangeInclusive<usize> = 1..=512;

/// Maximum number of buttons on one activity
pub const MAX_BUTTONS: usize = 2;

/// Activity flag bits, combined into [`Activity::flags`]
pub mod flags {
    /// Instanced game session
    pub const INSTANCE: u32 = 1;
    /// Party can be joined
    pub const JOIN: u32 = 1 << 1;
    /// Game can be spectated
    pub const SPECTATE: u32 = 1 << 2;
    /// Join requests are accepted
    pub const JOIN_REQUEST: u32 = 1 << 3;
    /// Listening-along sync
    pub const SYNC: u32 = 1 << 4;
    /// Play button shown
    pub const PLAY: u32 = 1 << 5;
    /// Party visible to friends only
    pub const PARTY_PRIVACY_FRIENDS: u32 = 1 << 6;
    /// Party visible to the voice channel only
    pub const PARTY_PRIVACY_VOICE_CHANNEL: u32 = 1 << 7;
    /// Embedded activity
    pub const EMBEDDED: u32 = 1 << 8;
}

// ============================================================================
// Errors
// ============================================================================

/// Activity validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivityError {
    /// A text field is outside its accepted length
    #[error("Field `{field}` must be {min}..={max} characters, got {len}")]
    FieldLength {
        /// JSON name of the field
        field: &'static str,
        /// Actual length in characters
        len: usize,
        /// Minimum accepted length
        min: usize,
        /// Maximum accepted length
        max: usize,
    },

    /// More buttons than the protocol accepts
    #[error("At most {max} buttons are allowed, got {count}")]
    TooManyButtons {
        /// Number of buttons supplied
        count: usize,
        /// Limit
        max: usize,
    },

    /// Party size is zero or current exceeds max
    #[error("Invalid party size {current}/{max}")]
    InvalidPartySize {
        /// Current member count
        current: u32,
        /// Maximum member count
        max: u32,
    },
}

fn check_len(
    field: &'static str,
    value: &str,
    range: &RangeInclusive<usize>,
) -> Result<(), ActivityError> {
    let len = value.chars().count();
    if range.contains(&len) {
        Ok(())
    } else {
        Err(ActivityError::FieldLength {
            field,
            len,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

fn check_opt(
    field: &'static str,
    value: Option<&String>,
    range: &RangeInclusive<usize>,
) -> Result<(), ActivityError> {
    value.map_or(Ok(()), |v| check_len(field, v, range))
}

// ============================================================================
// Activity Type
// ============================================================================

/// Kind of activity; serialized as its integer code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ActivityType {
    /// "Playing ..."
    #[default]
    Game,
    /// "Streaming ..."
    Streaming,
    /// "Listening to ..."
    Listening,
    /// "Watching ..."
    Watching,
    /// Custom status
    Custom,
    /// "Competing in ..."
    Competing,
}

impl ActivityType {
    /// Integer code on the wire
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Game => 0,
            Self::Streaming => 1,
            Self::Listening => 2,
            Self::Watching => 3,
            Self::Custom => 4,
            Self::Competing => 5,
        }
    }

    /// Map a wire code back to a type
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Game),
            1 => Some(Self::Streaming),
            2 => Some(Self::Listening),
            3 => Some(Self::Watching),
            4 => Some(Self::Custom),
            5 => Some(Self::Competing),
            _ => None,
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Game => "game",
            Self::Streaming => "streaming",
            Self::Listening => "listening",
            Self::Watching => "watching",
            Self::Custom => "custom",
            Self::Competing => "competing",
        };
        f.write_str(name)
    }
}

impl Serialize for ActivityType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for ActivityType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown activity type {code}")))
    }
}

// ============================================================================
// Components
// ============================================================================

/// Start and end of the activity, in Unix epoch milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    /// When the activity started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,

    /// When the activity will end
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<u64>,
}

impl Timestamps {
    /// Timestamps starting at the current time
    #[must_use]
    pub fn now() -> Self {
        Self::starting_at(epoch_millis())
    }

    /// Timestamps starting at `start` epoch milliseconds
    #[must_use]
    pub fn starting_at(start: u64) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Set the end time
    #[must_use]
    pub fn ending_at(mut self, end: u64) -> Self {
        self.end = Some(end);
        self
    }
}

/// Current Unix time in milliseconds
#[must_use]
pub fn epoch_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Party the user is in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// Party identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// `[current, max]` member counts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<(u32, u32)>,
}

/// Images and their hover texts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assets {
    /// Large image key or URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_image: Option<String>,

    /// Hover text of the large image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_text: Option<String>,

    /// Small image key or URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_image: Option<String>,

    /// Hover text of the small image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_text: Option<String>,
}

/// Join and spectate secrets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secrets {
    /// Secret for joining the party
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,

    /// Secret for spectating
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectate: Option<String>,

    /// Secret for a specific match
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_secret: Option<String>,
}

/// Emoji of a custom status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emoji {
    /// Unicode emoji or custom emoji name
    pub name: String,

    /// Custom emoji id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    /// Whether the custom emoji is animated
    #[serde(default)]
    pub animated: bool,
}

impl Emoji {
    /// A unicode emoji
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            animated: false,
        }
    }
}

/// Clickable link shown under the activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Button text
    pub label: String,
    /// Target URL
    pub url: String,
}

impl Button {
    /// Create a button
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

// ============================================================================
// Activity
// ============================================================================

/// A rich presence activity
///
/// Two activities are equal when every field is equal; the client uses this
/// to skip redundant updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Kind of activity
    #[serde(rename = "type", default)]
    pub kind: ActivityType,

    /// Stream URL, shown with [`ActivityType::Streaming`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Application the activity belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<u64>,

    /// First line under the application name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    /// Second line, usually party status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Emoji of a [`ActivityType::Custom`] status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<Emoji>,

    /// Elapsed / remaining time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Timestamps>,

    /// Party information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<Party>,

    /// Images
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<Assets>,

    /// Join / spectate secrets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Secrets>,

    /// Whether this is an instanced game session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<bool>,

    /// Bits from [`flags`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,

    /// Up to two link buttons
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<Button>>,
}

impl Activity {
    /// Start building an activity
    #[must_use]
    pub fn builder() -> ActivityBuilder {
        ActivityBuilder::default()
    }

    /// Check every field against the protocol limits
    ///
    /// # Errors
    ///
    /// Returns the first violated limit.
    pub fn validate(&self) -> Result<(), ActivityError> {
        check_opt("details", self.details.as_ref(), &TEXT_LEN)?;
        check_opt("state", self.state.as_ref(), &TEXT_LEN)?;
        check_opt("url", self.url.as_ref(), &BUTTON_URL_LEN)?;
        if let Some(emoji) = &self.emoji {
            check_len("emoji.name", &emoji.name, &ID_LEN)?;
        }

        if let Some(party) = &self.party {
            check_opt("party.id", party.id.as_ref(), &ID_LEN)?;
            if let Some((current, max)) = party.size {
                if current == 0 || current > max {
                    return Err(ActivityError::InvalidPartySize { current, max });
                }
            }
        }

        if let Some(assets) = &self.assets {
            check_opt("assets.large_image", assets.large_image.as_ref(), &ASSET_KEY_LEN)?;
            check_opt("assets.large_text", assets.large_text.as_ref(), &TEXT_LEN)?;
            check_opt("assets.small_image", assets.small_image.as_ref(), &ASSET_KEY_LEN)?;
            check_opt("assets.small_text", assets.small_text.as_ref(), &TEXT_LEN)?;
        }

        if let Some(secrets) = &self.secrets {
            check_opt("secrets.join", secrets.join.as_ref(), &ID_LEN)?;
            check_opt("secrets.spectate", secrets.spectate.as_ref(), &ID_LEN)?;
            check_opt("secrets.match", secrets.match_secret.as_ref(), &ID_LEN)?;
        }

        if let Some(buttons) = &self.buttons {
            if buttons.len() > MAX_BUTTONS {
                return Err(ActivityError::TooManyButtons {
                    count: buttons.len(),
                    max: MAX_BUTTONS,
                });
            }
            for button in buttons {
                check_len("buttons.label", &button.label, &BUTTON_LABEL_LEN)?;
                check_len("buttons.url", &button.url, &BUTTON_URL_LEN)?;
            }
        }

        Ok(())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Chained construction of an [`Activity`]
#[derive(Debug, Clone, Default)]
pub struct ActivityBuilder {
    activity: Activity,
}

impl ActivityBuilder {
    /// Set the activity type
    #[must_use]
    pub fn kind(mut self, kind: ActivityType) -> Self {
        self.activity.kind = kind;
        self
    }

    /// Set the stream URL
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.activity.url = Some(url.into());
        self
    }

    /// Set the owning application id
    #[must_use]
    pub fn application_id(mut self, id: u64) -> Self {
        self.activity.application_id = Some(id);
        self
    }

    /// Set the custom status emoji
    #[must_use]
    pub fn emoji(mut self, emoji: Emoji) -> Self {
        self.activity.emoji = Some(emoji);
        self
    }

    /// Set the flag bits
    #[must_use]
    pub fn flags(mut self, bits: u32) -> Self {
        self.activity.flags = Some(bits);
        self
    }

    /// Set the details line
    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.activity.details = Some(details.into());
        self
    }

    /// Set the state line
    #[must_use]
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.activity.state = Some(state.into());
        self
    }

    /// Set explicit timestamps
    #[must_use]
    pub fn timestamps(mut self, timestamps: Timestamps) -> Self {
        self.activity.timestamps = Some(timestamps);
        self
    }

    /// Start the elapsed timer at the current time
    #[must_use]
    pub fn started_now(self) -> Self {
        self.timestamps(Timestamps::now())
    }

    /// Set the party id and size
    #[must_use]
    pub fn party(mut self, id: impl Into<String>, current: u32, max: u32) -> Self {
        self.activity.party = Some(Party {
            id: Some(id.into()),
            size: Some((current, max)),
        });
        self
    }

    /// Set the large image and its hover text
    #[must_use]
    pub fn large_image(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        let assets = self.activity.assets.get_or_insert_with(Assets::default);
        assets.large_image = Some(key.into());
        assets.large_text = Some(text.into());
        self
    }

    /// Set all image fields at once
    #[must_use]
    pub fn assets(mut self, assets: Assets) -> Self {
        self.activity.assets = Some(assets);
        self
    }

    /// Set the small image and its hover text
    #[must_use]
    pub fn small_image(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        let assets = self.activity.assets.get_or_insert_with(Assets::default);
        assets.small_image = Some(key.into());
        assets.small_text = Some(text.into());
        self
    }

    /// Set the join / spectate / match secrets
    #[must_use]
    pub fn secrets(mut self, secrets: Secrets) -> Self {
        self.activity.secrets = Some(secrets);
        self
    }

    /// Mark the activity as an instanced session
    #[must_use]
    pub fn instance(mut self, instance: bool) -> Self {
        self.activity.instance = Some(instance);
        self
    }

    /// Append a link button
    #[must_use]
    pub fn button(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.activity
            .buttons
            .get_or_insert_with(Vec::new)
            .push(Button::new(label, url));
        self
    }

    /// Validate and return the activity
    ///
    /// # Errors
    ///
    /// Returns the first violated limit, see [`Activity::validate`].
    pub fn build(self) -> Result<Activity, ActivityError> {
        self.activity.validate()?;
        Ok(self.activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_minimal_activity_json() {
        let activity = Activity::builder().details("x").build().unwrap();
        let json = serde_json::to_value(&activity).unwrap();

        assert_eq!(json, serde_json::json!({"type": 0, "details": "x"}));
    }

    #[test]
    fn test_streaming_and_custom_fields() {
        let stream = Activity::builder()
            .kind(ActivityType::Streaming)
            .details("Speedrun")
            .url("https://twitch.tv/someone")
            .application_id(42)
            .flags(flags::INSTANCE | flags::PLAY)
            .build()
            .unwrap();
        assert_eq!(
            serde_json::to_value(&stream).unwrap(),
            serde_json::json!({
                "type": 1,
                "url": "https://twitch.tv/someone",
                "application_id": 42,
                "details": "Speedrun",
                "flags": 33
            })
        );

        let status = Activity::builder()
            .kind(ActivityType::Custom)
            .state("Out for lunch")
            .emoji(Emoji::new("🍜"))
            .build()
            .unwrap();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["emoji"], serde_json::json!({"name": "🍜", "animated": false}));
        let parsed: Activity = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, status);
    }

    #[test]
    fn test_stream_url_and_emoji_limits() {
        let err = Activity::builder().url("").build().unwrap_err();
        assert!(matches!(err, ActivityError::FieldLength { field: "url", .. }));

        let err = Activity::builder()
            .url(format!("https://{}", "a".repeat(512)))
            .build()
            .unwrap_err();
        assert!(matches!(err, ActivityError::FieldLength { field: "url", .. }));

        let err = Activity::builder().emoji(Emoji::new("")).build().unwrap_err();
        assert!(matches!(
            err,
            ActivityError::FieldLength {
                field: "emoji.name",
                ..
            }
        ));
    }

    #[test]
    fn test_full_activity_json_layout() {
        let activity = Activity::builder()
            .kind(ActivityType::Competing)
            .details("Ranked")
            .state("In queue")
            .timestamps(Timestamps::starting_at(1_000).ending_at(2_000))
            .party("lobby-1", 2, 5)
            .large_image("map", "Dust")
            .small_image("rank", "Gold")
            .secrets(Secrets {
                join: Some("j".into()),
                spectate: None,
                match_secret: Some("m".into()),
            })
            .instance(true)
            .button("Site", "https://example.com")
            .build()
            .unwrap();

        let json = serde_json::to_value(&activity).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": 5,
                "details": "Ranked",
                "state": "In queue",
                "timestamps": {"start": 1000, "end": 2000},
                "party": {"id": "lobby-1", "size": [2, 5]},
                "assets": {
                    "large_image": "map",
                    "large_text": "Dust",
                    "small_image": "rank",
                    "small_text": "Gold"
                },
                "secrets": {"join": "j", "match": "m"},
                "instance": true,
                "buttons": [{"label": "Site", "url": "https://example.com"}]
            })
        );

        let parsed: Activity = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, activity);
    }

    #[test]
    fn test_activity_type_codes() {
        for code in 0..=5 {
            let kind = ActivityType::from_code(code).unwrap();
            assert_eq!(kind.code(), code);
        }
        assert!(ActivityType::from_code(6).is_none());
        assert!(serde_json::from_str::<ActivityType>("9").is_err());
    }

    #[test]
    fn test_structural_equality() {
        let a = Activity::builder().details("same").build().unwrap();
        let b = Activity::builder().details("same").build().unwrap();
        let c = Activity::builder().details("other").build().unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_text_length_limits() {
        assert!(Activity::builder().details("x").build().is_ok());

        let err = Activity::builder().details("").build().unwrap_err();
        assert_eq!(
            err,
            ActivityError::FieldLength {
                field: "details",
                len: 0,
                min: 1,
                max: 128
            }
        );

        let long = "a".repeat(129);
        assert!(Activity::builder().state(long).build().is_err());
        assert!(Activity::builder().state("a".repeat(128)).build().is_ok());
    }

    #[test]
    fn test_length_counts_characters() {
        // 64 two-byte characters
        let text = "é".repeat(64);
        assert!(Activity::builder().details(text).build().is_ok());
    }

    #[test]
    fn test_button_limits() {
        let err = Activity::builder()
            .button("a", "https://a")
            .button("b", "https://b")
            .button("c", "https://c")
            .build()
            .unwrap_err();
        assert_eq!(err, ActivityError::TooManyButtons { count: 3, max: 2 });

        let err = Activity::builder()
            .button("x".repeat(33), "https://a")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ActivityError::FieldLength {
                field: "buttons.label",
                ..
            }
        ));
    }

    #[test]
    fn test_party_size_limits() {
        assert_eq!(
            Activity::builder().party("p", 0, 4).build().unwrap_err(),
            ActivityError::InvalidPartySize { current: 0, max: 4 }
        );
        assert!(Activity::builder().party("p", 5, 4).build().is_err());
        assert!(Activity::builder().party("p", 4, 4).build().is_ok());
    }

    #[test]
    fn test_timestamps_now_is_epoch_millis() {
        let before = epoch_millis();
        let ts = Timestamps::now();
        let after = epoch_millis();

        let start = ts.start.unwrap();
        assert!(start >= before && start <= after);
        assert!(ts.end.is_none());
    }
}

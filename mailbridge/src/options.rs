//! Provider-agnostic send options and layered defaults
//!
//! [`SendOptions`] carries the extra features an ESP can attach to a
//! message beyond its MIME content: metadata, tags, tracking flags, a
//! scheduled send time, and raw provider-specific parameters.
//!
//! Options resolve across three layers before a backend builds its
//! payload: global send defaults, provider-specific send defaults, and
//! the per-message options. Provider defaults replace global defaults
//! per option; message options then merge in: metadata and extras
//! shallow-merge key-wise with the message winning, tags concatenate,
//! and scalar options are overridden when the message sets them.

use std::fmt;

use chrono::{
    DateTime, FixedOffset, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EmailError;

/// When the ESP should release a scheduled message
///
/// All variants normalize to UTC epoch seconds. Timezone-naive values
/// are interpreted in the caller's local timezone; date-only values
/// mean local midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SendAt {
    /// Timezone-aware timestamp
    DateTime(DateTime<FixedOffset>),
    /// Timezone-naive timestamp, assumed local
    Naive(NaiveDateTime),
    /// Date only, meaning local midnight
    Date(NaiveDate),
    /// Epoch seconds, used verbatim
    Timestamp(i64),
}

impl SendAt {
    /// UTC epoch seconds, interpreting naive values in `local`
    ///
    /// Sub-second precision is dropped.
    #[must_use]
    pub fn epoch_seconds_in<Tz: TimeZone>(&self, local: &Tz) -> i64 {
        match self {
            Self::DateTime(dt) => dt.timestamp(),
            Self::Naive(naive) => resolve_local(local, *naive).timestamp(),
            Self::Date(date) => resolve_local(local, date.and_time(NaiveTime::MIN)).timestamp(),
            Self::Timestamp(ts) => *ts,
        }
    }

    /// UTC epoch seconds, interpreting naive values in the system
    /// local timezone
    #[must_use]
    pub fn epoch_seconds(&self) -> i64 {
        self.epoch_seconds_in(&Local)
    }
}

// DST gaps have no local representation; fall back to reading the
// naive value as UTC rather than failing the send.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
        LocalResult::None => tz.from_utc_datetime(&naive),
    }
}

impl From<DateTime<FixedOffset>> for SendAt {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Self::DateTime(dt)
    }
}

impl From<DateTime<Utc>> for SendAt {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt.fixed_offset())
    }
}

impl From<NaiveDateTime> for SendAt {
    fn from(naive: NaiveDateTime) -> Self {
        Self::Naive(naive)
    }
}

impl From<NaiveDate> for SendAt {
    fn from(date: NaiveDate) -> Self {
        Self::Date(date)
    }
}

impl From<i64> for SendAt {
    fn from(ts: i64) -> Self {
        Self::Timestamp(ts)
    }
}

/// ESP features attached to a message beyond its MIME content
///
/// Also used as the global and provider-specific default layers; see
/// [`SendOptions::resolve`].
///
/// # Examples
///
/// ```rust
/// use mailbridge::options::SendOptions;
///
/// let options = SendOptions::new()
///     .metadata("user_id", "12345")
///     .tag("receipt")
///     .track_opens(true);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendOptions {
    /// String-keyed metadata forwarded to the ESP
    pub metadata: Map<String, Value>,

    /// Tags for categorizing the message in ESP reporting
    pub tags: Vec<String>,

    /// Enable or disable click tracking; `None` leaves the ESP
    /// account default in place
    pub track_clicks: Option<bool>,

    /// Enable or disable open tracking; `None` leaves the ESP
    /// account default in place
    pub track_opens: Option<bool>,

    /// Scheduled send time
    pub send_at: Option<SendAt>,

    /// Raw provider-specific parameters, merged into the request on
    /// top of everything this crate generates
    pub extra: Map<String, Value>,
}

impl SendOptions {
    /// Create empty options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no option is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
            && self.tags.is_empty()
            && self.track_clicks.is_none()
            && self.track_opens.is_none()
            && self.send_at.is_none()
            && self.extra.is_empty()
    }

    /// Add a metadata entry
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Add a metadata entry from arbitrary serializable data
    ///
    /// # Errors
    ///
    /// Returns [`EmailError::Serialization`] when the value cannot be
    /// represented as JSON; the message names the offending key and
    /// value alongside the encoder's own message.
    pub fn try_metadata<T: Serialize + fmt::Debug>(
        mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self, EmailError> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|e| {
            EmailError::serialization(
                format!("metadata value for {key:?} is not JSON-serializable ({value:?})"),
                e,
            )
        })?;
        self.metadata.insert(key, value);
        Ok(self)
    }

    /// Add a tag
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add multiple tags
    #[must_use]
    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Enable or disable click tracking
    #[must_use]
    pub fn track_clicks(mut self, enabled: bool) -> Self {
        self.track_clicks = Some(enabled);
        self
    }

    /// Enable or disable open tracking
    #[must_use]
    pub fn track_opens(mut self, enabled: bool) -> Self {
        self.track_opens = Some(enabled);
        self
    }

    /// Schedule the send
    #[must_use]
    pub fn send_at(mut self, at: impl Into<SendAt>) -> Self {
        self.send_at = Some(at.into());
        self
    }

    /// Add a raw provider-specific parameter
    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Add a raw provider-specific parameter from arbitrary
    /// serializable data
    ///
    /// # Errors
    ///
    /// Returns [`EmailError::Serialization`] when the value cannot be
    /// represented as JSON.
    pub fn try_extra<T: Serialize + fmt::Debug>(
        mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self, EmailError> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|e| {
            EmailError::serialization(
                format!("extra value for {key:?} is not JSON-serializable ({value:?})"),
                e,
            )
        })?;
        self.extra.insert(key, value);
        Ok(self)
    }

    /// Combine two default layers: options `other` sets replace this
    /// layer's values for those options wholesale
    ///
    /// Used for provider-specific defaults over global defaults. An
    /// unset option (empty collection, `None` scalar) leaves the less
    /// specific layer's value in place.
    #[must_use]
    pub fn overridden_by(&self, other: &Self) -> Self {
        Self {
            metadata: if other.metadata.is_empty() {
                self.metadata.clone()
            } else {
                other.metadata.clone()
            },
            tags: if other.tags.is_empty() {
                self.tags.clone()
            } else {
                other.tags.clone()
            },
            track_clicks: other.track_clicks.or(self.track_clicks),
            track_opens: other.track_opens.or(self.track_opens),
            send_at: other.send_at.clone().or_else(|| self.send_at.clone()),
            extra: if other.extra.is_empty() {
                self.extra.clone()
            } else {
                other.extra.clone()
            },
        }
    }

    /// Merge these per-message options into resolved defaults
    ///
    /// Metadata and extras shallow-merge key-wise with the message
    /// winning on collisions; tags concatenate (defaults first);
    /// scalar options use the message value when set.
    #[must_use]
    pub fn merged_into_defaults(&self, defaults: &Self) -> Self {
        let mut metadata = defaults.metadata.clone();
        metadata.extend(self.metadata.clone());

        let mut tags = defaults.tags.clone();
        tags.extend(self.tags.iter().cloned());

        let mut extra = defaults.extra.clone();
        extra.extend(self.extra.clone());

        Self {
            metadata,
            tags,
            track_clicks: self.track_clicks.or(defaults.track_clicks),
            track_opens: self.track_opens.or(defaults.track_opens),
            send_at: self.send_at.clone().or_else(|| defaults.send_at.clone()),
            extra,
        }
    }

    /// Resolve the three option layers into the set a backend builds
    /// its payload from
    #[must_use]
    pub fn resolve(global: &Self, provider: &Self, message: &Self) -> Self {
        message.merged_into_defaults(&global.overridden_by(provider))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    fn utc_plus_6() -> FixedOffset {
        FixedOffset::east_opt(6 * 3600).unwrap()
    }

    #[test]
    fn aware_timestamp_converts_to_utc_epoch() {
        // 05:06:07 at UTC-8 is 13:06:07 UTC
        let utc_minus_8 = FixedOffset::west_opt(8 * 3600).unwrap();
        let at: SendAt = utc_minus_8
            .with_ymd_and_hms(2016, 3, 4, 5, 6, 7)
            .unwrap()
            .into();
        let expected = Utc.with_ymd_and_hms(2016, 3, 4, 13, 6, 7).unwrap().timestamp();
        assert_eq!(at.epoch_seconds_in(&utc_plus_6()), expected);
        // The local timezone plays no part in the aware case
        assert_eq!(at.epoch_seconds_in(&Utc), expected);
    }

    #[test]
    fn naive_timestamp_assumed_local_and_truncated() {
        // 12:13:14.000567 at UTC+6 is 06:13:14 UTC, microseconds dropped
        let naive = NaiveDate::from_ymd_opt(2022, 10, 11)
            .unwrap()
            .and_hms_micro_opt(12, 13, 14, 567)
            .unwrap();
        let at = SendAt::from(naive);
        let expected = Utc.with_ymd_and_hms(2022, 10, 11, 6, 13, 14).unwrap().timestamp();
        assert_eq!(at.epoch_seconds_in(&utc_plus_6()), expected);
    }

    #[test]
    fn date_only_means_local_midnight() {
        // Midnight Oct 22 at UTC+6 is 18:00 Oct 21 UTC
        let at = SendAt::from(NaiveDate::from_ymd_opt(2022, 10, 22).unwrap());
        let expected = Utc.with_ymd_and_hms(2022, 10, 21, 18, 0, 0).unwrap().timestamp();
        assert_eq!(at.epoch_seconds_in(&utc_plus_6()), expected);
    }

    #[test]
    fn epoch_timestamp_passes_through() {
        let at = SendAt::from(1_651_820_889_i64);
        assert_eq!(at.epoch_seconds_in(&utc_plus_6()), 1_651_820_889);
    }

    #[test]
    fn builder_collects_options() {
        let options = SendOptions::new()
            .metadata("user_id", "12345")
            .metadata("items", 6)
            .tags(["receipt", "repeat-user"])
            .track_clicks(false)
            .track_opens(true)
            .extra("newthing", "value");
        assert_eq!(options.metadata["user_id"], "12345");
        assert_eq!(options.metadata["items"], 6);
        assert_eq!(options.tags, vec!["receipt", "repeat-user"]);
        assert_eq!(options.track_clicks, Some(false));
        assert_eq!(options.track_opens, Some(true));
        assert!(!options.is_empty());
        assert!(SendOptions::new().is_empty());
    }

    #[test]
    fn try_metadata_rejects_unencodable_values() {
        // Maps without string keys have no JSON representation
        let bad: HashMap<(u8, u8), &str> = HashMap::from([((1, 2), "x")]);
        let err = SendOptions::new().try_metadata("total", &bad).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("metadata value for \"total\" is not JSON-serializable"));
        assert!(text.contains("key must be a string"));
    }

    #[test]
    fn try_metadata_accepts_ordinary_data() {
        let options = SendOptions::new().try_metadata("count", &7_u32).unwrap();
        assert_eq!(options.metadata["count"], 7);
    }

    #[test]
    fn provider_defaults_replace_global_per_option() {
        let global = SendOptions::new()
            .metadata("global", "globalvalue")
            .metadata("other", "othervalue")
            .tag("globaltag")
            .track_clicks(true)
            .track_opens(true)
            .extra("globaloption", "globalsetting");
        let provider = SendOptions::new()
            .metadata("esp", "espvalue")
            .tag("esptag")
            .track_opens(false);

        let combined = global.overridden_by(&provider);
        // Options the provider layer sets are swapped wholesale
        assert_eq!(combined.metadata, provider.metadata);
        assert_eq!(combined.tags, vec!["esptag"]);
        assert_eq!(combined.track_opens, Some(false));
        // Options it leaves unset fall through to the global layer
        assert_eq!(combined.track_clicks, Some(true));
        assert_eq!(combined.extra["globaloption"], "globalsetting");
    }

    #[test]
    fn message_options_merge_into_defaults() {
        let defaults = SendOptions::new()
            .metadata("global", "globalvalue")
            .metadata("other", "othervalue")
            .tag("globaltag")
            .track_clicks(true)
            .track_opens(true);
        let message = SendOptions::new()
            .metadata("message", "messagevalue")
            .metadata("other", "override")
            .tag("messagetag")
            .track_clicks(false);

        let resolved = message.merged_into_defaults(&defaults);
        assert_eq!(
            Value::Object(resolved.metadata),
            json!({
                "global": "globalvalue",
                "message": "messagevalue",
                "other": "override",
            })
        );
        assert_eq!(resolved.tags, vec!["globaltag", "messagetag"]);
        assert_eq!(resolved.track_clicks, Some(false));
        assert_eq!(resolved.track_opens, Some(true));
    }

    #[test]
    fn resolve_applies_all_three_layers() {
        let global = SendOptions::new().tag("d").metadata("scope", "global");
        let provider = SendOptions::new().tag("c");
        let message = SendOptions::new().tags(["a", "b"]);

        let resolved = SendOptions::resolve(&global, &provider, &message);
        // Provider tags replaced the global list, then message tags
        // concatenated onto them
        assert_eq!(resolved.tags, vec!["c", "a", "b"]);
        // Metadata untouched by provider layer survives from global
        assert_eq!(resolved.metadata["scope"], "global");
    }
}

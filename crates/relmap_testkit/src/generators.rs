//! Property-based test generators using proptest.
//!
//! Strategies only produce values every engine stores exactly: finite
//! doubles and printable text.

use crate::records::Sample;
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

/// Strategy for printable text, possibly empty.
pub fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("\\PC{0,40}").expect("Invalid regex")
}

/// Strategy for identifier-like names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for finite doubles.
pub fn double_strategy() -> impl Strategy<Value = f64> {
    prop::num::f64::NORMAL | prop::num::f64::ZERO | prop::num::f64::SUBNORMAL
}

/// Strategy for UTC timestamps between 1970 and 2100, nanosecond precision.
pub fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_102_444_800, 0u32..1_000_000_000).prop_map(|(secs, nanos)| {
        Utc.timestamp_opt(secs, nanos)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    })
}

/// Values for every column of [`Sample`] except the key.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleValues {
    /// Text.
    pub text: String,
    /// 32-bit integer.
    pub small: i32,
    /// 64-bit integer.
    pub big: i64,
    /// Boolean.
    pub flag: bool,
    /// Double.
    pub ratio: f64,
    /// Timestamp.
    pub at: DateTime<Utc>,
    /// Nullable text.
    pub maybe_text: Option<String>,
    /// Nullable 32-bit integer.
    pub maybe_small: Option<i32>,
    /// Nullable 64-bit integer.
    pub maybe_big: Option<i64>,
    /// Nullable boolean.
    pub maybe_flag: Option<bool>,
    /// Nullable double.
    pub maybe_ratio: Option<f64>,
    /// Nullable timestamp.
    pub maybe_at: Option<DateTime<Utc>>,
}

impl SampleValues {
    /// Writes the values into `sample`.
    pub fn apply(&self, sample: &mut Sample) {
        sample.text.set(self.text.clone());
        sample.small.set(self.small);
        sample.big.set(self.big);
        sample.flag.set(self.flag);
        sample.ratio.set(self.ratio);
        sample.at.set(self.at);
        sample.maybe_text.set(self.maybe_text.clone());
        sample.maybe_small.set(self.maybe_small);
        sample.maybe_big.set(self.maybe_big);
        sample.maybe_flag.set(self.maybe_flag);
        sample.maybe_ratio.set(self.maybe_ratio);
        sample.maybe_at.set(self.maybe_at);
    }

    /// Reads the current values out of `sample`.
    #[must_use]
    pub fn read(sample: &Sample) -> Self {
        Self {
            text: sample.text.get().clone(),
            small: *sample.small.get(),
            big: *sample.big.get(),
            flag: *sample.flag.get(),
            ratio: *sample.ratio.get(),
            at: *sample.at.get(),
            maybe_text: sample.maybe_text.get().clone(),
            maybe_small: *sample.maybe_small.get(),
            maybe_big: *sample.maybe_big.get(),
            maybe_flag: *sample.maybe_flag.get(),
            maybe_ratio: *sample.maybe_ratio.get(),
            maybe_at: *sample.maybe_at.get(),
        }
    }
}

/// Strategy for [`SampleValues`].
pub fn sample_values_strategy() -> impl Strategy<Value = SampleValues> {
    let required = (
        text_strategy(),
        any::<i32>(),
        any::<i64>(),
        any::<bool>(),
        double_strategy(),
        timestamp_strategy(),
    );
    let optional = (
        prop::option::of(text_strategy()),
        prop::option::of(any::<i32>()),
        prop::option::of(any::<i64>()),
        prop::option::of(any::<bool>()),
        prop::option::of(double_strategy()),
        prop::option::of(timestamp_strategy()),
    );
    (required, optional).prop_map(
        |(
            (text, small, big, flag, ratio, at),
            (maybe_text, maybe_small, maybe_big, maybe_flag, maybe_ratio, maybe_at),
        )| SampleValues {
            text,
            small,
            big,
            flag,
            ratio,
            at,
            maybe_text,
            maybe_small,
            maybe_big,
            maybe_flag,
            maybe_ratio,
            maybe_at,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn doubles_are_finite(d in double_strategy()) {
            prop_assert!(d.is_finite());
        }

        #[test]
        fn applied_values_read_back(values in sample_values_strategy()) {
            let mut sample = Sample::default();
            values.apply(&mut sample);
            prop_assert_eq!(SampleValues::read(&sample), values);
        }
    }
}

/*
    Copyright 2025 MydriaTech AB

    Licensed under the Apache License 2.0 with Free world makers exception
    1.0.0 (the "License"); you may not use this file except in compliance with
    the License. You should have obtained a copy of the License with the source
    or binary distribution in file named

        LICENSE-Apache-2.0-with-FWM-Exception-1.0.0

    Unless required by applicable law or agreed to in writing, software
    distributed under the License is distributed on an "AS IS" BASIS,
    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    See the License for the specific language governing permissions and
    limitations under the License.
*/

//! Sequence identities, value domains and generator configuration.

use crate::SeqgenError;
use crate::SeqgenErrorKind;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// Schema and sequence name pair that identifies a sequence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceIdentity {
    schema_name: String,
    sequence_name: String,
}

impl SequenceIdentity {
    /// Return a new instance.
    pub fn new(schema_name: &str, sequence_name: &str) -> Self {
        Self {
            schema_name: schema_name.to_string(),
            sequence_name: sequence_name.to_string(),
        }
    }

    /// Name of the schema the sequence belongs to.
    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// Name of the sequence within its schema.
    pub fn sequence_name(&self) -> &str {
        &self.sequence_name
    }
}

impl fmt::Display for SequenceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.schema_name, self.sequence_name)
    }
}

/// Declared SQL type of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceDataType {
    /// 16-bit signed integer.
    SmallInt,
    /// 32-bit signed integer.
    #[default]
    Integer,
    /// 64-bit signed integer.
    BigInt,
}

impl SequenceDataType {
    /// Smallest value the type can hold.
    pub fn min_value(&self) -> i64 {
        match self {
            Self::SmallInt => i64::from(i16::MIN),
            Self::Integer => i64::from(i32::MIN),
            Self::BigInt => i64::MIN,
        }
    }

    /// Largest value the type can hold.
    pub fn max_value(&self) -> i64 {
        match self {
            Self::SmallInt => i64::from(i16::MAX),
            Self::Integer => i64::from(i32::MAX),
            Self::BigInt => i64::MAX,
        }
    }
}

/** Validated and immutable configuration of a sequence generator.

All values live in the signed 64-bit domain. Narrower SQL types are expressed
through `min_value` and `max_value`.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceConfig {
    increment: i64,
    min_value: i64,
    max_value: i64,
    can_cycle: bool,
    restart_value: i64,
}

impl SequenceConfig {
    /// Return a new instance or a [SeqgenErrorKind::Malformed] error if the
    /// combination of values is unusable.
    pub fn new(
        increment: i64,
        min_value: i64,
        max_value: i64,
        can_cycle: bool,
        restart_value: i64,
    ) -> Result<Self, SeqgenError> {
        if increment == 0 {
            Err(SeqgenErrorKind::Malformed.error_with_msg("Increment must not be zero."))?;
        }
        if min_value >= max_value {
            Err(SeqgenErrorKind::Malformed.error_with_msg(format!(
                "Min value {min_value} must be less than max value {max_value}."
            )))?;
        }
        if increment.unsigned_abs() > max_value.abs_diff(min_value) {
            Err(SeqgenErrorKind::Malformed.error_with_msg(format!(
                "Increment {increment} is larger than the range {min_value}..={max_value}."
            )))?;
        }
        if !(min_value..=max_value).contains(&restart_value) {
            Err(SeqgenErrorKind::Malformed.error_with_msg(format!(
                "Restart value {restart_value} is outside of {min_value}..={max_value}."
            )))?;
        }
        Ok(Self {
            increment,
            min_value,
            max_value,
            can_cycle,
            restart_value,
        })
    }

    /// Step between two consecutive values. Never zero.
    pub fn increment(&self) -> i64 {
        self.increment
    }

    /// Smallest legal value (inclusive).
    pub fn min_value(&self) -> i64 {
        self.min_value
    }

    /// Largest legal value (inclusive).
    pub fn max_value(&self) -> i64 {
        self.max_value
    }

    /// `true` if the generator wraps to the restart value instead of failing
    /// when the domain is exhausted.
    pub fn can_cycle(&self) -> bool {
        self.can_cycle
    }

    /// Value to continue from after a wrap around.
    pub fn restart_value(&self) -> i64 {
        self.restart_value
    }

    /// `true` for sequences that count upwards.
    pub fn is_ascending(&self) -> bool {
        self.increment > 0
    }

    /// Return `true` if `value` is inside the domain.
    pub(crate) fn contains(&self, value: i64) -> bool {
        (self.min_value..=self.max_value).contains(&value)
    }

    /// Return the value following `value` or `None` if it would leave the
    /// domain.
    pub(crate) fn step_from(&self, value: i64) -> Option<i64> {
        value
            .checked_add(self.increment)
            .filter(|next| self.contains(*next))
    }

    /// Return the value `steps` increments away from `value` or `None` if it
    /// would leave the domain.
    pub(crate) fn offset(&self, value: i64, steps: u64) -> Option<i64> {
        i64::try_from(steps)
            .ok()
            .and_then(|steps| steps.checked_mul(self.increment))
            .and_then(|distance| value.checked_add(distance))
            .filter(|target| self.contains(*target))
    }

    /// Number of legal values from `value` (inclusive) to the end of the
    /// domain in the direction of travel.
    ///
    /// `value` must be inside the domain.
    pub(crate) fn values_from(&self, value: i64) -> u64 {
        let domain_end = if self.is_ascending() {
            self.max_value
        } else {
            self.min_value
        };
        (domain_end.abs_diff(value) / self.increment.unsigned_abs()).saturating_add(1)
    }

    /// Largest number of values a single range may hold so that the distance
    /// covered by the range is representable as an `i64` and does not exceed
    /// the width of the domain. Never less than one.
    pub(crate) fn max_batch_size(&self) -> u64 {
        let step = self.increment.unsigned_abs();
        let representable = i64::MAX.unsigned_abs() / step;
        let within_domain = self.max_value.abs_diff(self.min_value) / step;
        representable.min(within_domain).max(1)
    }
}

/** Declaration of a sequence where everything but the type is optional.

Resolved into a [SequenceConfig] and a start value with the SQL defaults:
increment 1, bounds of the data type, and start and restart at the minimum for
ascending or the maximum for descending sequences.
*/
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceDefinition {
    /// Declared type. Defaults to [SequenceDataType::Integer].
    #[serde(default)]
    pub data_type: SequenceDataType,
    /// Step between values.
    pub increment: Option<i64>,
    /// Smallest legal value.
    pub min_value: Option<i64>,
    /// Largest legal value.
    pub max_value: Option<i64>,
    /// First value handed out.
    pub start_value: Option<i64>,
    /// Value to continue from after a wrap around.
    pub restart_value: Option<i64>,
    /// Wrap around instead of failing when the values run out.
    #[serde(default)]
    pub cycle: bool,
}

impl SequenceDefinition {
    /// Return the effective configuration and start value.
    pub fn resolve(&self) -> Result<(SequenceConfig, i64), SeqgenError> {
        let increment = self.increment.unwrap_or(1);
        let type_min = self.data_type.min_value();
        let type_max = self.data_type.max_value();
        let min_value = self.min_value.unwrap_or(type_min);
        let max_value = self.max_value.unwrap_or(type_max);
        if min_value < type_min || max_value > type_max {
            Err(SeqgenErrorKind::Malformed.error_with_msg(format!(
                "Bounds {min_value}..={max_value} do not fit {:?}.",
                self.data_type
            )))?;
        }
        let origin = if increment < 0 { max_value } else { min_value };
        let restart_value = self.restart_value.unwrap_or(origin);
        let start_value = self.start_value.unwrap_or(origin);
        let config =
            SequenceConfig::new(increment, min_value, max_value, self.cycle, restart_value)?;
        if !config.contains(start_value) {
            Err(SeqgenErrorKind::Malformed.error_with_msg(format!(
                "Start value {start_value} is outside of {min_value}..={max_value}."
            )))?;
        }
        Ok((config, start_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_data_type_and_direction() {
        let (config, start) = SequenceDefinition::default().resolve().unwrap();
        assert_eq!(config.min_value(), i64::from(i32::MIN));
        assert_eq!(config.max_value(), i64::from(i32::MAX));
        assert_eq!(config.restart_value(), i64::from(i32::MIN));
        assert_eq!(start, i64::from(i32::MIN));
        assert!(!config.can_cycle());

        let descending = SequenceDefinition {
            data_type: SequenceDataType::SmallInt,
            increment: Some(-2),
            ..Default::default()
        };
        let (config, start) = descending.resolve().unwrap();
        assert_eq!(start, i64::from(i16::MAX));
        assert_eq!(config.restart_value(), i64::from(i16::MAX));
    }

    #[test]
    fn rejects_unusable_configurations() {
        for (increment, min, max, restart) in [
            (0, 0, 10, 0),
            (1, 10, 10, 10),
            (11, 0, 10, 0),
            (1, 0, 10, 11),
        ] {
            let e = SequenceConfig::new(increment, min, max, false, restart).unwrap_err();
            assert_eq!(e.kind(), &SeqgenErrorKind::Malformed);
        }
        let too_wide = SequenceDefinition {
            data_type: SequenceDataType::SmallInt,
            max_value: Some(i64::from(i32::MAX)),
            ..Default::default()
        };
        assert!(too_wide.resolve().is_err());
        let bad_start = SequenceDefinition {
            min_value: Some(0),
            max_value: Some(10),
            start_value: Some(11),
            ..Default::default()
        };
        assert!(bad_start.resolve().is_err());
    }

    #[test]
    fn domain_arithmetic_never_overflows() {
        let config = SequenceConfig::new(1, i64::MIN, i64::MAX, true, i64::MIN).unwrap();
        assert_eq!(config.values_from(i64::MIN), u64::MAX);
        assert_eq!(config.step_from(i64::MAX), None);
        assert_eq!(config.offset(i64::MAX - 3, 3), Some(i64::MAX));
        assert_eq!(config.offset(i64::MAX - 3, 4), None);
        assert_eq!(config.max_batch_size(), i64::MAX.unsigned_abs());

        let descending = SequenceConfig::new(-7, -100, 100, false, 100).unwrap();
        assert_eq!(descending.values_from(100), 29);
        assert_eq!(descending.values_from(-96), 1);
        assert_eq!(descending.step_from(-96), None);
    }

    #[test]
    fn big_steps_limit_the_batch_size() {
        let step = (i64::MAX / 100) * 3;
        let config = SequenceConfig::new(step, i64::MIN, i64::MAX, true, i64::MIN).unwrap();
        assert_eq!(config.max_batch_size(), 33);
        let (min, max) = (i64::from(i16::MIN), i64::from(i16::MAX));
        let config = SequenceConfig::new(max - 1, min, max, true, min).unwrap();
        assert_eq!(config.max_batch_size(), 2);
    }
}

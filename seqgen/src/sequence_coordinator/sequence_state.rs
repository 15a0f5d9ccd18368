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

//! Side-effect free arithmetic of a single sequence generator.

use crate::SequenceConfig;

/// Reason why no value could be handed out from memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    /// The preallocated range is used up and a new one must be persisted.
    Range,
    /// No value is left and the sequence is not allowed to cycle.
    Domain,
}

/// Contiguous run of values covered by a single durable update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceRange {
    /// First value of the range.
    pub current_value: i64,
    /// First value after the range. This is what must be durable before the
    /// range is used. `None` when the range ends the domain of a non-cycling
    /// sequence.
    pub upper_bound: Option<i64>,
    /// Number of values in the range.
    pub value_count: u64,
}

/** In-memory state of a sequence generator.

Values are handed out from the adopted [SequenceRange]. The state never
touches storage: when the range is used up [Self::next_value] signals
[Exhaustion::Range] and the caller is expected to persist the result of
[Self::advance_range] before calling [Self::adopt].
*/
pub struct SequenceState {
    config: SequenceConfig,
    current_value: i64,
    remaining: u64,
    upper_bound: Option<i64>,
    exhausted: bool,
}

impl SequenceState {
    /// Return a new instance positioned at the durable upper bound.
    ///
    /// No values are cached until a range has been adopted.
    pub fn new(config: SequenceConfig, upper_bound: Option<i64>) -> Self {
        Self {
            config,
            current_value: upper_bound.unwrap_or(config.restart_value()),
            remaining: 0,
            upper_bound,
            exhausted: upper_bound.is_none(),
        }
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    /// Number of values that can be handed out without a durable update.
    pub fn cached_values(&self) -> u64 {
        self.remaining
    }

    /// Return the value [Self::next_value] would return without consuming it.
    pub fn peek(&self) -> Result<i64, Exhaustion> {
        if self.exhausted {
            Err(Exhaustion::Domain)
        } else if self.remaining == 0 {
            Err(Exhaustion::Range)
        } else {
            Ok(self.current_value)
        }
    }

    /// Hand out the current value and move on to the next one.
    pub fn next_value(&mut self) -> Result<i64, Exhaustion> {
        let value = self.peek()?;
        self.remaining -= 1;
        match self.config.step_from(value) {
            Some(next_value) => self.current_value = next_value,
            None if self.config.can_cycle() => self.current_value = self.config.restart_value(),
            None => {
                // A non-cycling range always ends with the domain.
                self.remaining = 0;
                self.exhausted = true;
            }
        }
        Ok(value)
    }

    /** Compute the range following the durable `upper_bound`.

    The range holds `batch_size` values, truncated to the largest batch whose
    span is representable and fits the domain (at least one value). When the
    end of the domain is reached the range either wraps around to the restart
    value or, for non-cycling sequences, stops at the end of the domain.
    */
    pub fn advance_range(
        &self,
        upper_bound: i64,
        batch_size: u32,
    ) -> Result<SequenceRange, Exhaustion> {
        let start = if self.config.contains(upper_bound) {
            upper_bound
        } else if self.config.can_cycle() {
            self.config.restart_value()
        } else {
            return Err(Exhaustion::Domain);
        };
        let batch_size = u64::from(batch_size).clamp(1, self.config.max_batch_size());
        let values_ahead = self.config.values_from(start);
        if batch_size < values_ahead
            && let Some(next_upper_bound) = self.config.offset(start, batch_size)
        {
            return Ok(SequenceRange {
                current_value: start,
                upper_bound: Some(next_upper_bound),
                value_count: batch_size,
            });
        }
        if !self.config.can_cycle() {
            return Ok(SequenceRange {
                current_value: start,
                upper_bound: None,
                value_count: values_ahead,
            });
        }
        let restart_value = self.config.restart_value();
        let spill_over = batch_size
            .saturating_sub(values_ahead)
            .min(self.config.values_from(restart_value) - 1);
        let (next_upper_bound, spill_over) = self
            .config
            .offset(restart_value, spill_over)
            .map_or((restart_value, 0), |bound| (bound, spill_over));
        Ok(SequenceRange {
            current_value: start,
            upper_bound: Some(next_upper_bound),
            value_count: values_ahead.min(batch_size) + spill_over,
        })
    }

    /// Start handing out values from a range that has been made durable.
    pub fn adopt(&mut self, range: SequenceRange) {
        self.current_value = range.current_value;
        self.remaining = range.value_count;
        self.upper_bound = range.upper_bound;
        self.exhausted = false;
    }

    /// Fail all further requests until the state is recreated.
    pub fn mark_exhausted(&mut self) {
        self.remaining = 0;
        self.exhausted = true;
    }

    /// Stop handing out cached values.
    ///
    /// Returns the first unused value and the durable upper bound of the
    /// range they belong to, or `None` if nothing was cached.
    pub fn take_unused(&mut self) -> Option<(i64, Option<i64>)> {
        if self.exhausted || self.remaining == 0 {
            return None;
        }
        self.remaining = 0;
        Some((self.current_value, self.upper_bound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand out a value the way the coordinator does with `disk` as storage.
    fn bump(state: &mut SequenceState, disk: &mut Option<i64>, batch_size: u32) -> Option<i64> {
        loop {
            match state.next_value() {
                Ok(value) => return Some(value),
                Err(Exhaustion::Domain) => return None,
                Err(Exhaustion::Range) => {
                    let range = disk
                        .ok_or(Exhaustion::Domain)
                        .and_then(|upper_bound| state.advance_range(upper_bound, batch_size));
                    match range {
                        Ok(range) => {
                            *disk = range.upper_bound;
                            state.adopt(range);
                        }
                        Err(_) => {
                            state.mark_exhausted();
                            return None;
                        }
                    }
                }
            }
        }
    }

    fn generator(
        first_value: i64,
        can_cycle: bool,
        increment: i64,
        max_value: i64,
        min_value: i64,
        restart_value: i64,
    ) -> (SequenceState, Option<i64>) {
        let config =
            SequenceConfig::new(increment, min_value, max_value, can_cycle, restart_value).unwrap();
        (
            SequenceState::new(config, Some(first_value)),
            Some(first_value),
        )
    }

    #[test]
    fn upper_bound_moves_one_batch_at_a_time() {
        let min = i64::from(i32::MIN);
        let (mut state, mut disk) = generator(min, true, 1, i64::from(i32::MAX), min, min);
        for i in 0..20 {
            assert_eq!(bump(&mut state, &mut disk, 20), Some(min + i));
            assert_eq!(disk, Some(-2147483628));
        }
        assert_eq!(bump(&mut state, &mut disk, 20), Some(-2147483628));
        assert_eq!(disk, Some(-2147483608));
    }

    #[test]
    fn cycles_in_both_directions() {
        let k = 5;
        let (mut state, mut disk) = generator(k, true, 1, k, -k, -k);
        let values = (0..=2 * k)
            .map(|_| bump(&mut state, &mut disk, 20).unwrap())
            .collect::<Vec<_>>();
        let mut expected = vec![k];
        expected.extend(-k..k);
        assert_eq!(values, expected);

        let (mut state, mut disk) = generator(-k, true, -1, k, -k, k);
        let values = (0..=2 * k)
            .map(|_| bump(&mut state, &mut disk, 20).unwrap())
            .collect::<Vec<_>>();
        let mut expected = vec![-k];
        expected.extend((-k + 1..=k).rev());
        assert_eq!(values, expected);
    }

    #[test]
    fn non_cycling_sequences_stop_at_the_edge() {
        for (max, min) in [
            (i64::from(i16::MAX), i64::from(i16::MIN)),
            (i64::MAX, i64::MIN),
        ] {
            let (mut state, mut disk) = generator(max - 3, false, 1, max, min, min);
            for expected in max - 3..=max {
                assert_eq!(bump(&mut state, &mut disk, 20), Some(expected));
                assert_eq!(disk, None);
            }
            for _ in 0..3 {
                assert_eq!(bump(&mut state, &mut disk, 20), None);
            }

            let (mut state, mut disk) = generator(min + 3, false, -1, max, min, max);
            for expected in (min..=min + 3).rev() {
                assert_eq!(bump(&mut state, &mut disk, 20), Some(expected));
            }
            assert_eq!(bump(&mut state, &mut disk, 20), None);
            assert_eq!(state.peek(), Err(Exhaustion::Domain));
        }
    }

    #[test]
    fn big_steps_truncate_the_batch() {
        let step = (i64::MAX / 100) * 3;
        let (state, _disk) = generator(i64::MIN, true, step, i64::MAX, i64::MIN, i64::MIN);
        let range = state.advance_range(i64::MIN, 100).unwrap();
        assert_eq!(range.value_count, 33);
        assert_eq!(range.upper_bound, Some(i64::MIN + 33 * step));

        let (min, max) = (i64::from(i16::MIN), i64::from(i16::MAX));
        let (mut state, mut disk) = generator(min, true, max - 1, max, min, min);
        for i in 0..100 {
            let value = bump(&mut state, &mut disk, 100).unwrap();
            assert_eq!(value, [min, -2, 32764][i % 3]);
            assert!(disk.is_some_and(|upper_bound| (min..=max).contains(&upper_bound)));
        }
    }

    #[test]
    fn stale_upper_bound_outside_the_domain() {
        let (state, _disk) = generator(0, false, 1, 100, 0, 0);
        assert_eq!(state.advance_range(200, 5), Err(Exhaustion::Domain));
        let (state, _disk) = generator(0, true, 1, 100, 0, 0);
        let range = state.advance_range(200, 5).unwrap();
        assert_eq!(range.current_value, 0);
        assert_eq!(range.upper_bound, Some(5));
    }

    #[test]
    fn unused_values_can_be_taken_back() {
        let (mut state, mut disk) = generator(10, false, 1, 100, 0, 0);
        assert_eq!(bump(&mut state, &mut disk, 20), Some(10));
        assert_eq!(state.cached_values(), 19);
        assert_eq!(state.take_unused(), Some((11, Some(30))));
        assert_eq!(state.next_value(), Err(Exhaustion::Range));
        assert_eq!(state.take_unused(), None);
    }
}

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

//! Policy that uses the same batch size for every sequence.

use super::BatchSizePolicy;
use super::DEFAULT_BATCH_SIZE;

/// Same number of preallocated values for every sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSizePolicy {
    batch_size: u32,
}

impl FixedSizePolicy {
    /// Return a new instance.
    pub fn new(batch_size: u32) -> Self {
        Self { batch_size }
    }
}

impl Default for FixedSizePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl BatchSizePolicy for FixedSizePolicy {
    fn next_range_size(&self, _schema_name: &str, _sequence_name: &str) -> i64 {
        i64::from(self.batch_size)
    }
}

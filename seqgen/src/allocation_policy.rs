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

//! Policies deciding how many values to preallocate per durable update.

mod fixed_size_policy;
mod policy_registry;

pub use self::fixed_size_policy::FixedSizePolicy;
pub use self::policy_registry::PolicyFactory;
pub use self::policy_registry::PolicyRegistry;

/// Number of values preallocated per range when nothing else is configured.
pub const DEFAULT_BATCH_SIZE: u32 = 20;

/** Decides the number of values to preallocate with each durable update.

Implementations are selected by name through a [PolicyRegistry].
*/
pub trait BatchSizePolicy: Send + Sync {
    /// Return the preferred number of values in the next range of the
    /// sequence.
    ///
    /// Results that are not positive, do not fit an `u32` or span more than
    /// the sequence's domain are replaced by [DEFAULT_BATCH_SIZE].
    fn next_range_size(&self, schema_name: &str, sequence_name: &str) -> i64;
}

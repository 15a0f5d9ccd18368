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

//! Durable storage of sequence rows.

mod local_sequence_store;

pub use self::local_sequence_store::LocalSequenceStore;

use crate::SeqgenError;
use crate::SequenceConfig;
use crate::SequenceIdentity;
use async_trait::async_trait;

/** Storage and catalog collaborator of the sequence generators.

Each sequence is a row holding its configuration and the durable upper bound:
the first value that is not covered by any preallocated range. A row whose
upper bound is `None` has no values left.

Unknown sequences yield [crate::SeqgenErrorKind::NotFound].
*/
#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Return the configuration of a sequence.
    async fn load_config(&self, identity: &SequenceIdentity) -> Result<SequenceConfig, SeqgenError>;

    /// Return the committed upper bound of a sequence.
    async fn read_current_upper_bound(
        &self,
        identity: &SequenceIdentity,
    ) -> Result<Option<i64>, SeqgenError>;

    /// Durably replace the upper bound with `proposed_new` if it still is
    /// `observed_old`.
    ///
    /// Returns `false` if the stored value differs or if the row is locked by
    /// another writer and `wait_for_lock` is `false`.
    async fn compare_and_swap_upper_bound(
        &self,
        identity: &SequenceIdentity,
        observed_old: Option<i64>,
        proposed_new: Option<i64>,
        wait_for_lock: bool,
    ) -> Result<bool, SeqgenError>;

    /// Longest time to wait for a conflicting writer.
    fn lock_timeout_millis(&self) -> u64;

    /// Add a new sequence that will hand out `start_value` first.
    async fn create_sequence(
        &self,
        identity: &SequenceIdentity,
        config: SequenceConfig,
        start_value: i64,
    ) -> Result<(), SeqgenError>;

    /// Remove a sequence.
    async fn drop_sequence(&self, identity: &SequenceIdentity) -> Result<(), SeqgenError>;
}

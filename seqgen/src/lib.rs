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

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Batched, crash-safe generation of SQL sequence values.
//!
//! Values are handed out from preallocated ranges held in memory. A range is
//! only used after its end has been durably recorded through a
//! [SequenceStore], so a restart can leave gaps but never repeat a value.

mod allocation_policy;
mod seqgen_error;
mod sequence_config;
mod sequence_coordinator;
mod sequence_store;

pub use self::allocation_policy::BatchSizePolicy;
pub use self::allocation_policy::DEFAULT_BATCH_SIZE;
pub use self::allocation_policy::FixedSizePolicy;
pub use self::allocation_policy::PolicyFactory;
pub use self::allocation_policy::PolicyRegistry;
pub use self::seqgen_error::SeqgenError;
pub use self::seqgen_error::SeqgenErrorKind;
pub use self::sequence_config::SequenceConfig;
pub use self::sequence_config::SequenceDataType;
pub use self::sequence_config::SequenceDefinition;
pub use self::sequence_config::SequenceIdentity;
pub use self::sequence_coordinator::CoordinatorConfig;
pub use self::sequence_coordinator::SequenceCoordinator;
pub use self::sequence_store::LocalSequenceStore;
pub use self::sequence_store::SequenceStore;

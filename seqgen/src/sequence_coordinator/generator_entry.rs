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

//! Cached generator of a single sequence.

use super::sequence_state::SequenceState;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use tokio::sync::Mutex;
use tokio::sync::MutexGuard;

/// In-memory generator state and the permit to refresh its range.
///
/// The state lock is only held for in-memory decisions. Durable updates are
/// made while holding the refresh permit, so callers that can still be served
/// from memory are never blocked by storage.
pub struct GeneratorEntry {
    state: Mutex<SequenceState>,
    refresh: Mutex<()>,
    /// Set once the entry has left the cache. Callers still holding it must
    /// look up the current entry.
    retired: AtomicBool,
    last_used: AtomicU64,
}

impl GeneratorEntry {
    /// Return a new instance.
    pub fn new(state: SequenceState, now: u64) -> Self {
        Self {
            state: Mutex::new(state),
            refresh: Mutex::default(),
            retired: AtomicBool::new(false),
            last_used: AtomicU64::new(now),
        }
    }

    pub async fn state(&self) -> MutexGuard<'_, SequenceState> {
        self.state.lock().await
    }

    /// Wait until no other caller is refreshing the range.
    pub async fn refresh_permit(&self) -> MutexGuard<'_, ()> {
        self.refresh.lock().await
    }

    pub fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Record use at logical time `now`.
    pub fn touch(&self, now: u64) {
        self.last_used.fetch_max(now, Ordering::Relaxed);
    }

    pub fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::Relaxed)
    }
}

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

//! Sequence generators backed by durable storage.

mod generator_entry;
mod sequence_state;

use self::generator_entry::GeneratorEntry;
use self::sequence_state::Exhaustion;
use self::sequence_state::SequenceState;
use crate::BatchSizePolicy;
use crate::DEFAULT_BATCH_SIZE;
use crate::PolicyRegistry;
use crate::SeqgenError;
use crate::SeqgenErrorKind;
use crate::SequenceConfig;
use crate::SequenceDefinition;
use crate::SequenceIdentity;
use crate::SequenceStore;
use crossbeam_skiplist::SkipMap;
use crossbeam_skiplist::SkipSet;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::RwLock;

/// Settings of a [SequenceCoordinator].
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Batch size policy selection. See [PolicyRegistry] for the syntax.
    pub allocation_policy: Option<String>,
    /// Maximum number of generators kept in memory.
    pub cache_capacity: usize,
    /// Compare-and-swap attempts per range refresh before giving up.
    pub max_refresh_attempts: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            allocation_policy: None,
            cache_capacity: 1000,
            max_refresh_attempts: 16,
        }
    }
}

/** Hands out sequence values and keeps their durable upper bounds ahead.

Each sequence gets a lazily created generator that serves values from a
preallocated range in memory. When the range is used up, the durable upper
bound is re-read from the [SequenceStore], a new range is computed and the
new upper bound is written with a compare-and-swap. The range is only used
after the write succeeded, so a crash can skip values but never repeat them.

Concurrent refreshers of the same sequence are serialized in-process, while
callers that can be served from memory only contend on a short lock. Losing
a compare-and-swap to another writer (e.g. another process sharing the
storage) leads to a re-read and retry.
*/
pub struct SequenceCoordinator {
    store: Arc<dyn SequenceStore>,
    policy_registry: PolicyRegistry,
    /// Resolved policy or the reason why it could not be resolved.
    allocation_policy: RwLock<Result<Arc<dyn BatchSizePolicy>, String>>,
    generators: SkipMap<SequenceIdentity, Arc<GeneratorEntry>>,
    dropped: SkipSet<SequenceIdentity>,
    /// Logical time of generator use, for least recently used eviction.
    clock: AtomicU64,
    cache_capacity: usize,
    max_refresh_attempts: u32,
}

impl SequenceCoordinator {
    /// Return a new instance.
    pub fn new(
        store: Arc<dyn SequenceStore>,
        policy_registry: PolicyRegistry,
        config: CoordinatorConfig,
    ) -> Arc<Self> {
        let allocation_policy =
            Self::resolve_policy(&policy_registry, config.allocation_policy.as_deref());
        Arc::new(Self {
            store,
            policy_registry,
            allocation_policy: RwLock::new(allocation_policy),
            generators: SkipMap::default(),
            dropped: SkipSet::default(),
            clock: AtomicU64::default(),
            cache_capacity: config.cache_capacity.max(1),
            max_refresh_attempts: config.max_refresh_attempts.max(1),
        })
    }

    /// Registry of named batch size policies.
    pub fn policy_registry(&self) -> &PolicyRegistry {
        &self.policy_registry
    }

    fn resolve_policy(
        policy_registry: &PolicyRegistry,
        setting: Option<&str>,
    ) -> Result<Arc<dyn BatchSizePolicy>, String> {
        policy_registry.resolve(setting).map_err(|e| {
            log::warn!("Sequence values can't be generated until the policy is fixed: {e}");
            e.to_string()
        })
    }

    /// Select a different batch size policy.
    ///
    /// All cached generators are discarded, so the new policy applies to the
    /// next range of every sequence.
    pub async fn set_allocation_policy(&self, setting: Option<&str>) {
        let allocation_policy = Self::resolve_policy(&self.policy_registry, setting);
        *self.allocation_policy.write().await = allocation_policy;
        self.release_all().await;
        log::info!("Batch size policy changed to {setting:?}.");
    }

    /// Return the next value of the sequence.
    ///
    /// This is what `NEXT VALUE FOR` and identity columns use.
    pub async fn next_value_for(&self, identity: &SequenceIdentity) -> Result<i64, SeqgenError> {
        let mut entry = self.generator(identity).await?;
        loop {
            if entry.is_retired() {
                entry = self.generator(identity).await?;
                continue;
            }
            let next_value = entry.state().await.next_value();
            match next_value {
                Ok(value) => return Ok(value),
                Err(Exhaustion::Domain) => {
                    log::info!("Sequence {identity} has no more values.");
                    return Err(SeqgenErrorKind::DomainExhausted.error_with_msg(format!(
                        "Sequence {identity} has reached its limit and does not cycle."
                    )));
                }
                Err(Exhaustion::Range) => self.refresh(identity, &entry).await?,
            }
        }
    }

    /// Return the value the next call to [Self::next_value_for] would return
    /// without consuming it, or `None` if the sequence is exhausted.
    pub async fn peek_at_sequence(
        &self,
        identity: &SequenceIdentity,
    ) -> Result<Option<i64>, SeqgenError> {
        let mut entry = self.generator(identity).await?;
        while entry.is_retired() {
            entry = self.generator(identity).await?;
        }
        let cached = entry.state().await.peek();
        match cached {
            Ok(value) => Ok(Some(value)),
            Err(Exhaustion::Domain) => Ok(None),
            Err(Exhaustion::Range) => {
                let upper_bound = self
                    .store
                    .read_current_upper_bound(identity)
                    .await
                    .map_err(|e| self.on_storage_error(identity, e))?;
                let Some(upper_bound) = upper_bound else {
                    return Ok(None);
                };
                let next_range = entry.state().await.advance_range(upper_bound, 1);
                Ok(next_range.ok().map(|range| range.current_value))
            }
        }
    }

    /// Discard the cached generator, e.g. after the sequence was altered.
    ///
    /// Unused values of the cached range are handed back unless another
    /// writer has moved the durable upper bound since. The next call re-reads
    /// the durable state and allocates a new range.
    pub async fn invalidate_cache(&self, identity: &SequenceIdentity) {
        if let Some(entry) = self.discard(identity) {
            self.release(identity, &entry).await;
        }
    }

    /// Discard the cached generator and fail further use with
    /// [SeqgenErrorKind::ObjectGone].
    pub fn on_sequence_dropped(&self, identity: &SequenceIdentity) {
        self.dropped.insert(identity.clone());
        self.discard(identity);
    }

    /// Remove the cached generator without touching storage.
    fn discard(&self, identity: &SequenceIdentity) -> Option<Arc<GeneratorEntry>> {
        let entry = self
            .generators
            .remove(identity)
            .map(|entry| Arc::clone(entry.value()))?;
        entry.retire();
        log::debug!("Discarded cached generator of {identity}.");
        Some(entry)
    }

    /// Create a new sequence in storage.
    pub async fn create_sequence(
        &self,
        identity: &SequenceIdentity,
        definition: &SequenceDefinition,
    ) -> Result<(), SeqgenError> {
        let (config, start_value) = definition.resolve()?;
        self.store
            .create_sequence(identity, config, start_value)
            .await?;
        self.discard(identity);
        self.dropped.remove(identity);
        log::info!("Created sequence {identity}.");
        Ok(())
    }

    /// Remove a sequence from storage.
    pub async fn drop_sequence(&self, identity: &SequenceIdentity) -> Result<(), SeqgenError> {
        if self.dropped.contains(identity) {
            Err(SeqgenErrorKind::ObjectGone
                .error_with_msg(format!("Sequence {identity} has already been dropped.")))?;
        }
        self.store.drop_sequence(identity).await?;
        self.on_sequence_dropped(identity);
        log::info!("Dropped sequence {identity}.");
        Ok(())
    }

    /// Hand back unused preallocated values and discard all generators.
    pub async fn shutdown(&self) {
        self.release_all().await;
    }

    async fn release_all(&self) {
        while let Some((identity, entry)) = self
            .generators
            .pop_front()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
        {
            self.release(&identity, &entry).await;
        }
    }

    /// Return the cached generator or create one from the durable state.
    async fn generator(
        &self,
        identity: &SequenceIdentity,
    ) -> Result<Arc<GeneratorEntry>, SeqgenError> {
        if self.dropped.contains(identity) {
            Err(SeqgenErrorKind::ObjectGone
                .error_with_msg(format!("Sequence {identity} has been dropped.")))?;
        }
        let cached = self
            .generators
            .get(identity)
            .map(|entry| Arc::clone(entry.value()));
        if let Some(entry) = cached {
            entry.touch(self.tick());
            return Ok(entry);
        }
        let config = self.store.load_config(identity).await?;
        let upper_bound = self.store.read_current_upper_bound(identity).await?;
        let now = self.tick();
        let entry = Arc::clone(
            self.generators
                .get_or_insert(
                    identity.clone(),
                    Arc::new(GeneratorEntry::new(
                        SequenceState::new(config, upper_bound),
                        now,
                    )),
                )
                .value(),
        );
        entry.touch(now);
        self.evict_beyond_capacity(identity).await;
        Ok(entry)
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Release and drop the least recently used generators until the cache
    /// fits its capacity. `keep` is never evicted.
    async fn evict_beyond_capacity(&self, keep: &SequenceIdentity) {
        while self.generators.len() > self.cache_capacity {
            let least_recently_used = self
                .generators
                .iter()
                .filter(|entry| entry.key() != keep)
                .min_by_key(|entry| entry.value().last_used())
                .map(|entry| entry.key().clone());
            let Some(identity) = least_recently_used else {
                return;
            };
            if let Some(entry) = self.discard(&identity) {
                self.release(&identity, &entry).await;
            }
        }
    }

    /// Move the durable upper bound back to the first unused value if no one
    /// else has moved it since.
    async fn release(&self, identity: &SequenceIdentity, entry: &GeneratorEntry) {
        entry.retire();
        let _refresh_permit = entry.refresh_permit().await;
        let unused = entry.state().await.take_unused();
        let Some((current_value, upper_bound)) = unused else {
            return;
        };
        match self
            .store
            .compare_and_swap_upper_bound(identity, upper_bound, Some(current_value), false)
            .await
        {
            Ok(true) => log::debug!("Released unused values of {identity} from {current_value}."),
            Ok(false) => log::debug!("Kept upper bound of {identity} since it has moved."),
            Err(e) => log::info!("Failed to release unused values of {identity}: {e}"),
        }
    }

    /// Make a new range durable and adopt it.
    ///
    /// Waiting for other refreshers counts against the lock timeout.
    async fn refresh(
        &self,
        identity: &SequenceIdentity,
        entry: &GeneratorEntry,
    ) -> Result<(), SeqgenError> {
        let lock_timeout = Duration::from_millis(self.store.lock_timeout_millis());
        tokio::time::timeout(lock_timeout, self.refresh_with_permit(identity, entry))
            .await
            .map_err(|_elapsed| {
                SeqgenErrorKind::StorageBusy.error_with_msg(format!(
                    "Timed out after {lock_timeout:?} waiting to update {identity}."
                ))
            })?
    }

    async fn refresh_with_permit(
        &self,
        identity: &SequenceIdentity,
        entry: &GeneratorEntry,
    ) -> Result<(), SeqgenError> {
        let _refresh_permit = entry.refresh_permit().await;
        let config = {
            let state = entry.state().await;
            if entry.is_retired() || state.cached_values() > 0 {
                // Discarded or refreshed by another caller while waiting.
                return Ok(());
            }
            *state.config()
        };
        let batch_size = self.batch_size(identity, &config).await?;
        self.allocate_range(identity, entry, batch_size).await
    }

    async fn allocate_range(
        &self,
        identity: &SequenceIdentity,
        entry: &GeneratorEntry,
        batch_size: u32,
    ) -> Result<(), SeqgenError> {
        for attempt in 0..self.max_refresh_attempts {
            // Storage is the authority, another writer might have moved on.
            let upper_bound = self
                .store
                .read_current_upper_bound(identity)
                .await
                .map_err(|e| self.on_storage_error(identity, e))?;
            let Some(upper_bound) = upper_bound else {
                entry.state().await.mark_exhausted();
                return Ok(());
            };
            let next_range = entry.state().await.advance_range(upper_bound, batch_size);
            let Ok(next_range) = next_range else {
                entry.state().await.mark_exhausted();
                return Ok(());
            };
            let swapped = self
                .store
                .compare_and_swap_upper_bound(
                    identity,
                    Some(upper_bound),
                    next_range.upper_bound,
                    attempt > 0,
                )
                .await
                .map_err(|e| self.on_storage_error(identity, e))?;
            if swapped {
                if log::log_enabled!(log::Level::Debug) {
                    log::debug!(
                        "Allocated {} value(s) of {identity} from {}. Upper bound is now {:?}.",
                        next_range.value_count,
                        next_range.current_value,
                        next_range.upper_bound,
                    );
                }
                entry.state().await.adopt(next_range);
                return Ok(());
            }
            log::debug!("Upper bound of {identity} moved during attempt {attempt}. Retrying.");
        }
        Err(SeqgenErrorKind::StorageBusy.error_with_msg(format!(
            "Gave up updating {identity} after {} conflicting writes.",
            self.max_refresh_attempts
        )))
    }

    /// Return the number of values to preallocate for the next range.
    ///
    /// Results that are not a positive `u32` fall back to
    /// [DEFAULT_BATCH_SIZE]. Results wider than the domain of the sequence
    /// turn preallocation off, so every value is written to storage.
    async fn batch_size(
        &self,
        identity: &SequenceIdentity,
        config: &SequenceConfig,
    ) -> Result<u32, SeqgenError> {
        let policy = match &*self.allocation_policy.read().await {
            Ok(policy) => Arc::clone(policy),
            Err(msg) => Err(SeqgenErrorKind::InvalidAllocationPolicy.error_with_msg(msg))?,
        };
        let requested = policy.next_range_size(identity.schema_name(), identity.sequence_name());
        let batch_size = match u32::try_from(requested).ok().filter(|size| *size > 0) {
            None => {
                log::warn!(
                    "Batch size {requested} is unusable for {identity}. Using {DEFAULT_BATCH_SIZE}."
                );
                DEFAULT_BATCH_SIZE
            }
            Some(batch_size) if u64::from(batch_size) > config.max_batch_size() => {
                log::warn!(
                    "Batch size {batch_size} is wider than the domain of {identity}. Allocating one value at a time."
                );
                1
            }
            Some(batch_size) => batch_size,
        };
        Ok(batch_size)
    }

    /// Report a sequence that disappeared from storage as dropped.
    fn on_storage_error(&self, identity: &SequenceIdentity, e: SeqgenError) -> SeqgenError {
        if e.kind() == &SeqgenErrorKind::NotFound {
            self.on_sequence_dropped(identity);
            SeqgenErrorKind::ObjectGone
                .error_with_msg(format!("Sequence {identity} was dropped while in use."))
        } else {
            e
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalSequenceStore;

    async fn coordinator_with_sequence() -> (Arc<SequenceCoordinator>, SequenceIdentity) {
        let dc = SequenceCoordinator::new(
            LocalSequenceStore::in_memory(1_000),
            PolicyRegistry::default(),
            CoordinatorConfig::default(),
        );
        let id = SequenceIdentity::new("TEST_DBO", "HELD");
        dc.create_sequence(&id, &SequenceDefinition::default())
            .await
            .unwrap();
        (dc, id)
    }

    #[tokio::test]
    async fn held_generator_stops_after_invalidation() {
        let (dc, id) = coordinator_with_sequence().await;
        let min = i64::from(i32::MIN);
        assert_eq!(dc.next_value_for(&id).await.unwrap(), min);
        let held = dc.generator(&id).await.unwrap();
        dc.invalidate_cache(&id).await;
        assert!(held.is_retired());
        assert_eq!(held.state().await.peek(), Err(Exhaustion::Range));
        assert!(held.state().await.take_unused().is_none());

        let current = dc.generator(&id).await.unwrap();
        assert!(!Arc::ptr_eq(&held, &current));
        assert_eq!(dc.next_value_for(&id).await.unwrap(), min + 1);
        // Refreshing a retired generator must not allocate anything.
        dc.refresh(&id, &held).await.unwrap();
        assert_eq!(held.state().await.cached_values(), 0);
        assert_eq!(dc.next_value_for(&id).await.unwrap(), min + 2);
    }

    #[tokio::test]
    async fn held_generator_stops_after_drop() {
        let (dc, id) = coordinator_with_sequence().await;
        dc.next_value_for(&id).await.unwrap();
        let held = dc.generator(&id).await.unwrap();
        assert!(held.state().await.cached_values() > 0);
        dc.on_sequence_dropped(&id);
        assert!(held.is_retired());
        let e = dc.next_value_for(&id).await.unwrap_err();
        assert_eq!(e.kind(), &SeqgenErrorKind::ObjectGone);
    }
}

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

//! Lookup of batch size policies by configuration string.

use super::BatchSizePolicy;
use super::FixedSizePolicy;
use crate::SeqgenError;
use crate::SeqgenErrorKind;
use crossbeam_skiplist::SkipMap;
use std::sync::Arc;

/// Creates a named policy when the configuration selects it.
pub type PolicyFactory =
    Box<dyn Fn() -> Result<Arc<dyn BatchSizePolicy>, SeqgenError> + Send + Sync>;

/** Named batch size policies.

A configuration string is resolved as follows:

* unset or empty: the default fixed size policy.
* `0`: the default fixed size policy.
* a positive number that fits an `i32`: a fixed size policy of that size.
* any other number: [SeqgenErrorKind::InvalidAllocationPolicy].
* anything else: the registered policy with that name, or
  [SeqgenErrorKind::InvalidAllocationPolicy] if there is none or its factory
  fails.
*/
#[derive(Default)]
pub struct PolicyRegistry {
    factories: SkipMap<String, PolicyFactory>,
}

impl PolicyRegistry {
    /// Register a factory under `name`, replacing any previous one.
    ///
    /// Names that could be mistaken for a numeric batch size are rejected.
    pub fn register(&self, name: &str, factory: PolicyFactory) -> Result<(), SeqgenError> {
        if name.trim().is_empty() || name.trim() != name {
            Err(SeqgenErrorKind::Malformed.error_with_msg(format!(
                "Policy name '{name}' must be non-empty without surrounding whitespace."
            )))?;
        }
        if Self::is_numeric(name) {
            Err(SeqgenErrorKind::Malformed.error_with_msg(format!(
                "Policy name '{name}' would be read as a batch size."
            )))?;
        }
        self.factories.insert(name.to_string(), factory);
        Ok(())
    }

    /// Register an already created policy under `name`.
    pub fn register_policy(
        &self,
        name: &str,
        policy: Arc<dyn BatchSizePolicy>,
    ) -> Result<(), SeqgenError> {
        self.register(name, Box::new(move || Ok(Arc::clone(&policy))))
    }

    /// Return the policy selected by the configuration string.
    pub fn resolve(&self, setting: Option<&str>) -> Result<Arc<dyn BatchSizePolicy>, SeqgenError> {
        let Some(setting) = setting.map(str::trim).filter(|setting| !setting.is_empty()) else {
            return Ok(Arc::new(FixedSizePolicy::default()));
        };
        if Self::is_numeric(setting) {
            return Self::resolve_fixed_size(setting);
        }
        let entry = self.factories.get(setting).ok_or_else(|| {
            SeqgenErrorKind::InvalidAllocationPolicy
                .error_with_msg(format!("No batch size policy named '{setting}' is registered."))
        })?;
        (entry.value())().map_err(|e| {
            SeqgenErrorKind::InvalidAllocationPolicy
                .error_with_msg(format!("Batch size policy '{setting}' is unusable: {e}"))
        })
    }

    fn is_numeric(setting: &str) -> bool {
        let digits = setting.strip_prefix(['-', '+']).unwrap_or(setting);
        !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
    }

    fn resolve_fixed_size(setting: &str) -> Result<Arc<dyn BatchSizePolicy>, SeqgenError> {
        let batch_size = setting
            .parse::<i32>()
            .ok()
            .filter(|batch_size| *batch_size >= 0)
            .ok_or_else(|| {
                SeqgenErrorKind::InvalidAllocationPolicy
                    .error_with_msg(format!("'{setting}' is not a usable batch size."))
            })?;
        if batch_size == 0 {
            Ok(Arc::new(FixedSizePolicy::default()))
        } else {
            Ok(Arc::new(FixedSizePolicy::new(batch_size.unsigned_abs())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_BATCH_SIZE;

    struct TweakedPolicy;

    impl BatchSizePolicy for TweakedPolicy {
        fn next_range_size(&self, _schema_name: &str, _sequence_name: &str) -> i64 {
            7
        }
    }

    fn size_of(registry: &PolicyRegistry, setting: Option<&str>) -> Result<i64, SeqgenError> {
        registry
            .resolve(setting)
            .map(|policy| policy.next_range_size("APP", "SEQ"))
    }

    #[test]
    fn numbers_select_fixed_sizes() {
        let registry = PolicyRegistry::default();
        let default = i64::from(DEFAULT_BATCH_SIZE);
        assert_eq!(size_of(&registry, None).unwrap(), default);
        assert_eq!(size_of(&registry, Some("  ")).unwrap(), default);
        assert_eq!(size_of(&registry, Some("0")).unwrap(), default);
        assert_eq!(size_of(&registry, Some("30")).unwrap(), 30);
        assert_eq!(size_of(&registry, Some("+30")).unwrap(), 30);
        for unusable in ["-1", "9223372036854775806", "2147483648"] {
            let e = size_of(&registry, Some(unusable)).unwrap_err();
            assert_eq!(e.kind(), &SeqgenErrorKind::InvalidAllocationPolicy);
        }
    }

    #[test]
    fn names_select_registered_policies() {
        let registry = PolicyRegistry::default();
        registry
            .register_policy("tweaked", Arc::new(TweakedPolicy))
            .unwrap();
        registry
            .register(
                "broken",
                Box::new(|| Err(SeqgenErrorKind::Unspecified.error_with_msg("no constructor"))),
            )
            .unwrap();
        assert_eq!(size_of(&registry, Some("tweaked")).unwrap(), 7);
        let e = size_of(&registry, Some("unknown")).unwrap_err();
        assert_eq!(e.kind(), &SeqgenErrorKind::InvalidAllocationPolicy);
        let e = size_of(&registry, Some("broken")).unwrap_err();
        assert_eq!(e.kind(), &SeqgenErrorKind::InvalidAllocationPolicy);
    }

    #[test]
    fn rejects_ambiguous_names() {
        let registry = PolicyRegistry::default();
        for name in ["", " padded", "42", "-7"] {
            assert!(
                registry
                    .register_policy(name, Arc::new(TweakedPolicy))
                    .is_err(),
                "'{name}' should be rejected"
            );
        }
    }
}

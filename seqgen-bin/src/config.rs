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

//! Configuration parsing.

use seqgen::CoordinatorConfig;

/// Return the path of the JSON document that persists the sequences.
pub fn data_file() -> String {
    env_or_default("SEQGEN_DATA_FILE", "seqgen-data.json")
}

/// Return how many milliseconds to wait for a locked sequence.
pub fn lock_timeout_millis() -> u64 {
    env_or_default("SEQGEN_LOCK_TIMEOUT_MILLIS", "5000")
        .parse()
        .unwrap_or(5000)
}

/// Return the settings of the sequence coordinator.
pub fn coordinator_config() -> CoordinatorConfig {
    let defaults = CoordinatorConfig::default();
    CoordinatorConfig {
        // Unset is a legal choice, so don't warn about it.
        allocation_policy: std::env::var("SEQGEN_PREALLOCATOR").ok(),
        cache_capacity: env_or_default("SEQGEN_CACHE_SIZE", "1000")
            .parse()
            .unwrap_or(defaults.cache_capacity),
        ..defaults
    }
}

/// Return the address the HTTP server binds to.
pub fn bind_address() -> String {
    env_or_default("SEQGEN_BIND_ADDRESS", "0.0.0.0")
}

/// Return the port the HTTP server binds to.
pub fn bind_port() -> u16 {
    env_or_default("SEQGEN_BIND_PORT", "8080")
        .parse()
        .unwrap_or(8080)
}

/// Get environment variable by name or return a default value if the variable
/// isn't set.
fn env_or_default(name: &str, default_value: &str) -> String {
    std::env::var(name)
        .inspect_err(|_e| log::warn!("Missing env.{name} -> using default value '{default_value}'"))
        .unwrap_or(default_value.to_string())
}

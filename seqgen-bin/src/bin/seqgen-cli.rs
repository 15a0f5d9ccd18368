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

//! REST API CLI for Seqgen.

use reqwest::StatusCode;
use std::process::ExitCode;

/// Basic CLI that can be extended later.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    if let Err(e) = init_logger() {
        println!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }
    let mut args = std::env::args();
    let cli_name = args.next().unwrap_or_default();
    let command = args.next();
    if let Some(command) = command.as_deref()
        && let Some(schema_name) = args.next()
        && let Some(sequence_name) = args.next()
    {
        let base_url = args.next().unwrap_or("http://localhost:8080".to_string());
        let sequence_url = format!("{base_url}/api/v1/sequences/{schema_name}/{sequence_name}");
        match command {
            "next" => {
                if let Some(value) = next_value(&sequence_url).await {
                    log::info!("{value}");
                    return ExitCode::SUCCESS;
                }
                return ExitCode::FAILURE;
            }
            "peek" => {
                if let Some(value) = peek_value(&sequence_url).await {
                    match value {
                        Some(value) => log::info!("{value}"),
                        None => log::info!("Sequence has no more values."),
                    }
                    return ExitCode::SUCCESS;
                }
                return ExitCode::FAILURE;
            }
            "invalidate" => {
                if invalidate_cache(&sequence_url).await {
                    return ExitCode::SUCCESS;
                }
                return ExitCode::FAILURE;
            }
            _other => {}
        }
    }
    log::info!(
        "{cli_name} - Seqgen REST CLI

Usage:
    {cli_name} next <schema> <name> [base_url]
    {cli_name} peek <schema> <name> [base_url]
    {cli_name} invalidate <schema> <name> [base_url]

Example
    {cli_name} next app orders http://localhost:8080
    "
    );
    ExitCode::FAILURE
}

fn init_logger() -> Result<(), log::SetLoggerError> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .filter(Some("hyper_util"), log::LevelFilter::Info)
        .filter(Some("reqwest"), log::LevelFilter::Info)
        .write_style(env_logger::fmt::WriteStyle::Auto)
        .target(env_logger::fmt::Target::Stdout)
        .is_test(false)
        .parse_env(
            env_logger::Env::new()
                .filter("LOG_LEVEL")
                .write_style("LOG_STYLE"),
        )
        .try_init()
}

/// Invoke REST API and consume the next value of the sequence.
pub async fn next_value(sequence_url: &str) -> Option<i64> {
    let url = format!("{sequence_url}/next");
    if log::log_enabled!(log::Level::Debug) {
        log::debug!("POST '{url}'");
    }
    let client = reqwest::Client::new();
    let response = client
        .post(&url)
        .send()
        .await
        .inspect_err(|e| log::warn!("Request to '{url}' failed: {e}"))
        .ok()?;
    parse_value(&url, response).await.flatten()
}

/// Invoke REST API and look at the next value without consuming it.
///
/// The inner `None` means that the sequence has run out of values.
pub async fn peek_value(sequence_url: &str) -> Option<Option<i64>> {
    let url = format!("{sequence_url}/peek");
    if log::log_enabled!(log::Level::Debug) {
        log::debug!("GET '{url}'");
    }
    let response = reqwest::get(&url)
        .await
        .inspect_err(|e| log::warn!("Request to '{url}' failed: {e}"))
        .ok()?;
    parse_value(&url, response).await
}

/// Invoke REST API and discard the server's cached values of the sequence.
pub async fn invalidate_cache(sequence_url: &str) -> bool {
    let url = format!("{sequence_url}/cache");
    if log::log_enabled!(log::Level::Debug) {
        log::debug!("DELETE '{url}'");
    }
    let client = reqwest::Client::new();
    match client.delete(&url).send().await {
        Ok(response) => match response.status() {
            StatusCode::NO_CONTENT => {
                log::debug!("Ok");
                return true;
            }
            _other_status => {
                log::info!("Unexpected response status from '{url}': {response:?}");
            }
        },
        Err(e) => {
            log::warn!("Request to '{url}' failed: {e}");
        }
    }
    false
}

/// Extract the `value` of a successful response.
async fn parse_value(url: &str, response: reqwest::Response) -> Option<Option<i64>> {
    match response.status() {
        StatusCode::OK => {
            let body = response
                .text()
                .await
                .inspect_err(|e| log::warn!("Failed reading response from '{url}': {e}"))
                .ok()?;
            serde_json::from_str::<serde_json::Value>(&body)
                .inspect_err(|e| log::warn!("Failed parsing response from '{url}': {e}"))
                .ok()
                .map(|document| document["value"].as_i64())
        }
        StatusCode::NOT_FOUND => {
            log::info!("No such sequence.");
            None
        }
        _other_status => {
            let status = response.status();
            let reason = response.text().await.unwrap_or_default();
            log::info!("Unexpected response status {status} from '{url}': {reason}");
            None
        }
    }
}

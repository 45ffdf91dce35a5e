// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::time::Duration;

const DEFAULT_SINK_URL: &str = "http://localhost:9200";
/// Event buffering queue size.
const DEFAULT_BUFFER_SIZE: usize = 5000;
/// Size of one publishing bulk.
const DEFAULT_BULK_SIZE: usize = 500;
/// Budget for collecting one bulk, in millis.
const DEFAULT_BULK_TIMEOUT_MS: u64 = 5000;
/// Worker wait when the buffer is empty, in millis.
const DEFAULT_EMPTY_SLEEP_MS: u64 = 1000;
/// Worker sleep between probes while the sink is down, in millis.
const DEFAULT_SINK_DOWN_SLEEP_MS: u64 = 5000;
/// Timeout for one bulk request, in seconds.
const DEFAULT_FLUSH_TIMEOUT_SECS: u64 = 30;

/// Pipeline and sink-connection settings, read from `FLOW_*` environment
/// variables with compiled-in defaults. Credentials arrive here already
/// resolved; secret storage is the host's concern.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the indexing sink.
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub https_proxy: Option<String>,
    /// Capacity of the in-memory event queue.
    pub buffer_size: usize,
    /// Maximum records per bulk write.
    pub bulk_size: usize,
    /// Maximum time to accumulate one bulk after its first record.
    pub bulk_timeout: Duration,
    /// How long the worker waits on an empty queue before re-checking.
    pub empty_sleep: Duration,
    /// How long the worker sleeps between connectivity probes.
    pub sink_down_sleep: Duration,
    /// Timeout for one bulk HTTP request.
    pub flush_timeout: Duration,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|val| val.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Config, Box<dyn std::error::Error>> {
        let url = env::var("FLOW_SINK_URL").unwrap_or_else(|_| DEFAULT_SINK_URL.to_string());
        reqwest::Url::parse(&url)
            .map_err(|e| anyhow::anyhow!("Invalid FLOW_SINK_URL `{url}`: {e}"))?;

        let buffer_size = env_parse("FLOW_BUFFER_SIZE", DEFAULT_BUFFER_SIZE);
        if buffer_size == 0 {
            return Err(anyhow::anyhow!("FLOW_BUFFER_SIZE must be positive").into());
        }
        let bulk_size = env_parse("FLOW_BULK_SIZE", DEFAULT_BULK_SIZE);
        if bulk_size == 0 {
            return Err(anyhow::anyhow!("FLOW_BULK_SIZE must be positive").into());
        }

        Ok(Config {
            url,
            username: env::var("FLOW_SINK_USERNAME").ok(),
            password: env::var("FLOW_SINK_PASSWORD").ok(),
            https_proxy: env::var("FLOW_PROXY_HTTPS")
                .or_else(|_| env::var("HTTPS_PROXY"))
                .ok(),
            buffer_size,
            bulk_size,
            bulk_timeout: Duration::from_millis(env_parse(
                "FLOW_BULK_TIMEOUT_MS",
                DEFAULT_BULK_TIMEOUT_MS,
            )),
            empty_sleep: Duration::from_millis(env_parse(
                "FLOW_BUFFER_EMPTY_SLEEP_MS",
                DEFAULT_EMPTY_SLEEP_MS,
            )),
            sink_down_sleep: Duration::from_millis(env_parse(
                "FLOW_SINK_DOWN_SLEEP_MS",
                DEFAULT_SINK_DOWN_SLEEP_MS,
            )),
            flush_timeout: Duration::from_secs(env_parse(
                "FLOW_FLUSH_TIMEOUT_SECS",
                DEFAULT_FLUSH_TIMEOUT_SECS,
            )),
        })
    }
}

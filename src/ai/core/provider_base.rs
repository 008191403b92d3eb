// Shared HTTP client construction for all provider kinds

use std::time::Duration;

use reqwest::Client;

use crate::error::CoreResult;

/// Default request timeout for provider calls. Embedding batches on slow
/// self-hosted hardware can take a while.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Build the reqwest client every provider shares. One knob: an optional
/// timeout override (None keeps the default).
pub fn build_http_client(timeout_seconds: Option<u64>) -> CoreResult<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(
            timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS),
        ))
        .build()?;
    Ok(client)
}

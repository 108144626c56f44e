use std::future::Future;
use std::time::Duration;

use super::provider::{DirectoryError, DirectoryKey, DirectoryService};
use crate::types::{Identity, Locator};

/// Separator between the filename and the locator in a directory value
pub const VALUE_DELIMITER: &str = "::";

/// One published file, as read back from the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub filename: String,
    pub locator: Locator,
}

/// Encode a published file as `<filename>::<locator>`
pub fn encode_value(filename: &str, locator: &Locator) -> String {
    format!("{}{}{}", filename, VALUE_DELIMITER, locator)
}

/// Split a directory value on the first `::`.
///
/// A filename that itself contains `::` is split in the wrong place;
///  the wire format has no escaping.
pub fn decode_value(value: &str) -> Option<DirectoryEntry> {
    let (filename, locator) = value.split_once(VALUE_DELIMITER)?;
    Some(DirectoryEntry {
        filename: filename.to_string(),
        locator: Locator::from(locator),
    })
}

/// Exponential backoff applied to network failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    /// Delay before the second attempt, doubled after every failure
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Publish/lookup wrapper over a [`DirectoryService`].
#[derive(Debug, Clone)]
pub struct DirectoryAdapter<D: DirectoryService> {
    service: D,
    retry: RetryPolicy,
}

impl<D: DirectoryService> DirectoryAdapter<D> {
    pub fn new(service: D) -> Self {
        Self {
            service,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn service(&self) -> &D {
        &self.service
    }

    /// Announce `locator` as `filename` under `identity`
    pub async fn publish(
        &self,
        identity: &Identity,
        filename: &str,
        locator: &Locator,
    ) -> Result<(), DirectoryError<D::Error>> {
        let key = DirectoryKey::for_identity(identity);
        let value = encode_value(filename, locator);

        self.call_with_retry("publish", || self.service.put(&key, value.clone()))
            .await?;

        tracing::info!(%identity, %key, filename, "published directory entry");
        Ok(())
    }

    /// Every `(filename, locator)` published under `identity`.
    ///
    /// An identity with nothing published yields an empty list. Values
    ///  that do not contain the delimiter are skipped.
    pub async fn lookup(
        &self,
        identity: &Identity,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError<D::Error>> {
        let key = DirectoryKey::for_identity(identity);
        let values = self.call_with_retry("lookup", || self.service.get(&key)).await?;

        let entries: Vec<DirectoryEntry> = values
            .iter()
            .filter_map(|value| {
                let entry = decode_value(value);
                if entry.is_none() {
                    tracing::warn!(%identity, value = %value, "skipping malformed directory value");
                }
                entry
            })
            .collect();

        tracing::debug!(%identity, count = entries.len(), "directory lookup finished");
        Ok(entries)
    }

    /// Record that `provider` holds the content behind `locator`
    pub async fn announce_provider(
        &self,
        locator: &Locator,
        provider: &str,
    ) -> Result<(), DirectoryError<D::Error>> {
        let key = DirectoryKey::for_providers(locator);
        self.call_with_retry("announce", || self.service.put(&key, provider.to_string()))
            .await?;

        tracing::debug!(%locator, provider, "announced provider");
        Ok(())
    }

    /// Every provider announced for `locator`, first announcement first,
    ///  without repeats
    pub async fn providers(&self, locator: &Locator) -> Result<Vec<String>, DirectoryError<D::Error>> {
        let key = DirectoryKey::for_providers(locator);
        let values = self
            .call_with_retry("providers", || self.service.get(&key))
            .await?;

        let mut providers: Vec<String> = Vec::with_capacity(values.len());
        for value in values {
            if !providers.contains(&value) {
                providers.push(value);
            }
        }
        Ok(providers)
    }

    async fn call_with_retry<T, F, Fut>(
        &self,
        operation: &str,
        mut call: F,
    ) -> Result<T, DirectoryError<D::Error>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DirectoryError<D::Error>>>,
    {
        let attempts = self.retry.attempts.max(1);
        let mut delay = self.retry.base_delay;
        let mut attempt = 1;

        loop {
            match call().await {
                Err(err) if err.is_retryable() && attempt < attempts => {
                    tracing::warn!(
                        operation,
                        attempt,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        "directory call failed, retrying: {}",
                        err
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::{collections::HashMap, time::Duration};
use thiserror::Error;

use crate::constants::HTTP_USER_AGENT;

/// Provider name as published by the NPPES registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryRecord {
    pub full_name: String,
    pub npi: String,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("'{0}' is not a numeric NPI")]
    InvalidNpi(String),
    #[error("NPI API request failed for {npi}: {source}")]
    Transport {
        npi: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("NPI API returned status {status} for {npi}")]
    Status {
        npi: String,
        status: reqwest::StatusCode,
    },
    #[error("Invalid NPI API JSON for {npi}: {source}")]
    Malformed {
        npi: String,
        #[source]
        source: reqwest::Error,
    },
}

/// A source of registry records keyed by NPI.
pub trait NpiRegistry {
    fn fetch(&self, npi: &str) -> Result<Option<RegistryRecord>, RegistryError>;
}

pub struct NppesClient {
    client: Client,
    api_base_url: String,
    api_version: String,
}

impl NppesClient {
    pub fn new(
        api_base_url: &str,
        api_version: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(HTTP_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed creating HTTP client")?;
        Ok(Self {
            client,
            api_base_url: api_base_url.to_string(),
            api_version: api_version.to_string(),
        })
    }
}

impl NpiRegistry for NppesClient {
    fn fetch(&self, npi: &str) -> Result<Option<RegistryRecord>, RegistryError> {
        let npi = npi.trim();
        if !is_numeric_npi(npi) {
            return Err(RegistryError::InvalidNpi(npi.to_string()));
        }

        let response = self
            .client
            .get(&self.api_base_url)
            .query(&[("version", self.api_version.as_str()), ("number", npi)])
            .send()
            .map_err(|source| RegistryError::Transport {
                npi: npi.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status {
                npi: npi.to_string(),
                status,
            });
        }

        let body: NpiApiResponse = response.json().map_err(|source| RegistryError::Malformed {
            npi: npi.to_string(),
            source,
        })?;

        Ok(extract_name_from_response(&body).map(|full_name| RegistryRecord {
            full_name,
            npi: npi.to_string(),
        }))
    }
}

/// Registry used with `--skip-api`: every NPI is unknown.
pub struct OfflineRegistry;

impl NpiRegistry for OfflineRegistry {
    fn fetch(&self, _npi: &str) -> Result<Option<RegistryRecord>, RegistryError> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub failures: usize,
}

/// Run-scoped read-through cache in front of an [`NpiRegistry`].
///
/// Entries are never evicted. Failed lookups are stored as `None`, so an NPI that
/// errored once is treated as unknown for the rest of the run.
pub struct CachedRegistry<R> {
    inner: R,
    entries: HashMap<String, Option<RegistryRecord>>,
    stats: CacheStats,
}

impl<R: NpiRegistry> CachedRegistry<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Looks up an NPI, returning `None` for anything that is not a usable registry record.
    pub fn lookup(&mut self, npi: Option<&str>) -> Option<RegistryRecord> {
        let npi = npi.map(str::trim).filter(|v| is_numeric_npi(v))?;

        if let Some(cached) = self.entries.get(npi) {
            self.stats.hits += 1;
            return cached.clone();
        }

        self.stats.misses += 1;
        let outcome = match self.inner.fetch(npi) {
            Ok(record) => record,
            Err(err) => {
                self.stats.failures += 1;
                tracing::warn!("NPI registry lookup failed: {err}");
                None
            }
        };
        self.entries.insert(npi.to_string(), outcome.clone());
        outcome
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

fn is_numeric_npi(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Deserialize)]
struct NpiApiResponse {
    #[serde(default)]
    result_count: u64,
    #[serde(default)]
    results: Vec<NpiResult>,
}

#[derive(Debug, Deserialize)]
struct NpiResult {
    basic: Option<NpiBasic>,
}

#[derive(Debug, Deserialize)]
struct NpiBasic {
    organization_name: Option<String>,
    first_name: Option<String>,
    middle_name: Option<String>,
    last_name: Option<String>,
    credential: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Formats the first result as `"LAST, FIRST MIDDLE CREDENTIAL"`.
///
/// Organizations carry no personal name parts, so their organization name is used instead.
fn extract_name_from_response(response: &NpiApiResponse) -> Option<String> {
    if response.result_count == 0 && response.results.is_empty() {
        return None;
    }
    let basic = response.results.first()?.basic.as_ref()?;

    let first = non_empty(&basic.first_name);
    let middle = non_empty(&basic.middle_name);
    let last = non_empty(&basic.last_name);

    if first.is_none() && middle.is_none() && last.is_none() {
        return non_empty(&basic.organization_name).map(ToOwned::to_owned);
    }

    let first_middle = [first, middle]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    let credential = non_empty(&basic.credential).unwrap_or("");
    let name = format!("{}, {} {}", last.unwrap_or(""), first_middle, credential);
    Some(name.trim().to_string())
}

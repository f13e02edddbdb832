//! Reference enrichment: attach registry codes to records by normalised name.
//!
//! The registry spells names with accents and apostrophes (`Dias d'Ávila`),
//! the report usually in plain uppercase (`DIAS D AVILA`). Both sides are
//! reduced to the same join key by [`normalize_key`]:
//!
//! 1. decompose (NFD) and drop everything non-ASCII, which removes diacritics;
//! 2. apostrophes become spaces;
//! 3. remaining punctuation is removed;
//! 4. whitespace is collapsed and the result uppercased.
//!
//! The registry itself is scraped from an HTML page ([`scrape_registry`]) and
//! fetched through the [`RegistrySource`] trait so tests can inject fixtures.

use crate::config::PipelineConfig;
use crate::error::SafError;
use crate::record::{EnrichedRecord, Record, ReferenceEntry};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use unicode_normalization::UnicodeNormalization;

/// Normalise a place name into its join key.
pub fn normalize_key(text: &str) -> String {
    let cleaned: String = text
        .nfd()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '`' | '\'' => ' ',
            other => other,
        })
        .filter(char::is_ascii)
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_ascii_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}

/// Join key → code. The first entry wins when two names share a key.
pub fn build_index(entries: &[ReferenceEntry]) -> HashMap<String, String> {
    let mut index = HashMap::with_capacity(entries.len());
    for entry in entries {
        let key = normalize_key(&entry.name);
        if key.is_empty() {
            continue;
        }
        index.entry(key).or_insert_with(|| entry.code.clone());
    }
    index
}

/// Left-join records against the registry.
///
/// With `registry = None` (fetch failed or skipped) every record passes
/// through with `code = None`.
pub fn enrich(records: Vec<Record>, registry: Option<&[ReferenceEntry]>) -> Vec<EnrichedRecord> {
    let Some(entries) = registry else {
        return records
            .into_iter()
            .map(|r| EnrichedRecord::from_record(r, None))
            .collect();
    };

    let index = build_index(entries);
    let enriched: Vec<EnrichedRecord> = records
        .into_iter()
        .map(|record| {
            let code = index.get(&normalize_key(&record.municipality)).cloned();
            if code.is_none() {
                debug!("No registry match for '{}'", record.municipality);
            }
            EnrichedRecord::from_record(record, code)
        })
        .collect();

    let matched = enriched.iter().filter(|r| r.code.is_some()).count();
    info!(
        "Registry join: {}/{} records matched ({} registry entries)",
        matched,
        enriched.len(),
        index.len()
    );
    enriched
}

// ── Registry scraping ────────────────────────────────────────────────────────

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Scrape registry entries from the table whose `<thead>` has `id = region`.
///
/// The name column is the header containing "munic", the code column the
/// first header after it containing "digo" (`Código`/`Codigo`). When the
/// headers are unrecognisable the first two columns are used.
pub fn scrape_registry(html: &str, region: &str) -> Result<Vec<ReferenceEntry>, SafError> {
    let document = Html::parse_document(html);
    let head_css = format!("thead#{region}");
    let head_selector = Selector::parse(&head_css)
        .map_err(|e| SafError::RegistryFormat(format!("invalid region '{region}': {e:?}")))?;

    let thead = document
        .select(&head_selector)
        .next()
        .ok_or_else(|| SafError::RegistryFormat(format!("no table header with id '{region}'")))?;
    let table = thead
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table")
        .ok_or_else(|| {
            SafError::RegistryFormat(format!("header '{region}' is not inside a table"))
        })?;

    let headers: Vec<String> = thead
        .select(&selector("th"))
        .map(|th| element_text(th).to_lowercase())
        .collect();
    let pairs = column_pairs(&headers);
    debug!("Registry headers {:?} → column pairs {:?}", headers, pairs);

    let cell_selector = selector("td");
    let mut entries = Vec::new();
    for tr in table.select(&selector("tbody tr")) {
        let cells: Vec<String> = tr.select(&cell_selector).map(element_text).collect();
        if cells.is_empty() {
            continue;
        }
        for &(name_col, code_col) in &pairs {
            let (Some(name), Some(code)) = (cells.get(name_col), cells.get(code_col)) else {
                continue;
            };
            if !name.is_empty() && !code.is_empty() {
                entries.push(ReferenceEntry::new(name.clone(), code.clone()));
            }
        }
    }

    if entries.is_empty() {
        return Err(SafError::RegistryFormat(format!(
            "table '{region}' has no usable rows"
        )));
    }
    Ok(entries)
}

/// (name column, code column) pairs derived from header texts.
fn column_pairs(headers: &[String]) -> Vec<(usize, usize)> {
    let pairs: Vec<(usize, usize)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.contains("munic"))
        .filter_map(|(name_col, _)| {
            headers
                .iter()
                .enumerate()
                .skip(name_col + 1)
                .find(|(_, h)| h.contains("digo"))
                .map(|(code_col, _)| (name_col, code_col))
        })
        .collect();

    if pairs.is_empty() {
        vec![(0, 1)]
    } else {
        pairs
    }
}

// ── Registry sources ─────────────────────────────────────────────────────────

/// Anything that can produce the municipality registry.
pub trait RegistrySource {
    fn fetch_registry(
        &self,
    ) -> impl Future<Output = Result<Vec<ReferenceEntry>, SafError>> + Send;
}

/// Scrapes the registry page over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRegistrySource {
    client: reqwest::Client,
    url: String,
    region: String,
    timeout_secs: u64,
}

impl HttpRegistrySource {
    pub fn new(config: &PipelineConfig) -> Result<Self, SafError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.registry_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SafError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: config.registry_url.clone(),
            region: config.region.clone(),
            timeout_secs: config.registry_timeout_secs,
        })
    }
}

impl RegistrySource for HttpRegistrySource {
    async fn fetch_registry(&self) -> Result<Vec<ReferenceEntry>, SafError> {
        info!("Fetching registry from {} (region {})", self.url, self.region);
        let response = self
            .client
            .get(self.url.as_str())
            .send()
            .await
            .map_err(|e| SafError::from_reqwest(&self.url, self.timeout_secs, e))?;

        if !response.status().is_success() {
            return Err(SafError::FetchFailed {
                url: self.url.clone(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| SafError::from_reqwest(&self.url, self.timeout_secs, e))?;
        let entries = scrape_registry(&html, &self.region)?;
        info!("Registry: {} entries", entries.len());
        Ok(entries)
    }
}

/// A fixed registry, for offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    pub entries: Vec<ReferenceEntry>,
}

impl StaticRegistry {
    pub fn new(entries: Vec<ReferenceEntry>) -> Self {
        Self { entries }
    }
}

impl RegistrySource for StaticRegistry {
    async fn fetch_registry(&self) -> Result<Vec<ReferenceEntry>, SafError> {
        Ok(self.entries.clone())
    }
}

/// Caches another source's registry for `ttl`.
///
/// Each fetch publishes a new immutable snapshot; an old snapshot still held
/// by a caller is never modified.
pub struct CachedRegistry<R> {
    inner: R,
    ttl: Duration,
    slot: Mutex<Option<(Instant, Arc<Vec<ReferenceEntry>>)>>,
}

impl<R: RegistrySource + Sync> CachedRegistry<R> {
    pub fn new(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Current snapshot, refreshed from the inner source when stale.
    pub async fn snapshot(&self) -> Result<Arc<Vec<ReferenceEntry>>, SafError> {
        if let Some(hit) = self.fresh() {
            debug!("Registry cache hit ({} entries)", hit.len());
            return Ok(hit);
        }
        let entries = Arc::new(self.inner.fetch_registry().await?);
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some((Instant::now(), Arc::clone(&entries)));
        Ok(entries)
    }

    fn fresh(&self) -> Option<Arc<Vec<ReferenceEntry>>> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        let hit = slot
            .as_ref()
            .filter(|(at, _)| at.elapsed() < self.ttl)
            .map(|(_, entries)| Arc::clone(entries));
        hit
    }
}

impl<R: RegistrySource + Sync> RegistrySource for CachedRegistry<R> {
    async fn fetch_registry(&self) -> Result<Vec<ReferenceEntry>, SafError> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.as_ref().clone())
    }
}

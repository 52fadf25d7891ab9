//! Best-effort cover art lookup against the Open Library search API.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::APP_USER_AGENT;

const SEARCH_URL: &str = "https://openlibrary.org/search.json";

/// Served from public/images when no cover can be resolved.
pub const FALLBACK_COVER_PATH: &str = "/images/cover-fallback.jpg";

/// A slow metadata service must not stall the add-book request indefinitely.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    isbn: Option<Vec<String>>,
    cover_i: Option<i64>,
}

/// Prefer an ISBN-derived cover over the internal cover id.
fn cover_from_doc(doc: &SearchDoc) -> Option<String> {
    if let Some(isbn) = doc.isbn.as_ref().and_then(|list| list.first()) {
        return Some(format!("https://covers.openlibrary.org/b/isbn/{isbn}-L.jpg"));
    }
    doc.cover_i
        .map(|id| format!("https://covers.openlibrary.org/b/id/{id}-L.jpg"))
}

#[derive(Debug, Clone)]
pub struct CoverClient {
    http: reqwest::Client,
}

impl CoverClient {
    /// Build the client with a bounded request timeout.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .context("Failed to build cover lookup client")?;
        Ok(Self { http })
    }

    /// Resolve a cover URL for a book, falling back to the bundled image.
    ///
    /// Enrichment is best effort: network and parse failures are logged and
    /// resolved to the fallback path so rendering never breaks.
    pub async fn lookup(&self, title: &str, author: &str) -> String {
        match self.try_lookup(title, author).await {
            Ok(Some(url)) => url,
            Ok(None) => {
                debug!(title, author, "No cover found, using fallback");
                FALLBACK_COVER_PATH.to_string()
            }
            Err(err) => {
                warn!("Cover lookup failed: {err:#}");
                FALLBACK_COVER_PATH.to_string()
            }
        }
    }

    async fn try_lookup(&self, title: &str, author: &str) -> Result<Option<String>> {
        let response = self
            .http
            .get(SEARCH_URL)
            .query(&[("title", title), ("author", author), ("limit", "1")])
            .send()
            .await
            .context("Cover search request failed")?
            .error_for_status()
            .context("Cover search returned an error status")?;

        let results: SearchResponse = response
            .json()
            .await
            .context("Failed to parse cover search response")?;

        Ok(results.docs.first().and_then(cover_from_doc))
    }
}

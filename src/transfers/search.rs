//! Item-code suggestions for the row being typed.
//!
//! Every accepted query gets a sequence number; only the answer to the most
//! recently issued query may replace the suggestions.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument, warn};

use super::duplicate_guard::same_code;
use crate::catalog::CatalogApi;
use crate::errors::ServiceError;
use crate::models::ItemCodeMatch;

/// Shortest query sent to the server.
pub const MIN_QUERY_LEN: usize = 2;

static QUERY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9-]+$").expect("query pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Query too short: suggestions cleared, no call made.
    Cleared,
    /// Query has characters outside `[A-Za-z0-9-]`: no call made.
    Rejected,
    /// A newer query was issued before this one was answered.
    Stale,
    /// Suggestions replaced with this many entries.
    Updated(usize),
}

/// A query accepted for sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    seq: u64,
    query: String,
    location_id: i64,
}

impl SearchRequest {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn location_id(&self) -> i64 {
        self.location_id
    }
}

#[derive(Debug, Default)]
pub struct SearchCoordinator {
    latest: u64,
    suggestions: Vec<ItemCodeMatch>,
}

impl SearchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suggestions(&self) -> &[ItemCodeMatch] {
        &self.suggestions
    }

    /// Checks a query and, when it may be sent, issues a new sequence number.
    ///
    /// Any query, accepted or not, makes older in-flight answers stale.
    pub fn begin(&mut self, query: &str, location_id: i64) -> Result<SearchRequest, SearchOutcome> {
        self.latest += 1;
        let query = query.trim();

        if query.chars().count() < MIN_QUERY_LEN {
            self.suggestions.clear();
            return Err(SearchOutcome::Cleared);
        }
        if !QUERY_PATTERN.is_match(query) {
            debug!(query, "Rejecting search query with invalid characters");
            self.suggestions.clear();
            return Err(SearchOutcome::Rejected);
        }

        Ok(SearchRequest {
            seq: self.latest,
            query: query.to_string(),
            location_id,
        })
    }

    /// Applies the answer to `request` unless a newer query was issued.
    ///
    /// Codes listed in `in_use` are left out of the suggestions.
    pub fn complete(
        &mut self,
        request: SearchRequest,
        results: Result<Vec<ItemCodeMatch>, ServiceError>,
        in_use: &[&str],
    ) -> Result<SearchOutcome, ServiceError> {
        if request.seq != self.latest {
            debug!(
                query = %request.query,
                seq = request.seq,
                latest = self.latest,
                "Discarding stale search answer"
            );
            return Ok(SearchOutcome::Stale);
        }

        match results {
            Ok(matches) => {
                self.suggestions = matches
                    .into_iter()
                    .filter(|m| !in_use.iter().any(|code| same_code(code, &m.code)))
                    .collect();
                Ok(SearchOutcome::Updated(self.suggestions.len()))
            }
            Err(err) => {
                warn!(query = %request.query, error = %err, "Item code search failed");
                self.suggestions.clear();
                Err(err)
            }
        }
    }

    #[instrument(skip(self, catalog, in_use))]
    pub async fn search<C>(
        &mut self,
        catalog: &C,
        query: &str,
        location_id: i64,
        in_use: &[&str],
    ) -> Result<SearchOutcome, ServiceError>
    where
        C: CatalogApi + ?Sized,
    {
        let request = match self.begin(query, location_id) {
            Ok(request) => request,
            Err(outcome) => return Ok(outcome),
        };
        let results = catalog
            .search_item_codes(request.query(), request.location_id())
            .await;
        self.complete(request, results, in_use)
    }
}

//! Remote catalog access.
//!
//! Thin request/response wrappers over the PyrHouse REST API. Nothing here
//! retries or caches: each call reflects the server state at call time.

use async_trait::async_trait;

use crate::errors::ServiceError;
use crate::models::{
    ItemCodeLookup, ItemCodeMatch, StockLine, SubmissionPayload, TransferReceipt, User,
};

mod http;

pub use http::HttpCatalogClient;

/// Operations the transfer workflow needs from the server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Checks that an item code exists and is available for transfer.
    /// Fails with [`ServiceError::NotFound`] otherwise.
    async fn validate_item_code(&self, code: &str) -> Result<ItemCodeLookup, ServiceError>;

    /// Lists item codes of a location starting with `prefix`.
    async fn search_item_codes(
        &self,
        prefix: &str,
        location_id: i64,
    ) -> Result<Vec<ItemCodeMatch>, ServiceError>;

    async fn fetch_stock_lines(&self, location_id: i64) -> Result<Vec<StockLine>, ServiceError>;

    async fn fetch_users(&self) -> Result<Vec<User>, ServiceError>;

    async fn submit_transfer(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<TransferReceipt, ServiceError>;
}

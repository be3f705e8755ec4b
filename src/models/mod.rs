// Catalog read models
pub mod catalog;

// Transfer submission models
pub mod transfer;

pub use catalog::{ItemCodeLookup, ItemCodeMatch, StockLine, User};
pub use transfer::{AssetRef, StockRef, SubmissionPayload, TransferReceipt, UserRef};

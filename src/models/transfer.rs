use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRef {
    pub id: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: i64,
}

/// Body of `POST /transfers`.
///
/// Empty collections are left out of the JSON entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub from_location_id: i64,
    /// Destination location.
    pub location_id: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<AssetRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stocks: Vec<StockRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<UserRef>,
}

/// Transfer persisted by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub id: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_collections_are_omitted() {
        let payload = SubmissionPayload {
            from_location_id: 1,
            location_id: 2,
            assets: vec![AssetRef { id: 7 }],
            stocks: vec![],
            users: vec![],
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"from_location_id": 1, "location_id": 2, "assets": [{"id": 7}]})
        );
    }

    #[test]
    fn receipt_keeps_unknown_fields() {
        let receipt: TransferReceipt = serde_json::from_value(json!({
            "id": 31,
            "status": "created",
            "from_location_id": 1
        }))
        .unwrap();
        assert_eq!(receipt.id, 31);
        assert_eq!(receipt.details.get("from_location_id"), Some(&json!(1)));
    }
}

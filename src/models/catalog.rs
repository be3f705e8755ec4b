use serde::{Deserialize, Serialize};

/// Answer of the item-code validation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCodeLookup {
    pub id: i64,
    pub category: String,
}

/// One suggestion returned by the item-code search of a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCodeMatch {
    pub id: i64,
    #[serde(rename = "pyrcode")]
    pub code: String,
    pub category: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Bulk stock held at a location.
///
/// `available_quantity` is a snapshot taken at fetch time; the server remains
/// authoritative when the transfer is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub id: i64,
    pub category_id: i64,
    pub category_label: String,
    #[serde(default)]
    pub origin_tag: Option<String>,
    #[serde(alias = "quantity")]
    pub available_quantity: u32,
    pub location_id: i64,
}

impl StockLine {
    /// A stock line with nothing on hand cannot be chosen for a transfer.
    pub fn is_selectable(&self) -> bool {
        self.available_quantity > 0
    }

    pub fn display_label(&self) -> String {
        match &self.origin_tag {
            Some(origin) if !origin.is_empty() => format!("{} ({})", self.category_label, origin),
            _ => self.category_label.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_match_reads_pyrcode_field() {
        let parsed: ItemCodeMatch = serde_json::from_value(json!({
            "id": 4,
            "pyrcode": "PYR-0004",
            "category": "Projector",
            "location": "Main hall",
            "status": "in_stock"
        }))
        .unwrap();
        assert_eq!(parsed.code, "PYR-0004");
        assert_eq!(parsed.status.as_deref(), Some("in_stock"));
    }

    #[test]
    fn stock_line_accepts_quantity_alias() {
        let parsed: StockLine = serde_json::from_value(json!({
            "id": 9,
            "category_id": 3,
            "category_label": "HDMI cable",
            "quantity": 0,
            "location_id": 1
        }))
        .unwrap();
        assert_eq!(parsed.available_quantity, 0);
        assert!(!parsed.is_selectable());
        assert_eq!(parsed.display_label(), "HDMI cable");
    }
}

//! Catalog item models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Catalog item. Deletion only sets `is_deleted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Threat {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub summary: String,
    pub image: String,
    pub count: i32,
    pub price: i32,
    pub is_deleted: bool,
}

impl Threat {
    /// Name substring and inclusive price bounds
    pub fn matches(&self, filter: &ThreatFilter) -> bool {
        let name_matches = filter.query.is_empty()
            || self
                .name
                .to_lowercase()
                .contains(&filter.query.to_lowercase());

        name_matches && self.price >= filter.low_price && self.price <= filter.high_price
    }
}

/// Fields of a new catalog item
#[derive(Debug, Clone, Default)]
pub struct ThreatDraft {
    pub name: String,
    pub description: String,
    pub summary: String,
    pub image: String,
    pub count: i32,
    pub price: i32,
}

/// Partial update. `None`, empty strings and zero numbers leave the stored
/// value unchanged.
#[derive(Debug, Clone, Default)]
pub struct ThreatPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub image: Option<String>,
    pub count: Option<i32>,
    pub price: Option<i32>,
}

impl ThreatPatch {
    pub fn apply(self, threat: &mut Threat) {
        let text = |value: Option<String>| value.filter(|v| !v.is_empty());
        let number = |value: Option<i32>| value.filter(|v| *v != 0);

        if let Some(name) = text(self.name) {
            threat.name = name;
        }
        if let Some(description) = text(self.description) {
            threat.description = description;
        }
        if let Some(summary) = text(self.summary) {
            threat.summary = summary;
        }
        if let Some(image) = text(self.image) {
            threat.image = image;
        }
        if let Some(count) = number(self.count) {
            threat.count = count;
        }
        if let Some(price) = number(self.price) {
            threat.price = price;
        }
    }
}

pub const DEFAULT_LOW_PRICE: i32 = 0;
pub const DEFAULT_HIGH_PRICE: i32 = 1_000_000;

/// Raw catalog list query parameters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatQuery {
    pub query: Option<String>,
    pub low_price: Option<String>,
    pub high_price: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreatFilter {
    pub query: String,
    pub low_price: i32,
    pub high_price: i32,
}

impl ThreatFilter {
    /// Unparsable bounds fall back to the defaults; inverted bounds are an
    /// error.
    pub fn parse(query: &ThreatQuery) -> Result<Self, String> {
        let bound = |raw: &Option<String>, default: i32| {
            raw.as_deref()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        let filter = Self {
            query: query.query.clone().unwrap_or_default().trim().to_string(),
            low_price: bound(&query.low_price, DEFAULT_LOW_PRICE),
            high_price: bound(&query.high_price, DEFAULT_HIGH_PRICE),
        };

        if filter.low_price > filter.high_price {
            return Err("invalid price filter: lowPrice is greater than highPrice".to_string());
        }

        Ok(filter)
    }
}

/// Catalog list response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatList {
    pub threats: Vec<Threat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threat(name: &str, price: i32) -> Threat {
        Threat {
            id: 1,
            name: name.to_string(),
            description: "description".to_string(),
            summary: "summary".to_string(),
            image: String::new(),
            count: 5,
            price,
            is_deleted: false,
        }
    }

    fn query(q: Option<&str>, low: Option<&str>, high: Option<&str>) -> ThreatQuery {
        ThreatQuery {
            query: q.map(String::from),
            low_price: low.map(String::from),
            high_price: high.map(String::from),
        }
    }

    #[test]
    fn test_filter_defaults() {
        let filter = ThreatFilter::parse(&ThreatQuery::default()).unwrap();
        assert_eq!(filter.query, "");
        assert_eq!(filter.low_price, DEFAULT_LOW_PRICE);
        assert_eq!(filter.high_price, DEFAULT_HIGH_PRICE);
    }

    #[test]
    fn test_filter_unparsable_bounds_fall_back() {
        let filter = ThreatFilter::parse(&query(None, Some("cheap"), Some("1e3"))).unwrap();
        assert_eq!(filter.low_price, DEFAULT_LOW_PRICE);
        assert_eq!(filter.high_price, DEFAULT_HIGH_PRICE);
    }

    #[test]
    fn test_filter_rejects_inverted_bounds() {
        assert!(ThreatFilter::parse(&query(None, Some("500"), Some("100"))).is_err());
        assert!(ThreatFilter::parse(&query(None, Some("2000000"), None)).is_err());
    }

    #[test]
    fn test_matches_name_and_price() {
        let filter = ThreatFilter::parse(&query(Some("ddos"), Some("100"), Some("200"))).unwrap();
        assert!(threat("DDoS watch", 100).matches(&filter));
        assert!(threat("ddos shield", 200).matches(&filter));
        assert!(!threat("DDoS watch", 201).matches(&filter));
        assert!(!threat("Phishing", 150).matches(&filter));
    }

    #[test]
    fn test_patch_keeps_unset_fields() {
        let mut stored = threat("Original", 100);
        ThreatPatch {
            name: Some(String::new()),
            summary: Some("new summary".to_string()),
            count: Some(0),
            price: Some(250),
            ..Default::default()
        }
        .apply(&mut stored);

        assert_eq!(stored.name, "Original");
        assert_eq!(stored.summary, "new summary");
        assert_eq!(stored.count, 5);
        assert_eq!(stored.price, 250);
        assert_eq!(stored.description, "description");
    }

    #[test]
    fn test_threat_json_shape() {
        let json = serde_json::to_value(threat("X", 100)).unwrap();
        assert_eq!(json["name"], "X");
        assert_eq!(json["price"], 100);
        assert_eq!(json["isDeleted"], false);

        let list = serde_json::to_value(ThreatList {
            threats: vec![],
            draft_id: None,
        })
        .unwrap();
        assert!(list.get("draftId").is_none());
    }
}

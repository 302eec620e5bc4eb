//! Discovered token records.
//!
//! The scanner backend owns the full token schema; the client keeps the
//! fields it actually reads and passes everything else through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A token discovered by the scanner.
///
/// Pushed over the realtime channel (`new_token`) and returned by the
/// recent-tokens endpoint. Beyond the named fields the record is opaque.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TokenRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    /// Everything else the backend sent (address, risk score, liquidity, …).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenRecord {
    /// Display label: name, else symbol, else a placeholder.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.symbol.as_deref())
            .unwrap_or("Unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_prefers_name() {
        let token = TokenRecord {
            name: Some("Pepe Classic".into()),
            symbol: Some("PEPEC".into()),
            ..Default::default()
        };
        assert_eq!(token.label(), "Pepe Classic");
    }

    #[test]
    fn test_label_falls_back_to_symbol() {
        let token = TokenRecord {
            symbol: Some("PEPEC".into()),
            ..Default::default()
        };
        assert_eq!(token.label(), "PEPEC");
    }

    #[test]
    fn test_label_placeholder() {
        assert_eq!(TokenRecord::default().label(), "Unknown");
    }

    #[test]
    fn test_extra_fields_round_trip() {
        let json = r#"{"name":"Pepe","symbol":"PEPE","chain":"ethereum","address":"0xabc","risk_score":72}"#;
        let token: TokenRecord = serde_json::from_str(json).unwrap();
        assert_eq!(token.chain.as_deref(), Some("ethereum"));
        assert_eq!(token.extra["address"], "0xabc");
        assert_eq!(token.extra["risk_score"], 72);

        let back = serde_json::to_value(&token).unwrap();
        assert_eq!(back["address"], "0xabc");
    }
}

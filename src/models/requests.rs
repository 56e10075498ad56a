//! Request DTOs for the price API
//!
//! Defines the structure of incoming path parameters.

use serde::Deserialize;

/// Path parameters of GET /price/:app_id/:market_hash_name
#[derive(Debug, Clone, Deserialize)]
pub struct PricePath {
    /// Steam app id (730 = CS2, 570 = Dota 2)
    pub app_id: u32,
    /// Market hash name of the item
    pub market_hash_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_path_deserialize() {
        let json = r#"{"app_id": 730, "market_hash_name": "AK-47 | Redline"}"#;
        let path: PricePath = serde_json::from_str(json).unwrap();
        assert_eq!(path.app_id, 730);
        assert_eq!(path.market_hash_name, "AK-47 | Redline");
    }

    #[test]
    fn test_price_path_rejects_negative_app_id() {
        let json = r#"{"app_id": -1, "market_hash_name": "x"}"#;
        assert!(serde_json::from_str::<PricePath>(json).is_err());
    }
}

//! Zone listing

use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::operation::{ControlOperation, HttpMethod};
use crate::wire::WireZone;

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ListZonesRequest;

/// The listing is either a bare array or a paginated envelope
#[derive(Deserialize)]
#[serde(untagged)]
enum ZoneListing {
    Bare(Vec<WireZone>),
    Paginated { results: Vec<WireZone> },
}

/// List the zones visible to the authenticated client
pub struct ListZonesOperation;

impl ControlOperation for ListZonesOperation {
    type Request = ListZonesRequest;
    type Response = Vec<WireZone>;

    const METHOD: HttpMethod = HttpMethod::Get;
    const PATH: &'static str = "/zones/zones/";
    const NAME: &'static str = "ListZones";

    fn parse_response(value: serde_json::Value) -> Result<Self::Response> {
        if value.is_null() {
            return Ok(Vec::new());
        }
        match serde_json::from_value(value).map_err(|e| ApiError::ParseError(e.to_string()))? {
            ZoneListing::Bare(zones) => Ok(zones),
            ZoneListing::Paginated { results } => Ok(results),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_and_paginated_listing() {
        let bare = serde_json::json!([{"id": "z1", "name": "Lobby"}]);
        let zones = ListZonesOperation::parse_response(bare).unwrap();
        assert_eq!(zones.len(), 1);

        let paginated = serde_json::json!({
            "count": 2,
            "next": null,
            "results": [{"id": "z1", "name": "Lobby"}, {"id": "z2", "name": "Bar"}]
        });
        let zones = ListZonesOperation::parse_response(paginated).unwrap();
        assert_eq!(zones[1].name, "Bar");
    }

    #[test]
    fn test_unexpected_shape_is_parse_error() {
        let result = ListZonesOperation::parse_response(serde_json::json!({"detail": "nope"}));
        assert!(matches!(result, Err(ApiError::ParseError(_))));
    }
}

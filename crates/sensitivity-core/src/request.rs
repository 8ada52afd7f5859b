//! Inbound classification request.
//!
//! Payloads come from the workspace request list, so the wire keys follow
//! that list's column names (`Id`, `groupId`, `SpaceName`, ...). Decoding
//! is strict about the two identifiers and lenient about everything else.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SensitivityError};
use crate::types::Tier;

// ---------------------------------------------------------------------------
// ClassificationRequest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationRequest {
    pub request_id: String,
    pub group_id: String,
    pub item_id: Option<String>,
    pub display_name_en: Option<String>,
    pub display_name_fr: Option<String>,
    pub requester_name: Option<String>,
    pub requester_email: Option<String>,
    pub tier: Tier,
}

impl ClassificationRequest {
    /// Decode a payload that names its own tier (`tier` or `SecurityCategory`).
    pub fn parse(raw: &str) -> Result<Self> {
        Self::decode(raw, None)
    }

    /// Decode a payload delivered on a tier-bound channel. A tier named in
    /// the payload still takes precedence over `fallback`.
    pub fn parse_with_tier(raw: &str, fallback: Tier) -> Result<Self> {
        Self::decode(raw, Some(fallback))
    }

    fn decode(raw: &str, fallback: Option<Tier>) -> Result<Self> {
        let raw: RawRequest = serde_json::from_str(raw)
            .map_err(|e| SensitivityError::InvalidRequest(format!("malformed payload: {e}")))?;
        raw.validate(fallback)
    }

    /// English name if present, otherwise the French one.
    pub fn display_name(&self) -> &str {
        self.display_name_en
            .as_deref()
            .or(self.display_name_fr.as_deref())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct RawRequest {
    #[serde(rename = "Id", alias = "id", alias = "requestId", default)]
    id: Option<serde_json::Value>,
    #[serde(rename = "groupId", alias = "GroupId", default)]
    group_id: Option<String>,
    #[serde(rename = "itemId", alias = "ItemId", default)]
    item_id: Option<serde_json::Value>,
    #[serde(
        rename = "SpaceName",
        alias = "DisplayName",
        alias = "displayNameEn",
        default
    )]
    space_name_en: Option<String>,
    #[serde(rename = "SpaceNameFR", alias = "displayNameFr", default)]
    space_name_fr: Option<String>,
    #[serde(rename = "RequesterName", alias = "requesterName", default)]
    requester_name: Option<String>,
    #[serde(rename = "RequesterEmail", alias = "requesterEmail", default)]
    requester_email: Option<String>,
    #[serde(rename = "tier", alias = "Tier", alias = "SecurityCategory", default)]
    tier: Option<String>,
}

impl RawRequest {
    fn validate(self, fallback: Option<Tier>) -> Result<ClassificationRequest> {
        let request_id = scalar_to_string(self.id)
            .ok_or_else(|| SensitivityError::InvalidRequest("missing required field 'Id'".into()))?;
        let group_id = non_empty(self.group_id).ok_or_else(|| {
            SensitivityError::InvalidRequest("missing required field 'groupId'".into())
        })?;
        check_identifier("Id", &request_id)?;
        check_identifier("groupId", &group_id)?;

        let display_name_en = non_empty(self.space_name_en);
        let display_name_fr = non_empty(self.space_name_fr);
        if display_name_en.is_none() && display_name_fr.is_none() {
            return Err(SensitivityError::InvalidRequest(
                "at least one of 'SpaceName' or 'SpaceNameFR' is required".into(),
            ));
        }

        let tier = match non_empty(self.tier) {
            Some(name) => name.parse::<Tier>().map_err(|_| {
                SensitivityError::InvalidRequest(format!("unrecognised tier '{name}'"))
            })?,
            None => fallback.ok_or_else(|| {
                SensitivityError::InvalidRequest("payload does not name a tier".into())
            })?,
        };

        Ok(ClassificationRequest {
            request_id,
            group_id,
            item_id: scalar_to_string(self.item_id),
            display_name_en,
            display_name_fr,
            requester_name: non_empty(self.requester_name),
            requester_email: non_empty(self.requester_email),
            tier,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Both identifiers end up as URL path segments (group resource, site
/// address), so only plain id characters are accepted.
fn check_identifier(field: &str, value: &str) -> Result<()> {
    let plain = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if plain {
        Ok(())
    } else {
        Err(SensitivityError::InvalidRequest(format!(
            "field '{field}' may only contain letters, digits, '-' and '_': '{value}'"
        )))
    }
}

/// List item ids arrive as numbers or strings depending on the producer.
fn scalar_to_string(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) => non_empty(Some(s)),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid(result: Result<ClassificationRequest>) -> String {
        match result {
            Err(SensitivityError::InvalidRequest(msg)) => msg,
            other => panic!("expected InvalidRequest, got {other:?}"),
        }
    }

    #[test]
    fn parses_full_payload() {
        let raw = r#"{
            "Id": "R1",
            "groupId": "G1",
            "itemId": "I1",
            "SpaceName": "Team A",
            "SpaceNameFR": "Équipe A",
            "RequesterName": "Ada",
            "RequesterEmail": "a@b.com",
            "tier": "unclassified"
        }"#;
        let req = ClassificationRequest::parse(raw).unwrap();
        assert_eq!(req.request_id, "R1");
        assert_eq!(req.group_id, "G1");
        assert_eq!(req.item_id.as_deref(), Some("I1"));
        assert_eq!(req.display_name_fr.as_deref(), Some("Équipe A"));
        assert_eq!(req.requester_email.as_deref(), Some("a@b.com"));
        assert_eq!(req.tier, Tier::Unclassified);
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let raw = r#"{"Id": 42, "groupId": "G1", "itemId": 7, "SpaceName": "X"}"#;
        let req = ClassificationRequest::parse_with_tier(raw, Tier::Restricted).unwrap();
        assert_eq!(req.request_id, "42");
        assert_eq!(req.item_id.as_deref(), Some("7"));
    }

    #[test]
    fn missing_group_id_is_validation_error() {
        let raw = r#"{"Id": "R1", "SpaceName": "X", "tier": "unclassified"}"#;
        assert!(invalid(ClassificationRequest::parse(raw)).contains("groupId"));
    }

    #[test]
    fn blank_request_id_is_validation_error() {
        let raw = r#"{"Id": "  ", "groupId": "G1", "SpaceName": "X", "tier": "unclassified"}"#;
        assert!(invalid(ClassificationRequest::parse(raw)).contains("Id"));
    }

    #[test]
    fn path_characters_in_ids_are_rejected() {
        for (id, group) in [
            ("1/../../../sites/hr", "G1"),
            ("R1?x=1", "G1"),
            ("..", "G1"),
            ("R1", "OTHER/owners/admin/$ref#"),
            ("R1", "G1%2F.."),
            ("R1", "G 1"),
        ] {
            let raw = serde_json::json!({
                "Id": id,
                "groupId": group,
                "SpaceName": "X",
                "tier": "unclassified",
            })
            .to_string();
            let msg = invalid(ClassificationRequest::parse(&raw));
            assert!(msg.contains("may only contain"), "{id} / {group}: {msg}");
        }
    }

    #[test]
    fn guid_group_id_is_accepted() {
        let raw = r#"{"Id": 17, "groupId": "0f8fad5b-d9cb-469f-a165-70867728950e", "SpaceName": "X", "tier": "restricted"}"#;
        let req = ClassificationRequest::parse(raw).unwrap();
        assert_eq!(req.group_id, "0f8fad5b-d9cb-469f-a165-70867728950e");
    }

    #[test]
    fn one_localized_name_is_enough() {
        let raw = r#"{"Id": "R1", "groupId": "G1", "SpaceNameFR": "Équipe"}"#;
        let req = ClassificationRequest::parse_with_tier(raw, Tier::Unclassified).unwrap();
        assert!(req.display_name_en.is_none());
        assert_eq!(req.display_name(), "Équipe");
    }

    #[test]
    fn no_localized_name_is_validation_error() {
        let raw = r#"{"Id": "R1", "groupId": "G1"}"#;
        assert!(
            invalid(ClassificationRequest::parse_with_tier(raw, Tier::Unclassified))
                .contains("SpaceName")
        );
    }

    #[test]
    fn legacy_display_name_key_maps_to_english_name() {
        let raw = r#"{"Id": "R1", "groupId": "G1", "DisplayName": "Legacy"}"#;
        let req = ClassificationRequest::parse_with_tier(raw, Tier::Restricted).unwrap();
        assert_eq!(req.display_name_en.as_deref(), Some("Legacy"));
    }

    #[test]
    fn payload_tier_wins_over_channel_tier() {
        let raw = r#"{"Id": "R1", "groupId": "G1", "SpaceName": "X", "SecurityCategory": "prob"}"#;
        let req = ClassificationRequest::parse_with_tier(raw, Tier::Unclassified).unwrap();
        assert_eq!(req.tier, Tier::Restricted);
    }

    #[test]
    fn tier_is_required_without_fallback() {
        let raw = r#"{"Id": "R1", "groupId": "G1", "SpaceName": "X"}"#;
        assert!(invalid(ClassificationRequest::parse(raw)).contains("tier"));
    }

    #[test]
    fn unknown_payload_tier_is_validation_error() {
        let raw = r#"{"Id": "R1", "groupId": "G1", "SpaceName": "X", "tier": "top-secret"}"#;
        assert!(invalid(ClassificationRequest::parse(raw)).contains("top-secret"));
    }

    #[test]
    fn malformed_json_is_validation_error() {
        assert!(invalid(ClassificationRequest::parse("not json")).contains("malformed"));
    }
}

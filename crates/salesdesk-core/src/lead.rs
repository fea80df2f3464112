//! Lead records, list pages and the per-record classification rules used by
//! client-side scans

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Source label marking leads that came through a channel partner
pub const CHANNEL_PARTNER_SOURCE: &str = "Channel Partner";

/// One page of a paginated list endpoint
///
/// Accepts both the paged envelope `{results, next}` and a bare JSON array,
/// which is treated as a single final page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Records on this page
    pub results: Vec<T>,
    /// URL of the next page, if any
    pub next: Option<String>,
    /// Total record count reported by the backend
    pub count: Option<u64>,
}

impl<T> Page<T> {
    /// Whether the backend indicates another page
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.next.as_deref().is_some_and(|n| !n.is_empty())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Page<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire<T> {
            Bare(Vec<T>),
            Paged {
                #[serde(default = "Vec::new")]
                results: Vec<T>,
                #[serde(default)]
                next: Option<String>,
                #[serde(default)]
                count: Option<u64>,
            },
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Bare(results) => Self {
                results,
                next: None,
                count: None,
            },
            Wire::Paged {
                results,
                next,
                count,
            } => Self {
                results,
                next,
                count,
            },
        })
    }
}

/// Sales lead as returned by the lead list endpoint
///
/// Only the fields the client classifies on are typed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadRecord {
    /// Status label (`Hot`, `warm `, ...)
    #[serde(default)]
    pub status_name: Option<String>,

    /// Source label
    #[serde(default)]
    pub source_name: Option<String>,

    /// Channel partner id or name
    #[serde(default)]
    pub channel_partner: Option<Value>,

    /// Channel partner display name
    #[serde(default)]
    pub channel_partner_name: Option<Value>,

    /// Partner referral code
    #[serde(default)]
    pub cp_referral_code: Option<Value>,

    /// Lead mobile number
    #[serde(default)]
    pub mobile_number: Option<Value>,

    /// Remaining fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl LeadRecord {
    /// Classify the lead into a status bucket
    #[must_use]
    pub fn status(&self) -> Option<LeadStatus> {
        self.status_name.as_deref().and_then(LeadStatus::parse)
    }

    /// Identity of the partner behind a channel-partner lead
    ///
    /// Falls through `channel_partner`, `channel_partner_name`,
    /// `cp_referral_code` and `mobile_number`, taking the first non-empty one.
    #[must_use]
    pub fn partner_key(&self) -> Option<String> {
        if self.source_name.as_deref() != Some(CHANNEL_PARTNER_SOURCE) {
            return None;
        }

        [
            &self.channel_partner,
            &self.channel_partner_name,
            &self.cp_referral_code,
            &self.mobile_number,
        ]
        .into_iter()
        .find_map(|v| v.as_ref().and_then(present_key))
    }
}

fn present_key(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

/// Lead temperature bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LeadStatus {
    /// Ready to buy
    Hot,
    /// Interested
    Warm,
    /// Low intent
    Cold,
}

impl LeadStatus {
    /// All buckets in display order
    pub const ALL: [Self; 3] = [Self::Hot, Self::Warm, Self::Cold];

    /// Parse a status label, ignoring case and surrounding whitespace
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "hot" => Some(Self::Hot),
            "warm" => Some(Self::Warm),
            "cold" => Some(Self::Cold),
            _ => None,
        }
    }

    /// Weight used by the lead quality score, in percent
    #[must_use]
    pub const fn quality_weight(self) -> u64 {
        match self {
            Self::Hot => 100,
            Self::Warm => 70,
            Self::Cold => 30,
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hot => write!(f, "Hot"),
            Self::Warm => write!(f, "Warm"),
            Self::Cold => write!(f, "Cold"),
        }
    }
}

/// Hot/Warm/Cold counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTally {
    /// Hot leads
    #[serde(rename = "Hot", default)]
    pub hot: u64,
    /// Warm leads
    #[serde(rename = "Warm", default)]
    pub warm: u64,
    /// Cold leads
    #[serde(rename = "Cold", default)]
    pub cold: u64,
}

impl StatusTally {
    /// Count for one bucket
    #[must_use]
    pub const fn get(&self, status: LeadStatus) -> u64 {
        match status {
            LeadStatus::Hot => self.hot,
            LeadStatus::Warm => self.warm,
            LeadStatus::Cold => self.cold,
        }
    }

    /// Bump one bucket
    pub const fn increment(&mut self, status: LeadStatus) {
        match status {
            LeadStatus::Hot => self.hot += 1,
            LeadStatus::Warm => self.warm += 1,
            LeadStatus::Cold => self.cold += 1,
        }
    }

    /// Sum of the three buckets
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.hot.saturating_add(self.warm).saturating_add(self.cold)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn lead(value: Value) -> LeadRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_status_parsing_normalizes() {
        assert_eq!(LeadStatus::parse(" HOT "), Some(LeadStatus::Hot));
        assert_eq!(LeadStatus::parse("warm"), Some(LeadStatus::Warm));
        assert_eq!(LeadStatus::parse("Cold\n"), Some(LeadStatus::Cold));
        assert_eq!(LeadStatus::parse("Lost"), None);
        assert_eq!(LeadStatus::parse(""), None);
    }

    #[test]
    fn test_record_status() {
        assert_eq!(lead(json!({"status_name": "Hot"})).status(), Some(LeadStatus::Hot));
        assert_eq!(lead(json!({"status_name": null})).status(), None);
        assert_eq!(lead(json!({})).status(), None);
    }

    #[test]
    fn test_partner_key_fallthrough() {
        let by_id = lead(json!({"source_name": "Channel Partner", "channel_partner": 12, "mobile_number": "999"}));
        assert_eq!(by_id.partner_key().as_deref(), Some("12"));

        let by_code = lead(json!({
            "source_name": "Channel Partner",
            "channel_partner": null,
            "channel_partner_name": "",
            "cp_referral_code": "CP-7"
        }));
        assert_eq!(by_code.partner_key().as_deref(), Some("CP-7"));

        let by_mobile = lead(json!({"source_name": "Channel Partner", "mobile_number": "98200"}));
        assert_eq!(by_mobile.partner_key().as_deref(), Some("98200"));

        let keyless = lead(json!({"source_name": "Channel Partner"}));
        assert_eq!(keyless.partner_key(), None);
    }

    #[test]
    fn test_partner_key_requires_partner_source() {
        let walk_in = lead(json!({"source_name": "Walk-in", "channel_partner": 12}));
        assert_eq!(walk_in.partner_key(), None);
    }

    #[test]
    fn test_page_envelope_and_bare_array() {
        let paged: Page<LeadRecord> = serde_json::from_value(json!({
            "count": 3,
            "next": "http://api/sales/sales-leads/?page=2",
            "results": [{"status_name": "Hot"}]
        }))
        .unwrap();
        assert!(paged.has_next());
        assert_eq!(paged.count, Some(3));
        assert_eq!(paged.results.len(), 1);

        let last: Page<LeadRecord> =
            serde_json::from_value(json!({"next": null, "results": []})).unwrap();
        assert!(!last.has_next());

        let empty_next: Page<LeadRecord> =
            serde_json::from_value(json!({"next": "", "results": []})).unwrap();
        assert!(!empty_next.has_next());

        let bare: Page<LeadRecord> =
            serde_json::from_value(json!([{"status_name": "Cold"}, {}])).unwrap();
        assert!(!bare.has_next());
        assert_eq!(bare.results.len(), 2);
    }

    #[test]
    fn test_status_tally() {
        let mut tally = StatusTally::default();
        tally.increment(LeadStatus::Hot);
        tally.increment(LeadStatus::Hot);
        tally.increment(LeadStatus::Cold);

        assert_eq!(tally.get(LeadStatus::Hot), 2);
        assert_eq!(tally.get(LeadStatus::Warm), 0);
        assert_eq!(tally.total(), 3);
        assert_eq!(
            serde_json::to_value(tally).unwrap(),
            json!({"Hot": 2, "Warm": 0, "Cold": 1})
        );
    }
}

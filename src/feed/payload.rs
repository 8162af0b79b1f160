//! Raw GraphQL payloads returned by the racing info endpoint

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingsData {
    #[serde(rename = "raceMeetings", default)]
    pub race_meetings: Vec<RawMeeting>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMeeting {
    /// Odds query alias
    #[serde(rename = "pmPools", default)]
    pub pm_pools: Vec<RawPool>,
    /// Investment query alias
    #[serde(rename = "poolInvs", default)]
    pub pool_invs: Vec<RawPool>,
    #[serde(default)]
    pub races: Vec<RawRace>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPool {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "oddsType")]
    pub odds_type: String,
    /// Number or numeric string
    #[serde(default)]
    pub investment: Option<Value>,
    #[serde(rename = "oddsNodes", default)]
    pub odds_nodes: Vec<RawOddsNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOddsNode {
    #[serde(rename = "combString")]
    pub comb_string: String,
    /// Decimal string, or `"SCR"` for a scratched runner
    #[serde(rename = "oddsValue")]
    pub odds_value: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRace {
    pub no: Value,
    #[serde(rename = "postTime", default)]
    pub post_time: Option<String>,
    #[serde(default)]
    pub runners: Vec<RawRunner>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRunner {
    #[serde(default)]
    pub no: Option<Value>,
    #[serde(rename = "standbyNo", default)]
    pub standby_no: Option<String>,
    #[serde(default)]
    pub name_ch: Option<String>,
    #[serde(default)]
    pub name_en: Option<String>,
    #[serde(default)]
    pub jockey: Option<RawPerson>,
    #[serde(default)]
    pub trainer: Option<RawPerson>,
    #[serde(default)]
    pub last6run: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPerson {
    #[serde(default)]
    pub name_ch: Option<String>,
    #[serde(default)]
    pub name_en: Option<String>,
}

/// Read a number that may arrive as JSON number or string
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_odds_response() {
        let body = r#"{
            "data": {
                "raceMeetings": [{
                    "pmPools": [{
                        "id": "20240512ST0101WIN",
                        "oddsType": "WIN",
                        "oddsNodes": [
                            {"combString": "01", "oddsValue": "3.5"},
                            {"combString": "02", "oddsValue": "SCR"}
                        ]
                    }]
                }]
            }
        }"#;
        let resp: GraphQlResponse<MeetingsData> = serde_json::from_str(body).unwrap();
        let meetings = resp.data.unwrap().race_meetings;
        assert_eq!(meetings.len(), 1);
        let pool = &meetings[0].pm_pools[0];
        assert_eq!(pool.odds_type, "WIN");
        assert_eq!(pool.odds_nodes.len(), 2);
        assert!(meetings[0].pool_invs.is_empty());
    }

    #[test]
    fn test_value_as_f64() {
        assert_eq!(value_as_f64(&Value::from(12.5)), Some(12.5));
        assert_eq!(value_as_f64(&Value::from("1034567.0")), Some(1034567.0));
        assert_eq!(value_as_f64(&Value::from("SCR")), None);
        assert_eq!(value_as_f64(&Value::Null), None);
    }
}

// Public player catalog: canonical player records and feed normalization.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::fetch::CatalogSource;

/// Catalog keyed by player id. Ordered so downstream iteration is
/// reproducible for identical inputs.
pub type Catalog = BTreeMap<u32, PlayerRecord>;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Playing position, derived from the feed's numeric skill code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "GK")]
    Gk,
    #[serde(rename = "DEF")]
    Def,
    #[serde(rename = "MID")]
    Mid,
    #[serde(rename = "FWD")]
    Fwd,
    #[serde(rename = "OTH")]
    Other,
}

impl Position {
    /// Map a skill code (1 = GK, 2 = DEF, 3 = MID, 4 = FWD). Any other code
    /// yields `fallback`, which differs between catalog normalization (MID)
    /// and placeholders for players missing from the catalog (OTH).
    pub fn from_skill(code: i64, fallback: Position) -> Self {
        match code {
            1 => Position::Gk,
            2 => Position::Def,
            3 => Position::Mid,
            4 => Position::Fwd,
            _ => fallback,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Gk => "GK",
            Position::Def => "DEF",
            Position::Mid => "MID",
            Position::Fwd => "FWD",
            Position::Other => "OTH",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_str())
    }
}

// ---------------------------------------------------------------------------
// PlayerRecord
// ---------------------------------------------------------------------------

/// One player from the public catalog, normalized to typed defaults.
/// Immutable once fetched for a matchday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub id: u32,
    pub name: String,
    pub full_name: String,
    pub team: String,
    pub team_code: String,
    #[serde(rename = "pos")]
    pub position: Position,
    #[serde(rename = "totPts")]
    pub total_points: i64,
    #[serde(rename = "gdPts")]
    pub matchday_points: i64,
    pub goals: i64,
    pub assists: i64,
    pub clean_sheets: i64,
    #[serde(rename = "selPer")]
    pub selection_pct: f64,
    /// Market value as reported by the feed.
    pub value: f64,
    /// Value in display units (the feed sometimes reports tenths).
    pub price: f64,
    pub rating: f64,
    pub status: String,
    pub yellow_cards: i64,
    pub red_cards: i64,
    #[serde(rename = "motm")]
    pub man_of_match_count: i64,
}

impl PlayerRecord {
    /// Normalize one `playerList` element. Returns `None` when the element
    /// carries no usable id.
    pub fn from_feed(raw: &Value) -> Option<Self> {
        let id = read_id(raw.get("id")?)?;
        let value = number(raw, &["value"]);
        let name = text(raw, &["pDName", "webName"]).unwrap_or_else(|| format!("#{id}"));

        Some(PlayerRecord {
            id,
            full_name: text(raw, &["pFName"]).unwrap_or_else(|| name.clone()),
            name,
            team: text(raw, &["tName"]).unwrap_or_default(),
            team_code: text(raw, &["tSCode", "cCode"]).unwrap_or_default(),
            position: Position::from_skill(integer(raw, &["skill"]), Position::Mid),
            total_points: integer(raw, &["totPts"]),
            matchday_points: integer(raw, &["gdPts", "lastGdPoints"]),
            goals: integer(raw, &["gS", "goals"]),
            assists: integer(raw, &["assist", "gA"]),
            clean_sheets: integer(raw, &["cS"]),
            selection_pct: number(raw, &["selPer"]),
            value,
            price: display_price(value),
            rating: number(raw, &["rating"]),
            status: text(raw, &["pStatus", "status"]).unwrap_or_default(),
            yellow_cards: integer(raw, &["yC"]),
            red_cards: integer(raw, &["rC"]),
            man_of_match_count: integer(raw, &["mOM"]),
        })
    }
}

/// The feed reports some values in tenths (e.g. 95 for 9.5); anything above
/// 50 is treated as tenths.
pub fn display_price(value: f64) -> f64 {
    if value > 50.0 {
        value / 10.0
    } else {
        value
    }
}

// ---------------------------------------------------------------------------
// Catalog normalization
// ---------------------------------------------------------------------------

/// Decode a catalog payload of shape `{data:{value:{playerList:[...]}}}`.
///
/// A payload without that shape is `FetchError::Malformed`. Individual
/// entries without an id are skipped; when an id repeats, the last entry wins.
pub fn parse_catalog(payload: &Value) -> Result<Catalog, FetchError> {
    let list = payload
        .pointer("/data/value/playerList")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::Malformed("missing data.value.playerList array".into()))?;

    let mut catalog = Catalog::new();
    for raw in list {
        match PlayerRecord::from_feed(raw) {
            Some(player) => {
                catalog.insert(player.id, player);
            }
            None => warn!("skipping catalog entry without a usable id"),
        }
    }
    Ok(catalog)
}

/// Fetches and normalizes the public catalog. No retries; failures
/// propagate to the caller.
#[derive(Clone)]
pub struct PublicCatalogFetcher {
    source: Arc<dyn CatalogSource>,
}

impl PublicCatalogFetcher {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self { source }
    }

    pub async fn fetch(&self, matchday: u32) -> Result<Catalog, FetchError> {
        let payload = self.source.fetch_catalog(matchday).await?;
        let catalog = parse_catalog(&payload)?;
        debug!(matchday, players = catalog.len(), "catalog normalized");
        Ok(catalog)
    }
}

// ---------------------------------------------------------------------------
// Field helpers (shared with manager snapshot parsing)
// ---------------------------------------------------------------------------

/// Ids arrive either as JSON numbers or as numeric strings.
pub(crate) fn read_id(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// First field among `keys` that parses as a number, numeric strings included.
pub(crate) fn parsed_number(raw: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|k| raw.get(*k))
        .find_map(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
}

/// Like [`parsed_number`], defaulting to 0.
pub(crate) fn number(raw: &Value, keys: &[&str]) -> f64 {
    parsed_number(raw, keys).unwrap_or(0.0)
}

pub(crate) fn integer(raw: &Value, keys: &[&str]) -> i64 {
    number(raw, keys).round() as i64
}

/// First present, non-empty string field among `keys`.
pub(crate) fn text(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| raw.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(players: Value) -> Value {
        json!({ "data": { "value": { "playerList": players } } })
    }

    #[test]
    fn skill_codes_map_to_positions() {
        assert_eq!(Position::from_skill(1, Position::Mid), Position::Gk);
        assert_eq!(Position::from_skill(2, Position::Mid), Position::Def);
        assert_eq!(Position::from_skill(3, Position::Other), Position::Mid);
        assert_eq!(Position::from_skill(4, Position::Mid), Position::Fwd);
        assert_eq!(Position::from_skill(0, Position::Mid), Position::Mid);
        assert_eq!(Position::from_skill(9, Position::Other), Position::Other);
    }

    #[test]
    fn full_entry_is_normalized() {
        let catalog = parse_catalog(&payload(json!([{
            "id": "250",
            "pDName": "Saka",
            "pFName": "Bukayo Saka",
            "tName": "Arsenal",
            "tSCode": "ARS",
            "skill": 3,
            "totPts": 42,
            "gdPts": 9,
            "gS": 3,
            "assist": 4,
            "cS": 1,
            "selPer": 37.5,
            "value": 95,
            "rating": 7.8,
            "pStatus": "available",
            "yC": 1,
            "rC": 0,
            "mOM": 2
        }])))
        .unwrap();

        let p = &catalog[&250];
        assert_eq!(p.name, "Saka");
        assert_eq!(p.full_name, "Bukayo Saka");
        assert_eq!(p.team, "Arsenal");
        assert_eq!(p.team_code, "ARS");
        assert_eq!(p.position, Position::Mid);
        assert_eq!(p.total_points, 42);
        assert_eq!(p.matchday_points, 9);
        assert_eq!(p.goals, 3);
        assert_eq!(p.assists, 4);
        assert_eq!(p.clean_sheets, 1);
        assert!((p.selection_pct - 37.5).abs() < f64::EPSILON);
        assert!((p.price - 9.5).abs() < f64::EPSILON);
        assert_eq!(p.status, "available");
        assert_eq!(p.yellow_cards, 1);
        assert_eq!(p.man_of_match_count, 2);
    }

    #[test]
    fn nullable_fields_default_to_zero() {
        let catalog = parse_catalog(&payload(json!([{
            "id": 7,
            "webName": "Keeper",
            "skill": null,
            "totPts": null,
            "selPer": null
        }])))
        .unwrap();

        let p = &catalog[&7];
        assert_eq!(p.name, "Keeper");
        assert_eq!(p.position, Position::Mid);
        assert_eq!(p.total_points, 0);
        assert_eq!(p.selection_pct, 0.0);
        assert_eq!(p.value, 0.0);
        assert!(p.team.is_empty());
    }

    #[test]
    fn entries_without_id_are_skipped() {
        let catalog = parse_catalog(&payload(json!([
            { "pDName": "Ghost" },
            { "id": 3, "pDName": "Real" }
        ])))
        .unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.contains_key(&3));
    }

    #[test]
    fn missing_player_list_is_malformed() {
        let err = parse_catalog(&json!({ "data": { "value": {} } })).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));

        let err = parse_catalog(&json!({ "data": { "value": { "playerList": {} } } })).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[test]
    fn small_values_are_already_display_price() {
        assert_eq!(display_price(9.5), 9.5);
        assert_eq!(display_price(50.0), 50.0);
        assert_eq!(display_price(105.0), 10.5);
    }

    #[test]
    fn position_serializes_as_short_code() {
        assert_eq!(serde_json::to_string(&Position::Fwd).unwrap(), "\"FWD\"");
        assert_eq!(serde_json::to_string(&Position::Other).unwrap(), "\"OTH\"");
    }
}

// Tracked managers: team snapshot normalization and tolerant batch fetching.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::FetchError;
use crate::fetch::SnapshotSource;
use crate::player::{integer, parsed_number, read_id, text};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One player entry in a manager's roster, carrying only the fields that
/// are specific to that manager's team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub player_id: u32,
    pub is_captain: bool,
    pub is_starter: bool,
    pub bench_position: u32,
    pub minutes_played: u32,
    /// Points this player scored for the manager on the matchday (includes
    /// the captain multiplier).
    pub points: Option<i64>,
    pub is_man_of_match: Option<bool>,
    /// The roster's own copy of the player's value, used when the catalog
    /// has no entry for the player.
    pub value: Option<f64>,
}

/// A manager's team as reported for one matchday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerSnapshot {
    pub guid: String,
    pub username: String,
    pub team_name: String,
    pub matchday_points: i64,
    pub matchday_rank: i64,
    pub overall_points: i64,
    pub overall_rank: i64,
    pub captain_id: Option<u32>,
    pub roster: Vec<RosterEntry>,
}

// ---------------------------------------------------------------------------
// Aliases
// ---------------------------------------------------------------------------

/// Replace an upstream username with a short display name when `pattern`
/// appears in it (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerAlias {
    pub pattern: String,
    pub display: String,
}

/// Ordered alias table; the first matching pattern wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerAliases(Vec<ManagerAlias>);

impl ManagerAliases {
    pub fn new(aliases: Vec<ManagerAlias>) -> Self {
        Self(aliases)
    }

    pub fn remap(&self, username: &str) -> String {
        let lowered = username.to_lowercase();
        self.0
            .iter()
            .find(|a| !a.pattern.is_empty() && lowered.contains(&a.pattern.to_lowercase()))
            .map(|a| a.display.clone())
            .unwrap_or_else(|| username.to_string())
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Decode one manager payload of shape `{data:{value:{...}}}`.
pub fn parse_snapshot(guid: &str, payload: &Value) -> Result<ManagerSnapshot, FetchError> {
    let value = payload
        .pointer("/data/value")
        .filter(|v| v.is_object())
        .ok_or_else(|| FetchError::Malformed("missing data.value object".into()))?;

    let roster: Vec<RosterEntry> = value
        .get("playerid")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(parse_roster_entry).collect())
        .unwrap_or_default();

    let captain_id = value
        .get("captainId")
        .and_then(read_id)
        .or_else(|| roster.iter().find(|e| e.is_captain).map(|e| e.player_id));

    Ok(ManagerSnapshot {
        guid: guid.to_string(),
        username: text(value, &["username"]).unwrap_or_else(|| "Unknown".to_string()),
        team_name: text(value, &["teamName"]).unwrap_or_default(),
        matchday_points: integer(value, &["gdPoints"]),
        matchday_rank: integer(value, &["gdRank"]),
        overall_points: integer(value, &["ovPoints"]),
        overall_rank: integer(value, &["ovRank"]),
        captain_id,
        roster,
    })
}

fn parse_roster_entry(raw: &Value) -> Option<RosterEntry> {
    let player_id = read_id(raw.get("id")?)?;
    let bench_position = integer(raw, &["benchposition"]).max(0) as u32;
    let is_starter = flag(raw, &["isstarting", "isplaying"]).unwrap_or(bench_position == 0);

    Some(RosterEntry {
        player_id,
        is_captain: flag(raw, &["iscaptain"]).unwrap_or(false),
        is_starter,
        bench_position,
        minutes_played: integer(raw, &["minutesplayed"]).max(0) as u32,
        points: parsed_number(raw, &["overallpoints", "points"]).map(|n| n.round() as i64),
        is_man_of_match: flag(raw, &["ismom"]),
        value: parsed_number(raw, &["value"]),
    })
}

/// Upstream flags are 0/1 integers, occasionally booleans.
fn flag(raw: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter().filter_map(|k| raw.get(*k)).find_map(|v| match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Batch fetch
// ---------------------------------------------------------------------------

/// Fetches every tracked manager's snapshot. A manager whose lookup fails is
/// logged and left out; the rest of the league is still returned.
#[derive(Clone)]
pub struct ManagerSnapshotFetcher {
    source: Arc<dyn SnapshotSource>,
    aliases: ManagerAliases,
}

impl ManagerSnapshotFetcher {
    pub fn new(source: Arc<dyn SnapshotSource>, aliases: ManagerAliases) -> Self {
        Self { source, aliases }
    }

    /// One lookup per id, issued concurrently. Output keeps the order of
    /// `manager_ids` and may be shorter than it.
    pub async fn fetch(&self, matchday: u32, manager_ids: &[String]) -> Vec<ManagerSnapshot> {
        let lookups = manager_ids.iter().map(|id| self.fetch_one(matchday, id));
        let snapshots: Vec<ManagerSnapshot> = join_all(lookups).await.into_iter().flatten().collect();

        if snapshots.len() < manager_ids.len() {
            warn!(
                matchday,
                fetched = snapshots.len(),
                tracked = manager_ids.len(),
                "some manager snapshots were skipped"
            );
        } else {
            info!(matchday, fetched = snapshots.len(), "manager snapshots fetched");
        }
        snapshots
    }

    async fn fetch_one(&self, matchday: u32, manager_id: &str) -> Option<ManagerSnapshot> {
        let result = match self.source.fetch_snapshot(matchday, manager_id).await {
            Ok(payload) => parse_snapshot(manager_id, &payload),
            Err(e) => Err(e),
        };
        match result {
            Ok(mut snapshot) => {
                snapshot.username = self.aliases.remap(&snapshot.username);
                Some(snapshot)
            }
            Err(e) => {
                warn!(matchday, manager_id, "skipping manager: {e}");
                None
            }
        }
    }
}

// Merge engine: reconciles the public catalog with manager snapshots.
//
// Produces (a) each manager's roster enriched with catalog stats and (b) a
// league-local leaderboard of every catalog player with ownership among the
// tracked managers. Pure: no I/O, no failure modes.

use std::collections::HashMap;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::manager::{ManagerSnapshot, RosterEntry};
use crate::player::{display_price, Catalog, PlayerRecord, Position};

// ---------------------------------------------------------------------------
// Field overlay rules
// ---------------------------------------------------------------------------

/// Which source is consulted first for a field both sources can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    ManagerFirst,
    CatalogFirst,
}

impl Precedence {
    fn pick<T>(self, manager: Option<T>, catalog: Option<T>) -> Option<T> {
        match self {
            Precedence::ManagerFirst => manager.or(catalog),
            Precedence::CatalogFirst => catalog.or(manager),
        }
    }
}

/// Per-field precedence for the overlapping fields of [`EnrichedPlayer`].
/// Every other field has a single source: identity and season stats come
/// from the catalog, roster flags (captain, starter, bench, minutes,
/// man of the match) from the manager entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayRules {
    pub value: Precedence,
    pub matchday_points: Precedence,
}

pub const OVERLAY_RULES: OverlayRules = OverlayRules {
    value: Precedence::CatalogFirst,
    matchday_points: Precedence::ManagerFirst,
};

// ---------------------------------------------------------------------------
// Output records
// ---------------------------------------------------------------------------

/// A roster entry joined with its catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedPlayer {
    pub id: u32,
    pub name: String,
    pub full_name: String,
    pub team: String,
    pub team_code: String,
    #[serde(rename = "pos")]
    pub position: Position,
    #[serde(rename = "totPts")]
    pub total_points: i64,
    pub goals: i64,
    pub assists: i64,
    pub clean_sheets: i64,
    #[serde(rename = "selPer")]
    pub selection_pct: f64,
    pub value: f64,
    pub price: f64,
    pub rating: f64,
    pub status: String,
    pub yellow_cards: i64,
    pub red_cards: i64,
    #[serde(rename = "motm")]
    pub man_of_match_count: i64,

    pub is_captain: bool,
    pub is_starter: bool,
    pub bench_position: u32,
    pub minutes_played: u32,
    #[serde(rename = "gdPts")]
    pub matchday_points: i64,
    /// Matchday points without the captain's double.
    pub base_points: f64,
    #[serde(rename = "isMotm")]
    pub is_man_of_match: bool,
}

impl EnrichedPlayer {
    /// Overlay a manager's roster entry on the catalog record for the same
    /// id according to [`OVERLAY_RULES`]. A missing catalog record yields a
    /// `#<id>` placeholder with zeroed stats.
    pub fn overlay(entry: &RosterEntry, catalog: Option<&PlayerRecord>) -> Self {
        let rules = OVERLAY_RULES;
        let id = entry.player_id;

        let value = rules
            .value
            .pick(entry.value, catalog.map(|c| c.value))
            .unwrap_or(0.0);
        let matchday_points = rules
            .matchday_points
            .pick(entry.points, catalog.map(|c| c.matchday_points))
            .unwrap_or(0);
        let base_points = if entry.is_captain {
            matchday_points as f64 / 2.0
        } else {
            matchday_points as f64
        };

        let mut enriched = match catalog {
            Some(c) => EnrichedPlayer {
                id,
                name: c.name.clone(),
                full_name: c.full_name.clone(),
                team: c.team.clone(),
                team_code: c.team_code.clone(),
                position: c.position,
                total_points: c.total_points,
                goals: c.goals,
                assists: c.assists,
                clean_sheets: c.clean_sheets,
                selection_pct: c.selection_pct,
                value,
                price: display_price(value),
                rating: c.rating,
                status: c.status.clone(),
                yellow_cards: c.yellow_cards,
                red_cards: c.red_cards,
                man_of_match_count: c.man_of_match_count,
                ..EnrichedPlayer::placeholder(id)
            },
            None => EnrichedPlayer {
                value,
                price: display_price(value),
                ..EnrichedPlayer::placeholder(id)
            },
        };

        enriched.is_captain = entry.is_captain;
        enriched.is_starter = entry.is_starter;
        enriched.bench_position = entry.bench_position;
        enriched.minutes_played = entry.minutes_played;
        enriched.matchday_points = matchday_points;
        enriched.base_points = base_points;
        enriched.is_man_of_match = entry.is_man_of_match.unwrap_or(false);
        enriched
    }

    fn placeholder(id: u32) -> Self {
        let name = format!("#{id}");
        EnrichedPlayer {
            id,
            full_name: name.clone(),
            name,
            team: String::new(),
            team_code: String::new(),
            position: Position::Other,
            total_points: 0,
            goals: 0,
            assists: 0,
            clean_sheets: 0,
            selection_pct: 0.0,
            value: 0.0,
            price: 0.0,
            rating: 0.0,
            status: String::new(),
            yellow_cards: 0,
            red_cards: 0,
            man_of_match_count: 0,
            is_captain: false,
            is_starter: false,
            bench_position: 0,
            minutes_played: 0,
            matchday_points: 0,
            base_points: 0.0,
            is_man_of_match: false,
        }
    }
}

/// A tracked manager with their enriched roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerView {
    pub guid: String,
    pub username: String,
    pub team_name: String,
    #[serde(rename = "gdPoints")]
    pub matchday_points: i64,
    #[serde(rename = "gdRank")]
    pub matchday_rank: i64,
    #[serde(rename = "ovPoints")]
    pub overall_points: i64,
    #[serde(rename = "ovRank")]
    pub overall_rank: i64,
    pub captain_id: Option<u32>,
    pub players: Vec<EnrichedPlayer>,
}

/// A catalog player with ownership among the tracked managers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalPlayerEntry {
    #[serde(flatten)]
    pub player: PlayerRecord,
    pub local_ownership: usize,
    pub local_per: u32,
    pub owners: Vec<String>,
}

/// One row of the matchday (live) ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingRow {
    pub rank: usize,
    pub manager: String,
    pub points: i64,
}

/// Everything served for one matchday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedResult {
    #[serde(rename = "lastUpdated")]
    pub timestamp: DateTime<Local>,
    pub matchday: u32,
    pub total_managers: usize,
    /// Sorted by overall points, descending.
    pub managers: Vec<ManagerView>,
    /// Every catalog player, sorted by season points, descending.
    pub players: Vec<GlobalPlayerEntry>,
    /// Managers ordered by matchday points, descending.
    pub live_ranking: Vec<RankingRow>,
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Merge a catalog with the snapshots that could be fetched.
///
/// `total_tracked` is the number of managers the league tracks, which may be
/// larger than `snapshots.len()` when some lookups failed. Ownership
/// percentages are taken over `total_tracked`; ownership counts only over the
/// snapshots actually present.
pub fn merge(
    catalog: &Catalog,
    snapshots: &[ManagerSnapshot],
    total_tracked: usize,
    matchday: u32,
    timestamp: DateTime<Local>,
) -> MergedResult {
    let live_ranking = live_ranking(snapshots);
    let mut owners: HashMap<u32, Vec<String>> = HashMap::new();
    let mut managers: Vec<ManagerView> = Vec::with_capacity(snapshots.len());

    for snapshot in snapshots {
        let mut players = Vec::with_capacity(snapshot.roster.len());
        for entry in &snapshot.roster {
            players.push(EnrichedPlayer::overlay(entry, catalog.get(&entry.player_id)));
            // One push per roster entry: a duplicated id counts twice.
            owners
                .entry(entry.player_id)
                .or_default()
                .push(snapshot.username.clone());
        }

        managers.push(ManagerView {
            guid: snapshot.guid.clone(),
            username: snapshot.username.clone(),
            team_name: snapshot.team_name.clone(),
            matchday_points: snapshot.matchday_points,
            matchday_rank: snapshot.matchday_rank,
            overall_points: snapshot.overall_points,
            overall_rank: snapshot.overall_rank,
            captain_id: snapshot.captain_id,
            players,
        });
    }

    // `sort_by` is stable: equal totals keep their input order.
    managers.sort_by(|a, b| b.overall_points.cmp(&a.overall_points));

    let mut players: Vec<GlobalPlayerEntry> = catalog
        .values()
        .map(|record| {
            let owned_by = owners.remove(&record.id).unwrap_or_default();
            GlobalPlayerEntry {
                player: record.clone(),
                local_ownership: owned_by.len(),
                local_per: local_percentage(owned_by.len(), total_tracked),
                owners: owned_by,
            }
        })
        .collect();
    players.sort_by(|a, b| b.player.total_points.cmp(&a.player.total_points));

    MergedResult {
        timestamp,
        matchday,
        total_managers: total_tracked,
        live_ranking,
        managers,
        players,
    }
}

/// `owners / total * 100`, rounded half to even. Computed on integers so
/// exact .5 boundaries are detected without float error. Zero when nobody is
/// tracked.
pub fn local_percentage(owners: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let scaled = owners * 100;
    let quotient = scaled / total;
    let twice_remainder = (scaled % total) * 2;

    let rounded = if twice_remainder > total || (twice_remainder == total && quotient % 2 == 1) {
        quotient + 1
    } else {
        quotient
    };
    rounded as u32
}

/// Managers by matchday points; ties keep fetch order.
fn live_ranking(snapshots: &[ManagerSnapshot]) -> Vec<RankingRow> {
    let mut rows: Vec<(&str, i64)> = snapshots
        .iter()
        .map(|m| (m.username.as_str(), m.matchday_points))
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1));

    rows.into_iter()
        .enumerate()
        .map(|(i, (manager, points))| RankingRow {
            rank: i + 1,
            manager: manager.to_string(),
            points,
        })
        .collect()
}

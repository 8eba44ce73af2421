//! Serde-deserializable types matching NHL web API responses.
//!
//! Payloads are shape-checked with a [`Schema`](crate::api::schema::Schema)
//! before they are deserialized here, so required fields carry readable
//! error messages. Everything else is optional: absent values stay absent.

use serde::Deserialize;
use serde_json::Value;

/// `{"default": "Toronto Maple Leafs", "fr": "..."}`
#[derive(Debug, Clone, Deserialize)]
pub struct LocalizedName {
  pub default: String,
}

// ============================================================================
// Standings
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStandingsRow {
  pub date: String,
  pub team_abbrev: LocalizedName,
  pub team_name: Option<LocalizedName>,
  pub conference_name: Option<String>,
  pub division_name: Option<String>,
  pub season_id: Option<u32>,
  pub games_played: Option<i64>,
  pub wins: Option<i64>,
  pub losses: Option<i64>,
  pub ot_losses: Option<i64>,
  pub points: Option<i64>,
  pub goal_for: Option<i64>,
  pub goal_against: Option<i64>,
  pub point_pctg: Option<f64>,
  pub league_sequence: Option<i64>,
}

// ============================================================================
// Games: schedule entries and the game part of a boxscore
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGame {
  pub id: i64,
  pub season: Option<u32>,
  pub game_type: Option<i64>,
  pub game_date: Option<String>,
  #[serde(rename = "startTimeUTC")]
  pub start_time_utc: Option<String>,
  pub game_state: String,
  pub venue: Option<LocalizedName>,
  pub home_team: ApiGameTeam,
  pub away_team: ApiGameTeam,
}

#[derive(Debug, Deserialize)]
pub struct ApiGameTeam {
  pub abbrev: String,
  pub score: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGameDay {
  pub date: String,
  #[serde(default)]
  pub games: Vec<Value>,
}

// ============================================================================
// Boxscore
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBoxscore {
  #[serde(flatten)]
  pub game: ApiGame,
  pub player_by_game_stats: ApiPlayerByGameStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPlayerByGameStats {
  pub home_team: ApiTeamPlayerStats,
  pub away_team: ApiTeamPlayerStats,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiTeamPlayerStats {
  #[serde(default)]
  pub forwards: Vec<ApiSkaterLine>,
  #[serde(default)]
  pub defense: Vec<ApiSkaterLine>,
  #[serde(default)]
  pub goalies: Vec<ApiGoalieLine>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSkaterLine {
  pub player_id: i64,
  pub position: Option<String>,
  pub goals: Option<i64>,
  pub assists: Option<i64>,
  pub points: Option<i64>,
  pub plus_minus: Option<i64>,
  pub pim: Option<i64>,
  pub hits: Option<i64>,
  /// Shots on goal; older payloads call it `shots`
  #[serde(alias = "shots")]
  pub sog: Option<i64>,
  pub toi: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGoalieLine {
  pub player_id: i64,
  pub position: Option<String>,
  pub toi: Option<String>,
  pub saves: Option<i64>,
  pub shots_against: Option<i64>,
  /// `"28/30"`, present when `saves`/`shotsAgainst` are not
  pub save_shots_against: Option<String>,
  pub goals_against: Option<i64>,
}

// ============================================================================
// Roster
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ApiRoster {
  #[serde(default)]
  pub forwards: Vec<Value>,
  #[serde(default)]
  pub defensemen: Vec<Value>,
  #[serde(default)]
  pub goalies: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRosterPlayer {
  pub id: i64,
  pub first_name: LocalizedName,
  pub last_name: LocalizedName,
  pub sweater_number: Option<i64>,
  pub position_code: Option<String>,
  pub shoots_catches: Option<String>,
  pub height_in_inches: Option<i64>,
  pub weight_in_pounds: Option<i64>,
  pub birth_date: Option<String>,
  pub birth_country: Option<String>,
}

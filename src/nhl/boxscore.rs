use serde_json::Value;

use crate::api::schema::{FieldRule, JsonKind, Schema};
use crate::api::{FetchError, Fetcher, ValidationError};
use crate::collect::{ListError, RawItem, Scope, Source};
use crate::store::{Entity, FieldValue, NormalizedRecord};

use super::api_types::{ApiBoxscore, ApiGoalieLine, ApiSkaterLine, ApiTeamPlayerStats};
use super::endpoint::Endpoint;
use super::schedule::{game_record, has_started, scheduled_games, GAME};

const PLAYER_STATS: Schema = Schema {
  name: "player stats",
  required: &[
    FieldRule::new("playerByGameStats", JsonKind::Object),
    FieldRule::new("playerByGameStats.homeTeam", JsonKind::Object),
    FieldRule::new("playerByGameStats.awayTeam", JsonKind::Object),
  ],
};

/// Per-player lines of every started game on the scope date. Each item
/// also refreshes its game row with the boxscore's score and state.
pub struct BoxscoreSource;

impl Source for BoxscoreSource {
  fn entity(&self) -> &'static str {
    "player_game_stats"
  }

  async fn list(&self, fetcher: &Fetcher, scope: &Scope) -> Result<Vec<RawItem>, ListError> {
    scheduled_games(fetcher, scope.require_date()?).await
  }

  async fn expand(&self, fetcher: &Fetcher, item: RawItem) -> Result<RawItem, FetchError> {
    let started = item
      .payload
      .get("gameState")
      .and_then(Value::as_str)
      .is_some_and(has_started);
    let game_id = item.payload.get("id").and_then(Value::as_u64);

    match game_id {
      Some(game_id) if started => {
        let response = fetcher.fetch(&Endpoint::Boxscore { game_id }).await?;
        Ok(RawItem::new(item.id, Value::clone(&response.body)))
      }
      _ => Ok(item),
    }
  }

  fn normalize(&self, item: &RawItem) -> Result<Vec<NormalizedRecord>, ValidationError> {
    GAME.validate(&item.payload)?;
    let started = item
      .payload
      .get("gameState")
      .and_then(Value::as_str)
      .is_some_and(has_started);
    if !started {
      return Ok(Vec::new());
    }

    PLAYER_STATS.validate(&item.payload)?;
    let boxscore: ApiBoxscore = serde_json::from_value(item.payload.clone())?;
    let game = &boxscore.game;

    let mut records = vec![game_record(game)?];
    let sides = [
      (&game.home_team.abbrev, &boxscore.player_by_game_stats.home_team),
      (&game.away_team.abbrev, &boxscore.player_by_game_stats.away_team),
    ];
    for (team, lines) in sides {
      player_records(game.id, team, lines, &mut records)?;
    }
    Ok(records)
  }
}

fn player_records(
  game_id: i64,
  team: &str,
  lines: &ApiTeamPlayerStats,
  records: &mut Vec<NormalizedRecord>,
) -> Result<(), ValidationError> {
  for line in lines.forwards.iter().chain(&lines.defense) {
    records.push(skater_record(game_id, team, line));
  }
  for line in &lines.goalies {
    records.push(goalie_record(game_id, team, line)?);
  }
  Ok(())
}

fn stats_key(player_id: i64, game_id: i64) -> [FieldValue; 2] {
  [FieldValue::Int(player_id), FieldValue::Int(game_id)]
}

fn skater_record(game_id: i64, team: &str, line: &ApiSkaterLine) -> NormalizedRecord {
  NormalizedRecord::new(Entity::PlayerGameStats, stats_key(line.player_id, game_id))
    .with("team_abbrev", team)
    .with_opt("position", line.position.clone())
    .with_opt("goals", line.goals)
    .with_opt("assists", line.assists)
    .with_opt("points", line.points)
    .with_opt("plus_minus", line.plus_minus)
    .with_opt("pim", line.pim)
    .with_opt("hits", line.hits)
    .with_opt("shots", line.sog)
    .with_opt("toi", line.toi.clone())
}

fn goalie_record(game_id: i64, team: &str, line: &ApiGoalieLine) -> Result<NormalizedRecord, ValidationError> {
  let (saves, shots_against) = goalie_saves(line)?;
  Ok(
    NormalizedRecord::new(Entity::PlayerGameStats, stats_key(line.player_id, game_id))
      .with("team_abbrev", team)
      .with_opt("position", line.position.clone())
      .with_opt("toi", line.toi.clone())
      .with_opt("saves", saves)
      .with_opt("shots_against", shots_against)
      .with_opt("goals_against", line.goals_against),
  )
}

/// Saves and shots faced, from the numeric fields or the `"28/30"` string.
fn goalie_saves(line: &ApiGoalieLine) -> Result<(Option<i64>, Option<i64>), ValidationError> {
  if line.saves.is_some() || line.shots_against.is_some() {
    return Ok((line.saves, line.shots_against));
  }
  let Some(text) = line.save_shots_against.as_deref().filter(|t| !t.is_empty()) else {
    return Ok((None, None));
  };

  let malformed = || ValidationError::Malformed(format!("saveShotsAgainst {:?} is not saves/shots", text));
  let (saves, shots) = text.split_once('/').ok_or_else(malformed)?;
  let saves: i64 = saves.trim().parse().map_err(|_| malformed())?;
  let shots: i64 = shots.trim().parse().map_err(|_| malformed())?;
  Ok((Some(saves), Some(shots)))
}

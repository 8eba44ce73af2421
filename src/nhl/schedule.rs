use chrono::NaiveDate;
use serde_json::Value;

use crate::api::schema::{FieldRule, JsonKind, Schema};
use crate::api::{Fetcher, ValidationError};
use crate::collect::{ListError, RawItem, Scope, Source};
use crate::store::{Entity, FieldValue, NormalizedRecord};

use super::api_types::{ApiGame, ApiGameDay, ApiGameTeam};
use super::endpoint::Endpoint;

pub(super) const GAME: Schema = Schema {
  name: "game",
  required: &[
    FieldRule::new("id", JsonKind::Integer),
    FieldRule::new("gameState", JsonKind::String),
    FieldRule::new("homeTeam", JsonKind::Object),
    FieldRule::new("homeTeam.abbrev", JsonKind::String),
    FieldRule::new("awayTeam", JsonKind::Object),
    FieldRule::new("awayTeam.abbrev", JsonKind::String),
  ],
};

/// Whether a game in `state` has begun and must therefore carry a score.
pub(super) fn has_started(state: &str) -> bool {
  matches!(state, "LIVE" | "CRIT" | "FINAL" | "OFF")
}

/// One item per game played on `date`. The schedule endpoint returns a
/// whole week; other days are dropped. Each game is tagged with its
/// `gameDate`.
pub(super) async fn scheduled_games(fetcher: &Fetcher, date: NaiveDate) -> Result<Vec<RawItem>, ListError> {
  let response = fetcher.fetch(&Endpoint::Schedule { date }).await?;
  let week = response
    .body
    .get("gameWeek")
    .cloned()
    .ok_or_else(|| ValidationError::MissingField("gameWeek".to_string()))?;
  let days: Vec<ApiGameDay> = serde_json::from_value(week).map_err(ValidationError::from)?;

  let wanted = date.format("%Y-%m-%d").to_string();
  let mut items = Vec::new();
  for day in days.into_iter().filter(|day| day.date == wanted) {
    for (index, mut game) in day.games.into_iter().enumerate() {
      let id = game
        .get("id")
        .and_then(Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_else(|| format!("{}#{}", day.date, index));
      if let Some(fields) = game.as_object_mut() {
        fields
          .entry("gameDate")
          .or_insert_with(|| Value::String(day.date.clone()));
      }
      items.push(RawItem::new(id, game));
    }
  }
  Ok(items)
}

/// Scores of a game, required once it has started.
pub(super) fn scores(
  state: &str,
  home: &ApiGameTeam,
  away: &ApiGameTeam,
) -> Result<(Option<i64>, Option<i64>), ValidationError> {
  if !has_started(state) {
    return Ok((home.score, away.score));
  }
  let home_score = home
    .score
    .ok_or_else(|| ValidationError::MissingField("homeTeam.score".to_string()))?;
  let away_score = away
    .score
    .ok_or_else(|| ValidationError::MissingField("awayTeam.score".to_string()))?;
  Ok((Some(home_score), Some(away_score)))
}

pub(super) fn game_record(game: &ApiGame) -> Result<NormalizedRecord, ValidationError> {
  let (home_score, away_score) = scores(&game.game_state, &game.home_team, &game.away_team)?;

  Ok(
    NormalizedRecord::new(Entity::Game, [FieldValue::Int(game.id)])
      .with_opt("season", game.season)
      .with_opt("game_type", game.game_type)
      .with_opt("game_date", game.game_date.clone())
      .with_opt("start_time_utc", game.start_time_utc.clone())
      .with("game_state", game.game_state.as_str())
      .with_opt("venue", game.venue.as_ref().map(|v| v.default.clone()))
      .with("home_team", game.home_team.abbrev.as_str())
      .with("away_team", game.away_team.abbrev.as_str())
      .with_opt("home_score", home_score)
      .with_opt("away_score", away_score),
  )
}

/// Games scheduled on the scope date.
pub struct ScheduleSource;

impl Source for ScheduleSource {
  fn entity(&self) -> &'static str {
    "games"
  }

  async fn list(&self, fetcher: &Fetcher, scope: &Scope) -> Result<Vec<RawItem>, ListError> {
    scheduled_games(fetcher, scope.require_date()?).await
  }

  fn normalize(&self, item: &RawItem) -> Result<Vec<NormalizedRecord>, ValidationError> {
    GAME.validate(&item.payload)?;
    let game: ApiGame = serde_json::from_value(item.payload.clone())?;
    Ok(vec![game_record(&game)?])
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn final_game() -> Value {
    json!({
      "id": 2023020680,
      "season": 20232024,
      "gameType": 2,
      "gameDate": "2024-01-15",
      "venue": {"default": "Scotiabank Arena"},
      "startTimeUTC": "2024-01-16T00:00:00Z",
      "gameState": "OFF",
      "homeTeam": {"id": 10, "abbrev": "TOR", "score": 3},
      "awayTeam": {"id": 8, "abbrev": "MTL", "score": 2}
    })
  }

  #[test]
  fn test_normalize_final_game() {
    let records = ScheduleSource
      .normalize(&RawItem::new("2023020680", final_game()))
      .unwrap();

    assert_eq!(
      records,
      vec![NormalizedRecord::new(Entity::Game, [FieldValue::Int(2023020680)])
        .with("season", 20232024)
        .with("game_type", 2)
        .with("game_date", "2024-01-15")
        .with("start_time_utc", "2024-01-16T00:00:00Z")
        .with("game_state", "OFF")
        .with("venue", "Scotiabank Arena")
        .with("home_team", "TOR")
        .with("away_team", "MTL")
        .with("home_score", 3)
        .with("away_score", 2)]
    );
  }

  #[test]
  fn test_future_game_has_no_score() {
    let payload = json!({
      "id": 2023020700,
      "gameState": "FUT",
      "homeTeam": {"abbrev": "TOR"},
      "awayTeam": {"abbrev": "BOS"}
    });
    let records = ScheduleSource.normalize(&RawItem::new("2023020700", payload)).unwrap();
    assert_eq!(records[0].field("home_score"), None);
    assert_eq!(records[0].field("game_state"), Some(&FieldValue::from("FUT")));
  }

  #[test]
  fn test_live_game_without_score_fails() {
    let mut payload = final_game();
    payload["gameState"] = json!("LIVE");
    payload["homeTeam"].as_object_mut().unwrap().remove("score");

    assert_eq!(
      ScheduleSource.normalize(&RawItem::new("2023020680", payload)),
      Err(ValidationError::MissingField("homeTeam.score".into()))
    );
  }

  #[test]
  fn test_game_without_home_team_fails() {
    let mut payload = final_game();
    payload.as_object_mut().unwrap().remove("homeTeam");
    let err = ScheduleSource
      .normalize(&RawItem::new("2023020680", payload))
      .unwrap_err();
    assert_eq!(err.to_string(), "missing field homeTeam");
  }

  async fn schedule_server(body: Value) -> wiremock::MockServer {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/schedule/2024-01-15"))
      .respond_with(ResponseTemplate::new(200).set_body_json(body))
      .mount(&server)
      .await;
    server
  }

  fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
  }

  #[tokio::test]
  async fn test_scheduled_games_keeps_only_the_date() {
    let server = schedule_server(json!({
      "gameWeek": [
        {"date": "2024-01-15", "games": [final_game()]},
        {"date": "2024-01-16", "games": [{"id": 2023020700}]}
      ]
    }))
    .await;
    let fetcher = crate::api::test_fetcher(&server.uri());

    let items = scheduled_games(&fetcher, date()).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "2023020680");
    assert_eq!(items[0].payload["gameDate"], json!("2024-01-15"));
  }

  #[tokio::test]
  async fn test_malformed_game_week_is_a_validation_error() {
    let server = schedule_server(json!({"gameWeek": [{"date": 20240115, "games": []}]})).await;
    let fetcher = crate::api::test_fetcher(&server.uri());

    let err = scheduled_games(&fetcher, date()).await.unwrap_err();
    assert!(matches!(err, ListError::Validation(ValidationError::Malformed(_))), "{err:?}");
    assert!(err.to_string().starts_with("ValidationError: "));
  }
}

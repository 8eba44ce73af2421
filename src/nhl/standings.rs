use chrono::NaiveDate;
use serde_json::Value;

use crate::api::schema::{FieldRule, JsonKind, Schema};
use crate::api::{Fetcher, ValidationError};
use crate::collect::{ListError, RawItem, Scope, Source};
use crate::store::{Entity, FieldValue, NormalizedRecord};

use super::api_types::ApiStandingsRow;
use super::endpoint::Endpoint;

const STANDINGS_ROW: Schema = Schema {
  name: "standings row",
  required: &[
    FieldRule::new("date", JsonKind::String),
    FieldRule::new("teamAbbrev.default", JsonKind::String),
  ],
};

/// One item per team row of the standings on `date` (or now).
pub(super) async fn standings_rows(fetcher: &Fetcher, date: Option<NaiveDate>) -> Result<Vec<RawItem>, ListError> {
  let response = fetcher.fetch(&Endpoint::Standings { date }).await?;
  let rows = response
    .body
    .get("standings")
    .and_then(Value::as_array)
    .ok_or_else(|| ValidationError::MissingField("standings".to_string()))?;

  Ok(
    rows
      .iter()
      .enumerate()
      .map(|(index, row)| {
        let id = row
          .pointer("/teamAbbrev/default")
          .and_then(Value::as_str)
          .map(str::to_string)
          .unwrap_or_else(|| format!("standings[{}]", index));
        RawItem::new(id, row.clone())
      })
      .collect(),
  )
}

/// Daily standings snapshot, one row per team.
pub struct StandingsSource;

impl Source for StandingsSource {
  fn entity(&self) -> &'static str {
    "standings"
  }

  async fn list(&self, fetcher: &Fetcher, scope: &Scope) -> Result<Vec<RawItem>, ListError> {
    standings_rows(fetcher, scope.date).await
  }

  fn normalize(&self, item: &RawItem) -> Result<Vec<NormalizedRecord>, ValidationError> {
    STANDINGS_ROW.validate(&item.payload)?;
    let row: ApiStandingsRow = serde_json::from_value(item.payload.clone())?;

    let record = NormalizedRecord::new(
      Entity::Standings,
      [
        FieldValue::from(row.date),
        FieldValue::from(row.team_abbrev.default),
      ],
    )
    .with_opt("season", row.season_id)
    .with_opt("games_played", row.games_played)
    .with_opt("wins", row.wins)
    .with_opt("losses", row.losses)
    .with_opt("ot_losses", row.ot_losses)
    .with_opt("points", row.points)
    .with_opt("goals_for", row.goal_for)
    .with_opt("goals_against", row.goal_against)
    .with_opt("point_pctg", row.point_pctg)
    .with_opt("league_sequence", row.league_sequence);

    Ok(vec![record])
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn row() -> Value {
    json!({
      "date": "2024-01-15",
      "seasonId": 20232024,
      "teamAbbrev": {"default": "TOR"},
      "teamName": {"default": "Toronto Maple Leafs", "fr": "Maple Leafs de Toronto"},
      "conferenceName": "Eastern",
      "divisionName": "Atlantic",
      "gamesPlayed": 42,
      "wins": 23,
      "losses": 12,
      "otLosses": 7,
      "points": 53,
      "goalFor": 150,
      "goalAgainst": 130,
      "pointPctg": 0.630952,
      "leagueSequence": 8
    })
  }

  #[test]
  fn test_normalize_row() {
    let records = StandingsSource
      .normalize(&RawItem::new("TOR", row()))
      .unwrap();

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.key_label(), "standings_date=2024-01-15/team_abbrev=TOR");
    assert_eq!(record.field("season"), Some(&FieldValue::Int(20232024)));
    assert_eq!(record.field("goals_for"), Some(&FieldValue::Int(150)));
    assert_eq!(record.field("point_pctg"), Some(&FieldValue::Real(0.630952)));
  }

  #[test]
  fn test_absent_numbers_are_not_zeroed() {
    let mut payload = row();
    payload.as_object_mut().unwrap().remove("wins");
    let records = StandingsSource.normalize(&RawItem::new("TOR", payload)).unwrap();
    assert_eq!(records[0].field("wins"), None);
  }

  #[test]
  fn test_row_without_date_fails() {
    let mut payload = row();
    payload.as_object_mut().unwrap().remove("date");
    assert_eq!(
      StandingsSource.normalize(&RawItem::new("TOR", payload)),
      Err(ValidationError::MissingField("date".into()))
    );
  }
}

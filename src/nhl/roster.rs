use serde_json::{json, Value};

use crate::api::schema::{FieldRule, JsonKind, Schema};
use crate::api::{FetchError, Fetcher, ValidationError};
use crate::collect::{ListError, RawItem, Scope, Source};
use crate::store::{Entity, FieldValue, NormalizedRecord};

use super::api_types::{ApiRoster, ApiRosterPlayer};
use super::endpoint::Endpoint;
use super::season::Season;
use super::standings::standings_rows;

const ROSTER_PLAYER: Schema = Schema {
  name: "roster player",
  required: &[
    FieldRule::new("id", JsonKind::Integer),
    FieldRule::new("firstName.default", JsonKind::String),
    FieldRule::new("lastName.default", JsonKind::String),
  ],
};

/// Players of each team's season roster. One item per team.
pub struct RosterSource;

impl Source for RosterSource {
  fn entity(&self) -> &'static str {
    "players"
  }

  async fn list(&self, fetcher: &Fetcher, scope: &Scope) -> Result<Vec<RawItem>, ListError> {
    let season = scope.require_season()?;
    let teams = if scope.teams.is_empty() {
      standings_rows(fetcher, scope.date)
        .await?
        .into_iter()
        .filter(|row| row.payload.pointer("/teamAbbrev/default").is_some())
        .map(|row| row.id)
        .collect()
    } else {
      scope.teams.clone()
    };

    Ok(
      teams
        .into_iter()
        .map(|team| {
          let payload = json!({"season": season.to_string()});
          RawItem::new(team, payload)
        })
        .collect(),
    )
  }

  async fn expand(&self, fetcher: &Fetcher, item: RawItem) -> Result<RawItem, FetchError> {
    let season: Season = item
      .payload
      .get("season")
      .and_then(Value::as_str)
      .and_then(|s| s.parse().ok())
      .ok_or_else(|| FetchError::Client {
        path: format!("roster/{}", item.id),
        status: None,
        reason: "roster item carries no season".to_string(),
      })?;

    let endpoint = Endpoint::Roster {
      team: item.id.clone(),
      season,
    };
    let response = fetcher.fetch(&endpoint).await?;
    Ok(RawItem::new(item.id, Value::clone(&response.body)))
  }

  fn normalize(&self, item: &RawItem) -> Result<Vec<NormalizedRecord>, ValidationError> {
    let roster: ApiRoster = serde_json::from_value(item.payload.clone())?;

    roster
      .forwards
      .iter()
      .chain(&roster.defensemen)
      .chain(&roster.goalies)
      .map(|entry| -> Result<NormalizedRecord, ValidationError> {
        ROSTER_PLAYER.validate(entry)?;
        let player: ApiRosterPlayer = serde_json::from_value(entry.clone())?;
        Ok(player_record(&item.id, player))
      })
      .collect()
  }
}

fn player_record(team: &str, player: ApiRosterPlayer) -> NormalizedRecord {
  NormalizedRecord::new(Entity::Player, [FieldValue::Int(player.id)])
    .with("first_name", player.first_name.default)
    .with("last_name", player.last_name.default)
    .with_opt("sweater_number", player.sweater_number)
    .with_opt("position", player.position_code)
    .with_opt("shoots_catches", player.shoots_catches)
    .with_opt("height_in", player.height_in_inches)
    .with_opt("weight_lb", player.weight_in_pounds)
    .with_opt("birth_date", player.birth_date)
    .with_opt("birth_country", player.birth_country)
    .with("team_abbrev", team)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn roster() -> Value {
    json!({
      "forwards": [{
        "id": 8479318,
        "firstName": {"default": "Auston"},
        "lastName": {"default": "Matthews"},
        "sweaterNumber": 34,
        "positionCode": "C",
        "shootsCatches": "L",
        "heightInInches": 75,
        "weightInPounds": 208,
        "birthDate": "1997-09-17",
        "birthCountry": "USA"
      }],
      "defensemen": [{
        "id": 8476853,
        "firstName": {"default": "Morgan"},
        "lastName": {"default": "Rielly"},
        "positionCode": "D"
      }],
      "goalies": []
    })
  }

  #[test]
  fn test_normalize_roster() {
    let records = RosterSource.normalize(&RawItem::new("TOR", roster())).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(
      records[0],
      NormalizedRecord::new(Entity::Player, [FieldValue::Int(8479318)])
        .with("first_name", "Auston")
        .with("last_name", "Matthews")
        .with("sweater_number", 34)
        .with("position", "C")
        .with("shoots_catches", "L")
        .with("height_in", 75)
        .with("weight_lb", 208)
        .with("birth_date", "1997-09-17")
        .with("birth_country", "USA")
        .with("team_abbrev", "TOR")
    );
    assert_eq!(records[1].field("sweater_number"), None);
  }

  #[test]
  fn test_player_without_id_fails_the_team() {
    let mut payload = roster();
    payload["defensemen"][0].as_object_mut().unwrap().remove("id");
    assert_eq!(
      RosterSource.normalize(&RawItem::new("TOR", payload)),
      Err(ValidationError::MissingField("id".into()))
    );
  }

  #[test]
  fn test_empty_roster_is_skipped() {
    let payload = json!({"forwards": [], "defensemen": [], "goalies": []});
    assert_eq!(RosterSource.normalize(&RawItem::new("TOR", payload)), Ok(Vec::new()));
  }
}

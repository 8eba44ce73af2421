use crate::api::schema::{FieldRule, JsonKind, Schema};
use crate::api::{Fetcher, ValidationError};
use crate::collect::{ListError, RawItem, Scope, Source};
use crate::store::{Entity, FieldValue, NormalizedRecord};

use super::api_types::ApiStandingsRow;
use super::standings::standings_rows;

const TEAM_ROW: Schema = Schema {
  name: "team",
  required: &[
    FieldRule::new("teamAbbrev.default", JsonKind::String),
    FieldRule::new("teamName.default", JsonKind::String),
  ],
};

/// Teams, discovered from the league standings.
pub struct TeamSource;

impl Source for TeamSource {
  fn entity(&self) -> &'static str {
    "teams"
  }

  async fn list(&self, fetcher: &Fetcher, scope: &Scope) -> Result<Vec<RawItem>, ListError> {
    let rows = standings_rows(fetcher, scope.date).await?;
    if scope.teams.is_empty() {
      return Ok(rows);
    }
    Ok(rows.into_iter().filter(|row| scope.teams.contains(&row.id)).collect())
  }

  fn normalize(&self, item: &RawItem) -> Result<Vec<NormalizedRecord>, ValidationError> {
    TEAM_ROW.validate(&item.payload)?;
    let row: ApiStandingsRow = serde_json::from_value(item.payload.clone())?;

    let record = NormalizedRecord::new(Entity::Team, [FieldValue::from(row.team_abbrev.default)])
      .with_opt("team_name", row.team_name.map(|n| n.default))
      .with_opt("conference", row.conference_name)
      .with_opt("division", row.division_name);

    Ok(vec![record])
  }
}

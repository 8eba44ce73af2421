//! Catalogue of the NHL web API endpoints we read.

use chrono::NaiveDate;
use std::fmt;

use crate::api::schema::{FieldRule, JsonKind, Schema};
use crate::cache::RequestKey;

use super::season::Season;

/// Endpoint family, used to pick a cache TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
  Standings,
  Roster,
  Schedule,
  Boxscore,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
  /// League standings on `date`, or as of now
  Standings { date: Option<NaiveDate> },
  Roster { team: String, season: Season },
  /// The schedule week starting at `date`
  Schedule { date: NaiveDate },
  Boxscore { game_id: u64 },
}

pub const STANDINGS: Schema = Schema {
  name: "standings",
  required: &[FieldRule::new("standings", JsonKind::Array)],
};

pub const ROSTER: Schema = Schema {
  name: "roster",
  required: &[
    FieldRule::new("forwards", JsonKind::Array),
    FieldRule::new("defensemen", JsonKind::Array),
    FieldRule::new("goalies", JsonKind::Array),
  ],
};

pub const SCHEDULE: Schema = Schema {
  name: "schedule",
  required: &[FieldRule::new("gameWeek", JsonKind::Array)],
};

pub const BOXSCORE: Schema = Schema {
  name: "boxscore",
  required: &[
    FieldRule::new("id", JsonKind::Integer),
    FieldRule::new("gameState", JsonKind::String),
    FieldRule::new("homeTeam", JsonKind::Object),
    FieldRule::new("awayTeam", JsonKind::Object),
  ],
};

impl Endpoint {
  pub fn kind(&self) -> EndpointKind {
    match self {
      Endpoint::Standings { .. } => EndpointKind::Standings,
      Endpoint::Roster { .. } => EndpointKind::Roster,
      Endpoint::Schedule { .. } => EndpointKind::Schedule,
      Endpoint::Boxscore { .. } => EndpointKind::Boxscore,
    }
  }

  pub fn path(&self) -> String {
    match self {
      Endpoint::Standings { date: None } => "standings/now".to_string(),
      Endpoint::Standings { date: Some(date) } => format!("standings/{}", date.format("%Y-%m-%d")),
      Endpoint::Roster { team, season } => format!("roster/{}/{}", team, season),
      Endpoint::Schedule { date } => format!("schedule/{}", date.format("%Y-%m-%d")),
      Endpoint::Boxscore { game_id } => format!("gamecenter/{}/boxscore", game_id),
    }
  }

  pub fn key(&self) -> RequestKey {
    RequestKey::new(self.path())
  }

  pub fn schema(&self) -> &'static Schema {
    match self.kind() {
      EndpointKind::Standings => &STANDINGS,
      EndpointKind::Roster => &ROSTER,
      EndpointKind::Schedule => &SCHEDULE,
      EndpointKind::Boxscore => &BOXSCORE,
    }
  }
}

impl fmt::Display for Endpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.path())
  }
}

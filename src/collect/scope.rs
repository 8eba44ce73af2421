use chrono::NaiveDate;

use crate::nhl::Season;

use super::ListError;

/// What one collection run covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
  pub date: Option<NaiveDate>,
  pub season: Option<Season>,
  /// Team abbreviations; empty means every team
  pub teams: Vec<String>,
}

impl Scope {
  pub fn for_date(date: NaiveDate) -> Self {
    Self {
      date: Some(date),
      ..Self::default()
    }
  }

  pub fn with_season(mut self, season: Season) -> Self {
    self.season = Some(season);
    self
  }

  pub fn with_teams(mut self, teams: impl IntoIterator<Item = String>) -> Self {
    self.teams = teams.into_iter().map(|t| t.to_uppercase()).collect();
    self
  }

  pub fn require_date(&self) -> Result<NaiveDate, ListError> {
    self
      .date
      .ok_or_else(|| ListError::Scope("a date is required".to_string()))
  }

  /// The explicit season, else the season containing the scope date.
  pub fn require_season(&self) -> Result<Season, ListError> {
    self
      .season
      .or_else(|| self.date.map(Season::containing))
      .ok_or_else(|| ListError::Scope("a season or date is required".to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_season_falls_back_to_date() {
    let scope = Scope::for_date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    assert_eq!(scope.require_season().unwrap(), Season::starting(2023));

    let scope = scope.with_season(Season::starting(2021));
    assert_eq!(scope.require_season().unwrap(), Season::starting(2021));
  }

  #[test]
  fn test_missing_date() {
    let err = Scope::default().require_date().unwrap_err();
    assert_eq!(err.to_string(), "invalid scope: a date is required");
    assert!(Scope::default().require_season().is_err());
  }

  #[test]
  fn test_teams_are_uppercased() {
    let scope = Scope::default().with_teams(vec!["tor".to_string(), "MTL".to_string()]);
    assert_eq!(scope.teams, vec!["TOR", "MTL"]);
  }
}

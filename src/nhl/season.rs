use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A season as the API spells it: start and end year run together,
/// e.g. `20232024`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Season(u32);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid season {0:?}: expected two consecutive years, e.g. 20232024")]
pub struct InvalidSeason(String);

impl Season {
  pub fn starting(year: u32) -> Self {
    Self(year * 10_000 + year + 1)
  }

  /// The season in progress on `date`. A new season starts in September.
  pub fn containing(date: NaiveDate) -> Self {
    let year = date.year().max(0) as u32;
    if date.month() >= 9 {
      Self::starting(year)
    } else {
      Self::starting(year.saturating_sub(1))
    }
  }

  pub fn id(self) -> u32 {
    self.0
  }

  pub fn start_year(self) -> u32 {
    self.0 / 10_000
  }
}

impl FromStr for Season {
  type Err = InvalidSeason;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || InvalidSeason(s.to_string());
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
      return Err(invalid());
    }
    let start: u32 = s[..4].parse().map_err(|_| invalid())?;
    let end: u32 = s[4..].parse().map_err(|_| invalid())?;
    if end != start + 1 {
      return Err(invalid());
    }
    Ok(Self::starting(start))
  }
}

impl fmt::Display for Season {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

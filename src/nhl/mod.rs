//! NHL web API: endpoint catalogue, payload types and one [`Source`]
//! per stored entity.
//!
//! [`Source`]: crate::collect::Source

pub mod api_types;
mod boxscore;
mod endpoint;
mod roster;
mod schedule;
mod season;
mod standings;
mod teams;

pub use boxscore::BoxscoreSource;
pub use endpoint::{Endpoint, EndpointKind, BOXSCORE, ROSTER, SCHEDULE, STANDINGS};
pub use roster::RosterSource;
pub use schedule::ScheduleSource;
pub use season::{InvalidSeason, Season};
pub use standings::StandingsSource;
pub use teams::TeamSource;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use nhlstat::api::Fetcher;
use nhlstat::collect::{CollectionResult, Collector, Scope, Source, StopSignal};
use nhlstat::config::Config;
use nhlstat::logging;
use nhlstat::nhl::{BoxscoreSource, RosterSource, ScheduleSource, Season, StandingsSource, TeamSource};
use nhlstat::store::Store;

#[derive(Parser, Debug)]
#[command(name = "nhlstat")]
#[command(about = "Collect NHL statistics into a local SQLite database")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/nhlstat/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// SQLite database file (default: $XDG_DATA_HOME/nhlstat/nhl.db)
  #[arg(long, global = true)]
  db: Option<PathBuf>,

  /// Write logs to daily files in this directory instead of stderr
  #[arg(long, global = true)]
  log_dir: Option<PathBuf>,

  /// Stop starting new items after this many seconds
  #[arg(long, global = true)]
  deadline_secs: Option<u64>,

  /// Print results as JSON lines
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Teams, from the standings
  Teams {
    /// Standings date (default: now)
    #[arg(long)]
    date: Option<NaiveDate>,
  },
  /// League standings snapshot
  Standings {
    #[arg(long)]
    date: Option<NaiveDate>,
  },
  /// Games scheduled on a date
  Schedule {
    /// Game date, YYYY-MM-DD (default: today)
    date: Option<NaiveDate>,
  },
  /// Player lines of the games played on a date
  Boxscores {
    date: Option<NaiveDate>,
  },
  /// Team rosters for a season
  Rosters {
    /// Season, e.g. 20232024 (default: the current one)
    #[arg(long)]
    season: Option<Season>,

    /// Only these teams, e.g. --team TOR,MTL
    #[arg(long = "team", value_delimiter = ',')]
    teams: Vec<String>,
  },
  /// Everything for a date: teams, standings, games, player lines, rosters
  All {
    date: Option<NaiveDate>,
  },
}

/// Shared handles for the runs of one invocation.
struct Runner {
  fetcher: Fetcher,
  store: Store,
  concurrency: usize,
  stop: StopSignal,
}

impl Runner {
  async fn run<S: Source>(&self, source: S, scope: &Scope) -> CollectionResult {
    Collector::new(source, self.fetcher.clone(), self.store.clone())
      .with_concurrency(self.concurrency)
      .collect(scope, &self.stop)
      .await
  }

  async fn all(&self, date: NaiveDate) -> Vec<CollectionResult> {
    let scope = Scope::for_date(date);
    let mut results = Vec::new();

    results.push(self.run(TeamSource, &scope).await);
    if self.should_continue(&results) {
      results.push(self.run(StandingsSource, &scope).await);
    }
    if self.should_continue(&results) {
      results.push(self.run(ScheduleSource, &scope).await);
    }
    if self.should_continue(&results) {
      results.push(self.run(BoxscoreSource, &scope).await);
    }
    if self.should_continue(&results) {
      results.push(self.run(RosterSource, &scope).await);
    }
    results
  }

  fn should_continue(&self, results: &[CollectionResult]) -> bool {
    results.last().is_some_and(|r| !r.is_aborted() && !r.cancelled)
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init(args.log_dir.as_deref())?;

  let mut config = Config::load(args.config.as_deref())?;
  if let Some(db) = args.db {
    config.database.path = Some(db);
  }

  let db_path = match &config.database.path {
    Some(path) => path.clone(),
    None => Store::default_path()?,
  };
  let store = Store::open(&db_path, config.database.pool_size).await?;
  let fetcher = Fetcher::from_config(&config)?;

  let (handle, stop) = StopSignal::channel();
  let stop = match args.deadline_secs {
    Some(secs) => stop.with_timeout(Duration::from_secs(secs)),
    None => stop,
  };
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupted; finishing in-flight items");
      handle.stop();
    }
  });

  let runner = Runner {
    fetcher,
    store,
    concurrency: config.collect.concurrency,
    stop,
  };

  let today = Local::now().date_naive();
  let results = match args.command {
    Command::Teams { date } => vec![runner.run(TeamSource, &Scope { date, ..Scope::default() }).await],
    Command::Standings { date } => {
      vec![runner.run(StandingsSource, &Scope { date, ..Scope::default() }).await]
    }
    Command::Schedule { date } => {
      vec![runner.run(ScheduleSource, &Scope::for_date(date.unwrap_or(today))).await]
    }
    Command::Boxscores { date } => {
      vec![runner.run(BoxscoreSource, &Scope::for_date(date.unwrap_or(today))).await]
    }
    Command::Rosters { season, teams } => {
      let scope = Scope::default()
        .with_season(season.unwrap_or_else(|| Season::containing(today)))
        .with_teams(teams);
      vec![runner.run(RosterSource, &scope).await]
    }
    Command::All { date } => runner.all(date.unwrap_or(today)).await,
  };

  for result in &results {
    if args.json {
      println!("{}", serde_json::to_string(result)?);
    } else {
      println!("{}", result);
    }
  }
  info!(cache_entries = runner.fetcher.cache().len(), "done");

  match results.iter().find_map(|r| r.aborted.as_ref().map(|reason| (r.entity, reason))) {
    Some((entity, reason)) => Err(eyre!("{} collection aborted: {}", entity, reason)),
    None => Ok(()),
  }
}

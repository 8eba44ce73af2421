/// Relational schema. Tables are STRICT so a value of the wrong type is
/// rejected instead of silently stored.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS team (
    team_abbrev TEXT NOT NULL PRIMARY KEY,
    team_name TEXT,
    conference TEXT,
    division TEXT
) STRICT;

CREATE TABLE IF NOT EXISTS player (
    player_id INTEGER NOT NULL PRIMARY KEY,
    first_name TEXT,
    last_name TEXT,
    sweater_number INTEGER,
    position TEXT,
    shoots_catches TEXT,
    height_in INTEGER,
    weight_lb INTEGER,
    birth_date TEXT,
    birth_country TEXT,
    team_abbrev TEXT
) STRICT;

CREATE TABLE IF NOT EXISTS game (
    game_id INTEGER NOT NULL PRIMARY KEY,
    season INTEGER,
    game_type INTEGER,
    game_date TEXT,
    start_time_utc TEXT,
    game_state TEXT,
    venue TEXT,
    home_team TEXT,
    away_team TEXT,
    home_score INTEGER,
    away_score INTEGER
) STRICT;

CREATE INDEX IF NOT EXISTS idx_game_date ON game(game_date);

CREATE TABLE IF NOT EXISTS player_game_stats (
    player_id INTEGER NOT NULL,
    game_id INTEGER NOT NULL,
    team_abbrev TEXT,
    position TEXT,
    goals INTEGER,
    assists INTEGER,
    points INTEGER,
    plus_minus INTEGER,
    pim INTEGER,
    hits INTEGER,
    shots INTEGER,
    toi TEXT,
    saves INTEGER,
    shots_against INTEGER,
    goals_against INTEGER,
    PRIMARY KEY (player_id, game_id)
) STRICT;

CREATE INDEX IF NOT EXISTS idx_player_game_stats_game ON player_game_stats(game_id);

CREATE TABLE IF NOT EXISTS standings (
    standings_date TEXT NOT NULL,
    team_abbrev TEXT NOT NULL,
    season INTEGER,
    games_played INTEGER,
    wins INTEGER,
    losses INTEGER,
    ot_losses INTEGER,
    points INTEGER,
    goals_for INTEGER,
    goals_against INTEGER,
    point_pctg REAL,
    league_sequence INTEGER,
    PRIMARY KEY (standings_date, team_abbrev)
) STRICT;
"#;

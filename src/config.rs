use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "https://statsbanger.onrender.com/api/player-season-stat";
pub const DEFAULT_TOURNAMENT_ID: u32 = 8;
pub const DEFAULT_SEASON_ID: u32 = 52376;

const DATA_DIR: &str = "footstats_etl";
const DB_FILE: &str = "player_stats.sqlite";

/// Fixed run parameters for one pipeline execution. Defaults target the
/// statsbanger player-season-stat collection; every field can be
/// overridden through the environment.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub api_url: String,
    pub tournament_id: u32,
    pub season_id: u32,
}

impl RunConfig {
    pub fn from_env() -> Self {
        let api_url = std::env::var("STATS_API_URL")
            .ok()
            .filter(|val| !val.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self {
            api_url,
            tournament_id: env_u32("STATS_TOURNAMENT_ID", DEFAULT_TOURNAMENT_ID),
            season_id: env_u32("STATS_SEASON_ID", DEFAULT_SEASON_ID),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            tournament_id: DEFAULT_TOURNAMENT_ID,
            season_id: DEFAULT_SEASON_ID,
        }
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|val| val.parse::<u32>().ok())
        .unwrap_or(default)
}

pub fn default_db_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(DB_FILE))
}

fn app_data_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_DATA_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(DATA_DIR));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(DATA_DIR),
    )
}

pub fn parse_db_path_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--db=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--db" {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}

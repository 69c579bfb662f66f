pub mod config;
pub mod intake;
pub mod learn;
pub mod profile;
pub mod status;

use caffy_core::{CaffeineService, Config, Database};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Global flags shared by every command.
pub struct Context {
    pub user: Option<i64>,
    pub json: bool,
}

/// An opened service with the configuration it was built from.
pub struct Session {
    pub service: CaffeineService<Database>,
    pub config: Config,
    pub user_id: i64,
}

impl Context {
    pub fn open(&self) -> Result<Session, Box<dyn std::error::Error>> {
        let config = Config::load()?;
        let db = Database::open()?;
        let user_id = self.user.unwrap_or(config.user.default_user_id);
        Ok(Session {
            service: CaffeineService::with_config(db, &config),
            config,
            user_id,
        })
    }

    /// Prints `value` as pretty JSON when `--json` is set, otherwise runs
    /// the text renderer.
    pub fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> CmdResult {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            text(value);
        }
        Ok(())
    }
}

/// `--at` if given, otherwise the current time.
pub fn time_or_now(at: Option<DateTime<Utc>>) -> DateTime<Utc> {
    at.unwrap_or_else(Utc::now)
}

pub fn fmt_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M UTC").to_string()
}

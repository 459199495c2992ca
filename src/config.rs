//! Application-level configuration loading: round pacing, scoring and question progression.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::DurationMilliSeconds;
use tracing::{info, warn};

use crate::{
    dao::models::{Difficulty, ParticipantStatus},
    state::game::ScoringRules,
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TRIVIA_BACK_CONFIG_PATH";
/// Upper bound accepted for the number of rounds of a session.
pub const MAX_TOTAL_ROUNDS: u32 = 50;

/// How the next round is started once a round has ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RoundAdvance {
    /// The admin sends StartRound for the next round.
    Manual,
    /// The next round starts on its own after `delay_ms`.
    Auto {
        #[serde(rename = "delay_ms", with = "serde_with::As::<DurationMilliSeconds<u64>>")]
        delay: Duration,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    total_rounds: u32,
    question_duration: Duration,
    timer_tick: Duration,
    scoring: ScoringRules,
    round_advance: RoundAdvance,
    difficulty_progression: Vec<Difficulty>,
    post_game_status: ParticipantStatus,
    store_timeout: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        total_rounds = app_config.total_rounds,
                        question_duration_ms = app_config.question_duration.as_millis() as u64,
                        round_advance = ?app_config.round_advance,
                        "loaded game configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; absent keys keep their default value.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        let raw: RawConfig = serde_json::from_str(contents)?;
        Ok(raw.into())
    }

    /// Rounds per session when the start command does not override it.
    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    /// Answer window of a round.
    pub fn question_duration(&self) -> Duration {
        self.question_duration
    }

    /// Cadence of `timer:update` broadcasts.
    pub fn timer_tick(&self) -> Duration {
        self.timer_tick
    }

    pub fn scoring(&self) -> &ScoringRules {
        &self.scoring
    }

    pub fn round_advance(&self) -> RoundAdvance {
        self.round_advance
    }

    /// Status participants are released to once their session ends.
    pub fn post_game_status(&self) -> ParticipantStatus {
        self.post_game_status
    }

    /// Upper bound on the persistence work of one state transition.
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// Difficulty requested for `round` (1-based); `None` means any difficulty.
    pub fn difficulty_for_round(&self, round: u32) -> Option<Difficulty> {
        let index = (round.max(1) - 1) as usize;
        self.difficulty_progression
            .get(index)
            .or_else(|| self.difficulty_progression.last())
            .copied()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[serde_with::serde_as]
#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    total_rounds: u32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "question_duration_ms")]
    question_duration: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "timer_tick_ms")]
    timer_tick: Duration,
    points_per_correct_answer: u32,
    max_time_bonus: u32,
    round_advance: RoundAdvance,
    difficulty_progression: Vec<Difficulty>,
    post_game_status: PostGameStatus,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "store_timeout_ms")]
    store_timeout: Duration,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            total_rounds: 5,
            question_duration: Duration::from_secs(30),
            timer_tick: Duration::from_secs(1),
            points_per_correct_answer: 10,
            max_time_bonus: 0,
            round_advance: RoundAdvance::Manual,
            difficulty_progression: vec![
                Difficulty::Easy,
                Difficulty::Medium,
                Difficulty::Medium,
                Difficulty::Hard,
                Difficulty::Hard,
            ],
            post_game_status: PostGameStatus::Waiting,
            store_timeout: Duration::from_secs(5),
        }
    }
}

/// Statuses a participant may be released to after a game.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PostGameStatus {
    Waiting,
    Retired,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            total_rounds: value.total_rounds.clamp(1, MAX_TOTAL_ROUNDS),
            question_duration: value.question_duration.max(Duration::from_millis(1)),
            timer_tick: value.timer_tick.max(Duration::from_millis(10)),
            scoring: ScoringRules {
                points_per_correct_answer: value.points_per_correct_answer,
                max_time_bonus: value.max_time_bonus,
            },
            round_advance: value.round_advance,
            difficulty_progression: value.difficulty_progression,
            post_game_status: match value.post_game_status {
                PostGameStatus::Waiting => ParticipantStatus::Waiting,
                PostGameStatus::Retired => ParticipantStatus::Retired,
            },
            store_timeout: value.store_timeout.max(Duration::from_millis(10)),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.total_rounds(), 5);
        assert_eq!(config.question_duration(), Duration::from_secs(30));
        assert_eq!(config.timer_tick(), Duration::from_secs(1));
        assert_eq!(config.scoring().points_per_correct_answer, 10);
        assert_eq!(config.round_advance(), RoundAdvance::Manual);
        assert_eq!(config.post_game_status(), ParticipantStatus::Waiting);
    }

    #[test]
    fn parses_every_key() {
        let config = AppConfig::from_json(
            r#"{
                "total_rounds": 3,
                "question_duration_ms": 15000,
                "timer_tick_ms": 500,
                "points_per_correct_answer": 100,
                "max_time_bonus": 50,
                "round_advance": { "mode": "auto", "delay_ms": 4000 },
                "difficulty_progression": ["hard"],
                "post_game_status": "retired",
                "store_timeout_ms": 750
            }"#,
        )
        .unwrap();

        assert_eq!(config.total_rounds(), 3);
        assert_eq!(config.question_duration(), Duration::from_millis(15_000));
        assert_eq!(config.timer_tick(), Duration::from_millis(500));
        assert_eq!(
            *config.scoring(),
            ScoringRules {
                points_per_correct_answer: 100,
                max_time_bonus: 50,
            }
        );
        assert_eq!(
            config.round_advance(),
            RoundAdvance::Auto {
                delay: Duration::from_secs(4)
            }
        );
        assert_eq!(config.post_game_status(), ParticipantStatus::Retired);
        assert_eq!(config.store_timeout(), Duration::from_millis(750));
    }

    #[test]
    fn difficulty_progression_clamps_to_last_entry() {
        let config = AppConfig::default();
        assert_eq!(config.difficulty_for_round(1), Some(Difficulty::Easy));
        assert_eq!(config.difficulty_for_round(2), Some(Difficulty::Medium));
        assert_eq!(config.difficulty_for_round(5), Some(Difficulty::Hard));
        assert_eq!(config.difficulty_for_round(12), Some(Difficulty::Hard));

        let any = AppConfig::from_json(r#"{ "difficulty_progression": [] }"#).unwrap();
        assert_eq!(any.difficulty_for_round(1), None);
    }

    #[test]
    fn out_of_range_rounds_are_clamped() {
        let config = AppConfig::from_json(r#"{ "total_rounds": 0 }"#).unwrap();
        assert_eq!(config.total_rounds(), 1);
        let config = AppConfig::from_json(r#"{ "total_rounds": 500 }"#).unwrap();
        assert_eq!(config.total_rounds(), MAX_TOTAL_ROUNDS);
    }

    #[test]
    fn unknown_post_game_status_is_an_error() {
        assert!(AppConfig::from_json(r#"{ "post_game_status": "playing" }"#).is_err());
    }
}

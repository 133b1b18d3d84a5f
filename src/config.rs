use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::quiz::bank::SelectionPolicy;
use crate::quiz::grading::GradeScale;

#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub question_bank_dir: PathBuf,
    pub stats_db_path: PathBuf,
    pub font_path: PathBuf,
    pub seal_path: PathBuf,
    pub selection: SelectionPolicy,
    pub seed: Option<u64>,
    pub grade_scale: GradeScale,
    pub reminder_interval: Duration,
    pub reminder_idle: chrono::Duration,
    pub antispam_interval: Duration,
    pub recent_results: usize,
}

impl Config {
    /// Reads the process environment. Call `dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let token = var("API_TOKEN")
            .or_else(|| var("TELOXIDE_TOKEN"))
            .ok_or(ConfigError::MissingToken)?;

        let path = |name: &str, default: &str| PathBuf::from(var(name).unwrap_or(default.into()));

        let selection = match var("QUESTION_ORDER") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "QUESTION_ORDER",
                value,
            })?,
            None => SelectionPolicy::default(),
        };

        let seed = var("QUESTION_SEED")
            .map(|value| parse("QUESTION_SEED", value))
            .transpose()?;

        let grade_scale = match var("GRADE_THRESHOLDS") {
            Some(value) => parse_thresholds(&value)
                .and_then(GradeScale::from_thresholds)
                .ok_or(ConfigError::Invalid {
                    name: "GRADE_THRESHOLDS",
                    value,
                })?,
            None => GradeScale::default(),
        };

        let number = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            var(name).map_or(Ok(default), |value| parse(name, value))
        };

        let idle_minutes = number("REMINDER_IDLE_MINUTES", 5)?;
        let reminder_idle = i64::try_from(idle_minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .ok_or_else(|| ConfigError::Invalid {
                name: "REMINDER_IDLE_MINUTES",
                value: idle_minutes.to_string(),
            })?;

        let recent = number("RECENT_RESULTS", 5)?;
        let recent_results = usize::try_from(recent).map_err(|_| ConfigError::Invalid {
            name: "RECENT_RESULTS",
            value: recent.to_string(),
        })?;

        Ok(Self {
            token,
            question_bank_dir: path("QUESTION_BANK_DIR", "data/questions"),
            stats_db_path: path("STATS_DB_PATH", "data/stats.sqlite"),
            font_path: path("FONT_PATH", "assets/fonts/DejaVuSans.ttf"),
            seal_path: path("SEAL_PATH", "assets/seal.png"),
            selection,
            seed,
            grade_scale,
            reminder_interval: Duration::from_secs(number("REMINDER_INTERVAL_SECS", 60)?.max(1)),
            reminder_idle,
            antispam_interval: Duration::from_millis(number("ANTISPAM_INTERVAL_MS", 700)?),
            recent_results,
        })
    }
}

fn parse<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn parse_thresholds(value: &str) -> Option<[f64; 3]> {
    let parsed = value
        .split(',')
        .map(|part| part.trim().parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()?;
    parsed.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::grading::Grade;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let config = config(&[("API_TOKEN", "123:abc")]).unwrap();
        assert_eq!(config.token, "123:abc");
        assert_eq!(config.question_bank_dir, PathBuf::from("data/questions"));
        assert_eq!(config.selection, SelectionPolicy::Shuffled);
        assert_eq!(config.seed, None);
        assert_eq!(config.grade_scale, GradeScale::default());
        assert_eq!(config.reminder_interval, Duration::from_secs(60));
        assert_eq!(config.reminder_idle, chrono::Duration::minutes(5));
        assert_eq!(config.recent_results, 5);
    }

    #[test]
    fn missing_token_is_an_error() {
        assert!(matches!(config(&[]), Err(ConfigError::MissingToken)));
        assert!(matches!(
            config(&[("API_TOKEN", "  ")]),
            Err(ConfigError::MissingToken)
        ));
        assert_eq!(config(&[("TELOXIDE_TOKEN", "t")]).unwrap().token, "t");
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config(&[
            ("API_TOKEN", "t"),
            ("QUESTION_ORDER", "fixed"),
            ("QUESTION_SEED", "99"),
            ("GRADE_THRESHOLDS", "85, 70, 50"),
            ("REMINDER_IDLE_MINUTES", "10"),
            ("STATS_DB_PATH", "/var/lib/bot/stats.db"),
        ])
        .unwrap();
        assert_eq!(config.selection, SelectionPolicy::Fixed);
        assert_eq!(config.seed, Some(99));
        assert_eq!(config.grade_scale.grade_for(72.0), Grade::Good);
        assert_eq!(config.reminder_idle, chrono::Duration::minutes(10));
        assert_eq!(config.stats_db_path, PathBuf::from("/var/lib/bot/stats.db"));
    }

    #[test]
    fn bad_values_name_the_variable() {
        for (name, value) in [
            ("QUESTION_ORDER", "sideways"),
            ("QUESTION_SEED", "-1"),
            ("GRADE_THRESHOLDS", "90,75"),
            ("GRADE_THRESHOLDS", "60,75,90"),
            ("ANTISPAM_INTERVAL_MS", "fast"),
            ("REMINDER_IDLE_MINUTES", "18446744073709551615"),
            ("REMINDER_IDLE_MINUTES", "9223372036854775807"),
        ] {
            match config(&[("API_TOKEN", "t"), (name, value)]) {
                Err(ConfigError::Invalid { name: got, .. }) => assert_eq!(got, name),
                other => panic!("{} = {} gave {:?}", name, value, other.map(|_| ())),
            }
        }
    }
}

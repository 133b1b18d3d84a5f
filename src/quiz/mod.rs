pub mod bank;
pub mod grading;
pub mod session;
pub mod specialization;

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
    pub correct: usize,
}

impl Question {
    pub fn is_correct(&self, option: usize) -> bool {
        self.correct == option
    }

    pub fn correct_option(&self) -> &str {
        self.options
            .get(self.correct)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Exam tier. Each tier fixes how many questions are asked and how long the user has.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Reserve,
    Basic,
    Standard,
    Advanced,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Reserve,
        Difficulty::Basic,
        Difficulty::Standard,
        Difficulty::Advanced,
    ];

    pub fn question_count(self) -> usize {
        match self {
            Difficulty::Reserve => 20,
            Difficulty::Basic => 30,
            Difficulty::Standard => 40,
            Difficulty::Advanced => 50,
        }
    }

    pub fn time_limit_minutes(self) -> i64 {
        match self {
            Difficulty::Reserve => 35,
            Difficulty::Basic => 25,
            Difficulty::Standard => 20,
            Difficulty::Advanced => 20,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Difficulty::Reserve => "reserve",
            Difficulty::Basic => "basic",
            Difficulty::Standard => "standard",
            Difficulty::Advanced => "advanced",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.key() == key)
    }

    pub fn title(self) -> &'static str {
        match self {
            Difficulty::Reserve => "Резерв",
            Difficulty::Basic => "Базовый",
            Difficulty::Standard => "Стандартный",
            Difficulty::Advanced => "Продвинутый",
        }
    }

    pub fn badge(self) -> &'static str {
        match self {
            Difficulty::Reserve => "🥉",
            Difficulty::Basic => "🥈",
            Difficulty::Standard => "🥇",
            Difficulty::Advanced => "💎",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_table_matches_help_text() {
        let table: Vec<_> = Difficulty::ALL
            .iter()
            .map(|d| (d.question_count(), d.time_limit_minutes()))
            .collect();
        assert_eq!(table, vec![(20, 35), (30, 25), (40, 20), (50, 20)]);
    }

    #[test]
    fn difficulty_keys_round_trip() {
        for d in Difficulty::ALL {
            assert_eq!(Difficulty::from_key(d.key()), Some(d));
        }
        assert_eq!(Difficulty::from_key("expert"), None);
    }

    #[test]
    fn correct_option_text() {
        let q = Question {
            text: "2 + 2?".to_string(),
            options: vec!["3".to_string(), "4".to_string()],
            correct: 1,
        };
        assert_eq!(q.correct_option(), "4");
        assert!(q.is_correct(1));
        assert!(!q.is_correct(0));
    }
}

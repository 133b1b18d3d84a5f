use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::BankError;
use crate::quiz::specialization::{Specialization, SPECIALIZATIONS};
use crate::quiz::{Difficulty, Question};

/// How a session's questions are picked out of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// The first `question_count` questions, in bank order.
    Fixed,
    /// A random subset in random order.
    #[default]
    Shuffled,
}

impl SelectionPolicy {
    pub fn select<R: Rng + ?Sized>(
        self,
        pool: &[Arc<Question>],
        count: usize,
        rng: &mut R,
    ) -> Vec<Arc<Question>> {
        match self {
            SelectionPolicy::Fixed => pool.iter().take(count).cloned().collect(),
            SelectionPolicy::Shuffled => {
                let mut picked: Vec<_> = pool.choose_multiple(rng, count).cloned().collect();
                // choose_multiple does not promise a random order
                picked.shuffle(rng);
                picked
            }
        }
    }
}

impl FromStr for SelectionPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(SelectionPolicy::Fixed),
            "shuffled" | "random" => Ok(SelectionPolicy::Shuffled),
            _ => Err(()),
        }
    }
}

/// On-disk layout of one `<specialization>.json` file.
type BankFile = BTreeMap<Difficulty, Vec<Question>>;

/// Every question the bot knows, keyed by specialization and difficulty.
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Default)]
pub struct QuestionBank {
    pools: HashMap<&'static str, BTreeMap<Difficulty, Vec<Arc<Question>>>>,
}

impl QuestionBank {
    /// Loads `<dir>/<key>.json` for every known specialization. A missing
    /// file only hides that specialization; a malformed one is an error.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, BankError> {
        let dir = dir.as_ref();
        let mut bank = Self::default();

        for specialization in SPECIALIZATIONS.iter() {
            let path = dir.join(format!("{}.json", specialization.key));
            if !path.exists() {
                log::warn!(
                    "No question bank for {} at {}",
                    specialization.key,
                    path.display()
                );
                continue;
            }

            let file = File::open(&path).map_err(|source| BankError::Io {
                path: path.clone(),
                source,
            })?;
            let parsed: BankFile =
                serde_json::from_reader(BufReader::new(file)).map_err(|source| {
                    BankError::Parse {
                        path: path.clone(),
                        source,
                    }
                })?;

            for (difficulty, questions) in parsed {
                validate(&path, difficulty, &questions)?;
                log::debug!(
                    "Loaded {} questions for {}/{}",
                    questions.len(),
                    specialization.key,
                    difficulty.key()
                );
                bank.insert(specialization.key, difficulty, questions);
            }
        }

        Ok(bank)
    }

    pub fn insert(&mut self, key: &'static str, difficulty: Difficulty, questions: Vec<Question>) {
        self.pools
            .entry(key)
            .or_default()
            .entry(difficulty)
            .or_default()
            .extend(questions.into_iter().map(Arc::new));
    }

    pub fn pool(&self, key: &str, difficulty: Difficulty) -> &[Arc<Question>] {
        self.pools
            .get(key)
            .and_then(|pools| pools.get(&difficulty))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Difficulties whose pool is large enough to run a full exam.
    pub fn playable_difficulties(&self, key: &str) -> Vec<Difficulty> {
        Difficulty::ALL
            .into_iter()
            .filter(|d| self.pool(key, *d).len() >= d.question_count())
            .collect()
    }

    /// Specializations that can run at least one difficulty, in table order.
    pub fn playable_specializations(&self) -> Vec<&'static Specialization> {
        SPECIALIZATIONS
            .iter()
            .filter(|s| !self.playable_difficulties(s.key).is_empty())
            .collect()
    }

    pub fn question_total(&self) -> usize {
        self.pools
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }
}

fn validate(path: &Path, difficulty: Difficulty, questions: &[Question]) -> Result<(), BankError> {
    let invalid = |index: usize, reason: &'static str| BankError::InvalidQuestion {
        path: PathBuf::from(path),
        difficulty,
        index,
        reason,
    };

    for (index, question) in questions.iter().enumerate() {
        if question.text.trim().is_empty() {
            return Err(invalid(index, "empty text"));
        }
        if question.options.len() < 2 {
            return Err(invalid(index, "fewer than two options"));
        }
        if question.options.len() > 10 {
            return Err(invalid(index, "more than ten options"));
        }
        if question.correct >= question.options.len() {
            return Err(invalid(index, "correct option out of range"));
        }
    }
    Ok(())
}

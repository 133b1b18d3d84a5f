//! One user's exam attempt and the rules for moving it forward.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::error::ExamError;
use crate::quiz::bank::{QuestionBank, SelectionPolicy};
use crate::quiz::grading::{Grade, GradeScale};
use crate::quiz::specialization::Specialization;
use crate::quiz::{Difficulty, Question};

/// Intake form answers, printed on the certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub full_name: String,
    pub position: String,
    pub department: String,
}

/// Immutable record of a completed exam.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub user_id: u64,
    pub specialization: String,
    pub difficulty: Difficulty,
    pub correct_count: usize,
    pub total_questions: usize,
    pub percentage: f64,
    pub grade: Grade,
    pub elapsed_secs: i64,
    pub timestamp: DateTime<Utc>,
}

impl TestResult {
    pub fn elapsed_display(&self) -> String {
        format_elapsed(self.elapsed_secs)
    }
}

pub fn format_elapsed(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{} мин {:02} сек", secs / 60, secs % 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub completed: bool,
}

/// Outcome of [`Session::finish`]. `newly_finished` is true only for the
/// call that actually produced the result.
#[derive(Debug, Clone, PartialEq)]
pub struct Finished {
    pub result: TestResult,
    pub newly_finished: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewItem {
    pub number: usize,
    pub question: Arc<Question>,
    pub chosen: Option<usize>,
}

impl ReviewItem {
    pub fn is_correct(&self) -> bool {
        self.chosen.map_or(false, |c| self.question.is_correct(c))
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: u64,
    pub profile: Profile,
    pub specialization: &'static Specialization,
    pub difficulty: Difficulty,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    questions: Vec<Arc<Question>>,
    current_index: usize,
    answers: BTreeMap<usize, usize>,
    selection: Option<usize>,
    last_activity: DateTime<Utc>,
    reminded: bool,
    result: Option<TestResult>,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub fn start<R: Rng + ?Sized>(
        user_id: u64,
        profile: Profile,
        specialization: &'static Specialization,
        difficulty: Difficulty,
        bank: &QuestionBank,
        policy: SelectionPolicy,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<Self, ExamError> {
        let pool = bank.pool(specialization.key, difficulty);
        let required = difficulty.question_count();
        if pool.len() < required {
            return Err(ExamError::NotEnoughQuestions {
                difficulty,
                required,
                available: pool.len(),
            });
        }

        let questions = policy.select(pool, required, rng);
        Ok(Self {
            user_id,
            profile,
            specialization,
            difficulty,
            started_at: now,
            deadline: now + Duration::minutes(difficulty.time_limit_minutes()),
            questions,
            current_index: 0,
            answers: BTreeMap::new(),
            selection: None,
            last_activity: now,
            reminded: false,
            result: None,
        })
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> Option<&Arc<Question>> {
        self.questions.get(self.current_index)
    }

    pub fn selection(&self) -> Option<usize> {
        self.selection
    }

    pub fn answers(&self) -> &BTreeMap<usize, usize> {
        &self.answers
    }

    pub fn is_completed(&self) -> bool {
        self.result.is_some() || self.current_index >= self.questions.len()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.deadline - now).max(Duration::zero())
    }

    pub fn result(&self) -> Option<&TestResult> {
        self.result.as_ref()
    }

    fn ensure_open(&self, now: DateTime<Utc>) -> Result<(), ExamError> {
        if self.is_completed() {
            return Err(ExamError::InvalidState);
        }
        if self.is_expired(now) {
            return Err(ExamError::Expired);
        }
        Ok(())
    }

    fn ensure_option(&self, option: usize) -> Result<(), ExamError> {
        let available = self
            .current_question()
            .map(|q| q.options.len())
            .unwrap_or_default();
        if option >= available {
            return Err(ExamError::InvalidOption { option, available });
        }
        Ok(())
    }

    /// Marks `option` as the pending choice for the current question without
    /// moving on. Selecting again replaces the previous choice.
    pub fn select(&mut self, option: usize, now: DateTime<Utc>) -> Result<(), ExamError> {
        self.ensure_open(now)?;
        self.ensure_option(option)?;
        self.selection = Some(option);
        self.touch(now);
        Ok(())
    }

    pub fn submit_answer(
        &mut self,
        option: usize,
        now: DateTime<Utc>,
    ) -> Result<Submission, ExamError> {
        self.ensure_open(now)?;
        self.ensure_option(option)?;

        self.answers.insert(self.current_index, option);
        self.selection = None;
        self.current_index += 1;
        self.touch(now);

        Ok(Submission {
            completed: self.current_index >= self.questions.len(),
        })
    }

    pub fn correct_count(&self) -> usize {
        self.answers
            .iter()
            .filter(|(index, option)| {
                self.questions
                    .get(**index)
                    .map_or(false, |q| q.is_correct(**option))
            })
            .count()
    }

    /// Grades the attempt. Questions left unanswered count as wrong, which is
    /// what happens when the deadline passes mid-exam. Calling it again
    /// returns the cached result.
    pub fn finish(&mut self, scale: &GradeScale, now: DateTime<Utc>) -> Finished {
        if let Some(result) = &self.result {
            return Finished {
                result: result.clone(),
                newly_finished: false,
            };
        }

        let score = scale.grade(self.correct_count(), self.questions.len());
        let elapsed = (now.min(self.deadline) - self.started_at).num_seconds();
        let result = TestResult {
            user_id: self.user_id,
            specialization: self.specialization.key.to_string(),
            difficulty: self.difficulty,
            correct_count: score.correct,
            total_questions: score.total,
            percentage: score.percentage,
            grade: score.grade,
            elapsed_secs: elapsed.max(0),
            timestamp: now,
        };

        self.current_index = self.questions.len();
        self.selection = None;
        self.result = Some(result.clone());
        Finished {
            result,
            newly_finished: true,
        }
    }

    pub fn review(&self) -> Vec<ReviewItem> {
        self.questions
            .iter()
            .enumerate()
            .map(|(index, question)| ReviewItem {
                number: index + 1,
                question: question.clone(),
                chosen: self.answers.get(&index).copied(),
            })
            .collect()
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
        self.reminded = false;
    }

    /// True once per idle stretch: an unfinished, unexpired session whose
    /// user has not acted for `idle`.
    pub fn needs_reminder(&self, now: DateTime<Utc>, idle: Duration) -> bool {
        !self.reminded
            && !self.is_completed()
            && !self.is_expired(now)
            && now - self.last_activity >= idle
    }

    pub fn mark_reminded(&mut self) {
        self.reminded = true;
    }
}

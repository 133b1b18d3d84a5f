//! Durable log of finished exams, one row per result.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::error::StoreError;
use crate::quiz::session::TestResult;
use crate::quiz::Difficulty;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatsSummary {
    pub count: usize,
    pub average: f64,
    pub best: f64,
    pub worst: f64,
    /// Newest first.
    pub recent: Vec<TestResult>,
}

pub struct StatsStore {
    conn: Mutex<Connection>,
}

impl StatsStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::setup_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::setup_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn setup_db(conn: &Connection) -> rusqlite::Result<()> {
        // in-memory databases answer "memory" here
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        log::debug!("Stats journal mode: {}", mode);
        conn.execute_batch(
            "
            PRAGMA synchronous=NORMAL;
            CREATE TABLE IF NOT EXISTS results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                specialization TEXT NOT NULL,
                difficulty TEXT NOT NULL,
                correct_count INTEGER NOT NULL,
                total_questions INTEGER NOT NULL,
                percentage REAL NOT NULL,
                grade TEXT NOT NULL,
                elapsed_secs INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_results_user ON results(user_id, created_at);
        ",
        )
    }

    /// Drops the results table so every later call fails.
    #[cfg(test)]
    pub(crate) fn break_schema(&self) {
        self.conn()
            .execute_batch("DROP TABLE results;")
            .expect("drop results table");
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, result: &TestResult) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO results (user_id, specialization, difficulty, correct_count,
                total_questions, percentage, grade, elapsed_secs, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                result.user_id as i64,
                result.specialization,
                result.difficulty.key(),
                result.correct_count as i64,
                result.total_questions as i64,
                result.percentage,
                result.grade.as_str(),
                result.elapsed_secs,
                result.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn summary(&self, user_id: u64, recent_limit: usize) -> Result<StatsSummary, StoreError> {
        let conn = self.conn();

        let (count, average, best, worst): (i64, Option<f64>, Option<f64>, Option<f64>) = conn
            .query_row(
                "SELECT COUNT(*), AVG(percentage), MAX(percentage), MIN(percentage)
                 FROM results WHERE user_id = ?1",
                [user_id as i64],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        let mut stmt = conn.prepare(
            "SELECT user_id, specialization, difficulty, correct_count, total_questions,
                    percentage, grade, elapsed_secs, created_at
             FROM results WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let mut rows = stmt.query(params![user_id as i64, recent_limit as i64])?;
        let mut recent = Vec::new();
        while let Some(row) = rows.next()? {
            recent.push(result_from_row(row)?);
        }

        Ok(StatsSummary {
            count: count as usize,
            average: average.map(round1).unwrap_or_default(),
            best: best.unwrap_or_default(),
            worst: worst.unwrap_or_default(),
            recent,
        })
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn result_from_row(row: &Row<'_>) -> Result<TestResult, StoreError> {
    let user_id: i64 = row.get(0)?;
    let difficulty: String = row.get(2)?;
    let correct_count: i64 = row.get(3)?;
    let total_questions: i64 = row.get(4)?;
    let grade: String = row.get(6)?;
    let created_at: String = row.get(8)?;

    Ok(TestResult {
        user_id: user_id as u64,
        specialization: row.get(1)?,
        difficulty: Difficulty::from_key(&difficulty)
            .ok_or_else(|| StoreError::Record(format!("unknown difficulty {:?}", difficulty)))?,
        correct_count: correct_count as usize,
        total_questions: total_questions as usize,
        percentage: row.get(5)?,
        grade: grade.parse().map_err(StoreError::Record)?,
        elapsed_secs: row.get(7)?,
        timestamp: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::grading::Grade;
    use chrono::{Duration, TimeZone};

    fn result(user_id: u64, percentage: f64, minutes: i64) -> TestResult {
        TestResult {
            user_id,
            specialization: "kadry".into(),
            difficulty: Difficulty::Basic,
            correct_count: (percentage * 0.3).round() as usize,
            total_questions: 30,
            percentage,
            grade: Grade::Good,
            elapsed_secs: 600,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
                + Duration::minutes(minutes),
        }
    }

    #[test]
    fn empty_user_has_zero_summary() {
        let store = StatsStore::open_in_memory().unwrap();
        let summary = store.summary(1, 5).unwrap();
        assert_eq!(summary, StatsSummary::default());
    }

    #[test]
    fn summary_aggregates_one_user() {
        let store = StatsStore::open_in_memory().unwrap();
        store.append(&result(1, 80.0, 0)).unwrap();
        store.append(&result(1, 50.0, 1)).unwrap();
        store.append(&result(1, 93.3, 2)).unwrap();
        store.append(&result(2, 10.0, 3)).unwrap();

        let summary = store.summary(1, 2).unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average, 74.4);
        assert_eq!(summary.best, 93.3);
        assert_eq!(summary.worst, 50.0);

        let recent: Vec<_> = summary.recent.iter().map(|r| r.percentage).collect();
        assert_eq!(recent, vec![93.3, 50.0]);
    }

    #[test]
    fn broken_schema_surfaces_as_errors() {
        let store = StatsStore::open_in_memory().unwrap();
        store.break_schema();
        assert!(matches!(
            store.append(&result(1, 50.0, 0)),
            Err(StoreError::Sqlite(_))
        ));
        assert!(store.summary(1, 5).is_err());
    }

    #[test]
    fn stored_record_reads_back_unchanged() {
        let store = StatsStore::open_in_memory().unwrap();
        let original = result(42, 66.7, 15);
        store.append(&original).unwrap();

        let summary = store.summary(42, 5).unwrap();
        assert_eq!(summary.recent, vec![original]);
    }
}

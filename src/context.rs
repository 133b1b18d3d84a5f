//! Everything a handler needs, built once in `main` and shared through the
//! dispatcher's dependency map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::bot::antispam::SpamGuard;
use crate::certificate::CertificateRenderer;
use crate::config::Config;
use crate::error::{CertificateError, ExamError, StoreError};
use crate::quiz::bank::QuestionBank;
use crate::quiz::session::{Profile, Session, TestResult};
use crate::quiz::specialization::Specialization;
use crate::quiz::Difficulty;
use crate::stats::{StatsStore, StatsSummary};

pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

/// Running exams keyed by user id. Each session sits behind its own mutex so
/// the reminder loop and the user's handlers never touch it at once.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<u64, SessionHandle>>,
}

impl SessionRegistry {
    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<u64, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a session, dropping any earlier one of the same user.
    pub fn insert(&self, session: Session) -> SessionHandle {
        let user_id = session.user_id;
        let handle = Arc::new(tokio::sync::Mutex::new(session));
        if self.map().insert(user_id, handle.clone()).is_some() {
            log::info!("User {} abandoned a running exam", user_id);
        }
        handle
    }

    pub fn get(&self, user_id: u64) -> Option<SessionHandle> {
        self.map().get(&user_id).cloned()
    }

    pub fn remove(&self, user_id: u64) -> Option<SessionHandle> {
        self.map().remove(&user_id)
    }

    /// Removes the user's entry only if it is still `handle`, so a finished
    /// exam never evicts a newer one started in the meantime.
    pub fn release(&self, user_id: u64, handle: &SessionHandle) -> bool {
        let mut map = self.map();
        match map.get(&user_id) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                map.remove(&user_id);
                true
            }
            _ => false,
        }
    }

    pub fn snapshot(&self) -> Vec<(u64, SessionHandle)> {
        self.map()
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of grading a session. `saved` carries the stats write outcome of
/// the call that produced the result; later calls report `Ok`.
#[derive(Debug)]
pub struct Completion {
    pub result: TestResult,
    pub saved: Result<(), StoreError>,
}

pub struct AppContext {
    pub config: Config,
    pub bank: QuestionBank,
    pub stats: Arc<StatsStore>,
    pub sessions: SessionRegistry,
    pub renderer: Arc<CertificateRenderer>,
    pub antispam: SpamGuard,
    rng: Mutex<StdRng>,
}

impl AppContext {
    pub fn new(config: Config, bank: QuestionBank, stats: StatsStore) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            renderer: Arc::new(CertificateRenderer::new(
                &config.font_path,
                &config.seal_path,
            )),
            antispam: SpamGuard::new(config.antispam_interval),
            stats: Arc::new(stats),
            sessions: SessionRegistry::default(),
            rng: Mutex::new(rng),
            bank,
            config,
        }
    }

    pub fn start_session(
        &self,
        user_id: u64,
        profile: Profile,
        specialization: &'static Specialization,
        difficulty: Difficulty,
        now: DateTime<Utc>,
    ) -> Result<SessionHandle, ExamError> {
        let session = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            Session::start(
                user_id,
                profile,
                specialization,
                difficulty,
                &self.bank,
                self.config.selection,
                &mut *rng,
                now,
            )?
        };
        log::info!(
            "User {} started {}/{} with {} questions",
            user_id,
            specialization.key,
            difficulty.key(),
            session.total_questions()
        );
        Ok(self.sessions.insert(session))
    }

    /// Grades the session and appends the result to the stats store exactly
    /// once, however many times it is called.
    pub async fn complete(&self, session: &mut Session, now: DateTime<Utc>) -> Completion {
        let finished = session.finish(&self.config.grade_scale, now);
        let saved = if finished.newly_finished {
            log::info!(
                "User {} finished {}/{}: {}/{} ({}%)",
                finished.result.user_id,
                finished.result.specialization,
                finished.result.difficulty.key(),
                finished.result.correct_count,
                finished.result.total_questions,
                finished.result.percentage
            );
            self.record_result(finished.result.clone()).await
        } else {
            Ok(())
        };
        if let Err(err) = &saved {
            log::warn!(
                "Result of user {} was not saved: {}",
                finished.result.user_id,
                err
            );
        }
        Completion {
            result: finished.result,
            saved,
        }
    }

    pub async fn record_result(&self, result: TestResult) -> Result<(), StoreError> {
        let stats = self.stats.clone();
        tokio::task::spawn_blocking(move || stats.append(&result)).await?
    }

    pub async fn summary(&self, user_id: u64) -> Result<StatsSummary, StoreError> {
        let stats = self.stats.clone();
        let recent = self.config.recent_results;
        tokio::task::spawn_blocking(move || stats.summary(user_id, recent)).await?
    }

    pub async fn render_certificate(
        &self,
        profile: Profile,
        result: TestResult,
        user_id: u64,
    ) -> Result<Vec<u8>, CertificateError> {
        let renderer = self.renderer.clone();
        tokio::task::spawn_blocking(move || renderer.render(&profile, &result, user_id)).await?
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::quiz::bank::tests::full_bank;
    use crate::quiz::session::tests::{profile, t0};
    use crate::quiz::specialization;

    pub(crate) fn context() -> AppContext {
        let config = Config::from_lookup(|name| match name {
            "API_TOKEN" => Some("test".into()),
            "QUESTION_ORDER" => Some("fixed".into()),
            "QUESTION_SEED" => Some("11".into()),
            "FONT_PATH" => Some("/nonexistent/font.ttf".into()),
            "SEAL_PATH" => Some("/nonexistent/seal.png".into()),
            _ => None,
        })
        .unwrap();
        AppContext::new(
            config,
            full_bank("informatika"),
            StatsStore::open_in_memory().unwrap(),
        )
    }

    #[tokio::test]
    async fn completing_twice_stores_one_result() {
        let ctx = context();
        let informatika = specialization::find("informatika").unwrap();
        let handle = ctx
            .start_session(5, profile(), informatika, Difficulty::Reserve, t0())
            .unwrap();

        let mut session = handle.lock().await;
        for _ in 0..session.total_questions() {
            session.submit_answer(0, t0()).unwrap();
        }
        let first = ctx.complete(&mut session, t0()).await;
        let second = ctx.complete(&mut session, t0()).await;
        assert!(first.saved.is_ok());
        assert!(second.saved.is_ok());
        assert_eq!(first.result, second.result);

        let summary = ctx.summary(5).await.unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.recent, vec![first.result]);
    }

    #[tokio::test]
    async fn failed_stats_write_keeps_the_result() {
        let ctx = context();
        ctx.stats.break_schema();
        let informatika = specialization::find("informatika").unwrap();
        let handle = ctx
            .start_session(6, profile(), informatika, Difficulty::Reserve, t0())
            .unwrap();

        let mut session = handle.lock().await;
        for _ in 0..session.total_questions() {
            session.submit_answer(0, t0()).unwrap();
        }
        let first = ctx.complete(&mut session, t0()).await;
        assert!(matches!(first.saved, Err(StoreError::Sqlite(_))));
        assert_eq!(first.result.total_questions, 20);
        assert_eq!(session.result(), Some(&first.result));

        // the write is attempted once, later calls only return the result
        let second = ctx.complete(&mut session, t0()).await;
        assert!(second.saved.is_ok());
        assert_eq!(second.result, first.result);

        let pdf = ctx
            .render_certificate(session.profile.clone(), first.result, 6)
            .await
            .unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn starting_again_replaces_the_running_session() {
        let ctx = context();
        let informatika = specialization::find("informatika").unwrap();
        let first = ctx
            .start_session(9, profile(), informatika, Difficulty::Basic, t0())
            .unwrap();
        let second = ctx
            .start_session(9, profile(), informatika, Difficulty::Advanced, t0())
            .unwrap();

        assert_eq!(ctx.sessions.len(), 1);
        let current = ctx.sessions.get(9).unwrap();
        assert!(Arc::ptr_eq(&current, &second));
        assert!(!Arc::ptr_eq(&current, &first));
        assert_eq!(current.lock().await.difficulty, Difficulty::Advanced);
    }

    #[tokio::test]
    async fn release_keeps_a_newer_session() {
        let ctx = context();
        let informatika = specialization::find("informatika").unwrap();
        let old = ctx
            .start_session(4, profile(), informatika, Difficulty::Reserve, t0())
            .unwrap();
        let new = ctx
            .start_session(4, profile(), informatika, Difficulty::Reserve, t0())
            .unwrap();

        assert!(!ctx.sessions.release(4, &old));
        assert_eq!(ctx.sessions.len(), 1);
        assert!(ctx.sessions.release(4, &new));
        assert!(ctx.sessions.is_empty());
    }

    #[tokio::test]
    async fn unknown_pool_is_reported() {
        let ctx = context();
        let oko = specialization::find("oko").unwrap();
        let err = ctx
            .start_session(1, profile(), oko, Difficulty::Reserve, t0())
            .unwrap_err();
        assert!(matches!(err, ExamError::NotEnoughQuestions { available: 0, .. }));
        assert!(ctx.sessions.is_empty());
    }

    #[tokio::test]
    async fn certificate_renders_off_the_runtime() {
        let ctx = context();
        let informatika = specialization::find("informatika").unwrap();
        let handle = ctx
            .start_session(3, profile(), informatika, Difficulty::Reserve, t0())
            .unwrap();
        let mut session = handle.lock().await;
        let completion = ctx.complete(&mut session, t0()).await;

        let pdf = ctx
            .render_certificate(session.profile.clone(), completion.result, 3)
            .await
            .unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }
}

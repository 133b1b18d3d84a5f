//! Background loop that nudges users who went quiet in the middle of an exam.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use teloxide::{dispatching::dialogue::InMemStorage, prelude::*, types::ParseMode};
use tokio::time::{self, MissedTickBehavior};

use crate::bot::{keyboards, texts, ExamDialogue, State};
use crate::context::AppContext;
use crate::quiz::session::Session;

/// Running exams past their deadline by this much are graded and dropped.
const ABANDON_AFTER_MINUTES: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub user_id: u64,
    pub answered: usize,
    pub total: usize,
    pub remaining: Duration,
}

/// An exam the scan graded on the user's behalf.
#[derive(Debug)]
pub struct ClosedExam {
    pub user_id: u64,
    pub exam: Box<Session>,
    pub saved: bool,
}

#[derive(Debug, Default)]
pub struct Sweep {
    pub reminders: Vec<Reminder>,
    pub closed: Vec<ClosedExam>,
}

pub async fn run(bot: Bot, ctx: Arc<AppContext>, storage: Arc<InMemStorage<State>>) {
    let mut ticker = time::interval(ctx.config.reminder_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    log::info!(
        "Reminders started: every {:?}, idle threshold {} min",
        ctx.config.reminder_interval,
        ctx.config.reminder_idle.num_minutes()
    );

    loop {
        ticker.tick().await;
        if ctx.sessions.is_empty() {
            continue;
        }
        let pass = sweep(&ctx, Utc::now()).await;
        for reminder in pass.reminders {
            let text = texts::reminder(reminder.answered, reminder.total, reminder.remaining);
            match bot
                .send_message(ChatId(reminder.user_id as i64), text)
                .parse_mode(ParseMode::Html)
                .await
            {
                Ok(_) => log::debug!("Reminder sent to user {}", reminder.user_id),
                Err(err) => log::error!(
                    "Failed to send reminder to user {}: {}",
                    reminder.user_id,
                    err
                ),
            }
        }
        for closed in pass.closed {
            let user_id = closed.user_id;
            if let Err(err) = deliver_result(&bot, storage.clone(), closed).await {
                log::error!("Failed to deliver result to user {}: {}", user_id, err);
            }
        }
    }
}

/// Moves the user to the result screen, as if they had run out of time
/// while answering.
async fn deliver_result(
    bot: &Bot,
    storage: Arc<InMemStorage<State>>,
    closed: ClosedExam,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let chat = ChatId(closed.user_id as i64);
    let Some(result) = closed.exam.result().cloned() else {
        return Ok(());
    };

    ExamDialogue::new(storage, chat)
        .update(State::Finished { exam: closed.exam })
        .await?;
    bot.send_message(chat, texts::TIME_IS_UP)
        .parse_mode(ParseMode::Html)
        .await?;
    bot.send_message(chat, texts::result(&result))
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboards::finished())
        .await?;
    if !closed.saved {
        bot.send_message(chat, texts::RESULT_NOT_SAVED).await?;
    }
    Ok(())
}

/// One pass over the registry. Sessions a handler is holding right now are
/// skipped, they are active by definition.
pub async fn sweep(ctx: &AppContext, now: DateTime<Utc>) -> Sweep {
    let mut sweep = Sweep::default();
    for (user_id, handle) in ctx.sessions.snapshot() {
        let Ok(mut session) = handle.try_lock() else {
            continue;
        };

        if now - session.deadline >= Duration::minutes(ABANDON_AFTER_MINUTES) {
            // a newer exam or /start took the slot meanwhile
            if !ctx.sessions.release(user_id, &handle) {
                continue;
            }
            let completion = ctx.complete(&mut session, now).await;
            log::info!(
                "Closed abandoned exam of user {} at {}%",
                user_id,
                completion.result.percentage
            );
            sweep.closed.push(ClosedExam {
                user_id,
                exam: Box::new(session.clone()),
                saved: completion.saved.is_ok(),
            });
            continue;
        }

        if session.needs_reminder(now, ctx.config.reminder_idle) {
            session.mark_reminded();
            sweep.reminders.push(Reminder {
                user_id,
                answered: session.answers().len(),
                total: session.total_questions(),
                remaining: session.remaining(now),
            });
        }
    }
    sweep
}

//! Handlers for a running exam: starting it, answer buttons and the
//! hand-off to the result screen.

use std::sync::Arc;

use chrono::Utc;
use teloxide::{prelude::*, types::ParseMode};

use super::keyboards::{self, CallbackAction};
use super::{action_of, chat_of, texts, user_id_of, ExamDialogue, HandlerResult, State};
use crate::context::{AppContext, SessionHandle};
use crate::error::ExamError;
use crate::quiz::session::{Profile, Session};
use crate::quiz::specialization::Specialization;

pub async fn choose_difficulty(
    bot: Bot,
    dialogue: ExamDialogue,
    (specialization, profile): (&'static Specialization, Profile),
    q: CallbackQuery,
    ctx: Arc<AppContext>,
) -> HandlerResult {
    let Some(CallbackAction::Difficulty(difficulty)) = action_of(&q) else {
        bot.answer_callback_query(q.id).text(texts::STALE_BUTTON).await?;
        return Ok(());
    };
    let chat = chat_of(&q);
    let user_id = q.from.id.0;
    let now = Utc::now();

    let handle = match ctx.start_session(user_id, profile, specialization, difficulty, now) {
        Ok(handle) => handle,
        Err(err) => {
            log::warn!("User {} could not start {}: {}", user_id, specialization.key, err);
            bot.answer_callback_query(q.id)
                .text("😔 Для этого уровня пока недостаточно вопросов")
                .await?;
            return Ok(());
        }
    };
    bot.answer_callback_query(q.id).await?;
    if let Some(message) = &q.message {
        let _ = bot.edit_message_reply_markup(chat, message.id).await;
    }

    let session = handle.lock().await;
    bot.send_message(chat, texts::exam_started(&session))
        .parse_mode(ParseMode::Html)
        .await?;
    send_question(&bot, chat, &session, now).await?;
    dialogue.update(State::Exam).await?;
    Ok(())
}

async fn send_question(
    bot: &Bot,
    chat: ChatId,
    session: &Session,
    now: chrono::DateTime<Utc>,
) -> HandlerResult {
    let (Some(text), Some(question)) = (texts::question(session, now), session.current_question())
    else {
        return Ok(());
    };
    bot.send_message(chat, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboards::question(question.options.len(), session.selection()))
        .await?;
    Ok(())
}

/// Redraws the question message in place, or sends a fresh one when the
/// original is out of reach.
async fn show_question(
    bot: &Bot,
    chat: ChatId,
    message: Option<&Message>,
    session: &Session,
    now: chrono::DateTime<Utc>,
) -> HandlerResult {
    let (Some(message), Some(text), Some(question)) = (
        message,
        texts::question(session, now),
        session.current_question(),
    ) else {
        return send_question(bot, chat, session, now).await;
    };
    bot.edit_message_text(chat, message.id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboards::question(question.options.len(), session.selection()))
        .await?;
    Ok(())
}

/// Option and "➡️ Далее" buttons.
pub async fn answer(
    bot: Bot,
    dialogue: ExamDialogue,
    q: CallbackQuery,
    ctx: Arc<AppContext>,
) -> HandlerResult {
    let chat = chat_of(&q);
    let user_id = q.from.id.0;
    let Some(handle) = ctx.sessions.get(user_id) else {
        bot.answer_callback_query(q.id).text(texts::EXAM_OVER).await?;
        dialogue.reset().await?;
        return Ok(());
    };

    let mut session = handle.lock().await;
    let now = Utc::now();
    let step = match action_of(&q) {
        Some(CallbackAction::Option(option)) => {
            if session.selection() == Some(option) {
                bot.answer_callback_query(q.id).await?;
                return Ok(());
            }
            session.select(option, now).map(|()| false)
        }
        Some(CallbackAction::Next) => match session.selection() {
            Some(option) => session.submit_answer(option, now).map(|s| s.completed),
            None => {
                bot.answer_callback_query(q.id)
                    .text(texts::PICK_OPTION_FIRST)
                    .await?;
                return Ok(());
            }
        },
        _ => {
            bot.answer_callback_query(q.id).text(texts::STALE_BUTTON).await?;
            return Ok(());
        }
    };
    bot.answer_callback_query(q.id).await?;
    log::debug!("User {} answer step: {:?}", user_id, step);

    let message = q.message.as_ref();
    match step {
        Ok(false) => show_question(&bot, chat, message, &session, now).await,
        Ok(true) => {
            finish_exam(&bot, &dialogue, chat, message, &ctx, &handle, &mut session, false).await
        }
        Err(ExamError::Expired) => {
            finish_exam(&bot, &dialogue, chat, message, &ctx, &handle, &mut session, true).await
        }
        Err(ExamError::InvalidState) => {
            finish_exam(&bot, &dialogue, chat, message, &ctx, &handle, &mut session, false).await
        }
        Err(err) => {
            // buttons from an older question
            log::debug!("Ignoring answer of user {}: {}", user_id, err);
            Ok(())
        }
    }
}

/// Anything typed while the exam runs. Also the point where an exam whose
/// time ran out gets closed if the user never pressed a button again.
pub async fn text_during_exam(
    bot: Bot,
    dialogue: ExamDialogue,
    msg: Message,
    ctx: Arc<AppContext>,
) -> HandlerResult {
    let user_id = user_id_of(&msg);
    let Some(handle) = ctx.sessions.get(user_id) else {
        dialogue.reset().await?;
        bot.send_message(msg.chat.id, texts::UNKNOWN_INPUT).await?;
        return Ok(());
    };

    let mut session = handle.lock().await;
    let now = Utc::now();
    if session.is_expired(now) || session.is_completed() {
        let expired = !session.is_completed();
        return finish_exam(
            &bot,
            &dialogue,
            msg.chat.id,
            None,
            &ctx,
            &handle,
            &mut session,
            expired,
        )
        .await;
    }

    bot.send_message(msg.chat.id, texts::USE_BUTTONS).await?;
    send_question(&bot, msg.chat.id, &session, now).await
}

#[allow(clippy::too_many_arguments)]
async fn finish_exam(
    bot: &Bot,
    dialogue: &ExamDialogue,
    chat: ChatId,
    question_message: Option<&Message>,
    ctx: &AppContext,
    handle: &SessionHandle,
    session: &mut Session,
    expired: bool,
) -> HandlerResult {
    let completion = ctx.complete(session, Utc::now()).await;
    ctx.sessions.release(session.user_id, handle);
    dialogue
        .update(State::Finished {
            exam: Box::new(session.clone()),
        })
        .await?;

    if let Some(message) = question_message {
        let _ = bot.edit_message_reply_markup(chat, message.id).await;
    }
    if expired {
        bot.send_message(chat, texts::TIME_IS_UP)
            .parse_mode(ParseMode::Html)
            .await?;
    }
    bot.send_message(chat, texts::result(&completion.result))
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboards::finished())
        .await?;
    if completion.saved.is_err() {
        bot.send_message(chat, texts::RESULT_NOT_SAVED).await?;
    }
    Ok(())
}

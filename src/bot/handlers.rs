//! Commands, the intake form and the menu shown after an exam.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{ChatAction, InputFile, ParseMode},
};

use super::keyboards::{self, CallbackAction};
use super::{action_of, chat_of, texts, user_id_of, ExamDialogue, HandlerResult, State};
use crate::context::AppContext;
use crate::quiz::session::{Profile, Session};
use crate::quiz::specialization::{self, Specialization};

const FIELD_MAX_CHARS: usize = 150;

/// Trimmed free-text answer to an intake question, or the hint to send back.
pub fn clean_field(text: Option<&str>) -> Result<String, &'static str> {
    let text = text.map(str::trim).unwrap_or_default();
    if text.is_empty() || text.starts_with('/') {
        return Err("✍️ Пожалуйста, введите ответ текстом.");
    }
    if text.chars().count() > FIELD_MAX_CHARS {
        return Err("✂️ Слишком длинный ответ, сократите до 150 символов.");
    }
    Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
}

pub async fn start(
    bot: Bot,
    dialogue: ExamDialogue,
    msg: Message,
    ctx: Arc<AppContext>,
) -> HandlerResult {
    let user_id = user_id_of(&msg);
    if ctx.sessions.remove(user_id).is_some() {
        log::info!("User {} left a running exam with /start", user_id);
    }
    show_menu(&bot, &dialogue, msg.chat.id, &ctx).await
}

async fn show_menu(
    bot: &Bot,
    dialogue: &ExamDialogue,
    chat: ChatId,
    ctx: &AppContext,
) -> HandlerResult {
    let specializations = ctx.bank.playable_specializations();
    if specializations.is_empty() {
        bot.send_message(chat, texts::NO_SPECIALIZATIONS).await?;
        dialogue.update(State::Start).await?;
        return Ok(());
    }

    bot.send_message(chat, texts::WELCOME)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboards::specializations(&specializations))
        .await?;
    dialogue.update(State::ChooseSpecialization).await?;
    Ok(())
}

pub async fn stats(bot: Bot, msg: Message, ctx: Arc<AppContext>) -> HandlerResult {
    send_stats(&bot, msg.chat.id, user_id_of(&msg), &ctx).await
}

async fn send_stats(bot: &Bot, chat: ChatId, user_id: u64, ctx: &AppContext) -> HandlerResult {
    let text = match ctx.summary(user_id).await {
        Ok(summary) => texts::stats(&summary),
        Err(err) => {
            log::error!("Failed to load stats of user {}: {}", user_id, err);
            texts::STATS_UNAVAILABLE.to_string()
        }
    };
    bot.send_message(chat, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, texts::HELP)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn choose_specialization(
    bot: Bot,
    dialogue: ExamDialogue,
    q: CallbackQuery,
    ctx: Arc<AppContext>,
) -> HandlerResult {
    let chat = chat_of(&q);
    let chosen = match action_of(&q) {
        Some(CallbackAction::Specialization(key)) => specialization::find(&key)
            .filter(|s| !ctx.bank.playable_difficulties(s.key).is_empty()),
        _ => None,
    };
    let Some(specialization) = chosen else {
        bot.answer_callback_query(q.id).text(texts::STALE_BUTTON).await?;
        return Ok(());
    };

    bot.answer_callback_query(q.id).await?;
    bot.send_message(chat, texts::specialization_chosen(specialization.title))
        .parse_mode(ParseMode::Html)
        .await?;
    dialogue
        .update(State::ReceiveFullName { specialization })
        .await?;
    Ok(())
}

pub async fn receive_full_name(
    bot: Bot,
    dialogue: ExamDialogue,
    specialization: &'static Specialization,
    msg: Message,
) -> HandlerResult {
    match clean_field(msg.text()) {
        Ok(full_name) => {
            bot.send_message(msg.chat.id, texts::ASK_POSITION).await?;
            dialogue
                .update(State::ReceivePosition {
                    specialization,
                    full_name,
                })
                .await?;
        }
        Err(hint) => {
            bot.send_message(msg.chat.id, hint).await?;
        }
    }
    Ok(())
}

pub async fn receive_position(
    bot: Bot,
    dialogue: ExamDialogue,
    (specialization, full_name): (&'static Specialization, String),
    msg: Message,
) -> HandlerResult {
    match clean_field(msg.text()) {
        Ok(position) => {
            bot.send_message(msg.chat.id, texts::ASK_DEPARTMENT).await?;
            dialogue
                .update(State::ReceiveDepartment {
                    specialization,
                    full_name,
                    position,
                })
                .await?;
        }
        Err(hint) => {
            bot.send_message(msg.chat.id, hint).await?;
        }
    }
    Ok(())
}

pub async fn receive_department(
    bot: Bot,
    dialogue: ExamDialogue,
    (specialization, full_name, position): (&'static Specialization, String, String),
    msg: Message,
    ctx: Arc<AppContext>,
) -> HandlerResult {
    let department = match clean_field(msg.text()) {
        Ok(department) => department,
        Err(hint) => {
            bot.send_message(msg.chat.id, hint).await?;
            return Ok(());
        }
    };

    let profile = Profile {
        full_name,
        position,
        department,
    };
    ask_difficulty(&bot, &dialogue, msg.chat.id, &ctx, specialization, profile).await
}

pub(super) async fn ask_difficulty(
    bot: &Bot,
    dialogue: &ExamDialogue,
    chat: ChatId,
    ctx: &AppContext,
    specialization: &'static Specialization,
    profile: Profile,
) -> HandlerResult {
    let difficulties = ctx.bank.playable_difficulties(specialization.key);
    bot.send_message(chat, texts::ASK_DIFFICULTY)
        .reply_markup(keyboards::difficulties(&difficulties))
        .await?;
    dialogue
        .update(State::ChooseDifficulty {
            specialization,
            profile,
        })
        .await?;
    Ok(())
}

/// Buttons under the result message.
pub async fn after_exam(
    bot: Bot,
    dialogue: ExamDialogue,
    exam: Box<Session>,
    q: CallbackQuery,
    ctx: Arc<AppContext>,
) -> HandlerResult {
    let chat = chat_of(&q);
    let user_id = q.from.id.0;

    match action_of(&q) {
        Some(CallbackAction::Review) => {
            bot.answer_callback_query(q.id).await?;
            for part in texts::review(&exam.review()) {
                bot.send_message(chat, part)
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
        }
        Some(CallbackAction::Certificate) => {
            bot.answer_callback_query(q.id).await?;
            send_certificate(&bot, chat, user_id, &exam, &ctx).await?;
        }
        Some(CallbackAction::Stats) => {
            bot.answer_callback_query(q.id).await?;
            send_stats(&bot, chat, user_id, &ctx).await?;
        }
        Some(CallbackAction::Retry) => {
            bot.answer_callback_query(q.id).await?;
            ask_difficulty(
                &bot,
                &dialogue,
                chat,
                &ctx,
                exam.specialization,
                exam.profile.clone(),
            )
            .await?;
        }
        Some(CallbackAction::Menu) => {
            bot.answer_callback_query(q.id).await?;
            show_menu(&bot, &dialogue, chat, &ctx).await?;
        }
        // leftovers from the exam keyboard
        Some(CallbackAction::Option(_)) | Some(CallbackAction::Next) => {
            bot.answer_callback_query(q.id).text(texts::EXAM_OVER).await?;
        }
        _ => {
            bot.answer_callback_query(q.id).text(texts::STALE_BUTTON).await?;
        }
    }
    Ok(())
}

async fn send_certificate(
    bot: &Bot,
    chat: ChatId,
    user_id: u64,
    exam: &Session,
    ctx: &AppContext,
) -> HandlerResult {
    let Some(result) = exam.result().cloned() else {
        bot.send_message(chat, texts::EXAM_OVER).await?;
        return Ok(());
    };

    // Nice to have, the document is sent either way
    let _ = bot.send_chat_action(chat, ChatAction::UploadDocument).await;

    match ctx
        .render_certificate(exam.profile.clone(), result, user_id)
        .await
    {
        Ok(pdf) => {
            log::info!("Certificate generated for user {}", user_id);
            bot.send_document(
                chat,
                InputFile::memory(pdf).file_name(format!("certificate_{}.pdf", user_id)),
            )
            .caption("🏆 Ваш сертификат")
            .await?;
        }
        Err(err) => {
            log::error!("Certificate for user {} failed: {}", user_id, err);
            bot.send_message(chat, texts::CERTIFICATE_FAILED).await?;
        }
    }
    Ok(())
}

pub async fn stale_button(bot: Bot, q: CallbackQuery) -> HandlerResult {
    bot.answer_callback_query(q.id)
        .text(texts::STALE_BUTTON)
        .await?;
    Ok(())
}

pub async fn unexpected_message(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, texts::UNKNOWN_INPUT).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_is_trimmed_and_squeezed() {
        assert_eq!(
            clean_field(Some("  Иванов   Иван\tИванович ")),
            Ok("Иванов Иван Иванович".to_string())
        );
    }

    #[test]
    fn empty_or_command_fields_are_rejected() {
        assert!(clean_field(None).is_err());
        assert!(clean_field(Some("   ")).is_err());
        assert!(clean_field(Some("/stats")).is_err());
    }

    #[test]
    fn overlong_field_is_rejected() {
        let long = "я".repeat(FIELD_MAX_CHARS + 1);
        assert!(clean_field(Some(&long)).is_err());
        let exact = "я".repeat(FIELD_MAX_CHARS);
        assert_eq!(clean_field(Some(&exact)), Ok(exact.clone()));
    }
}

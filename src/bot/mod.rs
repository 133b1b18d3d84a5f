pub mod antispam;
pub mod exam;
pub mod handlers;
pub mod keyboards;
pub mod texts;

use std::sync::Arc;
use std::time::Instant;

use teloxide::{
    dispatching::{dialogue, dialogue::InMemStorage, UpdateHandler},
    prelude::*,
    types::UpdateKind,
    utils::command::BotCommands,
};

use crate::context::AppContext;
use crate::quiz::session::{Profile, Session};
use crate::quiz::specialization::Specialization;

pub type ExamDialogue = Dialogue<State, InMemStorage<State>>;
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Where a user is in the conversation. The running exam itself lives in
/// the session registry so the reminder loop can see it; `Finished` keeps a
/// snapshot for the certificate and the answer review.
#[derive(Clone, Default, Debug)]
pub enum State {
    #[default]
    Start,
    ChooseSpecialization,
    ReceiveFullName {
        specialization: &'static Specialization,
    },
    ReceivePosition {
        specialization: &'static Specialization,
        full_name: String,
    },
    ReceiveDepartment {
        specialization: &'static Specialization,
        full_name: String,
        position: String,
    },
    ChooseDifficulty {
        specialization: &'static Specialization,
        profile: Profile,
    },
    Exam,
    Finished {
        exam: Box<Session>,
    },
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
pub enum Command {
    #[command(description = "🏠 Начать тест")]
    Start,
    #[command(description = "📊 Моя статистика")]
    Stats,
    #[command(description = "❓ Помощь")]
    Help,
}

pub fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(handlers::start))
        .branch(case![Command::Stats].endpoint(handlers::stats))
        .branch(case![Command::Help].endpoint(handlers::help));

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(case![State::ReceiveFullName { specialization }].endpoint(handlers::receive_full_name))
        .branch(
            case![State::ReceivePosition {
                specialization,
                full_name
            }]
            .endpoint(handlers::receive_position),
        )
        .branch(
            case![State::ReceiveDepartment {
                specialization,
                full_name,
                position
            }]
            .endpoint(handlers::receive_department),
        )
        .branch(case![State::Exam].endpoint(exam::text_during_exam))
        .branch(dptree::endpoint(handlers::unexpected_message));

    let callback_handler = Update::filter_callback_query()
        .branch(case![State::ChooseSpecialization].endpoint(handlers::choose_specialization))
        .branch(
            case![State::ChooseDifficulty {
                specialization,
                profile
            }]
            .endpoint(exam::choose_difficulty),
        )
        .branch(case![State::Exam].endpoint(exam::answer))
        .branch(case![State::Finished { exam }].endpoint(handlers::after_exam))
        .branch(dptree::endpoint(handlers::stale_button));

    dptree::entry()
        .branch(dptree::filter(is_flooding).endpoint(drop_flood))
        .branch(
            dialogue::enter::<Update, InMemStorage<State>, State, _>()
                .branch(message_handler)
                .branch(callback_handler),
        )
}

fn is_flooding(update: Update, ctx: Arc<AppContext>) -> bool {
    match update.user() {
        Some(user) => !ctx.antispam.allow(user.id.0, Instant::now()),
        None => false,
    }
}

async fn drop_flood(bot: Bot, update: Update) -> HandlerResult {
    if let Some(user) = update.user() {
        log::warn!("Dropping update {} from user {}: too fast", update.id, user.id.0);
    }
    if let UpdateKind::CallbackQuery(q) = update.kind {
        bot.answer_callback_query(q.id).text(texts::SLOW_DOWN).await?;
    }
    Ok(())
}

/// Private-chat user id of a message, falling back to the chat id.
pub fn user_id_of(msg: &Message) -> u64 {
    msg.from()
        .map(|user| user.id.0)
        .unwrap_or(msg.chat.id.0 as u64)
}

/// Chat a button press came from. Private chats share the user's id.
pub fn chat_of(q: &CallbackQuery) -> ChatId {
    q.message
        .as_ref()
        .map(|m| m.chat.id)
        .unwrap_or_else(|| ChatId::from(q.from.id))
}

/// Parsed callback payload, if any.
pub fn action_of(q: &CallbackQuery) -> Option<keyboards::CallbackAction> {
    q.data.as_deref().and_then(keyboards::CallbackAction::parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyboards::CallbackAction;

    fn callback(data: &str) -> CallbackQuery {
        serde_json::from_value(serde_json::json!({
            "id": "4382bfdwdsb323b2d9",
            "from": {"id": 77, "is_bot": false, "first_name": "Анна"},
            "chat_instance": "-1",
            "data": data,
        }))
        .unwrap()
    }

    #[test]
    fn button_press_without_message_replies_to_the_user() {
        let q = callback("spec:kadry");
        assert_eq!(chat_of(&q), ChatId(77));
        assert_eq!(
            action_of(&q),
            Some(CallbackAction::Specialization("kadry".into()))
        );
        // the callback id stays usable after reading chat and action
        assert_eq!(q.id, "4382bfdwdsb323b2d9");
    }

    #[test]
    fn unknown_payload_has_no_action() {
        assert_eq!(action_of(&callback("later")), None);
    }
}

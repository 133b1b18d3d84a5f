use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::quiz::specialization::Specialization;
use crate::quiz::Difficulty;

const OPTION_MARKS: [&str; 10] = ["1️⃣", "2️⃣", "3️⃣", "4️⃣", "5️⃣", "6️⃣", "7️⃣", "8️⃣", "9️⃣", "🔟"];
const OPTIONS_PER_ROW: usize = 5;

/// Payload of an inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Specialization(String),
    Difficulty(Difficulty),
    Option(usize),
    Next,
    Review,
    Certificate,
    Stats,
    Retry,
    Menu,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let action = match data.split_once(':') {
            Some(("spec", key)) => CallbackAction::Specialization(key.to_string()),
            Some(("diff", key)) => CallbackAction::Difficulty(Difficulty::from_key(key)?),
            Some(("opt", index)) => CallbackAction::Option(index.parse().ok()?),
            Some(_) => return None,
            None => match data {
                "next" => CallbackAction::Next,
                "review" => CallbackAction::Review,
                "certificate" => CallbackAction::Certificate,
                "stats" => CallbackAction::Stats,
                "retry" => CallbackAction::Retry,
                "menu" => CallbackAction::Menu,
                _ => return None,
            },
        };
        Some(action)
    }

    pub fn data(&self) -> String {
        match self {
            CallbackAction::Specialization(key) => format!("spec:{}", key),
            CallbackAction::Difficulty(difficulty) => format!("diff:{}", difficulty.key()),
            CallbackAction::Option(index) => format!("opt:{}", index),
            CallbackAction::Next => "next".to_string(),
            CallbackAction::Review => "review".to_string(),
            CallbackAction::Certificate => "certificate".to_string(),
            CallbackAction::Stats => "stats".to_string(),
            CallbackAction::Retry => "retry".to_string(),
            CallbackAction::Menu => "menu".to_string(),
        }
    }
}

fn button(text: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.data())
}

pub fn option_mark(index: usize) -> &'static str {
    OPTION_MARKS.get(index).copied().unwrap_or("▫️")
}

pub fn specializations(specializations: &[&'static Specialization]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(specializations.iter().map(|s| {
        vec![button(
            s.title,
            CallbackAction::Specialization(s.key.to_string()),
        )]
    }))
}

pub fn difficulties(difficulties: &[Difficulty]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(difficulties.iter().map(|d| {
        vec![button(
            format!(
                "{} {}: {} вопросов, {} минут",
                d.badge(),
                d.title(),
                d.question_count(),
                d.time_limit_minutes()
            ),
            CallbackAction::Difficulty(*d),
        )]
    }))
}

/// Numbered answer buttons, the current selection marked with ✅, and the
/// confirm button underneath.
pub fn question(options: usize, selection: Option<usize>) -> InlineKeyboardMarkup {
    let numbers: Vec<InlineKeyboardButton> = (0..options)
        .map(|i| {
            let label = if selection == Some(i) {
                "✅".to_string()
            } else {
                option_mark(i).to_string()
            };
            button(label, CallbackAction::Option(i))
        })
        .collect();

    let mut rows: Vec<Vec<InlineKeyboardButton>> = numbers
        .chunks(OPTIONS_PER_ROW)
        .map(|row| row.to_vec())
        .collect();
    rows.push(vec![button("➡️ Далее", CallbackAction::Next)]);
    InlineKeyboardMarkup::new(rows)
}

pub fn finished() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button("📋 Правильные ответы", CallbackAction::Review)],
        vec![button("🏆 Сертификат PDF", CallbackAction::Certificate)],
        vec![
            button("📊 Статистика", CallbackAction::Stats),
            button("🔄 Пройти заново", CallbackAction::Retry),
        ],
        vec![button("🏠 Главное меню", CallbackAction::Menu)],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    fn callback_data(button: &InlineKeyboardButton) -> &str {
        match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => data,
            _ => panic!("not a callback button"),
        }
    }

    #[test]
    fn callback_data_round_trips() {
        let actions = [
            CallbackAction::Specialization("kadry".into()),
            CallbackAction::Difficulty(Difficulty::Advanced),
            CallbackAction::Option(3),
            CallbackAction::Next,
            CallbackAction::Review,
            CallbackAction::Certificate,
            CallbackAction::Stats,
            CallbackAction::Retry,
            CallbackAction::Menu,
        ];
        for action in actions {
            assert_eq!(CallbackAction::parse(&action.data()), Some(action));
        }
    }

    #[test]
    fn garbage_callback_data_is_ignored() {
        for data in ["", "opt:x", "diff:hardcore", "foo:bar", "later"] {
            assert_eq!(CallbackAction::parse(data), None, "{}", data);
        }
    }

    #[test]
    fn question_keyboard_marks_selection() {
        let keyboard = question(7, Some(1));
        let rows = &keyboard.inline_keyboard;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].len(), 5);
        assert_eq!(rows[1].len(), 2);
        assert_eq!(rows[0][0].text, "1️⃣");
        assert_eq!(rows[0][1].text, "✅");
        assert_eq!(callback_data(&rows[0][1]), "opt:1");
        assert_eq!(callback_data(&rows[2][0]), "next");
    }

    #[test]
    fn difficulty_buttons_describe_the_tier() {
        let keyboard = difficulties(&[Difficulty::Reserve]);
        let button = &keyboard.inline_keyboard[0][0];
        assert_eq!(button.text, "🥉 Резерв: 20 вопросов, 35 минут");
        assert_eq!(callback_data(button), "diff:reserve");
    }
}

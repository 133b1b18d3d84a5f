//! Message bodies. Everything here is HTML for `ParseMode::Html`.

use chrono::{DateTime, Duration, Utc};
use teloxide::utils::html::escape;

use crate::bot::keyboards::option_mark;
use crate::quiz::session::{ReviewItem, Session, TestResult};
use crate::quiz::specialization;
use crate::stats::StatsSummary;

/// Telegram refuses messages longer than this.
pub const MESSAGE_LIMIT: usize = 4096;

pub const WELCOME: &str = "🧪 <b>ФССП Тест-бот</b>\n\n\
Добро пожаловать в систему тестирования сотрудников ФССП!\n\n\
Выберите специализацию для прохождения теста:";

pub const NO_SPECIALIZATIONS: &str =
    "😔 Сейчас нет доступных тестов. Попробуйте позже.";

pub const ASK_FULL_NAME: &str = "👤 Введите ваше ФИО полностью:";
pub const ASK_POSITION: &str = "💼 Введите вашу должность:";
pub const ASK_DEPARTMENT: &str = "🏢 Введите ваше подразделение:";
pub const ASK_DIFFICULTY: &str = "📶 Выберите уровень сложности:";
pub const USE_BUTTONS: &str = "☝️ Отвечайте кнопками под вопросом.";
pub const UNKNOWN_INPUT: &str = "Не понимаю 🤔 Нажмите /start, чтобы начать тест, или /help для справки.";
pub const STALE_BUTTON: &str = "Кнопка устарела";
pub const PICK_OPTION_FIRST: &str = "Сначала выберите вариант ответа";
pub const EXAM_OVER: &str = "Тест уже завершён";
pub const SLOW_DOWN: &str = "⏳ Не так быстро";
pub const STATS_UNAVAILABLE: &str = "❌ Статистика сейчас недоступна, попробуйте позже.";
pub const RESULT_NOT_SAVED: &str =
    "⚠️ Результат не удалось сохранить в статистику, попробуйте позже. Сертификат доступен.";
pub const CERTIFICATE_FAILED: &str = "❌ Не удалось сформировать сертификат, попробуйте позже.";
pub const TIME_IS_UP: &str = "⏰ <b>Время вышло!</b> Неотвеченные вопросы засчитаны как неверные.";

pub const HELP: &str = "❓ <b>Справка по боту</b>\n\n\
<b>Как пройти тест:</b>\n\
1️⃣ Нажмите /start и выберите специализацию\n\
2️⃣ Введите ФИО, должность, подразделение\n\
3️⃣ Выберите уровень сложности\n\
4️⃣ Отвечайте на вопросы кнопками 1️⃣2️⃣3️⃣...\n\
5️⃣ Нажимайте ➡️ Далее после выбора ответа\n\
6️⃣ Получите результат и PDF сертификат\n\n\
<b>Обозначения:</b>\n\
• 1️⃣2️⃣3️⃣ - номера вариантов ответа\n\
• ✅ - выбранный вариант\n\
• ⏰ - оставшееся время\n\n\
<b>Функции после теста:</b>\n\
• 📋 Показать правильные ответы\n\
• 🏆 Скачать PDF сертификат\n\
• 📊 Просмотреть статистику\n\
• 🔄 Повторить тест\n\n\
<b>Команды:</b>\n\
/start - начать тест\n\
/stats - моя статистика\n\
/help - эта справка\n\n\
<b>Уровни сложности:</b>\n\
🥉 Резерв: 20 вопросов, 35 минут\n\
🥈 Базовый: 30 вопросов, 25 минут\n\
🥇 Стандартный: 40 вопросов, 20 минут\n\
💎 Продвинутый: 50 вопросов, 20 минут\n\n\
Удачи на тестировании! 🍀";

pub fn clock(remaining: Duration) -> String {
    let secs = remaining.num_seconds().max(0);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn specialization_chosen(title: &str) -> String {
    format!("📂 Специализация: <b>{}</b>\n\n{}", escape(title), ASK_FULL_NAME)
}

pub fn exam_started(session: &Session) -> String {
    format!(
        "🚀 <b>Тест начат</b>\n\n\
         📂 {}\n\
         📶 {} {}\n\
         ❓ Вопросов: {}\n\
         ⏰ Время: {} минут\n\n\
         Удачи!",
        escape(session.specialization.title),
        session.difficulty.badge(),
        session.difficulty.title(),
        session.total_questions(),
        session.difficulty.time_limit_minutes()
    )
}

/// The current question with its numbered options. Returns `None` once the
/// session has run out of questions.
pub fn question(session: &Session, now: DateTime<Utc>) -> Option<String> {
    let question = session.current_question()?;
    let mut text = format!(
        "<b>Вопрос {} из {}</b>   ⏰ {}\n\n{}\n",
        session.current_index() + 1,
        session.total_questions(),
        clock(session.remaining(now)),
        escape(&question.text)
    );
    for (i, option) in question.options.iter().enumerate() {
        let mark = if session.selection() == Some(i) {
            "✅"
        } else {
            option_mark(i)
        };
        text.push_str(&format!("\n{} {}", mark, escape(option)));
    }
    Some(text)
}

pub fn result(result: &TestResult) -> String {
    format!(
        "🏁 <b>Тест завершён!</b>\n\n\
         📂 {}\n\
         📶 {}\n\n\
         {} Оценка: <b>{}</b>\n\
         ✔️ Правильных ответов: {} из {}\n\
         📈 Результат: {:.1}%\n\
         ⏱ Затрачено времени: {}",
        escape(specialization::title_of(&result.specialization)),
        result.difficulty.title(),
        result.grade.emoji(),
        result.grade.title(),
        result.correct_count,
        result.total_questions,
        result.percentage,
        result.elapsed_display()
    )
}

pub fn stats(summary: &StatsSummary) -> String {
    if summary.count == 0 {
        return "📊 <b>Ваша статистика</b>\n\n\
                У вас пока нет пройденных тестов.\n\
                Начните тестирование командой /start!"
            .to_string();
    }

    let mut text = format!(
        "📊 <b>Ваша статистика</b>\n\n\
         📝 Всего тестов: {}\n\
         📈 Средний балл: {:.1}%\n\
         🏆 Лучший результат: {:.1}%\n\
         📉 Худший результат: {:.1}%",
        summary.count, summary.average, summary.best, summary.worst
    );
    if !summary.recent.is_empty() {
        text.push_str("\n\n<b>Последние тесты:</b>\n");
        for r in &summary.recent {
            text.push_str(&format!(
                "• {} ({}): {} - {:.1}%\n",
                escape(specialization::title_of(&r.specialization)),
                r.difficulty.title(),
                r.grade.title(),
                r.percentage
            ));
        }
    }
    text
}

/// Correct answers for every question, split into messages that fit the
/// platform limit.
pub fn review(items: &[ReviewItem]) -> Vec<String> {
    let blocks = items.iter().map(|item| {
        let verdict = if item.is_correct() { "✅" } else { "❌" };
        let chosen = item
            .chosen
            .and_then(|c| item.question.options.get(c))
            .map(|c| escape(c))
            .unwrap_or_else(|| "нет ответа".to_string());
        format!(
            "{} <b>{}.</b> {}\nВаш ответ: {}\nПравильный: <b>{}</b>\n\n",
            verdict,
            item.number,
            escape(&item.question.text),
            chosen,
            escape(item.question.correct_option())
        )
    });
    let header = "📋 <b>Правильные ответы</b>\n\n".to_string();
    split_blocks(std::iter::once(header).chain(blocks), MESSAGE_LIMIT)
}

/// Packs blocks into as few messages as possible without splitting a block,
/// except for a single block that is longer than `limit` on its own.
pub fn split_blocks(blocks: impl IntoIterator<Item = String>, limit: usize) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = String::new();

    for block in blocks {
        if current.chars().count() + block.chars().count() > limit && !current.is_empty() {
            messages.push(std::mem::take(&mut current));
        }
        if block.chars().count() > limit {
            let chars: Vec<char> = block.chars().collect();
            for piece in chars.chunks(limit) {
                messages.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(&block);
    }
    if !current.is_empty() {
        messages.push(current);
    }
    messages
}

pub fn reminder(answered: usize, total: usize, remaining: Duration) -> String {
    format!(
        "⏰ <b>Напоминание</b>\n\n\
         У вас есть незавершённый тест: отвечено {} из {}.\n\
         Осталось времени: {}. Вернитесь к вопросу выше!",
        answered,
        total,
        clock(remaining)
    )
}

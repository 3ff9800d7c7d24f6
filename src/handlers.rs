use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQuery, ChosenInlineResult, InlineKeyboardButton, InlineKeyboardMarkup, InlineQuery,
    InlineQueryResult, InlineQueryResultArticle, InputFile, InputMessageContent,
    InputMessageContentText,
};
use teloxide::utils::command::BotCommands as _;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::api::FlightFilter;
use crate::chart;
use crate::models::{Region, RegionStats};
use crate::stats::{flights_by_year, rank_position, top_by_total, AppState, RankingEntry};

const MEDALS: [&str; 3] = ["🥇", "🥈", "🥉"];
const UNAVAILABLE: &str = "Сервис временно недоступен";

#[derive(Debug, teloxide::macros::BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
pub enum BotCommand {
    #[command(description = "Показать помощь")]
    Help,
    #[command(description = "Приветствие и главное меню")]
    Start,
    #[command(description = "Карточка региона: /region Красноярский_край")]
    Region(String),
}

fn main_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::switch_inline_query_current_chat(
            "🔎 Найти регион",
            "",
        )],
        vec![
            InlineKeyboardButton::callback("🌍 Топ-10 регионов", "top10"),
            InlineKeyboardButton::callback("📈 Динамика", "trend"),
        ],
        vec![
            InlineKeyboardButton::callback("📄 Отчёт по РФ", "report_rf"),
            InlineKeyboardButton::callback("⚙️ Настройки", "settings"),
        ],
    ])
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: BotCommand,
    state: Arc<AppState>,
) -> Result<()> {
    info!(chat_id = %msg.chat.id, command = ?cmd, "Команда получена");
    match cmd {
        BotCommand::Help => {
            let text = BotCommand::descriptions().to_string();
            debug!(len = text.len(), "Отправляю помощь");
            bot.send_message(msg.chat.id, text).await?;
        }
        BotCommand::Start => {
            let welcome = "🚀 Добро пожаловать в Aerostat Bot!\n\n\
                Сервис аналитики полётов БАС по регионам РФ на основе данных Росавиации.\n\n\
                🔍 Найдите регион:\n\
                → Напишите /region Красноярский_край\n\
                → Или начните инлайн-поиск: @aerostat_bars_bot Регион\n\n\
                📊 Доступна статистика:\n\
                • Общее число полётов\n\
                • Средняя длительность\n\
                • Место в рейтинге\n\
                • Динамика";
            bot.send_message(msg.chat.id, welcome)
                .reply_markup(main_keyboard())
                .await?;
        }
        BotCommand::Region(raw) => {
            let name = raw.trim().replace('_', " ");
            if name.is_empty() {
                bot.send_message(msg.chat.id, "Укажите регион: /region Красноярский_край")
                    .await?;
                return Ok(());
            }
            match state.regions.find_by_name(&name).await {
                Some(region) => send_region_card(&bot, msg.chat.id, &region, &state).await?,
                None => {
                    bot.send_message(msg.chat.id, format!("Регион «{}» не найден", name))
                        .await?;
                }
            }
        }
    }
    Ok(())
}

/// Инлайн-поиск по подстроке имени региона. Пустой кэш отвечает одной
/// статьёй «сервис недоступен» вместо результатов.
pub async fn handle_inline_query(bot: Bot, q: InlineQuery, state: Arc<AppState>) -> Result<()> {
    let query = q.query.trim().to_lowercase();
    let regions = state.regions.snapshot().await;

    if regions.is_empty() {
        let article = InlineQueryResultArticle::new(
            "error",
            "Ошибка",
            InputMessageContent::Text(InputMessageContentText::new(UNAVAILABLE)),
        )
        .description("Не удалось загрузить список регионов");
        bot.answer_inline_query(q.id, vec![InlineQueryResult::Article(article)])
            .cache_time(0)
            .await?;
        return Ok(());
    }

    let results: Vec<InlineQueryResult> = regions
        .iter()
        .filter(|r| r.name.to_lowercase().contains(&query))
        .take(50)
        .map(|r| {
            let capital = capital_name(r);
            let article = InlineQueryResultArticle::new(
                r.id.to_string(),
                r.fullname.clone(),
                InputMessageContent::Text(InputMessageContentText::new(format!(
                    "Вы выбрали регион: {}\nСтолица: {}",
                    r.name, capital
                ))),
            )
            .description(format!("Столица: {}", capital));
            InlineQueryResult::Article(article)
        })
        .collect();

    bot.answer_inline_query(q.id, results)
        .cache_time(60)
        .is_personal(true)
        .await?;
    Ok(())
}

/// Пользователь выбрал регион в инлайн-результатах: шлём карточку
/// и график помесячной динамики.
pub async fn handle_chosen_inline_result(
    bot: Bot,
    chosen: ChosenInlineResult,
    state: Arc<AppState>,
) -> Result<()> {
    let Ok(region_id) = chosen.result_id.parse::<i64>() else {
        return Ok(());
    };
    let chat = ChatId(chosen.from.id.0 as i64);
    info!(region_id, user = chosen.from.id.0, "Выбран регион в инлайн-поиске");

    let region = match state.api.region(region_id).await {
        Ok(Some(region)) => region,
        Ok(None) => {
            bot.send_message(chat, UNAVAILABLE).await?;
            return Ok(());
        }
        Err(err) => {
            warn!(region_id, error = %err, "карточка региона недоступна");
            bot.send_message(chat, UNAVAILABLE).await?;
            return Ok(());
        }
    };
    send_region_card(&bot, chat, &region, &state).await
}

pub async fn handle_callback(bot: Bot, q: CallbackQuery, state: Arc<AppState>) -> Result<()> {
    let data = q.data.clone().unwrap_or_default();
    let chat = q.message.as_ref().map(|m| m.chat().id);
    debug!(data = %data, "Callback получен");

    match data.as_str() {
        "top10" => {
            bot.answer_callback_query(q.id).await?;
            if let Some(chat) = chat {
                let text = {
                    let rows = state.rows.read().await;
                    format_top_message(&top_by_total(&rows, state.top_limit))
                };
                bot.send_message(chat, text).await?;
            }
        }
        "trend" => {
            bot.answer_callback_query(q.id).await?;
            let Some(chat) = chat else { return Ok(()) };
            let by_year = {
                let rows = state.rows.read().await;
                flights_by_year(&rows)
            };
            if by_year.is_empty() {
                bot.send_message(chat, "Нет данных по динамике полётов.").await?;
                return Ok(());
            }
            let lines: Vec<String> = by_year
                .iter()
                .map(|(year, flights)| format!("{year}: {flights} полётов"))
                .collect();
            bot.send_message(
                chat,
                format!("📈 Динамика полётов по РФ\n\n{}", lines.join("\n")),
            )
            .await?;
            let counts: Vec<i64> = by_year.iter().map(|(_, flights)| *flights).collect();
            match chart::flights_trend_png(&counts) {
                Ok(png) => {
                    bot.send_photo(chat, InputFile::memory(png).file_name("flights_by_year.png"))
                        .await?;
                }
                Err(err) => warn!(error = %err, "график динамики не построен"),
            }
        }
        "report_rf" => {
            bot.answer_callback_query(q.id).await?;
            let Some(chat) = chat else { return Ok(()) };
            let year = OffsetDateTime::now_utc().year();
            let filter = FlightFilter {
                date_from: Some(format!("{year}-01-01")),
                ..Default::default()
            };
            let flights = state.api.flights(&filter).await;
            let text = if flights.is_empty() {
                "Нет данных по полётам за текущий год.".to_string()
            } else {
                format!(
                    "📄 Отчёт по РФ за {year} год\n🛫 Зарегистрировано полётов: {}",
                    flights.len()
                )
            };
            bot.send_message(chat, text).await?;
        }
        "settings" => {
            bot.answer_callback_query(q.id).await?;
            if let Some(chat) = chat {
                let count = state.regions.len().await;
                let refreshed = state
                    .regions
                    .populated_at()
                    .await
                    .and_then(|t| t.format(&Rfc3339).ok())
                    .unwrap_or_else(|| "ещё не загружался".to_string());
                bot.send_message(
                    chat,
                    format!("⚙️ Регионов в кэше: {count}\nСписок обновлён: {refreshed}"),
                )
                .await?;
            }
        }
        _ => {
            bot.answer_callback_query(q.id)
                .text("Раздел в разработке")
                .await?;
        }
    }
    Ok(())
}

async fn send_region_card(
    bot: &Bot,
    chat: ChatId,
    region: &Region,
    state: &AppState,
) -> Result<()> {
    let stats = match state.api.region_statistics(region.id).await {
        Ok(stats) => stats,
        Err(err) => {
            warn!(region_id = region.id, error = %err, "статистика региона недоступна");
            bot.send_message(chat, "Статистика по региону временно недоступна")
                .await?;
            return Ok(());
        }
    };
    let position = {
        let rows = state.rows.read().await;
        rank_position(&rows, region.id)
    };
    bot.send_message(chat, format_region_card(region, &stats, position))
        .await?;

    if stats.monthly_flights.is_empty() {
        return Ok(());
    }
    match chart::flights_trend_png(&stats.monthly_flights) {
        Ok(png) => {
            bot.send_photo(chat, InputFile::memory(png).file_name("flight_trend.png"))
                .await?;
        }
        Err(err) => warn!(region_id = region.id, error = %err, "график не построен"),
    }
    Ok(())
}

fn capital_name(region: &Region) -> &str {
    region
        .capital
        .as_ref()
        .map(|c| c.name.as_str())
        .unwrap_or("Нет столицы")
}

fn format_region_card(region: &Region, stats: &RegionStats, position: Option<usize>) -> String {
    let mut text = format!("📍 {} (ID: {})\n", region.fullname, region.id);
    if let Some(place) = position {
        text.push_str(&format!("🏆 Место в рейтинге: #{place}\n"));
    }
    match stats.total_flights {
        Some(total) => text.push_str(&format!("🛫 Всего полётов: {total}\n")),
        None => text.push_str("🛫 Всего полётов: нет данных\n"),
    }
    if let Some(last) = stats.last_year() {
        text.push_str(&format!("\n📊 Статистика за {}\n", last.year));
        text.push_str(&format!(
            "🛫 Полётов за год: {}\n",
            last.flight_count.unwrap_or(0)
        ));
        if let Some(avg) = &last.avg_flight_time {
            text.push_str(&format!("⏱️ Средняя длительность: {avg}\n"));
        }
        if let Some(total_time) = &last.total_flight_time {
            text.push_str(&format!("⏱️ Суммарная длительность: {total_time}\n"));
        }
        text.push_str(&format!("{}\n", stats.change_label));
    }
    text.push_str(&format!("\n📌 Столица: {}\n", capital_name(region)));
    if let Some(kind) = &region.kind {
        text.push_str(&format!("🗺️ Тип: {kind}\n"));
    }
    if let Some(population) = region.population {
        text.push_str(&format!("👥 Население: {population}"));
    }
    text
}

pub fn format_top_message(entries: &[RankingEntry]) -> String {
    if entries.is_empty() {
        return "Нет данных по полётам БПЛА за последний год.".to_string();
    }
    let lines: Vec<String> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let place = MEDALS
                .get(i)
                .map(|m| (*m).to_string())
                .unwrap_or_else(|| format!("{}.", i + 1));
            format!("{} ID {} — {} полётов", place, entry.region_id, entry.total)
        })
        .collect();
    format!(
        "🏆 Топ-10 регионов по активности БПЛА:\n\n{}",
        lines.join("\n")
    )
}

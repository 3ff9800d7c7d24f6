use std::collections::HashSet;

use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::models::{Region, RegionStats};

/// Общее состояние бота, раздаётся обработчикам через dptree.
pub struct AppState {
    pub api: ApiClient,
    pub regions: RegionCache,
    pub rows: RwLock<Vec<AggregatedRow>>,
    pub top_limit: usize,
}

/// Снимок списка регионов, загружаемый один раз на старте процесса.
/// Запись идёт только целиком (`replace`), читатели получают копию.
pub struct RegionCache {
    regions: RwLock<Vec<Region>>,
    populated_at: RwLock<Option<OffsetDateTime>>,
}

impl RegionCache {
    pub fn new() -> Self {
        Self {
            regions: RwLock::new(Vec::new()),
            populated_at: RwLock::new(None),
        }
    }

    /// Атомарно заменяет содержимое кэша. Дубликаты идентификаторов
    /// отбрасываются, остаётся первое вхождение.
    pub async fn replace(&self, fetched: Vec<Region>) {
        let mut seen = HashSet::new();
        let total = fetched.len();
        let unique: Vec<Region> = fetched
            .into_iter()
            .filter(|r| seen.insert(r.id))
            .collect();
        if unique.len() < total {
            warn!(dropped = total - unique.len(), "в списке регионов были дубликаты");
        }
        *self.regions.write().await = unique;
        *self.populated_at.write().await = Some(OffsetDateTime::now_utc());
    }

    pub async fn snapshot(&self) -> Vec<Region> {
        self.regions.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.regions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.regions.read().await.is_empty()
    }

    /// Точное совпадение имени без учёта регистра.
    pub async fn find_by_name(&self, name: &str) -> Option<Region> {
        let needle = name.trim().to_lowercase();
        self.regions
            .read()
            .await
            .iter()
            .find(|r| r.name.to_lowercase() == needle)
            .cloned()
    }

    pub async fn populated_at(&self) -> Option<OffsetDateTime> {
        *self.populated_at.read().await
    }
}

/// Одна строка агрегата: регион, его суммарный налёт и значение одного года.
/// На регион приходится по строке на каждый год из `by_year`, суммарный
/// налёт в них повторяется.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedRow {
    pub region_id: i64,
    pub total: Option<i64>,
    pub year: i32,
    pub flights: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingEntry {
    pub region_id: i64,
    pub total: i64,
}

pub struct AggregationOutcome {
    pub rows: Vec<AggregatedRow>,
    pub failed: Vec<i64>,
}

/// Последовательно запрашивает статистику каждого региона из кэша.
/// Отказ по одному региону не прерывает проход: регион попадает в список
/// `failed`, остальные обрабатываются дальше.
pub async fn collect_statistics(api: &ApiClient, regions: &[Region]) -> AggregationOutcome {
    let mut stats = Vec::new();
    let mut failed = Vec::new();
    for region in regions {
        match api.region_statistics(region.id).await {
            Ok(s) => stats.push(s),
            Err(err) => {
                warn!(region_id = region.id, error = %err, "статистика региона недоступна, пропускаю");
                failed.push(region.id);
            }
        }
    }
    AggregationOutcome {
        rows: aggregate_rows(&stats),
        failed,
    }
}

pub fn aggregate_rows(stats: &[RegionStats]) -> Vec<AggregatedRow> {
    let mut rows = Vec::new();
    for s in stats {
        for year in &s.by_year {
            rows.push(AggregatedRow {
                region_id: s.id,
                total: s.total_flights,
                year: year.year,
                flights: year.flight_count.unwrap_or(0),
            });
        }
    }
    rows
}

/// Топ-N регионов по суммарному налёту, по убыванию.
///
/// Строки без суммарного значения и с неположительным значением
/// отбрасываются. Повторные строки одного региона (по строке на год)
/// схлопываются до первой: регион занимает не больше одной позиции.
/// Сортировка стабильная, равные значения сохраняют исходный порядок.
pub fn top_by_total(rows: &[AggregatedRow], n: usize) -> Vec<RankingEntry> {
    let mut seen = HashSet::new();
    let mut entries: Vec<RankingEntry> = rows
        .iter()
        .filter_map(|row| match row.total {
            Some(total) if total > 0 => Some((row.region_id, total)),
            _ => None,
        })
        .filter(|(region_id, _)| seen.insert(*region_id))
        .map(|(region_id, total)| RankingEntry { region_id, total })
        .collect();
    entries.sort_by(|a, b| b.total.cmp(&a.total));
    entries.truncate(n);
    entries
}

/// Суммарное число полётов по годам по всем регионам, по возрастанию года.
pub fn flights_by_year(rows: &[AggregatedRow]) -> Vec<(i32, i64)> {
    let mut totals = std::collections::BTreeMap::new();
    for row in rows {
        *totals.entry(row.year).or_insert(0) += row.flights;
    }
    totals.into_iter().collect()
}

/// Позиция региона в полном рейтинге (с единицы), если он в него входит.
pub fn rank_position(rows: &[AggregatedRow], region_id: i64) -> Option<usize> {
    top_by_total(rows, usize::MAX)
        .iter()
        .position(|entry| entry.region_id == region_id)
        .map(|index| index + 1)
}

/// Пересобирает агрегат по текущему снимку кэша регионов и атомарно
/// заменяет таблицу строк. Пустой кэш оставляет прежние данные на месте.
pub async fn refresh_ranking(state: &AppState) {
    let regions = state.regions.snapshot().await;
    if regions.is_empty() {
        info!("кэш регионов пуст, агрегировать нечего");
        return;
    }
    info!(regions = regions.len(), "собираю статистику по регионам");
    let outcome = collect_statistics(&state.api, &regions).await;
    if !outcome.failed.is_empty() {
        warn!(
            failed = outcome.failed.len(),
            ids = ?outcome.failed,
            "часть регионов осталась без статистики"
        );
    }
    info!(rows = outcome.rows.len(), "агрегация завершена");
    *state.rows.write().await = outcome.rows;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::YearStat;

    fn row(region_id: i64, total: Option<i64>) -> AggregatedRow {
        AggregatedRow {
            region_id,
            total,
            year: 2024,
            flights: 0,
        }
    }

    #[test]
    fn ranking_drops_non_positive_and_missing_totals() {
        let rows = vec![row(1, Some(-5)), row(2, Some(0)), row(3, Some(10)), row(4, None)];
        let top = top_by_total(&rows, 10);
        assert_eq!(
            top,
            vec![RankingEntry {
                region_id: 3,
                total: 10
            }]
        );
    }

    #[test]
    fn ranking_sorts_descending_and_caps_at_limit() {
        let rows: Vec<AggregatedRow> = (1..=15).map(|i| row(i, Some(i * 10))).collect();
        let top = top_by_total(&rows, 10);
        assert_eq!(top.len(), 10);
        assert_eq!(top[0].total, 150);
        assert_eq!(top[9].total, 60);
        assert!(top.windows(2).all(|w| w[0].total >= w[1].total));
    }

    #[test]
    fn equal_totals_keep_first_seen_order() {
        let rows = vec![row(1, Some(5)), row(2, Some(5))];
        let top = top_by_total(&rows, 10);
        assert_eq!(
            top.iter().map(|e| e.region_id).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn region_with_many_years_takes_one_slot() {
        let rows = vec![
            AggregatedRow {
                region_id: 1,
                total: Some(100),
                year: 2023,
                flights: 40,
            },
            AggregatedRow {
                region_id: 1,
                total: Some(100),
                year: 2024,
                flights: 60,
            },
            row(2, Some(70)),
        ];
        let top = top_by_total(&rows, 10);
        assert_eq!(
            top.iter().map(|e| e.region_id).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn empty_input_gives_empty_ranking() {
        assert!(top_by_total(&[], 10).is_empty());
        assert!(aggregate_rows(&[]).is_empty());
    }

    #[test]
    fn aggregation_emits_one_row_per_year_with_repeated_total() {
        let stats = vec![RegionStats {
            id: 9,
            total_flights: Some(250),
            by_year: vec![
                YearStat {
                    year: 2023,
                    flight_count: Some(100),
                    avg_flight_time: None,
                    total_flight_time: None,
                },
                YearStat {
                    year: 2024,
                    flight_count: Some(150),
                    avg_flight_time: None,
                    total_flight_time: None,
                },
            ],
            monthly_flights: Vec::new(),
            change_label: String::new(),
        }];
        let rows = aggregate_rows(&stats);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.region_id == 9 && r.total == Some(250)));
        assert_eq!(rows[0].year, 2023);
        assert_eq!(rows[0].flights, 100);
        assert_eq!(rows[1].year, 2024);
        assert_eq!(rows[1].flights, 150);
    }

    #[test]
    fn flights_by_year_sums_across_regions() {
        let rows = vec![
            AggregatedRow {
                region_id: 1,
                total: Some(100),
                year: 2024,
                flights: 60,
            },
            AggregatedRow {
                region_id: 2,
                total: Some(50),
                year: 2023,
                flights: 10,
            },
            AggregatedRow {
                region_id: 2,
                total: Some(50),
                year: 2024,
                flights: 40,
            },
        ];
        assert_eq!(flights_by_year(&rows), vec![(2023, 10), (2024, 100)]);
        assert!(flights_by_year(&[]).is_empty());
    }

    #[test]
    fn rank_position_counts_from_one() {
        let rows = vec![row(1, Some(50)), row(2, Some(80)), row(3, Some(10))];
        assert_eq!(rank_position(&rows, 2), Some(1));
        assert_eq!(rank_position(&rows, 1), Some(2));
        assert_eq!(rank_position(&rows, 3), Some(3));
        assert_eq!(rank_position(&rows, 42), None);
    }

    #[tokio::test]
    async fn cache_replace_deduplicates_by_id() {
        let cache = RegionCache::new();
        let region = |id: i64| Region {
            id,
            name: format!("Регион {id}"),
            fullname: format!("Регион {id}"),
            capital: None,
            kind: None,
            population: None,
        };
        cache.replace(vec![region(1), region(2), region(1)]).await;
        assert_eq!(cache.len().await, 2);
        assert!(cache.populated_at().await.is_some());
        assert!(cache.find_by_name("регион 2").await.is_some());
        assert!(cache.find_by_name("нет такого").await.is_none());
    }
}

use serde::Deserialize;

/// Страница коллекции в том виде, в котором её отдаёт API:
/// `{"data": [...], "meta": {"last_page": N, ...}}`.
#[derive(Debug, Deserialize)]
pub struct PageEnvelope<T> {
    pub data: Option<Vec<T>>,
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
pub struct PageMeta {
    pub last_page: u32,
}

impl<T> PageEnvelope<T> {
    /// Номер следующей страницы либо `None`, если обход завершён.
    /// Отсутствие `meta` трактуется как последняя страница.
    pub fn next_page(&self, current: u32) -> Option<u32> {
        match &self.meta {
            Some(meta) if current < meta.last_page => Some(current + 1),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Region {
    pub id: i64,
    pub name: String,
    pub fullname: String,
    pub capital: Option<Capital>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub population: Option<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Capital {
    pub name: String,
}

/// Ответ `GET /region/{id}`.
#[derive(Debug, Deserialize)]
pub struct RegionEnvelope {
    pub data: Option<Region>,
}

/// Ответ `GET /statistics/region/{id}`.
#[derive(Debug, Deserialize)]
pub struct StatisticsEnvelope {
    pub summary: Option<Summary>,
    pub statistics: Option<StatisticsBlock>,
}

#[derive(Debug, Deserialize)]
pub struct Summary {
    pub total_flights: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatisticsBlock {
    #[serde(default)]
    pub by_year: Vec<YearStat>,
    #[serde(default)]
    pub by_year_and_month: Vec<YearMonths>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct YearStat {
    pub year: i32,
    pub flight_count: Option<i64>,
    pub avg_flight_time: Option<String>,
    pub total_flight_time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct YearMonths {
    #[serde(default)]
    pub months: Vec<MonthStat>,
}

#[derive(Debug, Deserialize)]
pub struct MonthStat {
    pub flight_count: Option<i64>,
}

/// Производная сводка по региону: суммарный налёт, погодовая разбивка,
/// помесячные значения последнего года и подпись изменения к прошлому году.
#[derive(Debug, Clone)]
pub struct RegionStats {
    pub id: i64,
    pub total_flights: Option<i64>,
    pub by_year: Vec<YearStat>,
    pub monthly_flights: Vec<i64>,
    pub change_label: String,
}

impl RegionStats {
    pub fn from_wire(id: i64, wire: StatisticsEnvelope) -> Self {
        let total_flights = wire.summary.and_then(|s| s.total_flights);
        let (by_year, by_year_and_month) = match wire.statistics {
            Some(block) => (block.by_year, block.by_year_and_month),
            None => (Vec::new(), Vec::new()),
        };
        // помесячная динамика берётся из последнего доступного года
        let monthly_flights = by_year_and_month
            .last()
            .map(|year| {
                year.months
                    .iter()
                    .map(|m| m.flight_count.unwrap_or(0))
                    .collect()
            })
            .unwrap_or_default();
        let change_label = match by_year.as_slice() {
            [.., prev, last] => {
                change_label(last.flight_count.unwrap_or(0), prev.flight_count.unwrap_or(0))
            }
            _ => "🔻 0%".to_string(),
        };
        Self {
            id,
            total_flights,
            by_year,
            monthly_flights,
            change_label,
        }
    }

    pub fn last_year(&self) -> Option<&YearStat> {
        self.by_year.last()
    }
}

fn change_label(current: i64, previous: i64) -> String {
    if previous == 0 {
        return if current == 0 {
            "🔻 0%".to_string()
        } else {
            "🔺 ∞".to_string()
        };
    }
    let percent = (current - previous) as f64 / previous as f64 * 100.0;
    if percent >= 0.0 {
        format!("🔺 {:.2}%", percent)
    } else {
        format!("🔻 {:.2}%", percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn year(y: i32, flights: i64) -> YearStat {
        YearStat {
            year: y,
            flight_count: Some(flights),
            avg_flight_time: None,
            total_flight_time: None,
        }
    }

    #[test]
    fn next_page_stops_at_last_page() {
        let envelope = PageEnvelope::<Region> {
            data: Some(Vec::new()),
            meta: Some(PageMeta { last_page: 3 }),
        };
        assert_eq!(envelope.next_page(1), Some(2));
        assert_eq!(envelope.next_page(2), Some(3));
        assert_eq!(envelope.next_page(3), None);
    }

    #[test]
    fn next_page_treats_missing_meta_as_last() {
        let envelope = PageEnvelope::<Region> {
            data: Some(Vec::new()),
            meta: None,
        };
        assert_eq!(envelope.next_page(1), None);
    }

    #[test]
    fn derives_change_label_from_two_last_years() {
        let wire = StatisticsEnvelope {
            summary: Some(Summary {
                total_flights: Some(300),
            }),
            statistics: Some(StatisticsBlock {
                by_year: vec![year(2023, 100), year(2024, 150)],
                by_year_and_month: Vec::new(),
            }),
        };
        let stats = RegionStats::from_wire(7, wire);
        assert_eq!(stats.change_label, "🔺 50.00%");
        assert_eq!(stats.total_flights, Some(300));
        assert_eq!(stats.last_year().unwrap().year, 2024);
    }

    #[test]
    fn single_year_gets_zero_change_label() {
        let wire = StatisticsEnvelope {
            summary: None,
            statistics: Some(StatisticsBlock {
                by_year: vec![year(2024, 10)],
                by_year_and_month: Vec::new(),
            }),
        };
        assert_eq!(RegionStats::from_wire(1, wire).change_label, "🔻 0%");
    }

    #[test]
    fn growth_from_zero_is_marked_infinite() {
        let wire = StatisticsEnvelope {
            summary: None,
            statistics: Some(StatisticsBlock {
                by_year: vec![year(2023, 0), year(2024, 5)],
                by_year_and_month: Vec::new(),
            }),
        };
        assert_eq!(RegionStats::from_wire(1, wire).change_label, "🔺 ∞");
    }
}

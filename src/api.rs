use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::models::{PageEnvelope, Region, RegionEnvelope, RegionStats, StatisticsEnvelope};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("ошибка запроса к API: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Клиент статистического API Росавиации.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

/// Необязательные фильтры коллекции `flight`.
#[derive(Debug, Default, Clone)]
pub struct FlightFilter {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub region_ids: Vec<i64>,
}

impl FlightFilter {
    fn query(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(from) = &self.date_from {
            params.push(("datefrom".to_string(), from.clone()));
        }
        if let Some(to) = &self.date_to {
            params.push(("dateto".to_string(), to.clone()));
        }
        for id in &self.region_ids {
            params.push(("regions[]".to_string(), id.to_string()));
        }
        params
    }
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("не удалось создать HTTP-клиент")?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Обходит все страницы коллекции и возвращает накопленный список.
    ///
    /// Страница без поля `data` завершает обход без ошибки. Сетевая ошибка
    /// или не-2xx ответ прерывают цикл: уже накопленные элементы
    /// возвращаются как частичный результат, сама ошибка уходит в лог.
    /// Дальше `last_page` клиент никогда не ходит.
    pub async fn fetch_paginated<T>(&self, path: &str, filters: &[(String, String)]) -> Vec<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let mut items = Vec::new();
        let mut page: u32 = 1;
        loop {
            match self.fetch_page::<T>(&url, filters, page).await {
                Ok(envelope) => {
                    let next = envelope.next_page(page);
                    let Some(data) = envelope.data else { break };
                    items.extend(data);
                    match next {
                        Some(next) => page = next,
                        None => break,
                    }
                }
                Err(err) => {
                    warn!(%url, page, error = %err, "обход страниц прерван, возвращаю частичный результат");
                    break;
                }
            }
        }
        items
    }

    async fn fetch_page<T>(
        &self,
        url: &str,
        filters: &[(String, String)],
        page: u32,
    ) -> Result<PageEnvelope<T>, ApiError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .http
            .get(url)
            .query(filters)
            .query(&[("page", page.to_string())])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    pub async fn regions(&self) -> Vec<Region> {
        self.fetch_paginated("region", &[]).await
    }

    /// Полёты за период. Элементы возвращаются как есть, без схемы:
    /// потребителю нужна только их численность.
    pub async fn flights(&self, filter: &FlightFilter) -> Vec<serde_json::Value> {
        self.fetch_paginated("flight", &filter.query()).await
    }

    pub async fn region(&self, id: i64) -> Result<Option<Region>, ApiError> {
        let envelope: RegionEnvelope = self
            .http
            .get(format!("{}/region/{}", self.base_url, id))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(envelope.data)
    }

    pub async fn region_statistics(&self, id: i64) -> Result<RegionStats, ApiError> {
        let envelope: StatisticsEnvelope = self
            .http
            .get(format!("{}/statistics/region/{}", self.base_url, id))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(RegionStats::from_wire(id, envelope))
    }
}

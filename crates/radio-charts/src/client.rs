//! Radio 357 chart API client
//!
//! The chart API is public and unauthenticated. Summaries change every week
//! and are always fetched; a published chart never changes, so charts are
//! kept in an `ImmutableCache` after the first successful fetch.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::cache::ImmutableCache;
use crate::error::{Error, Result};
use crate::model::{Chart, ChartKind, ChartSummary};

pub const DEFAULT_BASE_URL: &str = "https://wyniki.radio357.pl/api/charts";

pub struct ChartClient {
    base_url: String,
    http: reqwest::Client,
    charts: ImmutableCache<(ChartKind, u32), Chart>,
}

impl ChartClient {
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http,
            charts: ImmutableCache::new("charts"),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Published charts of one kind, newest first.
    pub async fn summaries(&self, kind: ChartKind) -> Result<Vec<ChartSummary>> {
        let url = format!("{}/{}/all", self.base_url, kind.segment());
        self.get_json(&url).await
    }

    /// The newest chart of one kind.
    pub async fn latest(&self, kind: ChartKind) -> Result<Arc<Chart>> {
        let summaries = self.summaries(kind).await?;
        let newest = summaries.first().ok_or(Error::NoCharts(kind))?;
        debug!(kind = %kind, no = newest.no, "latest chart number resolved");
        self.chart_by_number(kind, newest.no).await
    }

    /// One chart by number, from the cache when already fetched.
    pub async fn chart_by_number(&self, kind: ChartKind, no: u32) -> Result<Arc<Chart>> {
        self.charts
            .get_or_fetch((kind, no), || async {
                let url = format!("{}/{}/{}", self.base_url, kind.segment(), no);
                let chart: Chart = self.get_json(&url).await?;
                info!(kind = %kind, no, items = chart.results.main_chart.items.len(), "chart fetched");
                Ok::<_, Error>(chart)
            })
            .await
    }

    /// Number of charts held in the cache.
    pub fn cached_charts(&self) -> usize {
        self.charts.len()
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Http(format!("{url}: {e}")))?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chart_json(no: u32) -> serde_json::Value {
        serde_json::json!({
            "no": no.to_string(),
            "name": "Lista",
            "document": "Lista Przebojów",
            "published_at_date": "2026-10-16",
            "results": {"mainChart": {"items": [
                {"id": 1, "name": "Arahja", "artist": "Kult", "position": 1}
            ]}}
        })
    }

    fn client(server: &MockServer) -> ChartClient {
        ChartClient::new(format!("{}/api/charts/", server.uri()), reqwest::Client::new())
    }

    #[tokio::test]
    async fn chart_by_number_is_fetched_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/charts/lista/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chart_json(42)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let first = client.chart_by_number(ChartKind::Weekly, 42).await.unwrap();
        let second = client.chart_by_number(ChartKind::Weekly, 42).await.unwrap();
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(client.cached_charts(), 1);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn kinds_are_cached_separately() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/charts/lista/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chart_json(7)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/charts/top-pl/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chart_json(7)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        client.chart_by_number(ChartKind::Weekly, 7).await.unwrap();
        client.chart_by_number(ChartKind::TopPl, 7).await.unwrap();
        assert_eq!(client.cached_charts(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/charts/top/5"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/charts/top/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chart_json(5)))
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client.chart_by_number(ChartKind::Top, 5).await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 503, .. }));
        assert_eq!(client.cached_charts(), 0);

        let chart = client.chart_by_number(ChartKind::Top, 5).await.unwrap();
        assert_eq!(chart.no, 5);
    }

    #[tokio::test]
    async fn latest_uses_first_summary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/charts/lista/all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"no": "1200", "published_at_date": "2026-10-16"},
                {"no": "1199", "published_at_date": "2026-10-09"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/charts/lista/1200"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chart_json(1200)))
            .expect(1)
            .mount(&server)
            .await;

        let chart = client(&server).latest(ChartKind::Weekly).await.unwrap();
        assert_eq!(chart.no, 1200);
    }

    #[tokio::test]
    async fn latest_without_summaries_is_no_charts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/charts/top/all"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let err = client(&server).latest(ChartKind::Top).await.unwrap_err();
        assert!(matches!(err, Error::NoCharts(ChartKind::Top)));
    }

    #[tokio::test]
    async fn malformed_chart_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/charts/lista/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client.chart_by_number(ChartKind::Weekly, 1).await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert_eq!(client.cached_charts(), 0);
    }
}

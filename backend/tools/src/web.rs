/// Web search tool backed by the Bing Web Search API.
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use confab_config::SearchConfig;
use confab_core::{ConfabError, Tool, ToolOutput};
use confab_logging::redact_sensitive_data;

use crate::FailureMode;

pub const WEB_SEARCH_TOOL_NAME: &str = "web_searcher";

/// Input for the web_searcher tool.
#[derive(Debug, Deserialize)]
pub struct WebSearchInput {
    pub query: String,
    /// Sort results by date when the question needs fresh information.
    #[serde(default)]
    pub up_to_date: bool,
}

/// A single search result, as returned to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub content: String,
    pub source_url: String,
}

#[derive(Deserialize)]
struct BingResponse {
    #[serde(rename = "webPages")]
    web_pages: Option<BingWebPages>,
}

#[derive(Deserialize)]
struct BingWebPages {
    #[serde(default)]
    value: Vec<BingPage>,
}

#[derive(Deserialize)]
struct BingPage {
    #[serde(default)]
    name: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    url: String,
}

pub struct WebSearchTool {
    client: Client,
    endpoint: Option<String>,
    subscription_key: Option<String>,
    count: usize,
    failure_mode: FailureMode,
}

impl WebSearchTool {
    pub fn new(config: &SearchConfig, count: usize, failure_mode: FailureMode) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.endpoint.clone(),
            subscription_key: config.subscription_key.clone(),
            count,
            failure_mode,
        }
    }

    /// Run the query. Results are capped at the configured count and entries
    /// missing a title, snippet or URL are dropped.
    pub async fn search(&self, input: &WebSearchInput) -> Result<Vec<SearchHit>, ConfabError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| ConfabError::Config("search endpoint is not set".into()))?;

        let mut params = vec![
            ("q", input.query.clone()),
            ("count", self.count.to_string()),
        ];
        if input.up_to_date {
            params.push(("sortby", "Date".to_string()));
        }
        debug!(query = %input.query, up_to_date = input.up_to_date, count = self.count, "Web search");

        let mut request = self.client.get(endpoint).query(&params);
        if let Some(key) = &self.subscription_key {
            request = request.header("Ocp-Apim-Subscription-Key", key);
        }
        let resp = request.send().await.map_err(|e| ConfabError::Transport {
            service: "web search".into(),
            status: 0,
            message: e.to_string(),
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConfabError::Transport {
                service: "web search".into(),
                status: status.as_u16(),
                message: redact_sensitive_data(&body),
            });
        }

        let parsed: BingResponse = resp.json().await.map_err(|e| ConfabError::Transport {
            service: "web search".into(),
            status: status.as_u16(),
            message: format!("unexpected response body: {e}"),
        })?;

        Ok(parsed
            .web_pages
            .map(|p| p.value)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| !p.name.is_empty() && !p.snippet.is_empty() && !p.url.is_empty())
            .map(|p| SearchHit {
                title: p.name,
                content: p.snippet,
                source_url: p.url,
            })
            .take(self.count)
            .collect())
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        WEB_SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "A web searcher that calls Bing Search API to search the web and return a list of search result based on a query. If the query requires up-to-date information, overright the <up_to_date> parameter to 'true'"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The search query"},
                "up_to_date": {"type": "boolean", "description": "Sort results by date", "default": false}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let input: WebSearchInput =
            serde_json::from_value(args).map_err(|e| ConfabError::InvalidArguments {
                tool: WEB_SEARCH_TOOL_NAME.into(),
                message: e.to_string(),
            })?;

        match self.search(&input).await {
            Ok(hits) => Ok(ToolOutput::text(serde_json::to_string(&hits)?)),
            Err(e) => match self.failure_mode {
                FailureMode::Propagate => Err(e.into()),
                FailureMode::ReportEmpty => {
                    warn!(error = %e, "Web search failed; returning no results");
                    Ok(ToolOutput::degraded("[]", format!("Error during web search: {e}")))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tool(server: &MockServer, count: usize, mode: FailureMode) -> WebSearchTool {
        WebSearchTool::new(
            &SearchConfig {
                subscription_key: Some("bing-key".into()),
                endpoint: Some(format!("{}/v7.0/search", server.uri())),
            },
            count,
            mode,
        )
    }

    fn pages(n: usize) -> Value {
        let value: Vec<Value> = (0..n)
            .map(|i| {
                serde_json::json!({
                    "name": format!("Result {i}"),
                    "snippet": format!("Snippet {i}"),
                    "url": format!("https://example.com/{i}")
                })
            })
            .collect();
        serde_json::json!({"webPages": {"value": value}})
    }

    #[tokio::test]
    async fn test_results_capped_and_shaped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "rust async"))
            .and(query_param("count", "3"))
            .and(header("Ocp-Apim-Subscription-Key", "bing-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(pages(5)))
            .mount(&server)
            .await;

        let out = tool(&server, 3, FailureMode::Propagate)
            .execute(serde_json::json!({"query": "rust async"}))
            .await
            .unwrap();
        let hits: Vec<SearchHit> = serde_json::from_str(&out.content).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "Result 0");
        assert_eq!(hits[0].source_url, "https://example.com/0");
        assert!(hits.iter().all(|h| !h.content.is_empty()));
    }

    #[tokio::test]
    async fn test_up_to_date_sorts_by_date() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("sortby", "Date"))
            .respond_with(ResponseTemplate::new(200).set_body_json(pages(1)))
            .expect(1)
            .mount(&server)
            .await;

        let hits = tool(&server, 7, FailureMode::Propagate)
            .search(&WebSearchInput {
                query: "news".into(),
                up_to_date: true,
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_incomplete_entries_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "webPages": {"value": [
                    {"name": "No snippet", "url": "https://example.com/a"},
                    {"name": "Full", "snippet": "text", "url": "https://example.com/b"}
                ]}
            })))
            .mount(&server)
            .await;

        let hits = tool(&server, 3, FailureMode::Propagate)
            .search(&WebSearchInput {
                query: "q".into(),
                up_to_date: false,
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Full");
    }

    #[tokio::test]
    async fn test_failure_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let err = tool(&server, 3, FailureMode::Propagate)
            .execute(serde_json::json!({"query": "q"}))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfabError>(),
            Some(ConfabError::Transport { status: 401, .. })
        ));
    }

    #[tokio::test]
    async fn test_failure_reported_as_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let out = tool(&server, 7, FailureMode::ReportEmpty)
            .execute(serde_json::json!({"query": "q"}))
            .await
            .unwrap();
        assert_eq!(out.content, "[]");
        assert!(out.notice.unwrap().starts_with("Error during web search"));
    }

    #[tokio::test]
    async fn test_missing_endpoint() {
        let tool = WebSearchTool::new(&SearchConfig::default(), 3, FailureMode::ReportEmpty);
        let out = tool.execute(serde_json::json!({"query": "q"})).await.unwrap();
        assert_eq!(out.content, "[]");
        assert!(out.notice.is_some());
    }
}

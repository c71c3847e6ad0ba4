//! HTTP implementation of [`NodeApi`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::types::{
    parse_content_page, AckRequest, ApiErrorBody, GroupsResponse, ProducerResponse,
    PubQueueResponse, SubmitRequest, SubmitResponse, TransferResponse,
};
use super::{NodeApi, NodeContent, NodeError, NodeResult};
use crate::models::{Cursor, Group, Producer, PubQueueItem, Transfer, TrxId};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const NODE_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Clone)]
pub struct HttpNodeClient {
    base_url: String,
    jwt: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpNodeClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpNodeClient")
            .field("base_url", &self.base_url)
            .field("jwt", &self.jwt.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpNodeClient {
    pub fn new(base_url: impl Into<String>, jwt: Option<String>) -> NodeResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            jwt: normalize_text_option(jwt),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(NODE_HTTP_TIMEOUT_SECS))
                .build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header(reqwest::header::ACCEPT, "application/json");
        match &self.jwt {
            Some(jwt) => request.bearer_auth(jwt),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> NodeResult<T> {
        let request = self.client.get(self.url(path)).query(query);
        let response = self.authorize(request).send().await?;
        read_json(response).await
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> NodeResult<T> {
        let request = self.client.post(self.url(path)).json(body);
        let response = self.authorize(request).send().await?;
        read_json(response).await
    }
}

#[async_trait]
impl NodeApi for HttpNodeClient {
    async fn list_groups(&self) -> NodeResult<Vec<Group>> {
        let response: GroupsResponse = self.get_json("/api/v1/groups", &[]).await?;
        Ok(response.into_groups())
    }

    async fn fetch_contents(
        &self,
        group_id: &str,
        cursor: &Cursor,
        limit: usize,
    ) -> NodeResult<Vec<NodeContent>> {
        let mut query = vec![
            ("num", limit.to_string()),
            ("include_start_trx", "false".to_string()),
        ];
        if let Some(trx_id) = &cursor.trx_id {
            query.push(("start_trx", trx_id.to_string()));
        }
        let path = format!("/app/api/v1/group/{}/content", urlencoding::encode(group_id));
        let items: Option<Vec<serde_json::Value>> = self.get_json(&path, &query).await?;
        Ok(parse_content_page(items.unwrap_or_default(), group_id))
    }

    async fn submit(&self, group_id: &str, activity: &serde_json::Value) -> NodeResult<TrxId> {
        let path = format!("/api/v1/group/{}/content", urlencoding::encode(group_id));
        let response: SubmitResponse = self
            .post_json(&path, &SubmitRequest { data: activity })
            .await?;
        response
            .trx_id
            .map(|trx_id| trx_id.trim().to_string())
            .filter(|trx_id| !trx_id.is_empty())
            .map(TrxId::from)
            .ok_or_else(|| NodeError::InvalidPayload("response did not include trx_id".into()))
    }

    async fn pub_queue(&self, group_id: &str) -> NodeResult<Vec<PubQueueItem>> {
        let path = format!("/api/v1/group/{}/pubqueue", urlencoding::encode(group_id));
        let response: PubQueueResponse = self.get_json(&path, &[]).await?;
        Ok(response.into_items())
    }

    async fn ack(&self, trx_ids: &[TrxId]) -> NodeResult<Vec<TrxId>> {
        if trx_ids.is_empty() {
            return Ok(Vec::new());
        }
        let acked: Option<Vec<TrxId>> = self
            .post_json("/api/v1/trx/ack", &AckRequest { trx_ids })
            .await?;
        Ok(acked.unwrap_or_default())
    }

    async fn producers(&self, group_id: &str) -> NodeResult<Vec<Producer>> {
        let path = format!("/api/v1/group/{}/producers", urlencoding::encode(group_id));
        let producers: Option<Vec<ProducerResponse>> = self.get_json(&path, &[]).await?;
        Ok(producers
            .unwrap_or_default()
            .into_iter()
            .map(|producer| producer.into_producer(group_id))
            .collect())
    }

    async fn transfers(
        &self,
        group_id: &str,
        cursor: &Cursor,
        limit: usize,
    ) -> NodeResult<Vec<Transfer>> {
        let path = format!("/app/api/v1/group/{}/transfers", urlencoding::encode(group_id));
        let query = transfers_query(cursor, limit);
        let transfers: Option<Vec<TransferResponse>> = self.get_json(&path, &query).await?;
        Ok(transfers
            .unwrap_or_default()
            .into_iter()
            .map(|transfer| transfer.into_transfer(group_id))
            .collect())
    }
}

fn transfers_query(cursor: &Cursor, limit: usize) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("since", cursor.timestamp.to_string()),
        ("num", limit.to_string()),
    ];
    if let Some(last_id) = &cursor.trx_id {
        query.push(("start_trx", last_id.to_string()));
        query.push(("include_start_trx", "false".to_string()));
    }
    query
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> NodeResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(NodeError::Api(parse_api_error(status, &body)));
    }
    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|error| NodeError::InvalidPayload(format!("{error}: {}", compact_text(&body))))
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> NodeResult<String> {
    let url = normalize_text_option(Some(raw)).ok_or_else(|| {
        NodeError::InvalidConfiguration("node url must not be empty".to_string())
    })?;
    if is_http_url(&url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(NodeError::InvalidConfiguration(
            "node url must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfers_query_resumes_after_last_id() {
        let fresh = Cursor::default();
        assert_eq!(
            transfers_query(&fresh, 20),
            vec![("since", "0".to_string()), ("num", "20".to_string())]
        );

        let resumed = Cursor {
            timestamp: 7,
            trx_id: Some(TrxId::new("tx2")),
        };
        assert_eq!(
            transfers_query(&resumed, 20),
            vec![
                ("since", "7".to_string()),
                ("num", "20".to_string()),
                ("start_trx", "tx2".to_string()),
                ("include_start_trx", "false".to_string()),
            ]
        );
    }

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url(String::new()).is_err());
        assert!(normalize_base_url("127.0.0.1:8002".to_string()).is_err());
    }

    #[test]
    fn normalize_base_url_trims_trailing_slash() {
        assert_eq!(
            normalize_base_url(" http://127.0.0.1:8002/ ".to_string()).unwrap(),
            "http://127.0.0.1:8002"
        );
    }

    #[test]
    fn client_debug_redacts_jwt() {
        let client =
            HttpNodeClient::new("http://127.0.0.1:8002", Some("secret".to_string())).unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn parse_api_error_prefers_message_field() {
        let message = parse_api_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"group not found"}"#,
        );
        assert_eq!(message, "group not found (400)");
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, "  "),
            "HTTP 502"
        );
    }
}

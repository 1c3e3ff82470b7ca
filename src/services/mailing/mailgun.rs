//! Mailgun-backed subscription backend (HTTP API v3).
//!
//! - list: `GET /lists/pages?limit=100`, following `paging.next`
//! - subscribe: `POST /lists/{list}/members` (upsert, subscribed=yes)
//! - unsubscribe: `DELETE /lists/{list}/members/{member}`
//!
//! Every operation, pagination included, runs under one timeout.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::config::Config;
use crate::services::mailing::backend::{
    BackendError, BackendResult, ListVisibility, MailingList, SubscriptionBackend,
};

const PAGE_LIMIT: &str = "100";
const API_USER: &str = "api";

#[derive(Debug, Deserialize)]
struct ListsPage {
    #[serde(default)]
    items: Vec<MailgunList>,
    #[serde(default)]
    paging: Paging,
}

#[derive(Debug, Default, Deserialize)]
struct Paging {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MailgunList {
    address: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    access_level: String,
    #[serde(default)]
    members_count: u64,
    #[serde(default)]
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct MailgunClient {
    http: Client,
    api_base: Url,
    api_key: String,
    visibility: ListVisibility,
    timeout: Duration,
}

impl std::fmt::Debug for MailgunClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print the API key
        f.debug_struct("MailgunClient")
            .field("api_base", &self.api_base.as_str())
            .field("visibility", &self.visibility)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl MailgunClient {
    pub fn new(
        api_base: Url,
        api_key: String,
        visibility: ListVisibility,
        timeout: Duration,
    ) -> BackendResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_base,
            api_key,
            visibility,
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> BackendResult<Self> {
        Self::new(
            config.mailgun_api_base.clone(),
            config.mailgun_api_key.clone(),
            ListVisibility {
                blocked: config.mailgun_blocked_lists.clone(),
                hidden: config.mailgun_hidden_lists.clone(),
            },
            config.backend_timeout,
        )
    }

    fn endpoint(&self, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Transport("api base cannot be a base url".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(API_USER, Some(&self.api_key))
    }

    async fn bounded<T, F>(&self, operation: F) -> BackendResult<T>
    where
        F: Future<Output = BackendResult<T>>,
    {
        tokio::time::timeout(self.timeout, operation)
            .await
            .map_err(|_| BackendError::Timeout)?
    }

    // Paging links must stay on the configured API host; credentials go with every request.
    fn same_origin(&self, next: &Url) -> bool {
        next.scheme() == self.api_base.scheme()
            && next.host_str() == self.api_base.host_str()
            && next.port_or_known_default() == self.api_base.port_or_known_default()
    }

    async fn fetch_all_lists(&self) -> BackendResult<Vec<MailgunList>> {
        let mut url = self.endpoint(&["lists", "pages"])?;
        url.query_pairs_mut().append_pair("limit", PAGE_LIMIT);

        let mut lists = Vec::new();
        loop {
            let response = self
                .request(Method::GET, url.clone())
                .send()
                .await
                .map_err(transport_error)?;
            let page: ListsPage = check_status(response)
                .await?
                .json()
                .await
                .map_err(|e| BackendError::Decode(e.to_string()))?;

            if page.items.is_empty() {
                break;
            }
            lists.extend(page.items);

            let Some(next) = page.paging.next else {
                break;
            };
            let next = Url::parse(&next).map_err(|e| BackendError::Decode(e.to_string()))?;
            if next == url {
                break;
            }
            if !self.same_origin(&next) {
                return Err(BackendError::Decode(format!(
                    "paging link points to foreign host: {}",
                    next.host_str().unwrap_or_default()
                )));
            }
            url = next;
        }

        Ok(lists)
    }
}

#[async_trait]
impl SubscriptionBackend for MailgunClient {
    fn backend_name(&self) -> &'static str {
        "mailgun"
    }

    async fn list_mailing_lists(&self, include_hidden: bool) -> BackendResult<Vec<MailingList>> {
        let raw = self.bounded(self.fetch_all_lists()).await?;

        let lists = raw
            .into_iter()
            .filter_map(|list| {
                let hidden = self.visibility.is_hidden(&list.address);
                if hidden && !include_hidden {
                    return None;
                }
                let blocked = self.visibility.is_blocked(&list.address);
                Some(MailingList {
                    address: list.address,
                    name: list.name,
                    description: list.description,
                    access_level: list.access_level,
                    members_count: list.members_count,
                    created_at: list.created_at,
                    blocked,
                    hidden,
                })
            })
            .collect();

        Ok(lists)
    }

    async fn subscribe(&self, list_address: &str, member_address: &str) -> BackendResult<()> {
        self.visibility.ensure_subscribable(list_address)?;

        let url = self.endpoint(&["lists", list_address, "members"])?;
        let form = [
            ("address", member_address),
            ("subscribed", "yes"),
            ("upsert", "yes"),
        ];

        self.bounded(async {
            let response = self
                .request(Method::POST, url)
                .form(&form)
                .send()
                .await
                .map_err(transport_error)?;
            check_status(response).await.map(|_| ())
        })
        .await
    }

    async fn unsubscribe(&self, list_address: &str, member_address: &str) -> BackendResult<()> {
        self.visibility.ensure_subscribable(list_address)?;

        let url = self.endpoint(&["lists", list_address, "members", member_address])?;

        self.bounded(async {
            let response = self
                .request(Method::DELETE, url)
                .send()
                .await
                .map_err(transport_error)?;
            check_status(response).await.map(|_| ())
        })
        .await
    }
}

fn transport_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Transport(e.to_string())
    }
}

async fn check_status(response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.clone());

    Err(match status {
        StatusCode::BAD_REQUEST => BackendError::BadRequest(message),
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        StatusCode::CONFLICT => BackendError::Conflict(message),
        // 401/403 mean our own credentials are wrong: not the caller's problem.
        _ => BackendError::Upstream {
            status: status.as_u16(),
            body,
        },
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer, visibility: ListVisibility) -> MailgunClient {
        let base = Url::parse(&format!("{}/v3", server.uri())).unwrap();
        MailgunClient::new(
            base,
            "key-test".to_string(),
            visibility,
            Duration::from_secs(2),
        )
        .unwrap()
    }

    fn list_item(address: &str) -> serde_json::Value {
        json!({
            "address": address,
            "name": "News",
            "description": "General news",
            "access_level": "readonly",
            "members_count": 3,
            "created_at": "Tue, 06 Mar 2012 05:44:45 GMT",
            "reply_preference": "list"
        })
    }

    #[tokio::test]
    async fn lists_follow_paging_and_apply_visibility() {
        let server = MockServer::start().await;
        let next = format!("{}/v3/lists/pages?page=next&limit=100", server.uri());

        Mock::given(method("GET"))
            .and(path("/v3/lists/pages"))
            .and(query_param("page", "next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [],
                "paging": {"next": next.clone()}
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v3/lists/pages"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    list_item("news@lists.example.com"),
                    list_item("board@lists.example.com"),
                    list_item("staff@lists.example.com"),
                ],
                "paging": {"next": next}
            })))
            .mount(&server)
            .await;

        let visibility = ListVisibility {
            blocked: vec!["board@lists.example.com".to_string()],
            hidden: vec!["staff@lists.example.com".to_string()],
        };
        let client = client(&server, visibility);

        let lists = client.list_mailing_lists(false).await.unwrap();
        let addresses: Vec<_> = lists.iter().map(|l| l.address.as_str()).collect();
        assert_eq!(
            addresses,
            vec!["news@lists.example.com", "board@lists.example.com"]
        );
        assert!(!lists[0].blocked);
        assert!(lists[1].blocked);
        assert_eq!(lists[0].members_count, 3);

        let all = client.list_mailing_lists(true).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[2].hidden);
    }

    #[tokio::test]
    async fn foreign_paging_link_is_not_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/lists/pages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [list_item("news@lists.example.com")],
                "paging": {"next": "https://attacker.example.net/v3/lists/pages?page=next"}
            })))
            .mount(&server)
            .await;

        let err = client(&server, ListVisibility::default())
            .list_mailing_lists(false)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
    }

    #[tokio::test]
    async fn subscribe_posts_upsert_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/lists/news@lists.example.com/members"))
            .and(body_string_contains("address=a%40x.com"))
            .and(body_string_contains("subscribed=yes"))
            .and(body_string_contains("upsert=yes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "Mailing list member has been created"
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, ListVisibility::default())
            .subscribe("news@lists.example.com", "a@x.com")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unsubscribe_deletes_member() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v3/lists/news@lists.example.com/members/a@x.com"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, ListVisibility::default())
            .unsubscribe("news@lists.example.com", "a@x.com")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn blocked_list_never_reaches_mailgun() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let visibility = ListVisibility {
            blocked: vec!["board@lists.example.com".to_string()],
            hidden: vec![],
        };
        let err = client(&server, visibility)
            .subscribe("board@lists.example.com", "a@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Forbidden(_)));
    }

    #[tokio::test]
    async fn upstream_statuses_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v3/lists/news@lists.example.com/members/ghost@x.com"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "Member not found"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v3/lists/news@lists.example.com/members"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Forbidden"))
            .mount(&server)
            .await;

        let client = client(&server, ListVisibility::default());

        let err = client
            .unsubscribe("news@lists.example.com", "ghost@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound(ref m) if m == "Member not found"));

        let err = client
            .subscribe("news@lists.example.com", "a@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Upstream { status: 401, .. }));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let base = Url::parse(&format!("{}/v3", server.uri())).unwrap();
        let client = MailgunClient::new(
            base,
            "key-test".to_string(),
            ListVisibility::default(),
            Duration::from_millis(200),
        )
        .unwrap();

        let err = client.list_mailing_lists(false).await.unwrap_err();
        assert!(matches!(err, BackendError::Timeout));
    }
}

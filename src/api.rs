// API client module: a small blocking HTTP client for the Help Scout Docs
// API. It authenticates with the static API token, retries transient
// failures a fixed number of times, walks paginated listings and fetches
// single articles. All network access goes through `Transport` so the rest
// of the crate can be tested without a server.

use std::fmt;
use std::thread;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::{Settings, DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_DELAY};
use crate::error::{ExportError, Result};

const USER_AGENT: &str = concat!("export-help-scout-docs/", env!("CARGO_PKG_VERSION"));

/// Build a Basic `Authorization` header value. A missing password is sent
/// as the empty string.
pub fn basic_auth_header(username: &str, password: Option<&str>) -> String {
    let raw = format!("{}:{}", username, password.unwrap_or(""));
    format!("Basic {}", STANDARD.encode(raw))
}

/// The Help Scout API token. The API expects it as the Basic-auth username
/// with an empty password.
#[derive(Clone)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn authorization_header(&self) -> String {
        basic_auth_header(&self.token, None)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Pagination envelope found under the entity key of a listing response.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    pub page: u32,
    pub pages: u32,
    #[serde(default)]
    pub items: Vec<T>,
}

impl<T: DeserializeOwned> Page<T> {
    /// Decode `data[entity_key]` as a page of `T`.
    pub fn from_envelope(mut data: Value, entity_key: &str) -> Result<Self> {
        let inner = data
            .get_mut(entity_key)
            .map(Value::take)
            .ok_or_else(|| {
                ExportError::UnexpectedResponse(format!("missing \"{}\" key", entity_key))
            })?;
        serde_json::from_value(inner).map_err(|e| {
            ExportError::UnexpectedResponse(format!("\"{}\" page: {}", entity_key, e))
        })
    }
}

/// A Docs collection. Fields other than `id` and `name` are kept verbatim
/// so the listing can show the whole object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Entry of the per-collection article listing. The listing carries no
/// article text, only the ID needed to fetch each article afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct ArticleSummary {
    pub id: String,
}

/// Full response of `GET /v1/articles/{id}`, envelope included.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ArticleDocument(Value);

impl ArticleDocument {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// `article.slug` of the document.
    pub fn slug(&self) -> Result<&str> {
        self.0
            .get("article")
            .and_then(|article| article.get("slug"))
            .and_then(Value::as_str)
            .ok_or_else(|| ExportError::UnexpectedResponse("article has no slug".to_string()))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// One GET round trip. Implementations return the decoded JSON body, or
/// `ExportError::Status` for non-success responses.
pub trait Transport {
    fn get(&self, url: &Url, authorization: Option<&str>) -> Result<Value>;
}

/// `Transport` backed by a blocking reqwest client.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &Url, authorization: Option<&str>) -> Result<Value> {
        let mut request = self.client.get(url.clone());
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }

        let res = request.send()?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().unwrap_or_default();
            return Err(ExportError::Status {
                url: url.to_string(),
                status,
                body,
            });
        }

        let text = res.text()?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Client for the Docs API. Holds the transport, the API base URL, the
/// optional credential and the pacing/retry settings.
pub struct ApiClient<T = ReqwestTransport> {
    transport: T,
    base_url: String,
    credential: Option<Credential>,
    request_delay: Duration,
    max_attempts: u32,
}

impl ApiClient<ReqwestTransport> {
    /// Create a client backed by reqwest and configured from `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::configured(ReqwestTransport::new()?, settings))
    }
}

impl<T: Transport> ApiClient<T> {
    /// Unauthenticated client with the default delay and retry budget.
    pub fn new(transport: T, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            credential: None,
            request_delay: DEFAULT_REQUEST_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn configured(transport: T, settings: &Settings) -> Self {
        Self::new(transport, settings.api_url.clone())
            .with_credential(settings.credential.clone())
            .with_request_delay(settings.request_delay)
            .with_max_attempts(settings.max_attempts)
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `base_url` with `segments` appended as percent-encoded path segments.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut endpoint = Url::parse(&self.base_url)?;
        endpoint
            .path_segments_mut()
            .map_err(|_| ExportError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(endpoint)
    }

    /// GET `url` with `params` appended to the query string.
    ///
    /// Retryable failures are attempted again up to the attempt budget,
    /// sleeping the request delay in between. The error of the last
    /// attempt is returned as is.
    pub fn get(&self, url: Url, params: &[(&str, &str)]) -> Result<Value> {
        let mut url = url;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        let authorization = self.credential.as_ref().map(Credential::authorization_header);

        for attempt in 1..=self.max_attempts {
            debug!(url = %url, attempt, "GET");
            match self.transport.get(&url, authorization.as_deref()) {
                Ok(data) => return Ok(data),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    warn!(url = %url, attempt, error = %err, "Request failed, retrying");
                    thread::sleep(self.request_delay);
                }
                Err(err) => {
                    error!(url = %url, attempt, error = %err, "Request failed");
                    return Err(err);
                }
            }
        }

        Err(ExportError::NoAttempts)
    }

    /// Walk every page of a listing endpoint and collect the items found
    /// under `entity_key`, in server order. Sleeps the request delay after
    /// each page.
    pub fn fetch_all<D: DeserializeOwned>(&self, url: Url, entity_key: &str) -> Result<Vec<D>> {
        let mut entities = Vec::new();
        let mut next_page: u32 = 1;

        loop {
            info!(page = next_page, entity = entity_key, "Getting page");
            let page_param = next_page.to_string();
            let data = self.get(url.clone(), &[("page", page_param.as_str())])?;
            let page = Page::<D>::from_envelope(data, entity_key)?;
            entities.extend(page.items);
            thread::sleep(self.request_delay);

            // `pages` is taken from the latest response each time round.
            if page.page >= page.pages {
                break;
            }
            next_page = page.page + 1;
        }

        Ok(entities)
    }

    pub fn list_collections(&self) -> Result<Vec<Collection>> {
        info!("Getting collections");
        self.fetch_all(self.endpoint(&["v1", "collections"])?, "collections")
    }

    /// IDs of every article in `collection_id`, in listing order.
    pub fn list_article_ids(&self, collection_id: &str) -> Result<Vec<String>> {
        info!(collection = collection_id, "Getting article IDs");
        let url = self.endpoint(&["v1", "collections", collection_id, "articles"])?;
        let articles: Vec<ArticleSummary> = self.fetch_all(url, "articles")?;
        Ok(articles.into_iter().map(|article| article.id).collect())
    }

    pub fn get_article(&self, article_id: &str) -> Result<ArticleDocument> {
        let data = self.get(self.endpoint(&["v1", "articles", article_id])?, &[])?;
        Ok(ArticleDocument::new(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{listing, ScriptedTransport, BASE_URL};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn client(transport: ScriptedTransport) -> ApiClient<ScriptedTransport> {
        ApiClient::new(transport, BASE_URL)
            .with_credential(Credential::new("token"))
            .with_request_delay(Duration::ZERO)
    }

    #[test]
    fn test_authorization_uses_empty_password() {
        assert_eq!(
            basic_auth_header("token", None),
            format!("Basic {}", STANDARD.encode("token:"))
        );
        assert_eq!(basic_auth_header("token", None), basic_auth_header("token", Some("")));
        assert_eq!(
            Credential::new("abc123").authorization_header(),
            "Basic YWJjMTIzOg=="
        );
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let debug = format!("{:?}", Credential::new("super-secret"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_get_sends_auth_header_and_query() {
        let transport = ScriptedTransport::new()
            .respond("http://fake/v1/collections?page=3", json!({"ok": true}));
        let client = client(transport);

        let url = client.endpoint(&["v1", "collections"]).unwrap();
        let data = client.get(url, &[("page", "3")]).unwrap();

        assert_eq!(data, json!({"ok": true}));
        let requests = client.transport().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].authorization.as_deref(),
            Some(basic_auth_header("token", None).as_str())
        );
    }

    #[test]
    fn test_get_without_credential_sends_no_header() {
        let transport =
            ScriptedTransport::new().respond("http://fake/v1/articles/a1", json!({}));
        let client = ApiClient::new(transport, BASE_URL).with_request_delay(Duration::ZERO);

        client.get_article("a1").unwrap();

        assert_eq!(client.transport().requests()[0].authorization, None);
    }

    #[test]
    fn test_retry_then_success() {
        let transport = ScriptedTransport::new()
            .fail("http://fake/v1/articles/a1", 502)
            .fail("http://fake/v1/articles/a1", 503)
            .respond("http://fake/v1/articles/a1", json!({"article": {"slug": "x"}}));
        let client = client(transport).with_max_attempts(3);

        let doc = client.get_article("a1").unwrap();

        assert_eq!(doc.slug().unwrap(), "x");
        assert_eq!(client.transport().requests().len(), 3);
    }

    #[test]
    fn test_retries_exhausted_returns_last_error() {
        let transport = ScriptedTransport::new()
            .fail("http://fake/v1/articles/a1", 500)
            .fail("http://fake/v1/articles/a1", 429);
        let client = client(transport);

        let err = client.get_article("a1").unwrap_err();

        match err {
            ExportError::Status { status, .. } => assert_eq!(status.as_u16(), 429),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(client.transport().requests().len(), 2);
    }

    #[test]
    fn test_non_retryable_error_is_not_retried() {
        let transport = ScriptedTransport::new()
            .error(
                "http://fake/v1/articles/a1",
                ExportError::UnexpectedResponse("garbage".into()),
            )
            .respond("http://fake/v1/articles/a1", json!({}));
        let client = client(transport);

        assert!(client.get_article("a1").is_err());
        assert_eq!(client.transport().requests().len(), 1);
    }

    #[test]
    fn test_zero_attempts_is_internal_error() {
        let client = client(ScriptedTransport::new()).with_max_attempts(0);
        let err = client.get_article("a1").unwrap_err();
        assert!(matches!(err, ExportError::NoAttempts));
        assert!(client.transport().requests().is_empty());
    }

    #[test]
    fn test_fetch_all_preserves_page_order() {
        let url = "http://fake/v1/collections";
        let transport = ScriptedTransport::new()
            .respond(
                &format!("{url}?page=1"),
                listing("collections", 1, 3, json!([{"id": "c1"}, {"id": "c2"}])),
            )
            .respond(
                &format!("{url}?page=2"),
                listing("collections", 2, 3, json!([{"id": "c3"}])),
            )
            .respond(
                &format!("{url}?page=3"),
                listing("collections", 3, 3, json!([{"id": "c4"}, {"id": "c1"}])),
            );
        let client = client(transport);

        let collections = client.list_collections().unwrap();

        let ids: Vec<&str> = collections.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3", "c4", "c1"]);
        assert_eq!(
            client.transport().request_urls(),
            vec![
                format!("{url}?page=1"),
                format!("{url}?page=2"),
                format!("{url}?page=3"),
            ]
        );
    }

    #[test]
    fn test_fetch_all_with_zero_pages_makes_one_request() {
        let transport = ScriptedTransport::new().respond(
            "http://fake/v1/collections?page=1",
            listing("collections", 1, 0, json!([])),
        );
        let client = client(transport);

        assert!(client.list_collections().unwrap().is_empty());
        assert_eq!(client.transport().requests().len(), 1);
    }

    #[test]
    fn test_fetch_all_missing_entity_key() {
        let transport = ScriptedTransport::new().respond(
            "http://fake/v1/collections?page=1",
            listing("articles", 1, 1, json!([])),
        );
        let client = client(transport);

        let err = client.list_collections().unwrap_err();
        assert!(matches!(err, ExportError::UnexpectedResponse(_)));
    }

    #[test]
    fn test_list_article_ids_projects_ids() {
        let transport = ScriptedTransport::new().respond(
            "http://fake/v1/collections/col%201/articles?page=1",
            listing(
                "articles",
                1,
                1,
                json!([{"id": "a1", "slug": "intro"}, {"id": "a2", "slug": "setup"}]),
            ),
        );
        let client = client(transport);

        let ids = client.list_article_ids("col 1").unwrap();
        assert_eq!(ids, vec!["a1".to_string(), "a2".to_string()]);
    }

    #[test]
    fn test_collection_keeps_extra_fields() {
        let collection: Collection =
            serde_json::from_value(json!({"id": "c1", "name": "Docs", "siteId": "s1"})).unwrap();
        assert_eq!(collection.name.as_deref(), Some("Docs"));
        assert_eq!(collection.extra.get("siteId"), Some(&json!("s1")));
        let back = serde_json::to_value(&collection).unwrap();
        assert_eq!(back, json!({"id": "c1", "name": "Docs", "siteId": "s1"}));
    }

    #[test]
    fn test_article_document_without_slug() {
        let doc = ArticleDocument::new(json!({"article": {"id": "a1"}}));
        assert!(matches!(doc.slug(), Err(ExportError::UnexpectedResponse(_))));
    }

    const DELAY: Duration = Duration::from_millis(30);

    #[test]
    fn test_fetch_all_sleeps_after_every_page() {
        let url = "http://fake/v1/collections";
        let transport = ScriptedTransport::new()
            .respond(
                &format!("{url}?page=1"),
                listing("collections", 1, 2, json!([{"id": "c1"}])),
            )
            .respond(
                &format!("{url}?page=2"),
                listing("collections", 2, 2, json!([{"id": "c2"}])),
            );
        let client = client(transport).with_request_delay(DELAY);

        let started = std::time::Instant::now();
        client.list_collections().unwrap();

        assert!(started.elapsed() >= DELAY * 2);
    }

    #[test]
    fn test_retry_sleeps_between_attempts() {
        let transport = ScriptedTransport::new()
            .fail("http://fake/v1/articles/a1", 503)
            .respond("http://fake/v1/articles/a1", json!({"article": {"slug": "x"}}));
        let client = client(transport).with_request_delay(DELAY);

        let started = std::time::Instant::now();
        client.get_article("a1").unwrap();

        assert!(started.elapsed() >= DELAY);
    }
}

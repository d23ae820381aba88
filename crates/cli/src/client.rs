use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use cleanerio_core::config::ClientConfig;
use cleanerio_core::{DispatchError, Reply, ReplyDispatcher};

#[derive(Serialize)]
struct EnquiryBody<'a> {
    content: &'a str,
}

/// Sends each message to a running `/enquire` endpoint.
///
/// Any answer other than 200 becomes the apology. Every request carries the
/// client timeout, so a stalled server cannot block the chat loop.
#[derive(Clone, Debug)]
pub struct HttpEnquiryClient {
    http: reqwest::Client,
    url: String,
}

impl HttpEnquiryClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url: url.into() })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.enquire_url.clone(), Duration::from_secs(config.timeout_secs))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReplyDispatcher for HttpEnquiryClient {
    async fn dispatch(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Reply, DispatchError> {
        let send = self.http.post(&self.url).json(&EnquiryBody { content: text }).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
            response = send => response,
        }
        .map_err(|error| DispatchError::OracleUnavailable(format!("enquiry failed: {error}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(
                event_name = "client.enquire.non_ok",
                status = status.as_u16(),
                url = %self.url,
                "enquiry endpoint answered with an error status"
            );
            return Ok(Reply::fallback());
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DispatchError::Cancelled),
            body = response.json::<Reply>() => body.map_err(|error| {
                DispatchError::MalformedResponse(format!("enquiry body: {error}"))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use tokio_util::sync::CancellationToken;

    use cleanerio_core::{DispatchError, ReplyDispatcher, FALLBACK_REPLY};

    use super::HttpEnquiryClient;

    async fn answer(Json(body): Json<Value>) -> Json<Value> {
        let content = body["content"].as_str().unwrap_or_default().to_string();
        Json(json!({ "response": format!("you said: {content}") }))
    }

    async fn broken() -> (StatusCode, Json<Value>) {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"detail": "boom"})))
    }

    async fn stalled() -> Json<Value> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Json(json!({"response": "too late"}))
    }

    async fn spawn_server() -> String {
        let app = Router::new()
            .route("/enquire", post(answer))
            .route("/broken", post(broken))
            .route("/stalled", post(stalled));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{address}")
    }

    #[tokio::test]
    async fn ok_answer_is_passed_through() {
        let base = spawn_server().await;
        let client =
            HttpEnquiryClient::new(format!("{base}/enquire"), Duration::from_secs(2)).expect("client");

        let reply = client.dispatch("hello", &CancellationToken::new()).await.expect("reply");

        assert_eq!(reply.response, "you said: hello");
    }

    #[tokio::test]
    async fn error_status_becomes_apology() {
        let base = spawn_server().await;
        let client =
            HttpEnquiryClient::new(format!("{base}/broken"), Duration::from_secs(2)).expect("client");

        let reply = client.dispatch("hello", &CancellationToken::new()).await.expect("reply");

        assert_eq!(reply.response, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn stalled_server_times_out() {
        let base = spawn_server().await;
        let client = HttpEnquiryClient::new(format!("{base}/stalled"), Duration::from_millis(100))
            .expect("client");

        let error = client.dispatch("hello", &CancellationToken::new()).await.expect_err("timeout");

        assert!(matches!(error, DispatchError::OracleUnavailable(_)));
    }

    #[tokio::test]
    async fn cancelled_token_aborts_request() {
        let base = spawn_server().await;
        let client =
            HttpEnquiryClient::new(format!("{base}/stalled"), Duration::from_secs(10)).expect("client");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let error = client.dispatch("hello", &cancel).await.expect_err("cancelled");

        assert_eq!(error, DispatchError::Cancelled);
    }
}

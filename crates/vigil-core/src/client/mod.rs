//! Network auth client
//!
//! One awaitable call per request. Dropping the returned future aborts the underlying
//! HTTP request. Application-level refusals come back as `Ok(AuthResponse { status: false })`;
//! anything below that (DNS, connect, timeout, 5xx, unreadable body) is `Error::Transport`.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::{AuthResponse, LoginRequest, RegisterRequest};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Remote auth backend
#[async_trait]
pub trait AuthClient: Send + Sync {
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse>;

    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse>;
}

/// HTTPS/JSON implementation of [`AuthClient`]
pub struct HttpAuthClient {
    base_url: String,
    client: Client,
}

impl HttpAuthClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Self::with_client(base_url, client)
    }

    /// Use a preconfigured reqwest client
    pub fn with_client(base_url: &str, client: Client) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::config("Server URL is empty"));
        }
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<AuthResponse> {
        let url = format!("{}/{}", self.base_url, path);
        log::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(Error::transport(format!("Server error {}", status)));
        }

        let text = response.text().await.map_err(transport_error)?;
        interpret_response(status, &text)
    }
}

#[async_trait]
impl AuthClient for HttpAuthClient {
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse> {
        self.post("register", request).await
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse> {
        self.post("login", request).await
    }
}

/// Map a non-5xx response onto the structured success/failure contract
fn interpret_response(status: StatusCode, text: &str) -> Result<AuthResponse> {
    match serde_json::from_str::<AuthResponse>(text) {
        Ok(mut body) => {
            if !status.is_success() {
                body.status = false;
            }
            if !body.status && body.message.is_empty() {
                body.message = format!("Request rejected ({})", status);
            }
            Ok(body)
        }
        Err(_) if status.is_client_error() => {
            let message = match text.trim() {
                "" => format!("Request rejected ({})", status),
                t => t.to_string(),
            };
            Ok(AuthResponse::failure(message))
        }
        Err(e) => Err(Error::transport(format!("Unreadable response: {}", e))),
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::transport("Request timed out")
    } else if err.is_connect() {
        Error::transport("Connection failed")
    } else {
        Error::transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one canned HTTP response, returning the raw request
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if buf.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf).to_string()
        });

        (format!("http://{}", addr), handle)
    }

    fn test_client(url: &str) -> HttpAuthClient {
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HttpAuthClient::with_client(url, client).unwrap()
    }

    fn register_request() -> RegisterRequest {
        RegisterRequest {
            name: "Alice".to_string(),
            email: "a@x.com".to_string(),
            password: "pw1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_success() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"status":true,"message":"Check your email","user":{"id":42,"name":"Alice","email":"a@x.com"}}"#,
        )
        .await;
        let client = test_client(&url);

        let resp = client.register(&register_request()).await.unwrap();

        assert!(resp.status);
        assert_eq!(resp.message, "Check your email");
        assert_eq!(resp.user.unwrap().id, "42");

        let raw_request = server.await.unwrap();
        assert!(raw_request.starts_with("POST /register"));
        assert!(raw_request.contains(r#""email":"a@x.com""#));
    }

    #[tokio::test]
    async fn test_login_structured_failure_on_4xx() {
        let (url, _server) =
            serve_once("401 Unauthorized", r#"{"status":"error","message":"Wrong password"}"#).await;
        let client = test_client(&url);

        let resp = client
            .login(&LoginRequest {
                email: "a@x.com".to_string(),
                password: "bad".to_string(),
            })
            .await
            .unwrap();

        assert!(!resp.status);
        assert_eq!(resp.message, "Wrong password");
    }

    #[tokio::test]
    async fn test_server_error_is_transport() {
        let (url, _server) = serve_once("503 Service Unavailable", "").await;
        let client = test_client(&url);

        let err = client.register(&register_request()).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = test_client(&format!("http://{}", addr));
        let err = client.register(&register_request()).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_interpret_plain_text_rejection() {
        let resp = interpret_response(StatusCode::CONFLICT, "Email already registered").unwrap();
        assert!(!resp.status);
        assert_eq!(resp.message, "Email already registered");
    }

    #[test]
    fn test_interpret_unreadable_success_is_transport() {
        let err = interpret_response(StatusCode::OK, "<html>captive portal</html>").unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_new_rejects_empty_url() {
        assert!(matches!(HttpAuthClient::new("/", 5), Err(Error::Config(_))));
    }
}

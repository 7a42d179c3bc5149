use std::sync::Arc;

use axum::{
    body::Body as AxumBody,
    http::{Method, StatusCode, header},
};
use eyre::{Result, WrapErr};
use http_body_util::BodyExt;
use hyper::{Request, Response};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    core::{GatewayError, GatewayService, ResolvedTarget},
    ports::http_client::{HttpClient, HttpClientError},
};

/// HTTP handler for the Portico gateway.
///
/// Serves the gateway's own surface (`/health`, `/registry/*`) and proxies
/// everything else through the plan → forward pipeline. Owns the access log:
/// every request leaves one line with method, path, resolved target (or
/// failure kind), and final status.
pub struct HttpHandler {
    gateway_service: Arc<GatewayService>,
    http_client: Arc<dyn HttpClient>,
}

/// Body of `POST /registry/register`.
#[derive(Debug, Deserialize)]
struct RegisterRequest {
    service: String,
    address: String,
}

impl HttpHandler {
    pub fn new(gateway_service: Arc<GatewayService>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            gateway_service,
            http_client,
        }
    }

    /// Main request handler that routes requests appropriately
    pub async fn handle_request(&self, req: Request<AxumBody>) -> Result<Response<AxumBody>> {
        let path = req.uri().path().to_string();
        let method = req.method().clone();

        match path.as_str() {
            "/health" => self.handle_health_check().await,
            "/registry/services" => self.handle_list_services(method).await,
            "/registry/register" => self.handle_register(req).await,
            _ if path.starts_with("/registry/deregister/") => {
                self.handle_deregister(method, &path).await
            }
            _ => self.handle_proxy_request(req).await,
        }
    }

    /// Handle the gateway's own health endpoint
    async fn handle_health_check(&self) -> Result<Response<AxumBody>> {
        let registry = self.gateway_service.registry();
        let total_instances = registry.instance_count();
        let healthy_instances = registry.healthy_instance_count();

        let status = if healthy_instances > 0 {
            StatusCode::OK
        } else if total_instances > 0 {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::NOT_FOUND
        };

        let health_data = serde_json::json!({
            "status": if status == StatusCode::OK { "healthy" } else { "unhealthy" },
            "instances": {
                "healthy": healthy_instances,
                "total": total_instances
            },
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        json_response(status, health_data.to_string())
    }

    /// List all registered instances
    async fn handle_list_services(&self, method: Method) -> Result<Response<AxumBody>> {
        if method != Method::GET {
            return method_not_allowed();
        }

        let snapshot = self.gateway_service.registry().snapshot();
        let body = serde_json::to_string(&snapshot).wrap_err("Failed to serialize snapshot")?;
        json_response(StatusCode::OK, body)
    }

    /// Register a backend instance
    async fn handle_register(&self, req: Request<AxumBody>) -> Result<Response<AxumBody>> {
        if !self.gateway_service.config().registration.enabled {
            return json_response(
                StatusCode::NOT_FOUND,
                serde_json::json!({"error": "registration_disabled"}).to_string(),
            );
        }
        if req.method() != Method::POST {
            return method_not_allowed();
        }

        let body = req
            .into_body()
            .collect()
            .await
            .wrap_err("Failed to read registration body")?
            .to_bytes();

        let registration: RegisterRequest = match serde_json::from_slice(&body) {
            Ok(registration) => registration,
            Err(e) => {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    serde_json::json!({
                        "error": "invalid_request",
                        "message": format!("Invalid registration body: {e}"),
                    })
                    .to_string(),
                );
            }
        };

        match self
            .gateway_service
            .registry()
            .register(&registration.service, &registration.address)
        {
            Ok(id) => {
                tracing::info!(
                    "Registered instance {} for {} at {}",
                    id,
                    registration.service,
                    registration.address
                );
                json_response(
                    StatusCode::CREATED,
                    serde_json::json!({"id": id}).to_string(),
                )
            }
            Err(e) => json_response(
                StatusCode::BAD_REQUEST,
                serde_json::json!({
                    "error": "invalid_address",
                    "service": registration.service,
                    "message": e.to_string(),
                })
                .to_string(),
            ),
        }
    }

    /// Deregister a backend instance by id
    async fn handle_deregister(&self, method: Method, path: &str) -> Result<Response<AxumBody>> {
        if !self.gateway_service.config().registration.enabled {
            return json_response(
                StatusCode::NOT_FOUND,
                serde_json::json!({"error": "registration_disabled"}).to_string(),
            );
        }
        if method != Method::DELETE {
            return method_not_allowed();
        }

        let raw_id = path.trim_start_matches("/registry/deregister/");
        let id = match raw_id.parse::<Uuid>() {
            Ok(id) => id,
            Err(_) => {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    serde_json::json!({
                        "error": "invalid_request",
                        "message": format!("'{raw_id}' is not a valid instance id"),
                    })
                    .to_string(),
                );
            }
        };

        if self.gateway_service.registry().deregister(id) {
            tracing::info!("Deregistered instance {}", id);
            Response::builder()
                .status(StatusCode::NO_CONTENT)
                .body(AxumBody::empty())
                .wrap_err("Failed to build deregister response")
        } else {
            json_response(
                StatusCode::NOT_FOUND,
                serde_json::json!({
                    "error": "unknown_instance",
                    "message": format!("No instance with id {id}"),
                })
                .to_string(),
            )
        }
    }

    /// Proxy a request through plan → forward, mapping failures to statuses.
    async fn handle_proxy_request(&self, req: Request<AxumBody>) -> Result<Response<AxumBody>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let target = match self.gateway_service.plan(&path) {
            Ok(target) => target,
            Err(e) => {
                let response = self.error_response(&e)?;
                log_request(&method, &path, e.kind(), response.status());
                return Ok(response);
            }
        };

        match self.forward(req, &target).await {
            Ok(response) => {
                if response.status().is_server_error() {
                    // Reported, passed through verbatim, never retried
                    let upstream = GatewayError::UpstreamError {
                        service: target.service.clone(),
                        status: response.status().as_u16(),
                    };
                    tracing::warn!("{}", upstream);
                }
                log_request(&method, &path, &target.url(), response.status());
                Ok(response)
            }
            Err(e) => {
                let error = GatewayError::UpstreamUnreachable {
                    service: target.service.clone(),
                    reason: e.to_string(),
                };
                let response = self.error_response(&error)?;
                log_request(&method, &path, error.kind(), response.status());
                Ok(response)
            }
        }
    }

    /// Rewrite the request URI onto the resolved target and send it.
    ///
    /// Method, headers, and body pass through untouched; the query string is
    /// preserved. An optional overall timeout bounds the whole forward.
    async fn forward(
        &self,
        mut req: Request<AxumBody>,
        target: &ResolvedTarget,
    ) -> Result<Response<AxumBody>, HttpClientError> {
        let mut backend_uri = target.url();
        if let Some(query) = req.uri().query() {
            backend_uri.push('?');
            backend_uri.push_str(query);
        }

        *req.uri_mut() = backend_uri
            .parse()
            .map_err(|e| HttpClientError::InvalidRequest(format!("{backend_uri}: {e}")))?;

        match self.gateway_service.config().forward_timeout_secs {
            Some(secs) => {
                match tokio::time::timeout(
                    std::time::Duration::from_secs(secs),
                    self.http_client.send_request(req),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(HttpClientError::Timeout(secs)),
                }
            }
            None => self.http_client.send_request(req).await,
        }
    }

    fn error_response(&self, error: &GatewayError) -> Result<Response<AxumBody>> {
        json_response(error.status_code(), error.to_json_body())
    }
}

impl Clone for HttpHandler {
    fn clone(&self) -> Self {
        Self {
            gateway_service: self.gateway_service.clone(),
            http_client: self.http_client.clone(),
        }
    }
}

/// One access-log line per request: the only required observability output.
fn log_request(method: &Method, path: &str, target: &str, status: StatusCode) {
    tracing::info!(
        http.method = %method,
        http.path = %path,
        target = %target,
        http.status_code = status.as_u16(),
        "request completed"
    );
}

fn json_response(status: StatusCode, body: String) -> Result<Response<AxumBody>> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(AxumBody::from(body))
        .wrap_err("Failed to build response")
}

fn method_not_allowed() -> Result<Response<AxumBody>> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .body(AxumBody::empty())
        .wrap_err("Failed to build response")
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        config::models::ServerConfig,
        ports::http_client::HttpClientResult,
    };

    /// Mock client that captures the forwarded request and answers with a
    /// canned response.
    struct RecordingHttpClient {
        canned_status: StatusCode,
        canned_body: &'static str,
        seen: Mutex<Vec<(Method, String)>>,
    }

    impl RecordingHttpClient {
        fn new(canned_status: StatusCode, canned_body: &'static str) -> Self {
            Self {
                canned_status,
                canned_body,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn last_seen(&self) -> Option<(Method, String)> {
            self.seen.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl HttpClient for RecordingHttpClient {
        async fn send_request(
            &self,
            req: Request<AxumBody>,
        ) -> HttpClientResult<Response<AxumBody>> {
            self.seen
                .lock()
                .unwrap()
                .push((req.method().clone(), req.uri().to_string()));
            Ok(Response::builder()
                .status(self.canned_status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(AxumBody::from(self.canned_body))
                .unwrap())
        }

        async fn health_check(&self, _url: &str, _timeout_secs: u64) -> HttpClientResult<bool> {
            Ok(true)
        }
    }

    /// Mock client whose backend never answers.
    struct HangingHttpClient;

    #[async_trait]
    impl HttpClient for HangingHttpClient {
        async fn send_request(
            &self,
            _req: Request<AxumBody>,
        ) -> HttpClientResult<Response<AxumBody>> {
            std::future::pending().await
        }

        async fn health_check(&self, _url: &str, _timeout_secs: u64) -> HttpClientResult<bool> {
            Ok(true)
        }
    }

    /// Mock client whose backend is unreachable.
    struct RefusingHttpClient;

    #[async_trait]
    impl HttpClient for RefusingHttpClient {
        async fn send_request(
            &self,
            _req: Request<AxumBody>,
        ) -> HttpClientResult<Response<AxumBody>> {
            Err(HttpClientError::ConnectionError(
                "connection refused".to_string(),
            ))
        }

        async fn health_check(&self, _url: &str, _timeout_secs: u64) -> HttpClientResult<bool> {
            Ok(false)
        }
    }

    fn handler_with(client: Arc<dyn HttpClient>, config: ServerConfig) -> HttpHandler {
        let gateway = Arc::new(GatewayService::new(Arc::new(config)));
        HttpHandler::new(gateway, client)
    }

    fn users_config() -> ServerConfig {
        ServerConfig::builder()
            .listen_addr("127.0.0.1:8080")
            .service("users-service", ["http://localhost:8081"])
            .build()
            .unwrap()
    }

    fn get(path: &str) -> Request<AxumBody> {
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(AxumBody::empty())
            .unwrap()
    }

    async fn body_json(response: Response<AxumBody>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_proxy_passthrough() {
        let client = Arc::new(RecordingHttpClient::new(StatusCode::OK, r#"{"id":42}"#));
        let handler = handler_with(client.clone(), users_config());

        let response = handler.handle_request(get("/api/users/42")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], 42);

        let (method, uri) = client.last_seen().unwrap();
        assert_eq!(method, Method::GET);
        assert_eq!(uri, "http://localhost:8081/42");
    }

    #[tokio::test]
    async fn test_proxy_preserves_query() {
        let client = Arc::new(RecordingHttpClient::new(StatusCode::OK, "[]"));
        let handler = handler_with(client.clone(), users_config());

        handler
            .handle_request(get("/api/users/search?name=ada&limit=5"))
            .await
            .unwrap();

        let (_, uri) = client.last_seen().unwrap();
        assert_eq!(uri, "http://localhost:8081/search?name=ada&limit=5");
    }

    #[tokio::test]
    async fn test_malformed_path_is_400() {
        let client = Arc::new(RecordingHttpClient::new(StatusCode::OK, ""));
        let handler = handler_with(client.clone(), users_config());

        let response = handler.handle_request(get("/bogus")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "malformed_path");
        // Nothing was forwarded
        assert!(client.last_seen().is_none());
    }

    #[tokio::test]
    async fn test_unknown_service_is_503() {
        let client = Arc::new(RecordingHttpClient::new(StatusCode::OK, ""));
        let handler = handler_with(client, users_config());

        let response = handler
            .handle_request(get("/api/orders/recent"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["error"], "unknown_service");
        assert_eq!(body["service"], "orders-service");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_503() {
        let handler = handler_with(Arc::new(RefusingHttpClient), users_config());

        let response = handler.handle_request(get("/api/users/42")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["error"], "upstream_unreachable");
        assert_eq!(body["service"], "users-service");
    }

    #[tokio::test]
    async fn test_backend_5xx_passes_through() {
        let client = Arc::new(RecordingHttpClient::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":"boom"}"#,
        ));
        let handler = handler_with(client, users_config());

        let response = handler.handle_request(get("/api/users/42")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "boom");
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let client = Arc::new(RecordingHttpClient::new(StatusCode::OK, ""));
        let handler = handler_with(client, users_config());

        let response = handler.handle_request(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["instances"]["total"], 1);
        assert_eq!(body["instances"]["healthy"], 1);
    }

    #[tokio::test]
    async fn test_health_endpoint_empty_registry() {
        let client = Arc::new(RecordingHttpClient::new(StatusCode::OK, ""));
        let config = ServerConfig::builder()
            .listen_addr("127.0.0.1:8080")
            .build()
            .unwrap();
        let handler = handler_with(client, config);

        let response = handler.handle_request(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_register_then_list_then_deregister() {
        let client = Arc::new(RecordingHttpClient::new(StatusCode::OK, ""));
        let config = ServerConfig::builder()
            .listen_addr("127.0.0.1:8080")
            .build()
            .unwrap();
        let handler = handler_with(client, config);

        let register = Request::builder()
            .method(Method::POST)
            .uri("/registry/register")
            .body(AxumBody::from(
                r#"{"service":"users-service","address":"http://localhost:8081"}"#,
            ))
            .unwrap();
        let response = handler.handle_request(register).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["id"].as_str().unwrap().to_string();

        let response = handler
            .handle_request(get("/registry/services"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listed = body_json(response).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["service"], "users-service");
        assert_eq!(listed[0]["healthy"], true);

        let deregister = Request::builder()
            .method(Method::DELETE)
            .uri(format!("/registry/deregister/{id}"))
            .body(AxumBody::empty())
            .unwrap();
        let response = handler.handle_request(deregister).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        // The service is gone: proxying to it now fails
        let response = handler.handle_request(get("/api/users/42")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_address() {
        let client = Arc::new(RecordingHttpClient::new(StatusCode::OK, ""));
        let handler = handler_with(client, users_config());

        let register = Request::builder()
            .method(Method::POST)
            .uri("/registry/register")
            .body(AxumBody::from(
                r#"{"service":"users-service","address":"not-a-url"}"#,
            ))
            .unwrap();
        let response = handler.handle_request(register).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "invalid_address");
    }

    #[tokio::test]
    async fn test_registration_surface_disabled() {
        let client = Arc::new(RecordingHttpClient::new(StatusCode::OK, ""));
        let config = ServerConfig::builder()
            .listen_addr("127.0.0.1:8080")
            .registration_enabled(false)
            .build()
            .unwrap();
        let handler = handler_with(client, config);

        let register = Request::builder()
            .method(Method::POST)
            .uri("/registry/register")
            .body(AxumBody::from(
                r#"{"service":"users-service","address":"http://localhost:8081"}"#,
            ))
            .unwrap();
        let response = handler.handle_request(register).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_deregister_unknown_id_is_404() {
        let client = Arc::new(RecordingHttpClient::new(StatusCode::OK, ""));
        let handler = handler_with(client, users_config());

        let deregister = Request::builder()
            .method(Method::DELETE)
            .uri(format!("/registry/deregister/{}", Uuid::new_v4()))
            .body(AxumBody::empty())
            .unwrap();
        let response = handler.handle_request(deregister).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_forward_timeout_is_503() {
        let config = ServerConfig::builder()
            .listen_addr("127.0.0.1:8080")
            .service("users-service", ["http://localhost:8081"])
            .forward_timeout_secs(1)
            .build()
            .unwrap();
        let handler = handler_with(Arc::new(HangingHttpClient), config);

        let response = handler.handle_request(get("/api/users/42")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["error"], "upstream_unreachable");
        assert_eq!(body["service"], "users-service");
    }

    #[tokio::test]
    async fn test_handler_future_is_send() {
        // The handler future crosses task boundaries in the server wiring,
        // so it must stay Send even while borrowing request internals.
        fn assert_send<T: Send>(value: T) -> T {
            value
        }

        let client = Arc::new(RecordingHttpClient::new(StatusCode::OK, ""));
        let handler = handler_with(client, users_config());

        for path in ["/health", "/registry/services", "/api/users/42"] {
            let response = assert_send(handler.handle_request(get(path))).await;
            assert!(response.is_ok());
        }
    }

    #[tokio::test]
    async fn test_register_wrong_method() {
        let client = Arc::new(RecordingHttpClient::new(StatusCode::OK, ""));
        let handler = handler_with(client, users_config());

        let response = handler
            .handle_request(get("/registry/register"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}

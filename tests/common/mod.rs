#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    Router,
};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use tower::ServiceExt;

use storefront_api::{
    app,
    config::{AppConfig, GatewayConfig},
    db,
    errors::ServiceError,
    events,
    gateway::{PaymentGateway, RemoteOrder, RemoteOrderStatus},
    handlers::AppServices,
    AppState,
};

pub const KEY_SECRET: &str = "test_key_secret";
pub const WEBHOOK_SECRET: &str = "test_webhook_secret";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const USER_ID: &str = "user-1";
pub const USER_EMAIL: &str = "buyer@example.com";

/// How the mock gateway answers refund calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundMode {
    Succeed,
    Decline,
    TimeOut,
}

/// Gateway test double. Mints deterministic order refs, records every call,
/// and can be told to decline or time out refunds.
pub struct MockGateway {
    order_counter: AtomicU64,
    pub refund_mode: Mutex<RefundMode>,
    pub created_orders: Mutex<Vec<(i64, String)>>,
    pub refund_calls: Mutex<Vec<(String, i64)>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            order_counter: AtomicU64::new(1),
            refund_mode: Mutex::new(RefundMode::Succeed),
            created_orders: Mutex::new(Vec::new()),
            refund_calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockGateway {
    pub fn set_refund_mode(&self, mode: RefundMode) {
        *self.refund_mode.lock().unwrap() = mode;
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_remote_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
        _metadata: Value,
    ) -> Result<RemoteOrder, ServiceError> {
        let n = self.order_counter.fetch_add(1, Ordering::SeqCst);
        self.created_orders
            .lock()
            .unwrap()
            .push((amount_minor, receipt.to_string()));
        Ok(RemoteOrder {
            gateway_order_ref: format!("order_test_{}", n),
            amount_minor,
            currency: currency.to_string(),
        })
    }

    async fn fetch_order_status(
        &self,
        _gateway_order_ref: &str,
    ) -> Result<RemoteOrderStatus, ServiceError> {
        Ok(RemoteOrderStatus::Created)
    }

    async fn refund(&self, payment_ref: &str, amount_minor: i64) -> Result<String, ServiceError> {
        let mode = *self.refund_mode.lock().unwrap();
        match mode {
            RefundMode::Succeed => {
                self.refund_calls
                    .lock()
                    .unwrap()
                    .push((payment_ref.to_string(), amount_minor));
                Ok(format!("rfnd_{}", payment_ref))
            }
            RefundMode::Decline => Err(ServiceError::RefundFailed(
                "provider declined the refund".to_string(),
            )),
            RefundMode::TimeOut => Err(ServiceError::Indeterminate(
                "refund did not complete: timed out".to_string(),
            )),
        }
    }
}

/// Application harness backed by an in-memory SQLite database and the mock
/// gateway. One connection only: each pooled SQLite `:memory:` connection
/// would otherwise see its own empty database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<MockGateway>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let cfg = AppConfig {
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            log_level: "debug".to_string(),
            log_json: false,
            auto_migrate: true,
            admin_email: ADMIN_EMAIL.to_string(),
            cors_allowed_origins: None,
            db_max_connections: 1,
            db_min_connections: 1,
            gateway: GatewayConfig {
                key_id: "key_test_abc".to_string(),
                key_secret: KEY_SECRET.to_string(),
                webhook_secret: WEBHOOK_SECRET.to_string(),
                base_url: "http://127.0.0.1:0".to_string(),
                currency: "INR".to_string(),
                timeout_secs: 2,
            },
        };

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let gateway = Arc::new(MockGateway::default());

        let (event_sender, event_rx) = events::channel(64);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(
            db_arc.clone(),
            &cfg,
            gateway.clone(),
            Arc::new(event_sender.clone()),
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        Self {
            router: app(state.clone()),
            state,
            gateway,
            _event_task: event_task,
        }
    }

    /// Raw request with explicit headers.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        self.router.clone().oneshot(request).await.expect("response")
    }

    /// Request carrying the regular buyer's identity headers.
    pub async fn request_as_user(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(
            method,
            uri,
            &[("x-user-id", USER_ID), ("x-user-email", USER_EMAIL)],
            body,
        )
        .await
    }

    /// Request carrying the admin identity headers.
    pub async fn request_as_admin(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(
            method,
            uri,
            &[("x-user-id", "admin-1"), ("x-user-email", ADMIN_EMAIL)],
            body,
        )
        .await
    }

    /// Posts a raw webhook body with the given signature header.
    pub async fn post_webhook(&self, body: &str, signature: &str) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/payments/webhook")
            .header("content-type", "application/json")
            .header("x-signature", signature)
            .body(Body::from(body.to_string()))
            .expect("request");

        self.router.clone().oneshot(request).await.expect("response")
    }
}

/// Decodes a response body as JSON.
pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Signature the provider would attach to a completed checkout.
pub fn payment_signature(gateway_order_ref: &str, payment_ref: &str) -> String {
    storefront_api::gateway::payment_signature(gateway_order_ref, payment_ref, KEY_SECRET)
}

/// Signature the provider would attach to a webhook body.
pub fn webhook_signature(body: &str) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).expect("hmac key");
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

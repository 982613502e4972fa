//! Integration test support for Opticart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p opticart-integration-tests
//! ```
//!
//! Everything runs in process against the in-memory order store, either
//! through the library API or through the HTTP router with
//! [`tower::ServiceExt::oneshot`]. No database or network is needed.
//!
//! # Test Categories
//!
//! - `checkout_scenarios` - Cart to invoice scenarios against the library
//! - `order_feed` - Live feed scoping and updates
//! - `storefront_http` - The same flows through the router, sessions included

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Method, Request, StatusCode, header};
use opticart_core::{CatalogItem, Order, OrderId, OrderStatus, Price};
use opticart_storefront::checkout::{CheckoutFlow, Field};
use opticart_storefront::config::StorefrontConfig;
use opticart_storefront::middleware::auth::{ADMIN_HEADER, EMAIL_HEADER, USER_ID_HEADER};
use opticart_storefront::middleware::create_memory_session_layer;
use opticart_storefront::orders::{
    ChangeStream, FeedScope, MemoryOrderStore, NewOrder, OrderStore, RepositoryError,
};
use opticart_storefront::state::AppState;
use serde_json::Value;
use tokio::sync::watch;
use tower::ServiceExt;

// =============================================================================
// Fixtures
// =============================================================================

/// Configuration for in-process tests: gateway headers trusted, short feed wait.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig::from_lookup(|key| match key {
        "STOREFRONT_TRUST_AUTH_HEADERS" => Some("true".to_owned()),
        "STOREFRONT_FEED_READY_TIMEOUT_MS" => Some("1000".to_owned()),
        _ => None,
    })
    .expect("test configuration is valid")
}

/// The aviator frame with prescription lenses: 2500 + 500.
#[must_use]
pub fn aviator() -> CatalogItem {
    CatalogItem {
        product_id: "EG-AV-001".into(),
        variant_key: Some("Prescription Power".to_owned()),
        name: "Aviator Frame".to_owned(),
        unit_price: Price::new(2500 + 500),
        image: "/images/aviator.jpg".to_owned(),
    }
}

/// The aviator frame with plain lenses.
#[must_use]
pub fn aviator_plain() -> CatalogItem {
    CatalogItem {
        variant_key: Some("Zero Power".to_owned()),
        unit_price: Price::new(2500),
        ..aviator()
    }
}

/// Valid shipping inputs.
pub const SHIPPING: [(Field, &str); 4] = [
    (Field::Name, "Rahim Uddin"),
    (Field::Phone, "01712345678"),
    (Field::Email, "rahim@example.com"),
    (Field::Address, "House 12, Road 5, Dhanmondi, Dhaka"),
];

/// Fill valid shipping details and move to the payment step.
pub fn fill_shipping(flow: &mut CheckoutFlow) {
    for (field, value) in SHIPPING {
        flow.set_field(field, value);
    }
    assert!(flow.continue_to_payment(), "valid shipping should advance");
}

// =============================================================================
// Scripted Store
// =============================================================================

/// An in-memory order store whose inserts can be held open and whose next
/// IDs can be chosen.
#[derive(Debug, Clone)]
pub struct ScriptedStore {
    memory: MemoryOrderStore,
    next_ids: Arc<Mutex<VecDeque<OrderId>>>,
    gate: Arc<watch::Sender<bool>>,
    inserts: Arc<AtomicUsize>,
}

impl Default for ScriptedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedStore {
    /// A store with an open gate.
    #[must_use]
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            memory: MemoryOrderStore::new(),
            next_ids: Arc::default(),
            gate: Arc::new(gate),
            inserts: Arc::default(),
        }
    }

    /// The underlying store.
    #[must_use]
    pub const fn memory(&self) -> &MemoryOrderStore {
        &self.memory
    }

    /// Make the next insert return `id`.
    pub fn assign_next_id(&self, id: &str) {
        self.next_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(OrderId::new(id));
    }

    /// Hold every insert until [`Self::open_gate`].
    pub fn close_gate(&self) {
        self.gate.send_replace(false);
    }

    /// Release held inserts.
    pub fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    /// How many inserts have been attempted.
    #[must_use]
    pub fn insert_calls(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` inserts have been attempted.
    pub async fn wait_for_inserts(&self, count: usize) {
        while self.insert_calls() < count {
            tokio::task::yield_now().await;
        }
    }
}

impl OrderStore for ScriptedStore {
    async fn insert(&self, order: NewOrder) -> Result<OrderId, RepositoryError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        // The sender lives in `self`, so this cannot fail.
        let _ = gate.wait_for(|open| *open).await;

        let next = self
            .next_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(id) => {
                self.memory.seed(Order::from_payload(
                    id.clone(),
                    order.payload,
                    order.status,
                    order.created_at,
                ));
                Ok(id)
            }
            None => self.memory.insert(order).await,
        }
    }

    async fn get(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        self.memory.get(id).await
    }

    async fn list(&self, scope: &FeedScope) -> Result<Vec<Order>, RepositoryError> {
        self.memory.list(scope).await
    }

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        expected: Option<OrderStatus>,
    ) -> Result<(), RepositoryError> {
        self.memory.update_status(id, status, expected).await
    }

    async fn changes(&self) -> Result<ChangeStream, RepositoryError> {
        self.memory.changes().await
    }
}

// =============================================================================
// HTTP Client
// =============================================================================

/// A storefront router on an in-memory store and session store.
#[must_use]
pub fn test_app(store: MemoryOrderStore) -> Router {
    let config = test_config();
    let session_layer = create_memory_session_layer(&config);
    opticart_storefront::app(AppState::in_memory(config, store), session_layer)
}

/// A response with its body read.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: String,
}

impl TestResponse {
    /// Parse the body as JSON.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body)
            .unwrap_or_else(|e| panic!("response is not JSON ({e}): {}", self.body))
    }
}

/// One browser: keeps its session cookie and optional gateway identity.
#[derive(Debug)]
pub struct TestClient {
    router: Router,
    cookie: Mutex<Option<String>>,
    identity: Vec<(HeaderName, HeaderValue)>,
}

impl TestClient {
    /// An anonymous browser with no session yet.
    #[must_use]
    pub fn new(router: Router) -> Self {
        Self {
            router,
            cookie: Mutex::new(None),
            identity: Vec::new(),
        }
    }

    /// Sign this browser in as a customer.
    #[must_use]
    pub fn customer(mut self, user_id: &str, email: Option<&str>) -> Self {
        self.identity = vec![(
            HeaderName::from_static(USER_ID_HEADER),
            HeaderValue::from_str(user_id).expect("valid header"),
        )];
        if let Some(email) = email {
            self.identity.push((
                HeaderName::from_static(EMAIL_HEADER),
                HeaderValue::from_str(email).expect("valid header"),
            ));
        }
        self
    }

    /// Sign this browser in as an administrator.
    #[must_use]
    pub fn admin(self, user_id: &str) -> Self {
        let mut client = self.customer(user_id, None);
        client.identity.push((
            HeaderName::from_static(ADMIN_HEADER),
            HeaderValue::from_static("true"),
        ));
        client
    }

    fn cookie_header(&self) -> Option<String> {
        self.cookie
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Send a request, keeping any session cookie the response sets.
    pub async fn send(&self, method: Method, uri: &str, body: Option<&Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in &self.identity {
            builder = builder.header(name, value);
        }
        if let Some(cookie) = self.cookie_header() {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("valid request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            && let Some(pair) = set_cookie.split(';').next()
        {
            *self.cookie.lock().unwrap_or_else(PoisonError::into_inner) = Some(pair.to_owned());
        }

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        TestResponse {
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: &Value) -> TestResponse {
        self.send(Method::POST, uri, Some(body)).await
    }
}

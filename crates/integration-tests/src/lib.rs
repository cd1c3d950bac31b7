//! Integration tests for the Emporium storefront.
//!
//! # Running Tests
//!
//! ```bash
//! # HTTP tests over the in-memory store (no external services)
//! cargo test -p emporium-integration-tests
//!
//! # Include the PostgreSQL-backed tests
//! STOREFRONT_DATABASE_URL=postgres://... cargo test -p emporium-integration-tests -- --ignored
//! ```
//!
//! [`TestApp::spawn`] boots the real router on `127.0.0.1:0` over a fresh
//! [`MemoryStore`], so every test gets an isolated server.

#![allow(clippy::missing_panics_doc)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use emporium_storefront::config::StorefrontConfig;
use emporium_storefront::db::MemoryStore;
use emporium_storefront::services::notifier::LogNotifier;
use emporium_storefront::state::AppState;

/// Signing secret for test servers.
pub const TEST_JWT_SECRET: &str = "kX9#mQ2$vL7@pR4!wT8&zN3*bF6^hJ1%";

/// Password that satisfies the sign-up strength rules.
pub const STRONG_PASSWORD: &str = "Sup3r$ecret";

static NEXT_ACCOUNT: AtomicU32 = AtomicU32::new(1);

/// A running storefront and a client pointed at it.
pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    pub store: Arc<MemoryStore>,
}

/// Credentials of an account created by [`TestApp::register`].
pub struct Account {
    pub email: String,
    pub password: String,
    pub token: String,
}

impl TestApp {
    /// Start a server on an ephemeral port.
    pub async fn spawn() -> Self {
        let store = Arc::new(MemoryStore::new());
        let config = StorefrontConfig::local(SecretString::from(TEST_JWT_SECRET));
        let state = AppState::new(config, store.clone(), Arc::new(LogNotifier));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener
            .local_addr()
            .expect("Failed to read listener address");

        tokio::spawn(async move {
            axum::serve(
                listener,
                emporium_storefront::app(state)
                    .into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Test server error");
        });

        Self {
            base_url: format!("http://{addr}"),
            client: Client::new(),
            store,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    #[must_use]
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    #[must_use]
    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    #[must_use]
    pub fn put(&self, path: &str) -> RequestBuilder {
        self.client.put(self.url(path))
    }

    #[must_use]
    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path))
    }

    pub async fn signup(&self, email: &str, password: &str, role: &str) -> Response {
        self.post("/auth/signup")
            .json(&json!({
                "name": "Test Account",
                "email": email,
                "password": password,
                "role": role,
            }))
            .send()
            .await
            .expect("Failed to send signup request")
    }

    pub async fn signin(&self, email: &str, password: &str) -> Response {
        self.post("/auth/signin")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to send signin request")
    }

    /// Sign up a fresh account with `role` and sign it in.
    pub async fn register(&self, role: &str) -> Account {
        let n = NEXT_ACCOUNT.fetch_add(1, Ordering::Relaxed);
        let email = format!("{role}{n}@example.com");

        let resp = self.signup(&email, STRONG_PASSWORD, role).await;
        assert_eq!(resp.status(), StatusCode::CREATED, "signup failed");

        let body = json_body(self.signin(&email, STRONG_PASSWORD).await).await;
        let token = body["access_token"]
            .as_str()
            .expect("signin response has no access_token")
            .to_owned();

        Account {
            email,
            password: STRONG_PASSWORD.to_owned(),
            token,
        }
    }

    /// Create a product as `admin` and return its id.
    pub async fn create_product(
        &self,
        admin: &Account,
        name: &str,
        price: &str,
        stock: i64,
    ) -> i64 {
        let resp = self
            .post("/admin/products")
            .bearer_auth(&admin.token)
            .json(&json!({
                "name": name,
                "description": format!("{name} description"),
                "price": price,
                "stock": stock,
                "category": "Electronics",
            }))
            .send()
            .await
            .expect("Failed to send create product request");
        assert_eq!(resp.status(), StatusCode::CREATED, "create product failed");

        json_body(resp).await["product"]["id"]
            .as_i64()
            .expect("created product has no id")
    }

    pub async fn add_to_cart(
        &self,
        shopper: &Account,
        product_id: i64,
        quantity: i64,
    ) -> Response {
        self.post("/cart")
            .bearer_auth(&shopper.token)
            .json(&json!({ "product_id": product_id, "quantity": quantity }))
            .send()
            .await
            .expect("Failed to send add to cart request")
    }

    /// Public stock of a product.
    pub async fn stock(&self, product_id: i64) -> i64 {
        let resp = self
            .get(&format!("/products/{product_id}"))
            .send()
            .await
            .expect("Failed to fetch product");
        json_body(resp).await["stock"]
            .as_i64()
            .expect("product has no stock")
    }
}

/// Parse a response body as JSON.
pub async fn json_body(resp: Response) -> Value {
    resp.json().await.expect("Response body is not JSON")
}

/// Assert the error envelope and return its message.
pub async fn error_message(resp: Response, status: StatusCode) -> String {
    assert_eq!(resp.status(), status);
    let body = json_body(resp).await;
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], status.as_u16());
    body["message"]
        .as_str()
        .expect("error envelope has no message")
        .to_owned()
}

//! Integration tests for Shoplane.
//!
//! Each test spawns the full API router on an ephemeral port, backed by a
//! fresh in-memory store seeded with [`CATALOG`], and talks to it over HTTP
//! with a cookie-carrying client. No database or external service is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shoplane-integration-tests
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::{Value, json};
use shoplane_api::config::ApiConfig;
use shoplane_api::db::{Database, MemoryStore};
use shoplane_api::routes;
use shoplane_api::services::tokens::{Claims, TokenKind};
use shoplane_api::state::AppState;
use shoplane_core::{Email, UserRole};

/// Password that satisfies the registration rules.
pub const PASSWORD: &str = "Sunflower#42";

/// Products every test app starts with.
///
/// 1 and 4 share a category, 3 is out of stock.
pub const CATALOG: &str = r#"[
    {
        "id": 1,
        "title": "Wireless Earbuds",
        "description": "Bluetooth earbuds with charging case",
        "price": 10.00,
        "rating": 4.2,
        "reviews": 310,
        "image": "https://cdn.shoplane.test/earbuds.jpg",
        "category": "Electronics",
        "brand": "Sonique",
        "stockCount": 50
    },
    {
        "id": 2,
        "title": "Trail Backpack",
        "description": "28 litre hiking pack",
        "price": 49.99,
        "originalPrice": 79.99,
        "rating": 4.5,
        "reviews": 88,
        "image": "https://cdn.shoplane.test/backpack.jpg",
        "category": "Sports & Outdoors",
        "brand": "Ridgeway",
        "stockCount": 12,
        "freeShipping": true
    },
    {
        "id": 3,
        "title": "Brass Desk Lamp",
        "description": "Adjustable lamp with warm bulb",
        "price": 34.50,
        "image": "https://cdn.shoplane.test/lamp.jpg",
        "category": "Home & Kitchen",
        "brand": "Lumen",
        "inStock": false,
        "stockCount": 0
    },
    {
        "id": 4,
        "title": "Noise Cancelling Headphones",
        "description": "Over-ear headphones with 30 hour battery",
        "price": 199.99,
        "rating": 4.7,
        "reviews": 1204,
        "image": "https://cdn.shoplane.test/headphones.jpg",
        "category": "Electronics",
        "brand": "Sonique",
        "stockCount": 8,
        "prime": true
    }
]"#;

const JWT_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";
const JWT_REFRESH_SECRET: &str = "Zq8!Lm3@Vt6#Hy1$Rk4%Nw7^Gp0&Dc2*";
const COOKIE_SECRET: &str = "Fj5*Ts2&Qb9^Wm4%Xe7$Kd1#Ur8@Hn3!";

/// A running API server.
pub struct TestApp {
    pub addr: SocketAddr,
    pub db: Database,
    /// State shared with the server, for signing tokens directly.
    pub state: AppState,
    /// Client with a cookie store, so sign-in carries across requests.
    pub client: Client,
}

impl TestApp {
    /// Spawn an app with rate limiting disabled.
    pub async fn spawn() -> Self {
        Self::spawn_with(&[("RATE_LIMIT_ENABLED", "false")]).await
    }

    /// Spawn an app with extra environment variables.
    pub async fn spawn_with(vars: &[(&str, &str)]) -> Self {
        let mut env: HashMap<String, String> = [
            ("APP_ENV", "test"),
            ("JWT_SECRET", JWT_SECRET),
            ("JWT_REFRESH_SECRET", JWT_REFRESH_SECRET),
            ("COOKIE_SECRET", COOKIE_SECRET),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
        for (k, v) in vars {
            env.insert((*k).to_owned(), (*v).to_owned());
        }
        let config =
            ApiConfig::from_lookup(|key| env.get(key).cloned()).expect("Invalid test config");

        let store = MemoryStore::new();
        store
            .load_catalog_json(CATALOG)
            .await
            .expect("Invalid test catalog");
        let db = Database::memory(store);

        let state = AppState::new(config, db.clone()).expect("Failed to build state");
        let app = routes::app(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("No local address");
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Test server failed");
        });

        Self {
            addr,
            db,
            state,
            client: cookie_client(),
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET failed")
    }

    pub async fn post(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("POST failed")
    }

    pub async fn put(&self, path: &str, body: &Value) -> Response {
        self.client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .expect("PUT failed")
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Response {
        self.client
            .patch(self.url(path))
            .json(body)
            .send()
            .await
            .expect("PATCH failed")
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .expect("DELETE failed")
    }

    /// Register an account; the client is signed in afterwards.
    pub async fn register(&self, name: &str, email: &str) -> Response {
        self.post(
            "/api/auth/register",
            &json!({ "name": name, "email": email, "password": PASSWORD }),
        )
        .await
    }

    /// Sign in as an existing account.
    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.post(
            "/api/auth/login",
            &json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Register and sign in as an administrator.
    pub async fn register_admin(&self, email: &str) {
        let resp = self.register("Store Admin", email).await;
        assert_eq!(resp.status(), 201);
        self.db
            .users()
            .set_role(&Email::parse(email).expect("Invalid email"), UserRole::Admin)
            .await
            .expect("Failed to promote admin");
    }

    /// Sign an access token for a registered account, letting `adjust`
    /// rewrite the claims first.
    pub async fn access_token(&self, email: &str, adjust: impl FnOnce(&mut Claims)) -> String {
        let user = self
            .db
            .users()
            .get_by_email(&Email::parse(email).expect("Invalid email"))
            .await
            .expect("User lookup failed")
            .expect("No such user");
        let mut claims = Claims::new(&user, TokenKind::Access, Duration::from_secs(900));
        adjust(&mut claims);
        self.state
            .tokens()
            .sign(&claims)
            .expect("Failed to sign token")
    }

    /// A second signed-out client against the same server.
    #[must_use]
    pub fn other_client(&self) -> Client {
        cookie_client()
    }
}

fn cookie_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Read a JSON body.
pub async fn body(resp: Response) -> Value {
    resp.json().await.expect("Response was not JSON")
}

/// Read a numeric field as `f64`.
#[must_use]
pub fn number(value: &Value) -> f64 {
    value.as_f64().expect("Expected a number")
}

/// Compare money amounts to the cent.
pub fn assert_money(value: &Value, expected: f64) {
    let actual = number(value);
    assert!(
        (actual - expected).abs() < 0.005,
        "expected {expected}, got {actual}"
    );
}

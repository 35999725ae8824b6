use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request},
    middleware, Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use tressa_api::{
    auth::{AuthConfig, AuthService, ROLE_ADMIN},
    config::AppConfig,
    db,
    entities::product,
    events::{self, EventSender},
    handlers::AppServices,
    notifications::NoopMailer,
    pubsub::InMemoryPublisher,
    AppState,
};

const TEST_JWT_SECRET: &str =
    "integration_test_jwt_secret_that_is_long_enough_for_hs256_0123456789abcdef";

/// Helper harness spinning up the full application state backed by a
/// throwaway SQLite database and an in-memory pub/sub bus.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub publisher: Arc<InMemoryPublisher>,
    pub buyer_id: Uuid,
    buyer_token: String,
    admin_token: String,
    auth_service: Arc<AuthService>,
    db_file: std::path::PathBuf,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_file = std::env::temp_dir().join(format!(
            "tressa_test_{}.db",
            Uuid::new_v4().simple()
        ));
        let _ = std::fs::remove_file(&db_file);

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_file.display()),
            "redis://127.0.0.1:6379".to_string(),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        // A single pooled connection serializes writes, which keeps SQLite
        // happy under the concurrent checkout tests.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");

        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);

        let publisher = Arc::new(InMemoryPublisher::default());
        let event_task = tokio::spawn(events::process_events(
            event_rx,
            publisher.clone() as Arc<dyn tressa_api::pubsub::Publisher>,
            Arc::new(NoopMailer),
        ));

        let redis_client = Arc::new(
            redis::Client::open(cfg.redis_url.clone()).expect("invalid redis url for tests"),
        );

        let auth_service = Arc::new(AuthService::new(AuthConfig::new(
            cfg.jwt_secret.clone(),
            cfg.auth_issuer.clone(),
            cfg.auth_audience.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
        )));

        let services = AppServices::new(db_arc.clone(), Arc::new(event_sender.clone()), &cfg);

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
            redis: redis_client,
        };

        let buyer_id = Uuid::new_v4();
        let buyer_token = auth_service
            .generate_token(
                buyer_id,
                Some("Asha Nair".to_string()),
                Some("asha@example.com".to_string()),
                vec!["customer".to_string()],
            )
            .expect("mint buyer token");
        let admin_token = auth_service
            .generate_token(
                Uuid::new_v4(),
                Some("Back Office".to_string()),
                Some("ops@tressa.shop".to_string()),
                vec![ROLE_ADMIN.to_string()],
            )
            .expect("mint admin token");

        let auth_service_for_layer = auth_service.clone();
        let api_router = tressa_api::api_v1_routes().layer(middleware::from_fn_with_state(
            auth_service_for_layer,
            |axum::extract::State(auth): axum::extract::State<Arc<AuthService>>,
             mut req: Request<Body>,
             next: axum::middleware::Next| async move {
                req.extensions_mut().insert(auth);
                next.run(req).await
            },
        ));

        let router = Router::new()
            .nest("/api/v1", api_router)
            .with_state(state.clone());

        Self {
            router,
            state,
            publisher,
            buyer_id,
            buyer_token,
            admin_token,
            auth_service,
            db_file,
            _event_task: event_task,
        }
    }

    pub fn buyer_token(&self) -> &str {
        &self.buyer_token
    }

    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }

    /// Mint a token for a second buyer.
    pub fn token_for(&self, customer_id: Uuid, name: &str) -> String {
        self.auth_service
            .generate_token(customer_id, Some(name.to_string()), None, vec![
                "customer".to_string(),
            ])
            .expect("mint token")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn request_as_buyer(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(&self.buyer_token))
            .await
    }

    pub async fn request_as_admin(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(&self.admin_token))
            .await
    }

    /// Seed a catalog product with the given price and stock.
    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            slug: Set(name.to_lowercase().replace(' ', "-")),
            description: Set(Some(format!("{} seeded for integration tests", name))),
            price: Set(price),
            currency: Set("INR".to_string()),
            image_url: Set(Some(format!(
                "https://cdn.tressa.shop/products/{}.jpg",
                name.to_lowercase().replace(' ', "-")
            ))),
            stock_quantity: Set(stock),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product for tests")
    }

    /// Re-read a product's stock directly from the database.
    pub async fn product_stock(&self, product_id: Uuid) -> i32 {
        use sea_orm::EntityTrait;
        product::Entity::find_by_id(product_id)
            .one(&*self.state.db)
            .await
            .expect("fetch product")
            .expect("product exists")
            .stock_quantity
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
        let _ = std::fs::remove_file(&self.db_file);
    }
}

/// Standard cart line payload for a seeded product.
pub fn cart_line(product: &product::Model, quantity: i32, stock: i32) -> Value {
    serde_json::json!({
        "product_id": product.id,
        "name": product.name,
        "unit_price": product.price.to_string(),
        "quantity": quantity,
        "stock": stock,
    })
}

/// Complete shipping address payload.
pub fn shipping_address() -> Value {
    serde_json::json!({
        "name": "Asha Nair",
        "phone": "+91 98450 12345",
        "street": "14 Brigade Road",
        "city": "Bengaluru",
        "state": "Karnataka",
        "postal_code": "560001",
        "country": "IN",
    })
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

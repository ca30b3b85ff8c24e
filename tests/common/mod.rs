// Not every test binary exercises every helper.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use glowcart_api::{
    auth::{AuthService, AuthUser},
    config::AppConfig,
    db,
    entities::{product, supplier, user, user::UserRole},
    events::{self, EventSender},
    handlers::AppServices,
    services::provider::{CheckoutProvider, StaticProvider},
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Test harness backed by a throwaway SQLite database migrated with the
/// real migrator and wired with the canned checkout provider.
pub struct TestApp {
    pub state: AppState,
    _tmp: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_provider(Arc::new(StaticProvider::default())).await
    }

    pub async fn with_provider(provider: Arc<dyn CheckoutProvider>) -> Self {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let db_path = tmp.path().join("glowcart_test.db");
        let cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "test_secret_key_long_enough_for_hs256_usage",
        );

        let pool = db::establish_connection(&cfg)
            .await
            .expect("failed to open test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");
        let db = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(db.clone(), event_sender.clone(), provider, &cfg);
        let auth = AuthService::new(cfg.jwt_secret.clone(), cfg.jwt_expiration_secs);

        let state = AppState {
            db,
            config: cfg,
            auth,
            event_sender,
            services,
        };

        Self { state, _tmp: tmp }
    }

    pub async fn seed_user(&self, role: UserRole) -> AuthUser {
        let id = Uuid::new_v4();
        let suffix = &id.simple().to_string()[..8];
        user::ActiveModel {
            id: Set(id),
            username: Set(format!("user_{suffix}")),
            email: Set(format!("user_{suffix}@example.test")),
            password_hash: Set("unused-in-tests".to_string()),
            role: Set(role),
            full_name: Set(None),
            active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed user");

        AuthUser {
            user_id: id,
            role,
            name: None,
        }
    }

    pub async fn seed_product(
        &self,
        created_by: Uuid,
        price: Decimal,
        stock_quantity: i32,
        expiry_date: Option<DateTime<Utc>>,
    ) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(format!("Test Product {}", &Uuid::new_v4().simple().to_string()[..6])),
            description: Set(None),
            brand: Set(None),
            category: Set(Some("skincare".to_string())),
            image_url: Set(None),
            price: Set(price),
            sale_price: Set(None),
            is_on_sale: Set(false),
            stock_quantity: Set(stock_quantity),
            expiry_date: Set(expiry_date),
            created_by: Set(created_by),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed product")
    }

    pub async fn seed_supplier(&self) -> supplier::Model {
        let now = Utc::now();
        let suffix = &Uuid::new_v4().simple().to_string()[..6];
        supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(format!("SUP-{suffix}")),
            name: Set("Test Supplier".to_string()),
            contact_name: Set(None),
            email: Set(None),
            phone: Set(None),
            address: Set(None),
            status: Set(supplier::SupplierStatus::Active),
            rating: Set(5),
            total_orders: Set(0),
            total_value: Set(Decimal::ZERO),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed supplier")
    }
}

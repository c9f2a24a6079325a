pub mod addresses;
pub mod orders;
pub mod payment_webhooks;
pub mod payments;
pub mod products;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::gateway::PaymentGateway;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers.
/// Built once at process start and passed explicitly; no ambient singletons.
#[derive(Clone)]
pub struct AppServices {
    pub checkout: Arc<crate::services::checkout::CheckoutService>,
    pub orders: Arc<crate::services::orders::OrderService>,
    pub addresses: Arc<crate::services::addresses::AddressService>,
    pub products: Arc<crate::services::products::ProductService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        config: &AppConfig,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        let checkout = Arc::new(crate::services::checkout::CheckoutService::new(
            db_pool.clone(),
            gateway.clone(),
            config.gateway.clone(),
            Some(event_sender.clone()),
        ));
        let orders = Arc::new(crate::services::orders::OrderService::new(
            db_pool.clone(),
            gateway,
            Some(event_sender.clone()),
        ));
        let addresses = Arc::new(crate::services::addresses::AddressService::new(
            db_pool.clone(),
            Some(event_sender),
        ));
        let products = Arc::new(crate::services::products::ProductService::new(db_pool));

        Self {
            checkout,
            orders,
            addresses,
            products,
        }
    }
}

use std::sync::Arc;

use trekora_core::{BookingOrchestrator, EngineStore, LeadOrchestrator};
use trekora_store::app_config::BusinessRules;

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingOrchestrator>,
    pub leads: Arc<LeadOrchestrator>,
    pub business_rules: BusinessRules,
}

impl AppState {
    pub fn new(store: Arc<dyn EngineStore>, business_rules: BusinessRules) -> Self {
        Self {
            bookings: Arc::new(BookingOrchestrator::new(
                store.clone(),
                business_rules.cancellation_buffer_days,
            )),
            leads: Arc::new(LeadOrchestrator::new(store)),
            business_rules,
        }
    }
}

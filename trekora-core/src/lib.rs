pub mod error;
pub mod orchestrator;
pub mod store;

pub use error::{EngineError, EngineResult};
pub use orchestrator::{BookingOrchestrator, BookingRequest, LeadOrchestrator, UnlockReceipt};
pub use store::{BookingStore, CatalogStore, EngineStore, LeadStore};

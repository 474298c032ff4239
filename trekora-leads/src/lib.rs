pub mod ledger;
pub mod models;

pub use ledger::{CreditLedger, LedgerError, UnlockOutcome};
pub use models::{CreditPackage, Lead, LeadContact, LeadPurchase, LeadUnlock};

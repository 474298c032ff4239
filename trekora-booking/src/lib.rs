pub mod lifecycle;
pub mod models;
pub mod refund;
pub mod wallet;

pub use lifecycle::BookingError;
pub use models::{Booking, BookingStatus, RefundStatus};
pub use refund::{compute_refund, RefundError, RefundQuote};
pub use wallet::WalletEntry;

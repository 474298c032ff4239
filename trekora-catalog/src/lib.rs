pub mod promo;
pub mod slots;
pub mod trip;

pub use promo::{DiscountType, PromoCode, PromoStatus};
pub use slots::SlotError;
pub use trip::{BatchStatus, CancellationRule, TravelerDetail, Trip, TripBatch};

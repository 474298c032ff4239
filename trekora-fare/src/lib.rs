pub mod calculator;
pub mod promo_gate;

pub use calculator::{compute_fare, FareBreakdown, FareError, FareRequest};
pub use promo_gate::{validate_promo, PromoRejection};

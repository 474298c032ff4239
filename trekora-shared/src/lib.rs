pub mod money;
pub mod pii;

pub use money::{clamp_non_negative, percentage_of, round_money};
pub use pii::Masked;

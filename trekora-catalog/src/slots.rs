use crate::trip::TripBatch;

/// Slot accounting errors for a departure batch
#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("Slot count must be positive, got {0}")]
    NonPositiveCount(i32),

    #[error("Insufficient slots: requested {requested}, available {available}")]
    InsufficientSlots { requested: i32, available: i32 },

    #[error("Slot restore would exceed capacity: available {available} + restored {restored} > max {max}")]
    ExceedsCapacity {
        available: i32,
        restored: i32,
        max: i32,
    },
}

impl TripBatch {
    /// Takes `count` slots for a confirmed booking. Only a booking commit
    /// may call this; available_slots never drops below zero.
    pub fn take_slots(&mut self, count: i32) -> Result<(), SlotError> {
        if count <= 0 {
            return Err(SlotError::NonPositiveCount(count));
        }
        if self.available_slots < count {
            return Err(SlotError::InsufficientSlots {
                requested: count,
                available: self.available_slots,
            });
        }
        self.available_slots -= count;
        Ok(())
    }

    /// Returns `count` slots freed by a cancellation. available_slots never
    /// exceeds max_participants; an overshoot indicates ledger drift.
    pub fn restore_slots(&mut self, count: i32) -> Result<(), SlotError> {
        if count <= 0 {
            return Err(SlotError::NonPositiveCount(count));
        }
        if self.available_slots + count > self.max_participants {
            return Err(SlotError::ExceedsCapacity {
                available: self.available_slots,
                restored: count,
                max: self.max_participants,
            });
        }
        self.available_slots += count;
        Ok(())
    }
}

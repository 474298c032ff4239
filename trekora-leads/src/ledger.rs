use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CreditPackage, LeadPurchase, LeadUnlock};

/// Per-organizer running balance of purchased, unspent lead-unlock credits
/// plus its append-only audit history. Every balance mutation pairs with a
/// history row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditLedger {
    pub organizer_id: Uuid,
    pub available: i32,
    pub purchases: Vec<LeadPurchase>,
    pub unlocks: Vec<LeadUnlock>,
}

/// Result of an unlock applied to the ledger. Re-unlocking an already
/// unlocked lead succeeds without spending a second credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    Unlocked { remaining: i32 },
    AlreadyUnlocked { remaining: i32 },
}

impl UnlockOutcome {
    pub fn remaining(&self) -> i32 {
        match self {
            UnlockOutcome::Unlocked { remaining } => *remaining,
            UnlockOutcome::AlreadyUnlocked { remaining } => *remaining,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("No credits remaining")]
    InsufficientCredits,

    #[error("Credit package \"{0}\" grants no credits")]
    EmptyPackage(String),

    #[error("Duplicate unlock rows for organizer {organizer_id} and lead {lead_id}")]
    DuplicateUnlock { organizer_id: Uuid, lead_id: Uuid },

    #[error("Ledger drift for organizer {organizer_id}: available {available}, history implies {expected}")]
    Drift {
        organizer_id: Uuid,
        available: i32,
        expected: i32,
    },
}

impl CreditLedger {
    pub fn new(organizer_id: Uuid) -> Self {
        Self {
            organizer_id,
            available: 0,
            purchases: Vec::new(),
            unlocks: Vec::new(),
        }
    }

    pub fn has_unlocked(&self, lead_id: Uuid) -> bool {
        self.unlocks.iter().any(|u| u.lead_id == lead_id)
    }

    /// Adds a package's credits and the paired purchase row in one step.
    pub fn apply_purchase(&mut self, package: &CreditPackage) -> Result<LeadPurchase, LedgerError> {
        if package.credits <= 0 {
            return Err(LedgerError::EmptyPackage(package.name.clone()));
        }
        self.available += package.credits;
        let purchase = LeadPurchase::new(self.organizer_id, package, self.available);
        self.purchases.push(purchase.clone());
        Ok(purchase)
    }

    /// Spends one credit for `lead_id`, appending the unlock row, or
    /// reports an idempotent hit when the lead was already unlocked. The
    /// caller must hold whatever lock serializes this organizer's ledger.
    pub fn apply_unlock(&mut self, lead_id: Uuid) -> Result<UnlockOutcome, LedgerError> {
        if self.has_unlocked(lead_id) {
            return Ok(UnlockOutcome::AlreadyUnlocked {
                remaining: self.available,
            });
        }
        if self.available < 1 {
            return Err(LedgerError::InsufficientCredits);
        }
        self.available -= 1;
        self.unlocks
            .push(LeadUnlock::new(self.organizer_id, lead_id, self.available));
        Ok(UnlockOutcome::Unlocked {
            remaining: self.available,
        })
    }

    /// Audits the balance against the history: purchased credits minus one
    /// per unlock must equal `available`, and no lead may appear twice.
    /// A failure here is ledger drift, reported and never auto-corrected.
    pub fn check_consistency(&self) -> Result<(), LedgerError> {
        for (i, unlock) in self.unlocks.iter().enumerate() {
            if self.unlocks[..i].iter().any(|u| u.lead_id == unlock.lead_id) {
                return Err(LedgerError::DuplicateUnlock {
                    organizer_id: self.organizer_id,
                    lead_id: unlock.lead_id,
                });
            }
        }

        let purchased: i32 = self.purchases.iter().map(|p| p.credits_granted).sum();
        let expected = purchased - self.unlocks.len() as i32;
        if self.available != expected || self.available < 0 {
            return Err(LedgerError::Drift {
                organizer_id: self.organizer_id,
                available: self.available,
                expected,
            });
        }
        Ok(())
    }
}

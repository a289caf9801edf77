use tracing::{info, warn};

use crate::destination::{Destination, Filter};
use crate::models::OwnerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub expected: usize,
    pub actual: Option<usize>,
}

impl Verification {
    pub fn matched(&self) -> bool {
        self.actual == Some(self.expected)
    }
}

/// Count the owner's rows and compare with what the loader reported. Purely
/// diagnostic: the write has already happened, so every problem is a warning.
pub fn verify<D: Destination + ?Sized>(
    dest: &D,
    table: &str,
    owner_column: &str,
    owner: &OwnerId,
    expected: usize,
) -> Verification {
    let actual = match dest.count(table, &Filter::eq(owner_column, owner.as_str())) {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("verification count failed: {e}");
            None
        }
    };
    let verification = Verification { expected, actual };
    if verification.matched() {
        info!(expected, "migration verified");
    } else if let Some(n) = actual {
        warn!("count mismatch ({n} vs {expected})");
    }
    verification
}

//! Proposal lifecycle: proposing, voting, promotion and setlist ordering.
//!
//! Every mutating operation runs in one `BEGIN IMMEDIATE` transaction that
//! also writes its audit entry, and publishes a change event only after the
//! commit succeeded.

pub mod ordering;
pub mod promotion;
pub mod proposals;
pub mod validation;
pub mod votes;

pub use ordering::SetlistOrdering;
pub use promotion::{Promotion, PromotionEngine};
pub use proposals::{PROPOSALS_PER_WINDOW, ProposalRepository, RATE_WINDOW_MINUTES};
pub use validation::{ProposalInput, ProposalPatchInput, http_url_error, validate_email};
pub use votes::VoteLedger;

use crate::error::{SetlistError, SetlistResult};
use crate::models::Identity;

pub(crate) fn require_admin(actor: &Identity) -> SetlistResult<()> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(SetlistError::Forbidden("Admin access required".to_string()))
    }
}

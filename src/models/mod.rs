//! Models for the setlist service.

pub mod audit;
pub mod proposal;
pub mod settings;
pub mod user;

pub use audit::{AuditAction, AuditEntry};
pub use proposal::{PendingProposal, Proposal, ProposalStatus, ProposalSummary};
pub use settings::Settings;
pub use user::{Identity, User, UserSummary};

//! Proposal model and related types.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a proposal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    #[default]
    Pending,
    Approved,
    /// Reachable only through an admin edit.
    Archived,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "PENDING",
            ProposalStatus::Approved => "APPROVED",
            ProposalStatus::Archived => "ARCHIVED",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ProposalStatus::Pending),
            "APPROVED" => Ok(ProposalStatus::Approved),
            "ARCHIVED" => Ok(ProposalStatus::Archived),
            other => Err(format!("unknown proposal status '{other}'")),
        }
    }
}

/// A song proposal (domain model).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: i32,
    pub proposer_id: i32,
    pub title: String,
    pub artist: String,
    pub chart_url: Option<String>,
    pub lyrics_url: Option<String>,
    pub youtube_url: Option<String>,
    pub status: ProposalStatus,
    /// Position in the setlist; only meaningful while approved.
    pub setlist_order: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A pending proposal as shown on the voting page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingProposal {
    pub id: i32,
    pub title: String,
    pub artist: String,
    pub chart_url: Option<String>,
    pub lyrics_url: Option<String>,
    pub youtube_url: Option<String>,
    /// Number of votes cast so far.
    pub votes: i64,
    /// Whether the viewer has voted for it.
    pub mine: bool,
    /// Vote threshold in effect when the list was read.
    pub threshold: i32,
}

/// Compact row for the admin overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalSummary {
    pub id: i32,
    pub title: String,
    pub artist: String,
    pub status: ProposalStatus,
}

impl From<&Proposal> for ProposalSummary {
    fn from(proposal: &Proposal) -> Self {
        Self {
            id: proposal.id,
            title: proposal.title.clone(),
            artist: proposal.artist.clone(),
            status: proposal.status,
        }
    }
}

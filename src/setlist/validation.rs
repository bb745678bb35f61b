//! Input validation for proposals and user management.
//!
//! Everything here runs before a transaction is opened, so a rejected request
//! never touches the database.

use serde::{Deserialize, Deserializer};
use url::{Host, Url};

use crate::error::{SetlistError, SetlistResult};
use crate::models::ProposalStatus;

/// Client-supplied proposal fields for the create operations.
///
/// Unknown fields (such as a client-chosen `status`) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProposalInput {
    pub title: String,
    pub artist: String,
    pub chart_url: Option<String>,
    pub lyrics_url: Option<String>,
    pub youtube_url: Option<String>,
}

/// Validated fields for a new proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProposal {
    pub title: String,
    pub artist: String,
    pub chart_url: Option<String>,
    pub lyrics_url: Option<String>,
    pub youtube_url: Option<String>,
}

impl ProposalInput {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            ..Default::default()
        }
    }

    pub fn validate(self) -> SetlistResult<NewProposal> {
        Ok(NewProposal {
            title: required_text("title", &self.title)?,
            artist: required_text("artist", &self.artist)?,
            chart_url: optional_url("chartUrl", self.chart_url.as_deref())?,
            lyrics_url: optional_url("lyricsUrl", self.lyrics_url.as_deref())?,
            youtube_url: optional_url("youtubeUrl", self.youtube_url.as_deref())?,
        })
    }
}

/// Client-supplied partial update.
///
/// For the URL fields, an absent key leaves the value alone while `null` or
/// `""` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProposalPatchInput {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub status: Option<ProposalStatus>,
    #[serde(deserialize_with = "present")]
    pub chart_url: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub lyrics_url: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub youtube_url: Option<Option<String>>,
}

/// Validated partial update. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposalPatch {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub status: Option<ProposalStatus>,
    pub chart_url: Option<Option<String>>,
    pub lyrics_url: Option<Option<String>>,
    pub youtube_url: Option<Option<String>>,
}

impl ProposalPatchInput {
    pub fn validate(self) -> SetlistResult<ProposalPatch> {
        Ok(ProposalPatch {
            title: self.title.map(|t| required_text("title", &t)).transpose()?,
            artist: self.artist.map(|a| required_text("artist", &a)).transpose()?,
            status: self.status,
            chart_url: patch_url("chartUrl", self.chart_url)?,
            lyrics_url: patch_url("lyricsUrl", self.lyrics_url)?,
            youtube_url: patch_url("youtubeUrl", self.youtube_url)?,
        })
    }
}

/// Distinguishes an explicit `null` (`Some(None)`) from a missing key (`None`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn required_text(field: &str, value: &str) -> SetlistResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SetlistError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Empty means absent; anything else must be an http(s) URL.
fn optional_url(field: &str, value: Option<&str>) -> SetlistResult<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    match http_url_error(value) {
        None => Ok(Some(value.to_string())),
        Some(reason) => Err(SetlistError::validation(format!("{field}: {reason}"))),
    }
}

fn patch_url(field: &str, value: Option<Option<String>>) -> SetlistResult<Option<Option<String>>> {
    value
        .map(|inner| optional_url(field, inner.as_deref()))
        .transpose()
}

/// Check that `value` is an absolute http(s) URL with a usable host.
///
/// Returns the reason it is not, or `None` when it is. The host must be
/// `localhost`, an IP address, or a dotted domain name.
pub fn http_url_error(value: &str) -> Option<&'static str> {
    let v = value.trim();
    if v.is_empty() {
        return Some("Empty URL");
    }

    let lower = v.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return Some("Must start with http(s)://");
    }
    if v.chars().any(char::is_whitespace) {
        return Some("Invalid URL");
    }

    let Ok(url) = Url::parse(v) else {
        return Some("Invalid URL");
    };

    match url.host() {
        None => Some("Missing host"),
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => None,
        Some(Host::Domain(domain)) => domain_error(domain),
    }
}

/// Shape check of a domain name. The TLD must be at least two letters or a
/// punycode label; it is not looked up in a suffix list.
fn domain_error(domain: &str) -> Option<&'static str> {
    if domain.eq_ignore_ascii_case("localhost") {
        return None;
    }
    if domain.contains('_') {
        return Some("Invalid URL");
    }
    if !domain.contains('.') {
        return Some("Domain must contain a dot or be localhost");
    }
    if domain.split('.').any(str::is_empty) {
        return Some("Invalid domain/TLD");
    }

    let tld = domain.rsplit('.').next().unwrap_or_default();
    let tld_ok = tld.len() >= 2
        && (tld.chars().all(|c| c.is_ascii_alphabetic()) || tld.starts_with("xn--"));
    if !tld_ok {
        return Some("Invalid domain/TLD");
    }
    None
}

/// Whether `value` is an http(s) URL accepted for proposal links.
pub fn is_http_url(value: &str) -> bool {
    http_url_error(value).is_none()
}

/// Loose email shape check: `local@domain.tld`, no whitespace.
pub fn validate_email(value: &str) -> SetlistResult<String> {
    let email = value.trim().to_lowercase();
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.contains('@')
            && !email.chars().any(char::is_whitespace)
            && domain
                .char_indices()
                .any(|(i, c)| c == '.' && i > 0 && i < domain.len() - 1)
    });

    if valid {
        Ok(email)
    } else {
        Err(SetlistError::validation("Invalid email"))
    }
}

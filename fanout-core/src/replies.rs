//! Inbound reply classification
//!
//! Caregivers answer a shift offer with free text. Keyword matching decides
//! whether the reply claims the shift. A reply that reads as both ("yes... no
//! wait, I can't") counts as a decline.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static ACCEPT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(yes|yep|yeah|accept|accepted|claim|ok|okay|sure|i can|i'll take|count me in)\b")
        .expect("ACCEPT_PATTERN regex should compile")
});

static DECLINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(no|nope|decline|declined|pass|can't|cannot|can not|won't|unable|unavailable|not available|not sure)\b",
    )
    .expect("DECLINE_PATTERN regex should compile")
});

/// What a caregiver's reply means for the offered shift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyIntent {
    Accept,
    Decline,
    Unknown,
}

/// Classify a free-text reply.
pub fn parse_reply_intent(body: &str) -> ReplyIntent {
    // Phones often substitute typographic apostrophes
    let body = body.trim().replace(['\u{2019}', '\u{2018}'], "'");
    if DECLINE_PATTERN.is_match(&body) {
        ReplyIntent::Decline
    } else if ACCEPT_PATTERN.is_match(&body) {
        ReplyIntent::Accept
    } else {
        ReplyIntent::Unknown
    }
}

//! Two-stage news qualification: an attention hook in the leading words and
//! topical relevance anywhere in the body.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::sync::LazyLock;

use super::SocialPost;

/// Attention markers recognised at the start of a post.
pub const HOOKS: &[&str] = &["BREAKING", "JUST IN", "ALERT", "URGENT", "DEVELOPING"];

/// How many leading words are searched for a hook.
const HOOK_WINDOW_WORDS: usize = 5;

const SCORE_BOTH: f64 = 100.0;
const SCORE_HOOK_ONLY: f64 = 60.0;
const SCORE_RELEVANT_ONLY: f64 = 40.0;
const FRESH_BONUS: f64 = 20.0;
const MEDIA_BONUS: f64 = 10.0;

/// Regulatory, institutional, exchange, macro and market-structure terms.
static RELEVANCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(sec|cftc|etfs?|regulat\w*|lawsuit|sued|ban(?:s|ned)?|approv\w*|blackrock|fidelity|grayscale|microstrategy|binance|coinbase|kraken|okx|bybit|tether|circle|fed|fomc|powell|rate (?:cut|hike)s?|interest rates?|cpi|inflation|treasury|tariffs?|federal reserve|strategic reserve|stablecoins?|hack(?:ed)?|exploit(?:ed)?|liquidat\w*)\b",
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy)]
pub struct NewsPolicy {
    /// Posts older than this are discarded outright.
    pub max_age: Duration,
    /// Posts younger than this earn the freshness bonus.
    pub fresh_window: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub hook: bool,
    pub relevant: bool,
    pub priority: f64,
}

pub fn has_hook(text: &str) -> bool {
    let leading = text
        .split_whitespace()
        .take(HOOK_WINDOW_WORDS)
        .collect::<Vec<_>>()
        .join(" ");

    HOOKS.iter().any(|hook| leading.contains(hook))
}

pub fn is_relevant(text: &str) -> bool {
    RELEVANCE.is_match(text)
}

/// Scores a post from a monitored account. `None` when the post is too old or
/// matches neither stage.
pub fn assess(post: &SocialPost, now: DateTime<Utc>, policy: &NewsPolicy) -> Option<Assessment> {
    let age = now - post.created_at;
    if age > policy.max_age {
        return None;
    }

    let hook = has_hook(&post.text);
    let relevant = is_relevant(&post.text);

    let mut priority = match (hook, relevant) {
        (true, true) => SCORE_BOTH,
        (true, false) => SCORE_HOOK_ONLY,
        (false, true) => SCORE_RELEVANT_ONLY,
        (false, false) => return None,
    };
    if age < policy.fresh_window {
        priority += FRESH_BONUS;
    }
    if post.has_media() {
        priority += MEDIA_BONUS;
    }

    Some(Assessment {
        hook,
        relevant,
        priority,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> NewsPolicy {
        NewsPolicy {
            max_age: Duration::minutes(30),
            fresh_window: Duration::minutes(15),
        }
    }

    fn post(text: &str, age_minutes: i64, now: DateTime<Utc>) -> SocialPost {
        SocialPost {
            id: "1".into(),
            account: "WatcherGuru".into(),
            text: text.into(),
            created_at: now - Duration::minutes(age_minutes),
            image_url: None,
            video_url: None,
        }
    }

    #[test]
    fn hook_must_lead_the_post() {
        assert!(has_hook("🚨 JUST IN: Coinbase lists new token"));
        assert!(has_hook("BREAKING: Fed holds rates"));
        assert!(!has_hook("markets are calm today, nothing is BREAKING here at all"));
        assert!(!has_hook("Breaking: lowercase markers do not count"));
    }

    #[test]
    fn relevance_matches_whole_words() {
        assert!(is_relevant("SEC delays decision on spot ETF"));
        assert!(is_relevant("Fed cuts interest rates by 25bps"));
        assert!(!is_relevant("Good morning everyone, have a great weekend"));
        assert!(!is_relevant("seconds away from the section close"));
    }

    #[test]
    fn asset_names_alone_are_not_relevant() {
        assert!(!is_relevant("Bitcoin tops $100k"));
        assert!(!is_relevant("ETH and SOL rally while BTC consolidates"));
        assert!(is_relevant("US announces strategic reserve for Bitcoin"));
        assert!(is_relevant("BlackRock files for Ethereum staking"));
    }

    #[test]
    fn both_stages_score_highest() {
        let now = Utc::now();
        let policy = policy();

        let both = assess(&post("BREAKING: SEC approves ETF", 20, now), now, &policy).unwrap();
        let hook = assess(&post("BREAKING: big things coming", 20, now), now, &policy).unwrap();
        let relevant = assess(&post("Binance expands in Asia", 20, now), now, &policy).unwrap();

        assert_eq!(both.priority, 100.0);
        assert_eq!(hook.priority, 60.0);
        assert_eq!(relevant.priority, 40.0);
        assert!(assess(&post("hello world", 1, now), now, &policy).is_none());
    }

    #[test]
    fn freshness_and_media_add_bonuses() {
        let now = Utc::now();
        let mut fresh = post("JUST IN: Coinbase lists token", 3, now);
        fresh.image_url = Some("https://pbs.example/img.jpg".into());

        let scored = assess(&fresh, now, &policy()).unwrap();
        assert_eq!(scored.priority, 130.0);
    }

    #[test]
    fn post_older_than_max_age_is_discarded() {
        let now = Utc::now();
        let old = post("BREAKING: SEC approves spot Bitcoin ETF", 31, now);
        assert!(assess(&old, now, &policy()).is_none());

        let edge = post("BREAKING: SEC approves spot Bitcoin ETF", 30, now);
        assert!(assess(&edge, now, &policy()).is_some());
    }
}

//! Pure publication decisions. No I/O happens here.

use chrono::{DateTime, Duration, Utc};

use super::candidate::CandidateEvent;
use super::outcome::Reason;
use super::quota::QuotaSnapshot;

#[derive(Debug, Clone)]
pub enum Selection {
    Publish(CandidateEvent),
    Skip(Reason),
}

/// Checks that stop a cycle before any source is queried.
pub fn precheck(
    resume_at: Option<DateTime<Utc>>,
    quota: &QuotaSnapshot,
    now: DateTime<Utc>,
    min_interval: Duration,
) -> Option<Reason> {
    if resume_at.map_or(false, |resume_at| now < resume_at) {
        return Some(Reason::RateLimited);
    }
    if !quota.global_under_cap() {
        return Some(Reason::DailyLimit);
    }
    if let Some(last) = quota.last_published_at {
        if now - last < min_interval {
            return Some(Reason::MinInterval);
        }
    }
    None
}

/// Picks at most one candidate. `candidates` must already be in source
/// priority order; the first fresh candidate whose category still has room
/// wins. House-account candidates skip their category cap but never the
/// global one.
pub fn select(candidates: Vec<CandidateEvent>, quota: &QuotaSnapshot, now: DateTime<Utc>) -> Selection {
    if !quota.global_under_cap() {
        return Selection::Skip(Reason::DailyLimit);
    }

    let mut capped = false;
    let mut stale = false;

    for candidate in candidates {
        if !candidate.is_fresh(now) {
            stale = true;
            continue;
        }
        if candidate.bypass_category_cap || quota.category_under_cap(candidate.category) {
            return Selection::Publish(candidate);
        }
        capped = true;
    }

    let reason = if capped {
        Reason::CategoryLimit
    } else if stale {
        Reason::StaleCandidate
    } else {
        Reason::NoCandidates
    };
    Selection::Skip(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::candidate::{CandidatePayload, NewsPayload, TokenPayload, WhalePayload};
    use crate::scheduler::quota::QuotaCaps;
    use postgres_models::models::Category;
    use std::collections::HashMap;

    fn quota(counts: &[(Category, i64)]) -> QuotaSnapshot {
        QuotaSnapshot {
            caps: QuotaCaps::default(),
            counts: counts.iter().copied().collect::<HashMap<_, _>>(),
            last_published_at: None,
        }
    }

    fn whale(now: DateTime<Utc>) -> CandidateEvent {
        CandidateEvent {
            category: Category::Whale,
            natural_key: "0xwhale".into(),
            priority: 12_000_000.0,
            observed_at: now - Duration::minutes(10),
            expires_at: Some(now + Duration::minutes(80)),
            bypass_category_cap: false,
            payload: CandidatePayload::Whale(WhalePayload {
                tx_hash: "0xwhale".into(),
                chain: "ethereum".into(),
                symbol: "ETH".into(),
                amount: 4_000.0,
                amount_usd: 12_000_000.0,
                threshold_usd: 5_000_000.0,
                from_label: None,
                to_label: None,
            }),
        }
    }

    fn news(now: DateTime<Utc>, house: bool) -> CandidateEvent {
        CandidateEvent {
            category: Category::News,
            natural_key: "1790000000000000001".into(),
            priority: 120.0,
            observed_at: now - Duration::minutes(2),
            expires_at: (!house).then(|| now + Duration::minutes(28)),
            bypass_category_cap: house,
            payload: CandidatePayload::News(NewsPayload {
                post_id: "1790000000000000001".into(),
                account: "WatcherGuru".into(),
                text: "JUST IN: SEC approves spot ETF".into(),
                hook: true,
                relevant: true,
                house,
                image_url: None,
                video_url: None,
            }),
        }
    }

    fn token(now: DateTime<Utc>) -> CandidateEvent {
        CandidateEvent {
            category: Category::Token,
            natural_key: "Mint111:0".into(),
            priority: 81.5,
            observed_at: now,
            expires_at: None,
            bypass_category_cap: false,
            payload: CandidatePayload::Token(TokenPayload {
                address: "Mint111".into(),
                name: "Frog".into(),
                symbol: "FROG".into(),
                score: 81.5,
                progress: 88.0,
                generation: 0,
                image_url: None,
            }),
        }
    }

    #[test]
    fn whale_wins_when_every_source_has_a_candidate() {
        let now = Utc::now();
        let selection = select(vec![whale(now), news(now, false), token(now)], &quota(&[]), now);

        match selection {
            Selection::Publish(c) => assert_eq!(c.category, Category::Whale),
            other => panic!("expected whale, got {other:?}"),
        }
    }

    #[test]
    fn capped_category_falls_through_to_next_source() {
        let now = Utc::now();
        let selection = select(
            vec![whale(now), news(now, false), token(now)],
            &quota(&[(Category::Whale, 2)]),
            now,
        );

        match selection {
            Selection::Publish(c) => assert_eq!(c.category, Category::News),
            other => panic!("expected news, got {other:?}"),
        }
    }

    #[test]
    fn house_news_ignores_news_cap() {
        let now = Utc::now();
        let full = quota(&[(Category::News, 12)]);

        assert!(matches!(
            select(vec![news(now, false)], &full, now),
            Selection::Skip(Reason::CategoryLimit)
        ));
        assert!(matches!(
            select(vec![news(now, true)], &full, now),
            Selection::Publish(_)
        ));
    }

    #[test]
    fn house_news_still_respects_global_cap() {
        let now = Utc::now();
        let full = quota(&[(Category::News, 15)]);
        assert!(matches!(
            select(vec![news(now, true)], &full, now),
            Selection::Skip(Reason::DailyLimit)
        ));
    }

    #[test]
    fn expired_candidate_is_skipped() {
        let now = Utc::now();
        let mut old = whale(now);
        old.expires_at = Some(now - Duration::seconds(1));

        assert!(matches!(
            select(vec![old], &quota(&[]), now),
            Selection::Skip(Reason::StaleCandidate)
        ));
    }

    #[test]
    fn nothing_to_choose_from() {
        let now = Utc::now();
        assert!(matches!(
            select(Vec::new(), &quota(&[]), now),
            Selection::Skip(Reason::NoCandidates)
        ));
    }

    #[test]
    fn precheck_orders_rate_limit_before_quota() {
        let now = Utc::now();
        let full = quota(&[(Category::News, 15)]);

        assert_eq!(
            precheck(Some(now + Duration::minutes(5)), &full, now, Duration::minutes(15)),
            Some(Reason::RateLimited)
        );
        assert_eq!(
            precheck(Some(now - Duration::minutes(5)), &full, now, Duration::minutes(15)),
            Some(Reason::DailyLimit)
        );
    }

    #[test]
    fn precheck_enforces_minimum_interval() {
        let now = Utc::now();
        let mut recent = quota(&[(Category::News, 1)]);
        recent.last_published_at = Some(now - Duration::minutes(5));

        assert_eq!(
            precheck(None, &recent, now, Duration::minutes(15)),
            Some(Reason::MinInterval)
        );
        assert_eq!(precheck(None, &recent, now, Duration::minutes(5)), None);
    }
}

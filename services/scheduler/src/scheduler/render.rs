use serde::Serialize;

use super::candidate::{CandidateEvent, CandidatePayload, TokenPayload, WhalePayload};
use crate::sources::news::format;

const ELLIPSIS: char = '…';

/// Content handed to the platform adapter and the mirror channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundPost {
    pub text: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

pub fn render(candidate: &CandidateEvent, max_chars: usize) -> OutboundPost {
    match &candidate.payload {
        CandidatePayload::Whale(whale) => OutboundPost {
            text: truncate(&whale_text(whale), max_chars),
            image_url: None,
            video_url: None,
        },
        CandidatePayload::News(news) => OutboundPost {
            text: format::reformat(&news.text, max_chars),
            image_url: news.image_url.clone(),
            video_url: news.video_url.clone(),
        },
        CandidatePayload::Token(token) => OutboundPost {
            text: truncate(&token_text(token), max_chars),
            image_url: token.image_url.clone(),
            video_url: None,
        },
    }
}

fn whale_text(whale: &WhalePayload) -> String {
    let route = match (&whale.from_label, &whale.to_label) {
        (Some(from), Some(to)) => format!(" from {from} to {to}"),
        (Some(from), None) => format!(" from {from}"),
        (None, Some(to)) => format!(" to {to}"),
        (None, None) => String::new(),
    };

    format!(
        "🐋 WHALE ALERT: {} #{} ({}) moved{} on {}\n\n#WhaleAlert #{}",
        format_amount(whale.amount),
        whale.symbol,
        format_usd(whale.amount_usd),
        route,
        capitalize(&whale.chain),
        whale.symbol,
    )
}

fn token_text(token: &TokenPayload) -> String {
    format!(
        "👑 KING OF THE HILL: {} (${})\n\nBonding curve {:.1}% complete · Score {:.0}/100\n\n{}",
        token.name, token.symbol, token.progress, token.score, token.address,
    )
}

/// Cuts `text` to at most `max_chars` characters, ending in an ellipsis when
/// anything was removed.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out.push(ELLIPSIS);
    out
}

pub fn format_amount(value: f64) -> String {
    if value.abs() < 1_000.0 {
        return format!("{value:.2}");
    }

    let digits = format!("{:.0}", value.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0.0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_usd(value: f64) -> String {
    if value >= 1_000_000_000.0 {
        format!("${:.2}B", value / 1_000_000_000.0)
    } else if value >= 1_000_000.0 {
        format!("${:.2}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("${:.1}K", value / 1_000.0)
    } else {
        format!("${value:.0}")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

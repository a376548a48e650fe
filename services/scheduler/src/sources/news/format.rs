use regex::Regex;
use std::sync::LazyLock;

use crate::scheduler::render::truncate;

const HOOK_PREFIX: &str = "🚨 BREAKING:";

static LINKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());

/// A leading hook, optionally preceded by emoji and followed by separators.
static EXISTING_HOOK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:[\p{So}\x{FE0F}\x{200D}]\s*)*(?i:breaking news|breaking|just in|alert|urgent|developing)\b\s*[:|\-\x{2013}\x{2014}]*\s*",
    )
    .unwrap()
});

static PHRASES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\bgets? approval\b", "approved"),
        (r"(?i)\b(?:has|have) been approved\b", "approved"),
        (r"(?i)\b(?:has|have) officially approved\b", "approved"),
        (r"(?i)\b(?:has|have) been hacked\b", "hacked"),
        (r"(?i)\bis set to\b", "will"),
        (r"(?i)\bannounce(s|d) that\b", "announce$1"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), replacement))
    .collect()
});

/// Jurisdiction markers and their flags. The first match wins.
static REGIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\b(?:SEC|CFTC|FOMC|Fed|Powell|Trump|Congress|Senate|White House|US|U\.S\.|United States)\b", "🇺🇸"),
        (r"\b(?:EU|ECB|MiCA|European Union)\b", "🇪🇺"),
        (r"\b(?:UK|FCA|Bank of England)\b", "🇬🇧"),
        (r"\b(?:Japan|Japanese|BOJ)\b", "🇯🇵"),
        (r"\b(?:China|Chinese|PBOC)\b", "🇨🇳"),
        (r"\b(?:Korea|Korean)\b", "🇰🇷"),
        (r"\bHong Kong\b", "🇭🇰"),
    ]
    .into_iter()
    .map(|(pattern, flag)| (Regex::new(pattern).unwrap(), flag))
    .collect()
});

static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

pub fn strip_links(text: &str) -> String {
    LINKS.replace_all(text, "").into_owned()
}

/// Removes every leading hook so exactly one can be re-added.
pub fn strip_hooks(text: &str) -> String {
    let mut body = text.to_string();
    while let Some(found) = EXISTING_HOOK.find(&body) {
        if found.is_empty() {
            break;
        }
        body = body[found.end()..].to_string();
    }
    body
}

pub fn normalize_phrases(text: &str) -> String {
    PHRASES
        .iter()
        .fold(text.to_string(), |acc, (pattern, replacement)| {
            pattern.replace_all(&acc, *replacement).into_owned()
        })
}

pub fn region_flag(text: &str) -> Option<&'static str> {
    REGIONS
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, flag)| *flag)
}

fn collapse_whitespace(text: &str) -> String {
    let lines = text
        .lines()
        .map(|line| SPACES.replace_all(line, " ").trim().to_string())
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_LINES.replace_all(lines.trim(), "\n\n").into_owned()
}

/// Rewrites a monitored account's post into the house alert format and fits
/// it into `max_chars`.
pub fn reformat(text: &str, max_chars: usize) -> String {
    let body = strip_links(text);
    let body = strip_hooks(&body);
    let body = normalize_phrases(&body);

    let composed = match region_flag(&body) {
        Some(flag) => format!("{HOOK_PREFIX} {flag} {body}"),
        None => format!("{HOOK_PREFIX} {body}"),
    };

    truncate(&collapse_whitespace(&composed), max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_into_house_format() {
        let out = reformat(
            "JUST IN: SEC gets approval for spot Ethereum ETF https://t.co/abc123",
            280,
        );
        assert_eq!(out, "🚨 BREAKING: 🇺🇸 SEC approved for spot Ethereum ETF");
    }

    #[test]
    fn stacked_hooks_collapse_to_one() {
        let out = reformat("🚨🚨 BREAKING: JUST IN - Binance lists new pairs", 280);
        assert_eq!(out, "🚨 BREAKING: Binance lists new pairs");
    }

    #[test]
    fn region_flag_only_when_a_jurisdiction_is_named() {
        assert_eq!(region_flag("ECB holds rates steady"), Some("🇪🇺"));
        assert_eq!(region_flag("Bitcoin tops $100k"), None);
    }

    #[test]
    fn long_posts_are_cut_with_an_ellipsis() {
        let long = format!("BREAKING: {}", "word ".repeat(100));
        let out = reformat(&long, 280);
        assert_eq!(out.chars().count(), 280);
        assert!(out.ends_with('…'));
    }
}

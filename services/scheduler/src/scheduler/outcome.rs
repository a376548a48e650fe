use chrono::{DateTime, Utc};
use postgres_models::models::Category;
use serde::Serialize;
use std::collections::BTreeMap;

use super::quota::QuotaSnapshot;

/// Why a cycle posted nothing, or how it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    ConfigurationError,
    RateLimited,
    StoreUnavailable,
    DailyLimit,
    MinInterval,
    NoCandidates,
    CategoryLimit,
    StaleCandidate,
    AlreadyPublished,
    PublishFailed,
}

impl Reason {
    /// Whether the cycle itself is considered failed. Skips are successes.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationError | Self::StoreUnavailable | Self::PublishFailed
        )
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDiagnostics {
    pub today_count: i64,
    pub cap: i64,
    pub queried: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The JSON document returned to the cron caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleOutcome {
    pub success: bool,
    pub posted_count: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natural_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirrored: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub global_count: i64,
    pub global_cap: i64,
    pub diagnostics: BTreeMap<Category, CategoryDiagnostics>,
}

impl CycleOutcome {
    pub fn empty() -> Self {
        Self {
            success: true,
            posted_count: 0,
            reason: None,
            category: None,
            natural_key: None,
            post_id: None,
            resume_at: None,
            mirrored: None,
            error: None,
            global_count: 0,
            global_cap: 0,
            diagnostics: BTreeMap::new(),
        }
    }

    pub fn from_quota(quota: &QuotaSnapshot) -> Self {
        let diagnostics = Category::ALL
            .into_iter()
            .map(|category| {
                (
                    category,
                    CategoryDiagnostics {
                        today_count: quota.count_today(category),
                        cap: quota.caps.cap_for(category),
                        ..CategoryDiagnostics::default()
                    },
                )
            })
            .collect();

        Self {
            global_count: quota.count_global_today(),
            global_cap: quota.caps.global,
            diagnostics,
            ..Self::empty()
        }
    }

    pub fn skipped(mut self, reason: Reason) -> Self {
        self.success = !reason.is_failure();
        self.posted_count = 0;
        self.reason = Some(reason);
        self
    }

    pub fn failed(self, reason: Reason, error: impl Into<String>) -> Self {
        let mut outcome = self.skipped(reason);
        outcome.error = Some(error.into());
        outcome
    }

    pub fn posted(mut self, category: Category, post_id: String, mirrored: Option<bool>) -> Self {
        self.success = true;
        self.posted_count = 1;
        self.reason = None;
        self.category = Some(category);
        self.post_id = Some(post_id);
        self.mirrored = mirrored;
        self.global_count += 1;
        if let Some(diag) = self.diagnostics.get_mut(&category) {
            diag.today_count += 1;
        }
        self
    }

    pub fn with_resume_at(mut self, resume_at: Option<DateTime<Utc>>) -> Self {
        self.resume_at = resume_at;
        self
    }

    pub fn with_selected(mut self, category: Category, natural_key: &str) -> Self {
        self.category = Some(category);
        self.natural_key = Some(natural_key.to_string());
        self
    }

    pub fn diagnostics_mut(&mut self, category: Category) -> &mut CategoryDiagnostics {
        self.diagnostics.entry(category).or_default()
    }
}

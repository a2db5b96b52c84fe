//! Canonical status vocabularies.
//!
//! Each status concept has exactly one enum. The API value (`as_str`), the
//! dashboard display label (`label_zh`) and the badge color are pure mappings
//! off that enum, and `FromStr` accepts either the API value or the label.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

// ────────────────────────────────────────────────────────────────────────────
// Article status
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Draft,
    Pending,
    Published,
    Rejected,
    Failed,
}

impl ArticleStatus {
    pub const ALL: [ArticleStatus; 5] = [
        ArticleStatus::Draft,
        ArticleStatus::Pending,
        ArticleStatus::Published,
        ArticleStatus::Rejected,
        ArticleStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Pending => "pending",
            ArticleStatus::Published => "published",
            ArticleStatus::Rejected => "rejected",
            ArticleStatus::Failed => "failed",
        }
    }

    pub fn label_zh(self) -> &'static str {
        match self {
            ArticleStatus::Draft => "草稿",
            ArticleStatus::Pending => "待审核",
            ArticleStatus::Published => "已发布",
            ArticleStatus::Rejected => "已拒绝",
            ArticleStatus::Failed => "失败",
        }
    }

    pub fn badge_color(self) -> &'static str {
        match self {
            ArticleStatus::Draft => "gray",
            ArticleStatus::Pending => "orange",
            ArticleStatus::Published => "green",
            ArticleStatus::Rejected => "red",
            ArticleStatus::Failed => "volcano",
        }
    }

    /// Statuses a new article may be created with.
    pub fn is_initial(self) -> bool {
        matches!(self, ArticleStatus::Draft | ArticleStatus::Pending)
    }

    /// draft → pending → published | rejected | failed. Re-saving the same status is allowed.
    pub fn can_transition_to(self, next: ArticleStatus) -> bool {
        use ArticleStatus::*;
        self == next
            || matches!(
                (self, next),
                (Draft, Pending) | (Pending, Published) | (Pending, Rejected) | (Pending, Failed)
            )
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ArticleStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s) || st.label_zh() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// AI task status / type
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiTaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AiTaskStatus {
    pub const ALL: [AiTaskStatus; 4] = [
        AiTaskStatus::Pending,
        AiTaskStatus::Processing,
        AiTaskStatus::Completed,
        AiTaskStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AiTaskStatus::Pending => "pending",
            AiTaskStatus::Processing => "processing",
            AiTaskStatus::Completed => "completed",
            AiTaskStatus::Failed => "failed",
        }
    }

    pub fn label_zh(self) -> &'static str {
        match self {
            AiTaskStatus::Pending => "等待中",
            AiTaskStatus::Processing => "处理中",
            AiTaskStatus::Completed => "已完成",
            AiTaskStatus::Failed => "失败",
        }
    }

    pub fn badge_color(self) -> &'static str {
        match self {
            AiTaskStatus::Pending => "default",
            AiTaskStatus::Processing => "blue",
            AiTaskStatus::Completed => "green",
            AiTaskStatus::Failed => "red",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AiTaskStatus::Completed | AiTaskStatus::Failed)
    }
}

impl fmt::Display for AiTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiTaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        AiTaskStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s) || st.label_zh() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiTaskType {
    Cover,
    Title,
    Content,
    Summary,
}

impl AiTaskType {
    pub const ALL: [AiTaskType; 4] = [
        AiTaskType::Cover,
        AiTaskType::Title,
        AiTaskType::Content,
        AiTaskType::Summary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AiTaskType::Cover => "cover",
            AiTaskType::Title => "title",
            AiTaskType::Content => "content",
            AiTaskType::Summary => "summary",
        }
    }

    pub fn label_zh(self) -> &'static str {
        match self {
            AiTaskType::Cover => "封面生成",
            AiTaskType::Title => "标题生成",
            AiTaskType::Content => "内容生成",
            AiTaskType::Summary => "摘要生成",
        }
    }
}

impl fmt::Display for AiTaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiTaskType {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        AiTaskType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s) || t.label_zh() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_status_accepts_both_vocabularies() {
        assert_eq!("published".parse::<ArticleStatus>(), Ok(ArticleStatus::Published));
        assert_eq!("已发布".parse::<ArticleStatus>(), Ok(ArticleStatus::Published));
        assert_eq!(" Draft ".parse::<ArticleStatus>(), Ok(ArticleStatus::Draft));
        assert!("archived".parse::<ArticleStatus>().is_err());
    }

    #[test]
    fn test_label_round_trips_through_parse() {
        for status in ArticleStatus::ALL {
            assert_eq!(status.label_zh().parse::<ArticleStatus>(), Ok(status));
            assert_eq!(status.as_str().parse::<ArticleStatus>(), Ok(status));
        }
        for status in AiTaskStatus::ALL {
            assert_eq!(status.label_zh().parse::<AiTaskStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_article_transitions() {
        use ArticleStatus::*;
        assert!(Draft.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Published));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Pending.can_transition_to(Failed));
        assert!(Published.can_transition_to(Published));
        assert!(!Draft.can_transition_to(Published));
        assert!(!Published.can_transition_to(Draft));
        assert!(!Rejected.can_transition_to(Published));
    }

    #[test]
    fn test_serde_uses_api_values() {
        let json = serde_json::to_string(&ArticleStatus::Rejected).unwrap();
        assert_eq!(json, "\"rejected\"");
        let json = serde_json::to_string(&AiTaskType::Cover).unwrap();
        assert_eq!(json, "\"cover\"");
    }
}

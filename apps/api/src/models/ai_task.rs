use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::status::{AiTaskStatus, AiTaskType};
use crate::models::Pagination;

/// A row from the `ai_tasks` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiTask {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub task_type: AiTaskType,
    pub status: AiTaskStatus,
    pub input_data: Value,
    pub result_data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Insert payload. Tasks always start out `pending`.
#[derive(Debug, Clone)]
pub struct NewAiTask {
    pub name: String,
    pub task_type: AiTaskType,
    pub input_data: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiTaskQuery {
    pub page: Option<u32>,
    #[serde(alias = "page_size")]
    pub page_size: Option<u32>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub task_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AiTaskFilter {
    pub status: Option<AiTaskStatus>,
    pub task_type: Option<AiTaskType>,
    pub pagination: Pagination,
}

impl AiTaskFilter {
    pub fn matches(&self, task: &AiTask) -> bool {
        self.status.map_or(true, |s| task.status == s)
            && self.task_type.map_or(true, |t| task.task_type == t)
    }
}

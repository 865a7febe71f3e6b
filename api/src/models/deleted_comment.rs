use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::comment::DeletedAs;

/// Audit entry written alongside every soft delete. Never updated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCommentRecord {
    pub id: String,
    pub comment_id: String,
    #[serde(rename = "comment")]
    pub comment_text: Option<String>,
    pub deleted_at: DateTime<Utc>,
    pub deleted_by: String,
    pub deleted_as: DeletedAs,
    pub post_id: Option<String>,
    pub is_reply: bool,
    pub parent_comment_id: Option<String>,
}

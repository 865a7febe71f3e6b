use chrono::Duration;
use serde::Serialize;

use crate::{
    identity::Caller,
    models::DeletedCommentRecord,
    store::{Write, WriteBatch},
};

use super::{ModerationError, ModerationService};

pub const DEFAULT_PURGE_AGE_DAYS: i64 = 30;
pub const DEFAULT_PURGE_BATCH_SIZE: usize = 100;
/// Largest number of writes a single batch may carry.
pub const MAX_BATCH_WRITES: usize = 500;

pub const DEFAULT_PAGE_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeOptions {
    pub max_age_days: i64,
    pub batch_size: usize,
}

impl Default for PurgeOptions {
    fn default() -> Self {
        Self {
            max_age_days: DEFAULT_PURGE_AGE_DAYS,
            batch_size: DEFAULT_PURGE_BATCH_SIZE,
        }
    }
}

impl PurgeOptions {
    /// Missing or non-positive values fall back to the defaults.
    pub fn new(max_age_days: Option<i64>, batch_size: Option<i64>) -> Self {
        let defaults = Self::default();
        Self {
            max_age_days: max_age_days
                .filter(|d| *d > 0)
                .unwrap_or(defaults.max_age_days),
            batch_size: batch_size
                .filter(|n| *n > 0)
                .map(|n| usize::try_from(n).unwrap_or(MAX_BATCH_WRITES))
                .unwrap_or(defaults.batch_size)
                .min(MAX_BATCH_WRITES),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCommentsPage {
    pub deleted_comments: Vec<DeletedCommentRecord>,
    pub count: usize,
    pub has_more: bool,
}

impl ModerationService {
    /// Physically removes soft-deleted comments older than the configured
    /// age. Audit records are kept.
    pub async fn purge_deleted_comments(
        &self,
        options: PurgeOptions,
        caller: &Caller,
    ) -> Result<usize, ModerationError> {
        self.require_admin(caller).await?;

        let cutoff = Duration::try_days(options.max_age_days)
            .and_then(|age| self.now().checked_sub_signed(age))
            .ok_or(ModerationError::InvalidArgument("daysOld is too large"))?;
        tracing::info!(
            max_age_days = options.max_age_days,
            batch_size = options.batch_size,
            %cutoff,
            "Beginning purge of deleted comments"
        );

        let expired = self
            .store
            .deleted_comments_before(cutoff, options.batch_size)
            .await?;

        if expired.is_empty() {
            return Ok(0);
        }

        let mut batch = WriteBatch::new();
        for comment in &expired {
            batch.push(Write::DeleteComment(comment.id.clone()));
        }
        self.store.commit(batch).await?;

        tracing::info!(purged = expired.len(), "Purged deleted comments");
        Ok(expired.len())
    }

    /// A page of the deletion audit trail, newest first.
    pub async fn list_deleted_comments(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
        caller: &Caller,
    ) -> Result<DeletedCommentsPage, ModerationError> {
        self.require_admin(caller).await?;

        let limit = limit
            .filter(|n| *n > 0)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_PAGE_LIMIT);
        let offset = offset
            .filter(|n| *n > 0)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);

        let deleted_comments = self.store.deleted_comment_records(limit, offset).await?;
        tracing::debug!(count = deleted_comments.len(), "Retrieved deleted comments");

        Ok(DeletedCommentsPage {
            count: deleted_comments.len(),
            has_more: deleted_comments.len() == limit,
            deleted_comments,
        })
    }
}

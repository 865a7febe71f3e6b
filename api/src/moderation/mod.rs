use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};

use crate::{
    error::{ApiRequestError, AppError},
    identity::Caller,
    store::{DocumentStore, StoreError},
};

pub mod accounts;
pub mod admin;
pub mod comments;
pub mod posts;
pub mod routes;

pub use admin::{DeletedCommentsPage, PurgeOptions};
pub use comments::{CommentDeletion, plan_soft_delete};

#[derive(thiserror::Error, Debug)]
pub enum ModerationError {
    #[error("{0}")]
    InvalidArgument(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    FailedPrecondition(&'static str),

    #[error("{0}")]
    PermissionDenied(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiRequestError for ModerationError {
    fn status_code(&self) -> StatusCode {
        match self {
            ModerationError::InvalidArgument(_) | ModerationError::FailedPrecondition(_) => {
                StatusCode::BAD_REQUEST
            }
            ModerationError::NotFound(_) => StatusCode::NOT_FOUND,
            ModerationError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ModerationError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ModerationError::InvalidArgument(_) => "invalid-argument",
            ModerationError::NotFound(_) => "not-found",
            ModerationError::FailedPrecondition(_) => "failed-precondition",
            ModerationError::PermissionDenied(_) => "permission-denied",
            ModerationError::Store(_) => "internal",
        }
    }
}

impl ModerationError {
    /// Store failures become internal errors prefixed with `context`.
    pub fn into_app_error(self, context: &str) -> AppError {
        match self {
            ModerationError::Store(e) => AppError::internal(context, e),
            other => AppError::request(other),
        }
    }
}

pub type Clock = fn() -> DateTime<Utc>;

/// Comment, post and account moderation over an injected document store.
pub struct ModerationService {
    store: Arc<dyn DocumentStore>,
    clock: Clock,
}

impl ModerationService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Admin status lives on the caller's `User` document.
    async fn require_admin(&self, caller: &Caller) -> Result<(), ModerationError> {
        let is_admin = self
            .store
            .user(&caller.uid)
            .await?
            .is_some_and(|u| u.is_admin);

        if !is_admin {
            tracing::warn!(
                uid = %caller.uid,
                "Non-admin user attempted to access an admin function"
            );
            return Err(ModerationError::PermissionDenied(
                "You do not have permission to perform this action",
            ));
        }

        Ok(())
    }
}

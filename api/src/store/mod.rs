use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Comment, DeletedAs, DeletedCommentRecord, Post, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("could not get a database connection: {0}")]
    Pool(String),

    #[error(transparent)]
    Database(#[from] diesel::result::Error),

    #[error("no {collection} document with id `{id}` to update")]
    MissingDocument { collection: &'static str, id: String },

    #[error("malformed {collection} document `{id}`: {reason}")]
    Malformed {
        collection: &'static str,
        id: String,
        reason: String,
    },

    #[error("{0}")]
    Unavailable(String),
}

/// A single mutation inside a [`WriteBatch`].
#[derive(Clone, Debug, PartialEq)]
pub enum Write {
    /// Fails the whole batch when the comment does not exist.
    SoftDeleteComment {
        comment_id: String,
        deleted_at: DateTime<Utc>,
        deleted_by: String,
        deleted_as: DeletedAs,
    },
    InsertDeletedRecord(DeletedCommentRecord),
    DeleteComment(String),
    DeletePost(String),
    DeleteUser(String),
}

/// Mutations applied all-or-nothing by [`DocumentStore::commit`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: Write) -> &mut Self {
        self.writes.push(write);
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }
}

/// The collections the backend keeps: `comments`, `posts`,
/// `deleted_comments` and `User`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn comment(&self, id: &str) -> Result<Option<Comment>, StoreError>;

    /// Direct replies only.
    async fn replies(&self, parent_comment_id: &str) -> Result<Vec<Comment>, StoreError>;

    async fn post(&self, id: &str) -> Result<Option<Post>, StoreError>;

    async fn user(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Soft-deleted comments with `deleted_at` strictly before `cutoff`,
    /// oldest deletion first.
    async fn deleted_comments_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Comment>, StoreError>;

    /// Audit records, newest first.
    async fn deleted_comment_records(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DeletedCommentRecord>, StoreError>;

    async fn posts_pending_deletion(&self) -> Result<Vec<Post>, StoreError>;

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

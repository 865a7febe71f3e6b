use std::{
    collections::BTreeMap,
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::models::{Comment, DeletedCommentRecord, Post, User};

use super::{DocumentStore, StoreError, Write, WriteBatch};

#[derive(Default, Clone)]
struct Collections {
    comments: BTreeMap<String, Comment>,
    posts: BTreeMap<String, Post>,
    users: BTreeMap<String, User>,
    deleted_comments: BTreeMap<String, DeletedCommentRecord>,
}

/// Documents to preload into a [`MemoryStore`], read from a JSON file in dev.
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct Fixture {
    pub comments: Vec<Comment>,
    pub posts: Vec<Post>,
    pub users: Vec<User>,
}

/// Process-local store used in dev and in tests. A batch is applied under a
/// single write lock on a copy of the collections, so a failing write leaves
/// nothing behind.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
    fail_commits: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let mut collections = Collections::default();
        for c in fixture.comments {
            collections.comments.insert(c.id.clone(), c);
        }
        for p in fixture.posts {
            collections.posts.insert(p.id.clone(), p);
        }
        for u in fixture.users {
            collections.users.insert(u.id.clone(), u);
        }

        Self {
            collections: RwLock::new(collections),
            fail_commits: AtomicBool::new(false),
        }
    }

    pub async fn load_fixture(path: &Path) -> Result<Self, eyre::Error> {
        let raw = tokio::fs::read_to_string(path).await?;
        let fixture: Fixture = serde_json::from_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            comments = fixture.comments.len(),
            posts = fixture.posts.len(),
            users = fixture.users.len(),
            "Loaded in-memory store fixture"
        );
        Ok(Self::from_fixture(fixture))
    }

    pub async fn insert_comment(&self, comment: Comment) {
        let mut c = self.collections.write().await;
        c.comments.insert(comment.id.clone(), comment);
    }

    pub async fn insert_post(&self, post: Post) {
        let mut c = self.collections.write().await;
        c.posts.insert(post.id.clone(), post);
    }

    pub async fn insert_user(&self, user: User) {
        let mut c = self.collections.write().await;
        c.users.insert(user.id.clone(), user);
    }

    /// Makes every following commit fail until switched off again.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

fn apply(c: &mut Collections, write: Write) -> Result<(), StoreError> {
    match write {
        Write::SoftDeleteComment {
            comment_id,
            deleted_at,
            deleted_by,
            deleted_as,
        } => {
            let comment =
                c.comments
                    .get_mut(&comment_id)
                    .ok_or_else(|| StoreError::MissingDocument {
                        collection: "comments",
                        id: comment_id.clone(),
                    })?;
            comment.deleted = true;
            comment.deleted_at = Some(deleted_at);
            comment.deleted_by = Some(deleted_by);
            comment.deleted_as = Some(deleted_as);
        }
        Write::InsertDeletedRecord(record) => {
            c.deleted_comments.insert(record.id.clone(), record);
        }
        Write::DeleteComment(id) => {
            c.comments.remove(&id);
        }
        Write::DeletePost(id) => {
            c.posts.remove(&id);
        }
        Write::DeleteUser(id) => {
            c.users.remove(&id);
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn comment(&self, id: &str) -> Result<Option<Comment>, StoreError> {
        Ok(self.collections.read().await.comments.get(id).cloned())
    }

    async fn replies(&self, parent_comment_id: &str) -> Result<Vec<Comment>, StoreError> {
        let c = self.collections.read().await;
        Ok(c.comments
            .values()
            .filter(|comment| comment.parent_comment_id.as_deref() == Some(parent_comment_id))
            .cloned()
            .collect())
    }

    async fn post(&self, id: &str) -> Result<Option<Post>, StoreError> {
        Ok(self.collections.read().await.posts.get(id).cloned())
    }

    async fn user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.collections.read().await.users.get(id).cloned())
    }

    async fn deleted_comments_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Comment>, StoreError> {
        let c = self.collections.read().await;
        let mut expired: Vec<_> = c
            .comments
            .values()
            .filter(|comment| comment.deleted && comment.deleted_at.is_some_and(|at| at < cutoff))
            .cloned()
            .collect();
        expired.sort_by_key(|comment| comment.deleted_at);
        expired.truncate(limit);
        Ok(expired)
    }

    async fn deleted_comment_records(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DeletedCommentRecord>, StoreError> {
        let c = self.collections.read().await;
        let mut records: Vec<_> = c.deleted_comments.values().cloned().collect();
        records.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    async fn posts_pending_deletion(&self) -> Result<Vec<Post>, StoreError> {
        let c = self.collections.read().await;
        Ok(c.posts
            .values()
            .filter(|p| p.pending_deletion)
            .cloned()
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("commit rejected".into()));
        }

        let mut guard = self.collections.write().await;
        let mut staged = guard.clone();
        for write in batch.into_writes() {
            apply(&mut staged, write)?;
        }
        *guard = staged;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeletedAs;

    fn comment(id: &str, deleted_at: Option<DateTime<Utc>>) -> Comment {
        Comment {
            id: id.into(),
            post_id: Some("p1".into()),
            author_id: Some("u1".into()),
            parent_comment_id: None,
            text: Some("hello".into()),
            deleted: deleted_at.is_some(),
            deleted_at,
            deleted_by: None,
            deleted_as: None,
        }
    }

    #[tokio::test]
    async fn batch_with_missing_update_target_applies_nothing() {
        let store = MemoryStore::new();
        store.insert_comment(comment("c1", None)).await;

        let mut batch = WriteBatch::new();
        batch
            .push(Write::SoftDeleteComment {
                comment_id: "c1".into(),
                deleted_at: Utc::now(),
                deleted_by: "u1".into(),
                deleted_as: DeletedAs::Author,
            })
            .push(Write::SoftDeleteComment {
                comment_id: "missing".into(),
                deleted_at: Utc::now(),
                deleted_by: "u1".into(),
                deleted_as: DeletedAs::Author,
            });

        let err = store.commit(batch).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingDocument { .. }));

        let c1 = store.comment("c1").await.unwrap().unwrap();
        assert!(!c1.deleted, "first write must be rolled back");
    }

    #[tokio::test]
    async fn deleted_comments_before_is_strict_and_limited() {
        let store = MemoryStore::new();
        let cutoff = Utc::now();
        store
            .insert_comment(comment("old1", Some(cutoff - chrono::Duration::days(2))))
            .await;
        store
            .insert_comment(comment("old2", Some(cutoff - chrono::Duration::days(3))))
            .await;
        store.insert_comment(comment("exact", Some(cutoff))).await;
        store.insert_comment(comment("live", None)).await;

        let all = store.deleted_comments_before(cutoff, 10).await.unwrap();
        let mut ids: Vec<_> = all.iter().map(|c| c.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["old1", "old2"]);

        let limited = store.deleted_comments_before(cutoff, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, "old2", "oldest deletion comes first");
    }

    #[tokio::test]
    async fn fixture_is_loaded_into_collections() {
        let fixture: Fixture = serde_json::from_value(serde_json::json!({
            "comments": [{
                "id": "c1",
                "postId": "p1",
                "authorId": "u1",
                "parentCommentId": null,
                "text": "hi",
                "deleted": false,
                "deletedAt": null,
                "deletedBy": null,
                "deletedAs": null
            }],
            "posts": [{ "id": "p1", "userref": "u2", "poster": null, "pendingDeletion": false }]
        }))
        .unwrap();

        let store = MemoryStore::from_fixture(fixture);
        assert!(store.comment("c1").await.unwrap().is_some());
        assert!(store.post("p1").await.unwrap().is_some());
        assert!(store.user("u1").await.unwrap().is_none());
    }
}

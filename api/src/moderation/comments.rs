use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    identity::Caller,
    models::{Comment, DeletedAs, DeletedCommentRecord},
    store::{Write, WriteBatch},
};

use super::{ModerationError, ModerationService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDeletion {
    pub deleted_as: DeletedAs,
    pub replies_affected: usize,
}

/// Builds the soft-delete batch for `comment` and its direct `replies`.
///
/// Every comment in the batch gets its deletion fields set and one audit
/// record holding the text it had before the delete. Replies that are
/// already soft-deleted keep their existing record and are left out. Returns
/// the batch and the number of replies it touches, which is the count of
/// live replies and can be lower than `replies.len()`.
pub fn plan_soft_delete(
    comment: &Comment,
    replies: &[Comment],
    deleted_by: &str,
    deleted_as: DeletedAs,
    now: DateTime<Utc>,
) -> (WriteBatch, usize) {
    let mut batch = WriteBatch::new();
    let mut replies_affected = 0;

    let mut soft_delete = |target: &Comment, is_reply: bool, parent: Option<&str>| {
        batch
            .push(Write::SoftDeleteComment {
                comment_id: target.id.clone(),
                deleted_at: now,
                deleted_by: deleted_by.to_owned(),
                deleted_as,
            })
            .push(Write::InsertDeletedRecord(DeletedCommentRecord {
                id: uuid::Uuid::new_v4().to_string(),
                comment_id: target.id.clone(),
                comment_text: target.text.clone(),
                deleted_at: now,
                deleted_by: deleted_by.to_owned(),
                deleted_as,
                // replies are filed under the post of the comment being deleted
                post_id: comment.post_id.clone(),
                is_reply,
                parent_comment_id: parent.map(str::to_owned),
            }));
    };

    for reply in replies.iter().filter(|r| !r.deleted) {
        soft_delete(reply, true, Some(comment.id.as_str()));
        replies_affected += 1;
    }

    soft_delete(
        comment,
        comment.is_reply(),
        comment.parent_comment_id.as_deref(),
    );

    (batch, replies_affected)
}

impl ModerationService {
    /// Soft deletes a comment and its direct replies, as either the comment's
    /// author or the owner of the post it was left on.
    pub async fn delete_comment(
        &self,
        comment_id: &str,
        caller: &Caller,
    ) -> Result<CommentDeletion, ModerationError> {
        if comment_id.is_empty() {
            return Err(ModerationError::InvalidArgument("Comment ID is required"));
        }

        let comment = self
            .store
            .comment(comment_id)
            .await?
            .filter(|c| !c.deleted)
            .ok_or_else(|| {
                tracing::info!(comment_id, "Comment not found");
                ModerationError::NotFound("Comment not found")
            })?;

        let deleted_as = self.authorize_comment_deletion(&comment, caller).await?;
        let replies = self.store.replies(comment_id).await?;

        tracing::info!(
            comment_id,
            uid = %caller.uid,
            deleted_as = deleted_as.as_str(),
            replies = replies.len(),
            "Soft deleting comment"
        );

        let (batch, replies_affected) =
            plan_soft_delete(&comment, &replies, &caller.uid, deleted_as, self.now());
        self.store.commit(batch).await?;

        Ok(CommentDeletion {
            deleted_as,
            replies_affected,
        })
    }

    /// The author wins over the post owner; the post is only read when the
    /// caller did not write the comment.
    async fn authorize_comment_deletion(
        &self,
        comment: &Comment,
        caller: &Caller,
    ) -> Result<DeletedAs, ModerationError> {
        if comment.is_authored_by(&caller.uid) {
            return Ok(DeletedAs::Author);
        }

        let post_id = comment
            .post_id
            .as_deref()
            .ok_or(ModerationError::FailedPrecondition(
                "Comment does not have an associated post",
            ))?;

        let post = self
            .store
            .post(post_id)
            .await?
            .ok_or(ModerationError::NotFound("Associated post not found"))?;

        if post.is_owned_by(&caller.uid) {
            Ok(DeletedAs::PostOwner)
        } else {
            tracing::info!(
                comment_id = %comment.id,
                uid = %caller.uid,
                "Permission denied: user is neither comment author nor post owner"
            );
            Err(ModerationError::PermissionDenied(
                "Only the post owner or comment author can delete comments",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        moderation::fixtures::{caller, comment, fixed_now, post, thread},
        store::DocumentStore,
    };

    async fn records(store: &dyn DocumentStore) -> Vec<DeletedCommentRecord> {
        store.deleted_comment_records(usize::MAX, 0).await.unwrap()
    }

    #[tokio::test]
    async fn author_soft_deletes_comment_and_replies() {
        let (store, service) = thread().await;

        let outcome = service.delete_comment("c1", &caller("u1")).await.unwrap();
        assert_eq!(
            outcome,
            CommentDeletion {
                deleted_as: DeletedAs::Author,
                replies_affected: 1
            }
        );

        for id in ["c1", "c2"] {
            let c = store.comment(id).await.unwrap().unwrap();
            assert!(c.deleted, "{id} should be soft deleted");
            assert_eq!(c.deleted_at, Some(fixed_now()));
            assert_eq!(c.deleted_by.as_deref(), Some("u1"));
            assert_eq!(c.deleted_as, Some(DeletedAs::Author));
        }

        let records = records(store.as_ref()).await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.post_id.as_deref() == Some("p1")));

        let reply = records.iter().find(|r| r.comment_id == "c2").unwrap();
        assert!(reply.is_reply);
        assert_eq!(reply.parent_comment_id.as_deref(), Some("c1"));
        assert_eq!(reply.comment_text.as_deref(), Some("text of c2"));

        let target = records.iter().find(|r| r.comment_id == "c1").unwrap();
        assert!(!target.is_reply);
        assert_eq!(target.parent_comment_id, None);
    }

    #[tokio::test]
    async fn post_owner_soft_deletes_as_post_owner() {
        let (store, service) = thread().await;

        let outcome = service.delete_comment("c1", &caller("u2")).await.unwrap();
        assert_eq!(outcome.deleted_as, DeletedAs::PostOwner);
        assert_eq!(outcome.replies_affected, 1);

        let c2 = store.comment("c2").await.unwrap().unwrap();
        assert_eq!(c2.deleted_as, Some(DeletedAs::PostOwner));
        assert_eq!(c2.deleted_by.as_deref(), Some("u2"));
        assert!(
            records(store.as_ref())
                .await
                .iter()
                .all(|r| r.deleted_as == DeletedAs::PostOwner)
        );
    }

    #[tokio::test]
    async fn reply_author_is_denied_and_nothing_changes() {
        let (store, service) = thread().await;

        let err = service.delete_comment("c1", &caller("u3")).await.unwrap_err();
        assert!(matches!(err, ModerationError::PermissionDenied(_)));

        for id in ["c1", "c2"] {
            assert!(!store.comment(id).await.unwrap().unwrap().deleted);
        }
        assert!(records(store.as_ref()).await.is_empty());
    }

    #[tokio::test]
    async fn reply_author_may_delete_their_own_reply() {
        let (store, service) = thread().await;

        let outcome = service.delete_comment("c2", &caller("u3")).await.unwrap();
        assert_eq!(outcome.deleted_as, DeletedAs::Author);
        assert_eq!(outcome.replies_affected, 0);
        assert!(!store.comment("c1").await.unwrap().unwrap().deleted);

        let records = records(store.as_ref()).await;
        assert_eq!(records.len(), 1);
        assert!(records[0].is_reply);
        assert_eq!(records[0].parent_comment_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn cascades_to_every_reply() {
        let (store, service) = thread().await;
        for i in 3..8 {
            store
                .insert_comment(comment(&format!("c{i}"), Some("p1"), "u4", Some("c1")))
                .await;
        }

        let outcome = service.delete_comment("c1", &caller("u1")).await.unwrap();
        assert_eq!(outcome.replies_affected, 6);
        assert_eq!(records(store.as_ref()).await.len(), 7);
    }

    #[tokio::test]
    async fn missing_comment_is_not_found() {
        let (_, service) = thread().await;
        let err = service.delete_comment("nope", &caller("u1")).await.unwrap_err();
        assert!(matches!(err, ModerationError::NotFound("Comment not found")));
    }

    #[tokio::test]
    async fn empty_comment_id_is_invalid() {
        let (_, service) = thread().await;
        let err = service.delete_comment("", &caller("u1")).await.unwrap_err();
        assert!(matches!(err, ModerationError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn already_deleted_comment_is_not_found() {
        let (store, service) = thread().await;
        service.delete_comment("c1", &caller("u1")).await.unwrap();

        let err = service.delete_comment("c1", &caller("u1")).await.unwrap_err();
        assert!(matches!(err, ModerationError::NotFound(_)));
        assert_eq!(records(store.as_ref()).await.len(), 2);
    }

    #[tokio::test]
    async fn orphaned_comment_fails_precondition_for_non_author() {
        let (store, service) = thread().await;
        store
            .insert_comment(comment("orphan", None, "u1", None))
            .await;

        let err = service
            .delete_comment("orphan", &caller("u2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::FailedPrecondition(_)));
        assert!(!store.comment("orphan").await.unwrap().unwrap().deleted);
        assert!(records(store.as_ref()).await.is_empty());
    }

    #[tokio::test]
    async fn orphaned_comment_can_still_be_deleted_by_its_author() {
        let (store, service) = thread().await;
        store
            .insert_comment(comment("orphan", None, "u1", None))
            .await;

        let outcome = service
            .delete_comment("orphan", &caller("u1"))
            .await
            .unwrap();
        assert_eq!(outcome.deleted_as, DeletedAs::Author);
    }

    #[tokio::test]
    async fn comment_on_missing_post_is_not_found_for_non_author() {
        let (store, service) = thread().await;
        store
            .insert_comment(comment("c9", Some("gone"), "u1", None))
            .await;

        let err = service.delete_comment("c9", &caller("u2")).await.unwrap_err();
        assert!(matches!(
            err,
            ModerationError::NotFound("Associated post not found")
        ));
    }

    #[tokio::test]
    async fn legacy_poster_field_grants_ownership() {
        let (store, service) = thread().await;
        let mut legacy = post("p2", "ignored");
        legacy.userref = None;
        legacy.poster = Some("u5".into());
        store.insert_post(legacy).await;
        store
            .insert_comment(comment("c10", Some("p2"), "u1", None))
            .await;

        let outcome = service.delete_comment("c10", &caller("u5")).await.unwrap();
        assert_eq!(outcome.deleted_as, DeletedAs::PostOwner);
    }

    #[tokio::test]
    async fn failed_commit_leaves_no_partial_state() {
        let (store, service) = thread().await;
        store.fail_commits(true);

        let err = service.delete_comment("c1", &caller("u1")).await.unwrap_err();
        assert!(matches!(err, ModerationError::Store(_)));

        store.fail_commits(false);
        for id in ["c1", "c2"] {
            assert!(!store.comment(id).await.unwrap().unwrap().deleted);
        }
        assert!(records(store.as_ref()).await.is_empty());
    }

    #[test]
    fn plan_skips_replies_that_are_already_deleted() {
        let target = comment("c1", Some("p1"), "u1", None);
        let mut gone = comment("c2", Some("p1"), "u3", Some("c1"));
        gone.deleted = true;
        let live = comment("c3", Some("p1"), "u4", Some("c1"));

        let (batch, replies) =
            plan_soft_delete(&target, &[gone, live], "u1", DeletedAs::Author, fixed_now());

        assert_eq!(replies, 1);
        assert_eq!(batch.len(), 4);
        let soft_deleted: Vec<_> = batch
            .writes()
            .iter()
            .filter_map(|w| match w {
                Write::SoftDeleteComment { comment_id, .. } => Some(comment_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(soft_deleted, vec!["c3", "c1"]);
    }
}

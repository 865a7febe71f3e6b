use std::{sync::Arc, time::Duration};

use crate::{
    identity::Caller,
    store::{Write, WriteBatch},
};

use super::{ModerationError, ModerationService};

impl ModerationService {
    pub async fn delete_post(&self, post_id: &str, caller: &Caller) -> Result<(), ModerationError> {
        if post_id.is_empty() {
            return Err(ModerationError::InvalidArgument("Post ID is required"));
        }

        let post = self
            .store
            .post(post_id)
            .await?
            .ok_or(ModerationError::NotFound("Post not found"))?;

        if !post.is_owned_by(&caller.uid) {
            tracing::info!(
                post_id,
                uid = %caller.uid,
                owner = ?post.owner(),
                "Refusing to delete post not owned by caller"
            );
            return Err(ModerationError::PermissionDenied(
                "You do not have permission to delete this post",
            ));
        }

        let mut batch = WriteBatch::new();
        batch.push(Write::DeletePost(post.id));
        self.store.commit(batch).await?;

        tracing::info!(post_id, uid = %caller.uid, "Post deleted");
        Ok(())
    }

    /// Deletes every post flagged `pending_deletion`. Returns how many went.
    pub async fn cleanup_marked_posts(&self) -> Result<usize, ModerationError> {
        let marked = self.store.posts_pending_deletion().await?;
        tracing::info!(count = marked.len(), "Found posts marked for deletion");

        if marked.is_empty() {
            return Ok(0);
        }

        let mut batch = WriteBatch::new();
        for post in &marked {
            tracing::debug!(post_id = %post.id, "Adding post to deletion batch");
            batch.push(Write::DeletePost(post.id.clone()));
        }
        self.store.commit(batch).await?;

        tracing::info!(count = marked.len(), "Deleted posts marked for deletion");
        Ok(marked.len())
    }

    /// [`Self::cleanup_marked_posts`] on request, for tokens with the `admin`
    /// claim.
    pub async fn manual_cleanup(&self, caller: &Caller) -> Result<usize, ModerationError> {
        if !caller.admin_claim {
            return Err(ModerationError::PermissionDenied(
                "Only admins can perform manual cleanup",
            ));
        }

        self.cleanup_marked_posts().await
    }
}

pub fn start_background_cleanup(service: Arc<ModerationService>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if let Err(err) = service.cleanup_marked_posts().await {
                tracing::warn!(?err, "scheduled post cleanup failed");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        moderation::fixtures::{caller, post, thread},
        store::DocumentStore,
    };

    #[tokio::test]
    async fn owner_deletes_post() {
        let (store, service) = thread().await;
        service.delete_post("p1", &caller("u2")).await.unwrap();
        assert!(store.post("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_owner_cannot_delete_post() {
        let (store, service) = thread().await;
        let err = service.delete_post("p1", &caller("u1")).await.unwrap_err();
        assert!(matches!(err, ModerationError::PermissionDenied(_)));
        assert!(store.post("p1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deleting_missing_post_is_not_found() {
        let (_, service) = thread().await;
        let err = service.delete_post("nope", &caller("u2")).await.unwrap_err();
        assert!(matches!(err, ModerationError::NotFound(_)));

        let err = service.delete_post("", &caller("u2")).await.unwrap_err();
        assert!(matches!(err, ModerationError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn cleanup_only_removes_marked_posts() {
        let (store, service) = thread().await;
        for id in ["m1", "m2"] {
            let mut p = post(id, "u9");
            p.pending_deletion = true;
            store.insert_post(p).await;
        }

        assert_eq!(service.cleanup_marked_posts().await.unwrap(), 2);
        assert!(store.post("m1").await.unwrap().is_none());
        assert!(store.post("m2").await.unwrap().is_none());
        assert!(store.post("p1").await.unwrap().is_some());

        assert_eq!(service.cleanup_marked_posts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn manual_cleanup_requires_admin_claim() {
        let (_, service) = thread().await;
        let err = service.manual_cleanup(&caller("u1")).await.unwrap_err();
        assert!(matches!(err, ModerationError::PermissionDenied(_)));

        let admin = Caller {
            uid: "u1".into(),
            admin_claim: true,
        };
        assert_eq!(service.manual_cleanup(&admin).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn background_cleanup_runs_on_its_interval() {
        let (store, service) = thread().await;
        let mut p = post("m1", "u9");
        p.pending_deletion = true;
        store.insert_post(p).await;

        start_background_cleanup(Arc::new(service), Duration::from_secs(60 * 60));
        // first tick fires immediately
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(store.post("m1").await.unwrap().is_none());
    }
}

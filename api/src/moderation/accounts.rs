use crate::store::{Write, WriteBatch};

use super::{ModerationError, ModerationService};

impl ModerationService {
    /// Drops the `User` profile of an account the identity provider deleted.
    pub async fn on_user_deleted(&self, uid: &str) -> Result<(), ModerationError> {
        if uid.is_empty() {
            return Err(ModerationError::InvalidArgument("User ID is required"));
        }

        let mut batch = WriteBatch::new();
        batch.push(Write::DeleteUser(uid.to_owned()));
        self.store.commit(batch).await?;

        tracing::info!(uid, "Removed profile of deleted user");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        moderation::fixtures::{thread, user},
        store::DocumentStore,
    };

    #[tokio::test]
    async fn profile_is_removed() {
        let (store, service) = thread().await;
        store.insert_user(user("u1", false)).await;

        service.on_user_deleted("u1").await.unwrap();
        assert!(store.user("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_user_is_not_an_error() {
        let (_, service) = thread().await;
        service.on_user_deleted("ghost").await.unwrap();
    }
}

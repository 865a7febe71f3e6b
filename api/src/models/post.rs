use serde::{Deserialize, Serialize};

/// Posts written by older app builds reference their owner through `poster`,
/// newer ones through `userref`. Both columns are kept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub userref: Option<String>,
    pub poster: Option<String>,
    pub pending_deletion: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostOwner<'a> {
    UserRef(&'a str),
    Poster(&'a str),
}

impl<'a> PostOwner<'a> {
    pub fn user_id(&self) -> &'a str {
        match self {
            PostOwner::UserRef(id) | PostOwner::Poster(id) => id,
        }
    }
}

impl Post {
    /// `userref` wins when both are present.
    pub fn owner(&self) -> Option<PostOwner<'_>> {
        self.userref
            .as_deref()
            .map(PostOwner::UserRef)
            .or_else(|| self.poster.as_deref().map(PostOwner::Poster))
    }

    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.owner().is_some_and(|owner| owner.user_id() == uid)
    }
}

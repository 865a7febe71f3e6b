use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which authority a soft delete was performed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletedAs {
    Author,
    PostOwner,
}

impl DeletedAs {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletedAs::Author => "author",
            DeletedAs::PostOwner => "post_owner",
        }
    }
}

impl std::str::FromStr for DeletedAs {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "author" => Ok(DeletedAs::Author),
            "post_owner" => Ok(DeletedAs::PostOwner),
            other => Err(format!("unknown deletedAs value `{other}`")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: Option<String>,
    pub author_id: Option<String>,
    /// `None` for top-level comments.
    pub parent_comment_id: Option<String>,
    pub text: Option<String>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
    pub deleted_as: Option<DeletedAs>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_comment_id.is_some()
    }

    pub fn is_authored_by(&self, uid: &str) -> bool {
        self.author_id.as_deref() == Some(uid)
    }
}

pub mod comment;
pub mod deleted_comment;
pub mod post;
pub mod user;

pub use comment::{Comment, DeletedAs};
pub use deleted_comment::DeletedCommentRecord;
pub use post::{Post, PostOwner};
pub use user::User;

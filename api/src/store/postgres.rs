use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{
    AsyncConnection, AsyncPgConnection, RunQueryDsl,
    pooled_connection::{AsyncDieselConnectionManager, deadpool::Pool},
    scoped_futures::ScopedFutureExt,
};

use crate::{
    models::{Comment, DeletedAs, DeletedCommentRecord, Post, User},
    schema::{comments, deleted_comments, posts, users},
};

use super::{DocumentStore, StoreError, Write, WriteBatch};

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::schema::comments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct CommentRow {
    id: String,
    post_id: Option<String>,
    author_id: Option<String>,
    parent_comment_id: Option<String>,
    comment: Option<String>,
    deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<String>,
    deleted_as: Option<String>,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::schema::deleted_comments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct DeletedCommentRow {
    id: String,
    comment_id: String,
    comment: Option<String>,
    deleted_at: DateTime<Utc>,
    deleted_by: String,
    deleted_as: String,
    post_id: Option<String>,
    is_reply: bool,
    parent_comment_id: Option<String>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::deleted_comments)]
struct NewDeletedCommentRow<'a> {
    id: &'a str,
    comment_id: &'a str,
    comment: Option<&'a str>,
    deleted_at: DateTime<Utc>,
    deleted_by: &'a str,
    deleted_as: &'a str,
    post_id: Option<&'a str>,
    is_reply: bool,
    parent_comment_id: Option<&'a str>,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::schema::posts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct PostRow {
    id: String,
    userref: Option<String>,
    poster: Option<String>,
    pending_deletion: bool,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct UserRow {
    id: String,
    is_admin: bool,
    fcm_token: Option<String>,
}

fn parse_deleted_as(
    collection: &'static str,
    id: &str,
    raw: &str,
) -> Result<DeletedAs, StoreError> {
    raw.parse().map_err(|reason| StoreError::Malformed {
        collection,
        id: id.to_owned(),
        reason,
    })
}

impl TryFrom<CommentRow> for Comment {
    type Error = StoreError;

    fn try_from(row: CommentRow) -> Result<Self, Self::Error> {
        let deleted_as = row
            .deleted_as
            .as_deref()
            .map(|raw| parse_deleted_as("comments", &row.id, raw))
            .transpose()?;

        Ok(Comment {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            parent_comment_id: row.parent_comment_id,
            text: row.comment,
            deleted: row.deleted,
            deleted_at: row.deleted_at,
            deleted_by: row.deleted_by,
            deleted_as,
        })
    }
}

impl TryFrom<DeletedCommentRow> for DeletedCommentRecord {
    type Error = StoreError;

    fn try_from(row: DeletedCommentRow) -> Result<Self, Self::Error> {
        let deleted_as = parse_deleted_as("deleted_comments", &row.id, &row.deleted_as)?;

        Ok(DeletedCommentRecord {
            id: row.id,
            comment_id: row.comment_id,
            comment_text: row.comment,
            deleted_at: row.deleted_at,
            deleted_by: row.deleted_by,
            deleted_as,
            post_id: row.post_id,
            is_reply: row.is_reply,
            parent_comment_id: row.parent_comment_id,
        })
    }
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            userref: row.userref,
            poster: row.poster,
            pending_deletion: row.pending_deletion,
        }
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            is_admin: row.is_admin,
            fcm_token: row.fcm_token,
        }
    }
}

fn sql_limit(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Postgres-backed store. Each [`WriteBatch`] runs in one transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<AsyncPgConnection>,
}

impl PgStore {
    pub fn connect(database_url: &str, max_connections: usize) -> Result<Self, eyre::Error> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder(manager).max_size(max_connections).build()?;
        Ok(Self { pool })
    }

    async fn conn(
        &self,
    ) -> Result<diesel_async::pooled_connection::deadpool::Object<AsyncPgConnection>, StoreError>
    {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))
    }
}

async fn apply(conn: &mut AsyncPgConnection, write: Write) -> Result<(), StoreError> {
    match write {
        Write::SoftDeleteComment {
            comment_id,
            deleted_at,
            deleted_by,
            deleted_as,
        } => {
            let updated = diesel::update(comments::table.find(&comment_id))
                .set((
                    comments::deleted.eq(true),
                    comments::deleted_at.eq(Some(deleted_at)),
                    comments::deleted_by.eq(Some(deleted_by.as_str())),
                    comments::deleted_as.eq(Some(deleted_as.as_str())),
                ))
                .execute(conn)
                .await?;

            if updated == 0 {
                return Err(StoreError::MissingDocument {
                    collection: "comments",
                    id: comment_id,
                });
            }
        }
        Write::InsertDeletedRecord(record) => {
            diesel::insert_into(deleted_comments::table)
                .values(NewDeletedCommentRow {
                    id: &record.id,
                    comment_id: &record.comment_id,
                    comment: record.comment_text.as_deref(),
                    deleted_at: record.deleted_at,
                    deleted_by: &record.deleted_by,
                    deleted_as: record.deleted_as.as_str(),
                    post_id: record.post_id.as_deref(),
                    is_reply: record.is_reply,
                    parent_comment_id: record.parent_comment_id.as_deref(),
                })
                .execute(conn)
                .await?;
        }
        Write::DeleteComment(id) => {
            diesel::delete(comments::table.find(&id))
                .execute(conn)
                .await?;
        }
        Write::DeletePost(id) => {
            diesel::delete(posts::table.find(&id)).execute(conn).await?;
        }
        Write::DeleteUser(id) => {
            diesel::delete(users::table.find(&id)).execute(conn).await?;
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn comment(&self, id: &str) -> Result<Option<Comment>, StoreError> {
        let mut conn = self.conn().await?;
        comments::table
            .find(id)
            .select(CommentRow::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .map(Comment::try_from)
            .transpose()
    }

    async fn replies(&self, parent_comment_id: &str) -> Result<Vec<Comment>, StoreError> {
        let mut conn = self.conn().await?;
        comments::table
            .filter(comments::parent_comment_id.eq(parent_comment_id))
            .select(CommentRow::as_select())
            .load(&mut conn)
            .await?
            .into_iter()
            .map(Comment::try_from)
            .collect()
    }

    async fn post(&self, id: &str) -> Result<Option<Post>, StoreError> {
        let mut conn = self.conn().await?;
        Ok(posts::table
            .find(id)
            .select(PostRow::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .map(Post::from))
    }

    async fn user(&self, id: &str) -> Result<Option<User>, StoreError> {
        let mut conn = self.conn().await?;
        Ok(users::table
            .find(id)
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .map(User::from))
    }

    async fn deleted_comments_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Comment>, StoreError> {
        let mut conn = self.conn().await?;
        comments::table
            .filter(comments::deleted.eq(true))
            .filter(comments::deleted_at.lt(cutoff))
            .order(comments::deleted_at.asc())
            .limit(sql_limit(limit))
            .select(CommentRow::as_select())
            .load(&mut conn)
            .await?
            .into_iter()
            .map(Comment::try_from)
            .collect()
    }

    async fn deleted_comment_records(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DeletedCommentRecord>, StoreError> {
        let mut conn = self.conn().await?;
        deleted_comments::table
            .order(deleted_comments::deleted_at.desc())
            .offset(sql_limit(offset))
            .limit(sql_limit(limit))
            .select(DeletedCommentRow::as_select())
            .load(&mut conn)
            .await?
            .into_iter()
            .map(DeletedCommentRecord::try_from)
            .collect()
    }

    async fn posts_pending_deletion(&self) -> Result<Vec<Post>, StoreError> {
        let mut conn = self.conn().await?;
        Ok(posts::table
            .filter(posts::pending_deletion.eq(true))
            .select(PostRow::as_select())
            .load(&mut conn)
            .await?
            .into_iter()
            .map(Post::from)
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut pooled = self.conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        conn.transaction(|conn| {
            async move {
                for write in batch.into_writes() {
                    apply(conn, write).await?;
                }
                Ok::<_, StoreError>(())
            }
            .scope_boxed()
        })
        .await
    }
}

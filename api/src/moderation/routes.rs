use axum::{Router, debug_handler, extract::State, routing::post};
use serde::{Deserialize, Serialize};

use crate::{
    App,
    error::AppError,
    identity::AuthUser,
    json::{Envelope, Json},
    models::DeletedAs,
};

use super::{DeletedCommentsPage, PurgeOptions};

pub fn route() -> Router<App> {
    Router::<App>::new()
        .route("/deleteComment", post(delete_comment))
        .route("/purgeDeletedComments", post(purge_deleted_comments))
        .route("/getDeletedComments", post(get_deleted_comments))
        .route("/deletePost", post(delete_post))
        .route("/manualCleanup", post(manual_cleanup))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DeleteCommentRequest {
    #[serde(default)]
    comment_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteCommentResponse {
    success: bool,
    message: &'static str,
    soft_deleted_replies: usize,
    deleted_as: DeletedAs,
}

#[debug_handler]
async fn delete_comment(
    State(ctx): State<App>,
    AuthUser(caller): AuthUser,
    Json(Envelope { data }): Json<Envelope<DeleteCommentRequest>>,
) -> Result<Json<Envelope<DeleteCommentResponse>>, AppError> {
    let deletion = ctx
        .moderation
        .delete_comment(&data.comment_id, &caller)
        .await
        .map_err(|e| e.into_app_error("Error soft deleting comment"))?;

    Ok(Json(Envelope::new(DeleteCommentResponse {
        success: true,
        message: "Comment and replies soft deleted successfully",
        soft_deleted_replies: deletion.replies_affected,
        deleted_as: deletion.deleted_as,
    })))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PurgeRequest {
    days_old: Option<i64>,
    batch_size: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PurgeResponse {
    success: bool,
    message: String,
    purged_count: usize,
}

#[debug_handler]
async fn purge_deleted_comments(
    State(ctx): State<App>,
    AuthUser(caller): AuthUser,
    Json(Envelope { data }): Json<Envelope<PurgeRequest>>,
) -> Result<Json<Envelope<PurgeResponse>>, AppError> {
    let options = PurgeOptions::new(data.days_old, data.batch_size);
    let purged_count = ctx
        .moderation
        .purge_deleted_comments(options, &caller)
        .await
        .map_err(|e| e.into_app_error("Error purging deleted comments"))?;

    let message = if purged_count == 0 {
        "No deleted comments found to purge".to_owned()
    } else {
        format!("Successfully purged {purged_count} deleted comments")
    };

    Ok(Json(Envelope::new(PurgeResponse {
        success: true,
        message,
        purged_count,
    })))
}

#[derive(Deserialize, Default)]
struct ListDeletedRequest {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[debug_handler]
async fn get_deleted_comments(
    State(ctx): State<App>,
    AuthUser(caller): AuthUser,
    Json(Envelope { data }): Json<Envelope<ListDeletedRequest>>,
) -> Result<Json<Envelope<DeletedCommentsPage>>, AppError> {
    let page = ctx
        .moderation
        .list_deleted_comments(data.limit, data.offset, &caller)
        .await
        .map_err(|e| e.into_app_error("Error retrieving deleted comments"))?;

    Ok(Json(Envelope::new(page)))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DeletePostRequest {
    #[serde(default)]
    post_id: String,
}

#[derive(Serialize)]
struct Outcome {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
}

#[debug_handler]
async fn delete_post(
    State(ctx): State<App>,
    AuthUser(caller): AuthUser,
    Json(Envelope { data }): Json<Envelope<DeletePostRequest>>,
) -> Result<Json<Envelope<Outcome>>, AppError> {
    ctx.moderation
        .delete_post(&data.post_id, &caller)
        .await
        .map_err(|e| e.into_app_error("Error deleting post"))?;

    Ok(Json(Envelope::new(Outcome {
        success: true,
        message: "Post deleted successfully".into(),
        count: None,
    })))
}

#[debug_handler]
async fn manual_cleanup(
    State(ctx): State<App>,
    AuthUser(caller): AuthUser,
) -> Result<Json<Envelope<Outcome>>, AppError> {
    let count = ctx
        .moderation
        .manual_cleanup(&caller)
        .await
        .map_err(|e| e.into_app_error("Error during manual cleanup"))?;

    let message = if count == 0 {
        "No posts to clean up".to_owned()
    } else {
        format!("Successfully deleted {count} posts")
    };

    Ok(Json(Envelope::new(Outcome {
        success: true,
        message,
        count: Some(count),
    })))
}

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::instrument;

use super::bulk::{self, Announcement};
use super::schema::{
    BulkEmailRequestBody, BulkEmailResponseBody, CountResponseBody, DeleteResponseBody,
    JoinRequestBody, JoinResponseBody, SubscribersFailureBody, SubscribersResponseBody,
};
use crate::{
    app::{
        error::{AppError, AppResult},
        extractor::JsonBody,
        AppState,
    },
    config::WelcomeEmailFailurePolicy,
    domain::subscriber::{email::Email, NewSubscriber, Subscriber},
    email::EmailError,
};

#[instrument(name = "adding a new subscriber", skip(state, body), fields(email = %body.email, name = %body.name, role = %body.role))]
pub async fn join(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<JoinRequestBody>,
) -> AppResult<Json<JoinResponseBody>> {
    let new_subscriber = NewSubscriber::try_from(body).map_err(AppError::Validation)?;
    let subscriber = Subscriber::admit(new_subscriber);

    let inserted = state
        .store
        .add_if_absent(&subscriber)
        .await
        .context("Failed to store the new subscriber.")?;
    if !inserted {
        return Err(AppError::Conflict(
            "This email is already on the waitlist".to_owned(),
        ));
    }

    if let Err(e) = send_welcome_email(&state, &subscriber).await {
        match state.waitlist.on_welcome_email_failure {
            WelcomeEmailFailurePolicy::Fail => return Err(e.into()),
            WelcomeEmailFailurePolicy::Ignore => {
                tracing::warn!(detail = %e, "keeping the new subscriber without a welcome email");
            }
            WelcomeEmailFailurePolicy::Rollback => {
                if let Err(rollback) = state.store.remove(subscriber.email.as_ref()).await {
                    tracing::error!(
                        detail = %rollback,
                        "failed to remove a subscriber whose welcome email was not sent"
                    );
                }
                return Err(e.into());
            }
        }
    }

    // The subscriber is committed at this point, so a failing count must not
    // turn the admission into an error.
    let count = current_count(&state, true).await?;

    Ok(Json(JoinResponseBody {
        success: true,
        message: "Successfully joined the waitlist!".to_owned(),
        count,
    }))
}

#[tracing::instrument(
    name = "Send a welcome email to a new subscriber",
    skip(state, subscriber),
    fields(email = %subscriber.email)
)]
async fn send_welcome_email(state: &AppState, subscriber: &Subscriber) -> Result<(), EmailError> {
    let email_client = state.email_client()?;

    let plain_body = format!(
        "Hi {},\nThanks for joining the waitlist as a {}!\nWe will let you know as soon as we launch.",
        subscriber.name, subscriber.role
    );
    let html_body = format!(
        "Hi {},<br />\
        Thanks for joining the waitlist as a {}!<br />\
        We will let you know as soon as we launch.",
        htmlescape::encode_minimal(subscriber.name.as_ref()),
        subscriber.role
    );

    email_client
        .send_email(
            &subscriber.email,
            "Welcome to the waitlist!",
            &html_body,
            &plain_body,
        )
        .await
}

/// Number of subscribers. Store failures read as zero when `mask_errors` is
/// set; masked failures are still logged.
async fn current_count(state: &AppState, mask_errors: bool) -> AppResult<u64> {
    match state.store.count().await {
        Ok(count) => Ok(count),
        Err(e) if mask_errors => {
            tracing::warn!(count_unavailable = true, detail = %e, "reporting a subscriber count of 0");
            Ok(0)
        }
        Err(e) => Err(anyhow::Error::new(e)
            .context("Failed to count subscribers.")
            .into()),
    }
}

#[instrument(name = "counting subscribers", skip(state))]
pub async fn count(State(state): State<AppState>) -> AppResult<Json<CountResponseBody>> {
    let count = current_count(&state, state.waitlist.mask_count_errors).await?;
    Ok(Json(CountResponseBody { count }))
}

#[instrument(name = "listing subscribers", skip(state))]
pub async fn list_subscribers(State(state): State<AppState>) -> Response {
    match state.store.list().await {
        Ok(subscribers) => Json(SubscribersResponseBody { subscribers }).into_response(),
        Err(e) => {
            tracing::error!(detail = %e, "failed to list subscribers");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SubscribersFailureBody {
                    success: false,
                    message: "Failed to fetch subscribers".to_owned(),
                    subscribers: Vec::new(),
                }),
            )
                .into_response()
        }
    }
}

#[instrument(name = "deleting a subscriber", skip(state))]
pub async fn delete_subscriber(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> AppResult<Json<DeleteResponseBody>> {
    let key = Email::normalize(&email);
    if key.is_empty() {
        return Err(email_is_required());
    }

    let removed = state
        .store
        .remove(&key)
        .await
        .context("Failed to delete the subscriber.")?;
    if !removed {
        return Err(AppError::NotFound("Subscriber not found".to_owned()));
    }

    Ok(Json(DeleteResponseBody {
        success: true,
        message: "Subscriber deleted successfully".to_owned(),
    }))
}

pub async fn delete_without_email() -> AppResult<Json<DeleteResponseBody>> {
    Err(email_is_required())
}

fn email_is_required() -> AppError {
    AppError::Validation("Email is required".to_owned())
}

#[instrument(name = "sending a bulk email", skip(state, body), fields(subject = %body.subject, recipients = body.emails.len()))]
pub async fn bulk_email(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<BulkEmailRequestBody>,
) -> AppResult<Response> {
    if body.subject.trim().is_empty() || body.body.trim().is_empty() || body.emails.is_empty() {
        return Err(AppError::Validation(
            "Subject, body, and emails are required".to_owned(),
        ));
    }

    let email_client = state.email_client()?;
    let announcement = Announcement::new(body.subject, body.body, state.bulk_email.escape_html);

    let report = bulk::deliver(
        email_client,
        announcement,
        body.emails,
        state.bulk_email.max_concurrency,
    )
    .await?;

    let total = report.total();
    let (status, success, message) = if report.failed.is_empty() {
        (
            StatusCode::OK,
            true,
            format!("Emails sent successfully to {} recipients", total),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            false,
            format!(
                "Failed to send emails to {} of {} recipients",
                report.failed.len(),
                total
            ),
        )
    };

    Ok((
        status,
        Json(BulkEmailResponseBody {
            success,
            message,
            sent: report.sent,
            failed: report.failed,
        }),
    )
        .into_response())
}

/*
 * Responsibility
 * - GET /lists, POST /subscribe, POST /unsubscribe
 * - Caller identity comes from CurrentUser (verified by middleware)
 * - Ask services::auth::policy before touching the backend; a denial stops the request
 */
use axum::{
    Form, Json,
    extract::{Query, State, rejection::FormRejection},
};

use crate::{
    api::v1::{
        dto::membership::{ListsQuery, MembershipForm, MembershipResponse},
        extractors::CurrentUser,
    },
    error::AppError,
    services::{
        auth::{Action, Identity, authorize},
        mailing::MailingList,
    },
    state::AppState,
};

pub async fn list_mailing_lists(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Query(query): Query<ListsQuery>,
) -> Result<Json<Vec<MailingList>>, AppError> {
    ensure_allowed(&identity, "", Action::List)?;

    // Hidden lists are an admin view.
    let include_hidden = query.include_hidden && identity.is_admin;

    let lists = state.mailing.list_mailing_lists(include_hidden).await?;
    Ok(Json(lists))
}

pub async fn subscribe(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    form: Result<Form<MembershipForm>, FormRejection>,
) -> Result<Json<MembershipResponse>, AppError> {
    let form = parse_form(form)?;
    ensure_allowed(&identity, &form.member, Action::Subscribe)?;

    state.mailing.subscribe(&form.list, &form.member).await?;

    tracing::info!(
        actor = %identity.email,
        list = %form.list,
        member = %form.member,
        "member subscribed"
    );

    Ok(Json(MembershipResponse {
        status: "subscribed",
        list: form.list,
        member: form.member,
    }))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    form: Result<Form<MembershipForm>, FormRejection>,
) -> Result<Json<MembershipResponse>, AppError> {
    let form = parse_form(form)?;
    ensure_allowed(&identity, &form.member, Action::Unsubscribe)?;

    state.mailing.unsubscribe(&form.list, &form.member).await?;

    tracing::info!(
        actor = %identity.email,
        list = %form.list,
        member = %form.member,
        "member unsubscribed"
    );

    Ok(Json(MembershipResponse {
        status: "unsubscribed",
        list: form.list,
        member: form.member,
    }))
}

fn parse_form(form: Result<Form<MembershipForm>, FormRejection>) -> Result<MembershipForm, AppError> {
    let Form(form) = form.map_err(|e| AppError::bad_request("INVALID_FORM", e.body_text()))?;
    form.validate()
        .map_err(|msg| AppError::bad_request("INVALID_FORM", msg))?;
    Ok(form)
}

fn ensure_allowed(identity: &Identity, target: &str, action: Action) -> Result<(), AppError> {
    let decision = authorize(identity, target, action);
    if !decision.allowed {
        tracing::warn!(
            actor = %identity.email,
            target = %target,
            ?action,
            reason = decision.reason,
            "authorization denied"
        );
        return Err(AppError::forbidden(decision.reason));
    }
    Ok(())
}

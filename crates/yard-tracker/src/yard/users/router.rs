use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use serde::Deserialize;

use super::domain::{NewUser, UserId, UserUpdate};
use super::repository::UserRepository;
use super::service::UserService;
use crate::yard::http::{resolve_session, ApiError};

/// Router builder exposing account administration and the caller's own session.
pub fn user_router<U>(service: Arc<UserService<U>>) -> Router
where
    U: UserRepository + 'static,
{
    Router::new()
        .route("/api/v1/yard/login", post(login_handler::<U>))
        .route("/api/v1/yard/me", get(me_handler::<U>))
        .route(
            "/api/v1/yard/users",
            get(list_handler::<U>).post(create_handler::<U>),
        )
        .route(
            "/api/v1/yard/users/:user_id",
            get(get_handler::<U>)
                .put(update_handler::<U>)
                .delete(deactivate_handler::<U>),
        )
        .with_state(service)
}

#[derive(Deserialize)]
pub(crate) struct LoginRequest {
    username: String,
    password: String,
}

pub(crate) async fn login_handler<U>(
    State(service): State<Arc<UserService<U>>>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, ApiError>
where
    U: UserRepository + 'static,
{
    let grant = service.login(&request.username, &request.password)?;
    Ok((StatusCode::OK, Json(grant)).into_response())
}

pub(crate) async fn me_handler<U>(
    State(service): State<Arc<UserService<U>>>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    U: UserRepository + 'static,
{
    let session = resolve_session(&headers, &service)?;
    Ok((StatusCode::OK, Json(session)).into_response())
}

pub(crate) async fn list_handler<U>(
    State(service): State<Arc<UserService<U>>>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    U: UserRepository + 'static,
{
    let session = resolve_session(&headers, &service)?;
    let users = service.list(&session)?;
    Ok((StatusCode::OK, Json(users)).into_response())
}

pub(crate) async fn create_handler<U>(
    State(service): State<Arc<UserService<U>>>,
    headers: HeaderMap,
    Json(request): Json<NewUser>,
) -> Result<Response, ApiError>
where
    U: UserRepository + 'static,
{
    let session = resolve_session(&headers, &service)?;
    let user = service.create(&session, request)?;
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

pub(crate) async fn get_handler<U>(
    State(service): State<Arc<UserService<U>>>,
    headers: HeaderMap,
    Path(user_id): Path<u64>,
) -> Result<Response, ApiError>
where
    U: UserRepository + 'static,
{
    let session = resolve_session(&headers, &service)?;
    let user = service.get(&session, UserId(user_id))?;
    Ok((StatusCode::OK, Json(user)).into_response())
}

pub(crate) async fn update_handler<U>(
    State(service): State<Arc<UserService<U>>>,
    headers: HeaderMap,
    Path(user_id): Path<u64>,
    Json(update): Json<UserUpdate>,
) -> Result<Response, ApiError>
where
    U: UserRepository + 'static,
{
    let session = resolve_session(&headers, &service)?;
    let user = service.update(&session, UserId(user_id), update)?;
    Ok((StatusCode::OK, Json(user)).into_response())
}

pub(crate) async fn deactivate_handler<U>(
    State(service): State<Arc<UserService<U>>>,
    headers: HeaderMap,
    Path(user_id): Path<u64>,
) -> Result<Response, ApiError>
where
    U: UserRepository + 'static,
{
    let session = resolve_session(&headers, &service)?;
    let user = service.deactivate(&session, UserId(user_id))?;
    Ok((StatusCode::OK, Json(user)).into_response())
}

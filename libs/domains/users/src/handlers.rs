use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, request::Parts},
    response::IntoResponse,
    routing::{get, post},
};
use axum_helpers::{BearerToken, ErrorResponse, ValidatedJson};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

use crate::auth::{AuthService, Principal};
use crate::error::{UserError, UserResult};
use crate::models::{
    AuthTokenResponse, CreateUserRequest, DEFAULT_PER_PAGE, LoginRequest, MAX_PER_PAGE,
    PaginationMeta, PaginationQuery, RegisterRequest, Role, UpdateUserRequest, UserListResponse,
    UserResponse,
};
use crate::service::UserService;

const AUTH_TAG: &str = "auth";
const USERS_TAG: &str = "users";

/// OpenAPI documentation for the users API
#[derive(OpenApi)]
#[openapi(
    paths(
        register,
        login,
        current_user,
        logout,
        list_users,
        create_user,
        get_user,
        update_user,
        delete_user,
    ),
    components(schemas(
        AuthTokenResponse,
        CreateUserRequest,
        ErrorResponse,
        LoginRequest,
        MessageResponse,
        PaginationMeta,
        RegisterRequest,
        Role,
        UpdateUserRequest,
        UserListResponse,
        UserResponse,
    )),
    tags(
        (name = AUTH_TAG, description = "Registration, login and bearer tokens"),
        (name = USERS_TAG, description = "User management (admin)")
    )
)]
pub struct ApiDoc;

/// Shared state of the users router
pub struct UsersState {
    pub users: UserService,
    pub auth: AuthService,
    pub default_per_page: u64,
    pub max_per_page: u64,
}

impl UsersState {
    pub fn new(users: UserService) -> Self {
        Self {
            auth: AuthService::new(users.clone()),
            users,
            default_per_page: DEFAULT_PER_PAGE,
            max_per_page: MAX_PER_PAGE,
        }
    }

    pub fn with_page_sizes(mut self, default_per_page: u64, max_per_page: u64) -> Self {
        self.max_per_page = max_per_page.max(1);
        self.default_per_page = default_per_page.clamp(1, self.max_per_page);
        self
    }
}

/// Create the users router; mount it under `/api`.
pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/user", get(current_user))
        .route("/auth/logout", post(logout))
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .with_state(Arc::new(state))
}

/// Success envelope shared by every endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(data: T, message: &str) -> Self {
        Self {
            message: Some(message.to_string()),
            ..Self::data(data)
        }
    }
}

/// Envelope without a payload
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub status: String,
    pub message: String,
}

impl MessageResponse {
    fn success(message: &str) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
        }
    }
}

/// Any authenticated caller
pub struct AuthUser(pub Principal);

impl FromRequestParts<Arc<UsersState>> for AuthUser {
    type Rejection = UserError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<UsersState>,
    ) -> Result<Self, Self::Rejection> {
        let token = BearerToken::from_headers(&parts.headers).ok_or(UserError::Unauthenticated)?;
        state.auth.authenticate(token.as_str()).await.map(AuthUser)
    }
}

/// Authenticated caller with the admin role
pub struct AdminUser(pub Principal);

impl FromRequestParts<Arc<UsersState>> for AdminUser {
    type Rejection = UserError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<UsersState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(principal) = AuthUser::from_request_parts(parts, state).await?;
        principal.require_admin()?;
        Ok(AdminUser(principal))
    }
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = AUTH_TAG,
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = ApiResponse<AuthTokenResponse>),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 409, description = "Email already in use", body = ErrorResponse)
    )
)]
async fn register(
    State(state): State<Arc<UsersState>>,
    ValidatedJson(input): ValidatedJson<RegisterRequest>,
) -> UserResult<impl IntoResponse> {
    let (user, token) = state
        .auth
        .register(input.name, input.email, input.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            AuthTokenResponse::bearer(user, token.plain_text),
            "User registered successfully",
        )),
    ))
}

/// Exchange email and password for a bearer token
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = AUTH_TAG,
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = ApiResponse<AuthTokenResponse>),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
async fn login(
    State(state): State<Arc<UsersState>>,
    ValidatedJson(input): ValidatedJson<LoginRequest>,
) -> UserResult<Json<ApiResponse<AuthTokenResponse>>> {
    let (user, token) = state.auth.login(&input.email, input.password).await?;

    Ok(Json(ApiResponse::with_message(
        AuthTokenResponse::bearer(user, token.plain_text),
        "Logged in successfully",
    )))
}

/// The user behind the presented token
#[utoipa::path(
    get,
    path = "/api/auth/user",
    tag = AUTH_TAG,
    responses(
        (status = 200, description = "Current user", body = ApiResponse<UserResponse>),
        (status = 401, description = "Unauthenticated", body = ErrorResponse)
    )
)]
async fn current_user(AuthUser(principal): AuthUser) -> Json<ApiResponse<UserResponse>> {
    Json(ApiResponse::data(principal.user.into()))
}

/// Revoke the presented token
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = AUTH_TAG,
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Unauthenticated", body = ErrorResponse)
    )
)]
async fn logout(
    State(state): State<Arc<UsersState>>,
    AuthUser(principal): AuthUser,
) -> UserResult<Json<MessageResponse>> {
    state.auth.logout(&principal).await?;
    Ok(Json(MessageResponse::success("Logged out successfully")))
}

/// List users, newest first
#[utoipa::path(
    get,
    path = "/api/users",
    tag = USERS_TAG,
    params(PaginationQuery),
    responses(
        (status = 200, description = "One page of users", body = ApiResponse<UserListResponse>),
        (status = 401, description = "Unauthenticated", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse)
    )
)]
async fn list_users(
    State(state): State<Arc<UsersState>>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<PaginationQuery>,
) -> UserResult<Json<ApiResponse<UserListResponse>>> {
    let page = state
        .users
        .get_paginated_users(
            query.per_page.unwrap_or(state.default_per_page),
            query.page.unwrap_or(1),
            state.max_per_page,
        )
        .await?;

    Ok(Json(ApiResponse::data(page.into())))
}

/// Create a user
#[utoipa::path(
    post,
    path = "/api/users",
    tag = USERS_TAG,
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse<UserResponse>),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 409, description = "Email already in use", body = ErrorResponse)
    )
)]
async fn create_user(
    State(state): State<Arc<UsersState>>,
    AdminUser(admin): AdminUser,
    ValidatedJson(input): ValidatedJson<CreateUserRequest>,
) -> UserResult<impl IntoResponse> {
    let user = state
        .users
        .create_user(input.into(), Some(admin.id()))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            UserResponse::from(user),
            "User created successfully",
        )),
    ))
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = USERS_TAG,
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = ApiResponse<UserResponse>),
        (status = 401, description = "Unauthenticated", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
async fn get_user(
    State(state): State<Arc<UsersState>>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<i64>,
) -> UserResult<Json<ApiResponse<UserResponse>>> {
    let user = state.users.get_user_by_id(id).await?;
    Ok(Json(ApiResponse::data(user.into())))
}

/// Update a user; omitted fields are left untouched
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = USERS_TAG,
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<UserResponse>),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Email already in use", body = ErrorResponse)
    )
)]
async fn update_user(
    State(state): State<Arc<UsersState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    ValidatedJson(input): ValidatedJson<UpdateUserRequest>,
) -> UserResult<Json<ApiResponse<UserResponse>>> {
    let existing = state.users.get_user_by_id(id).await?;
    let user = state
        .users
        .update_user(&existing, input.into(), Some(admin.id()))
        .await?;

    Ok(Json(ApiResponse::with_message(
        user.into(),
        "User updated successfully",
    )))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = USERS_TAG,
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
async fn delete_user(
    State(state): State<Arc<UsersState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> UserResult<Json<MessageResponse>> {
    let existing = state.users.get_user_by_id(id).await?;
    if !state.users.delete_user(&existing, Some(admin.id())).await? {
        return Err(UserError::NotFound(id));
    }

    Ok(Json(MessageResponse::success("User deleted successfully")))
}

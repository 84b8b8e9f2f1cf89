use chrono::{DateTime, Utc};
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

/// Page size used when the client does not ask for one
pub const DEFAULT_PER_PAGE: u64 = 15;
/// Hard ceiling for `per_page`
pub const MAX_PER_PAGE: u64 = 100;

/// Account role. Stored as its lowercase name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[default]
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "guest")]
    Guest,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Roles that may be handed out through the API; `guest` is not one of them.
fn validate_assignable_role(role: &Role) -> Result<(), ValidationError> {
    match role {
        Role::Admin | Role::User => Ok(()),
        Role::Guest => Err(ValidationError::new("role")
            .with_message("The selected role is invalid.".into())),
    }
}

/// User account as seen by the domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string; `None` for accounts created without a password
    pub password_hash: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// `{id, name, email}`: recorded when an account appears or disappears.
    pub fn identity_snapshot(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "email": self.email,
        })
    }

    /// `{name, email, role}`: recorded on both sides of an update.
    pub fn profile_snapshot(&self) -> Value {
        json!({
            "name": self.name,
            "email": self.email,
            "role": self.role,
        })
    }
}

/// Input to `UserService::create_user`
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    /// Plaintext; hashed before it reaches storage
    pub password: Option<String>,
    /// Defaults to [`Role::User`]
    pub role: Option<Role>,
}

/// Input to `UserService::update_user`. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password.is_none() && self.role.is_none()
    }
}

/// Public view of a user; never carries the password hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Display name of `role`, e.g. "Admin"
    pub role_label: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::Admin => "Admin",
        Role::User => "User",
        Role::Guest => "Guest",
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            role_label: role_label(user.role).to_string(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// One page of users, newest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: u64,
    /// Effective page size after clamping
    pub per_page: u64,
    pub current_page: u64,
}

impl UserPage {
    pub fn last_page(&self) -> u64 {
        self.total.div_ceil(self.per_page).max(1)
    }

    /// 1-based rank of the first item on this page, `None` for an empty page
    pub fn from(&self) -> Option<u64> {
        (!self.users.is_empty()).then(|| {
            self.current_page
                .saturating_sub(1)
                .saturating_mul(self.per_page)
                .saturating_add(1)
        })
    }

    pub fn to(&self) -> Option<u64> {
        self.from()
            .map(|from| from.saturating_add(self.users.len() as u64 - 1))
    }

    pub fn meta(&self) -> PaginationMeta {
        PaginationMeta {
            total: self.total,
            per_page: self.per_page,
            current_page: self.current_page,
            last_page: self.last_page(),
            from: self.from(),
            to: self.to(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaginationMeta {
    pub total: u64,
    pub per_page: u64,
    pub current_page: u64,
    pub last_page: u64,
    pub from: Option<u64>,
    pub to: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub pagination: PaginationMeta,
}

impl From<UserPage> for UserListResponse {
    fn from(page: UserPage) -> Self {
        let pagination = page.meta();
        Self {
            users: page.users.into_iter().map(UserResponse::from).collect(),
            pagination,
        }
    }
}

/// Query string of `GET /users`
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationQuery {
    /// Page size, clamped to 1..=100 (default 15)
    pub per_page: Option<u64>,
    /// 1-based page number (default 1)
    pub page: Option<u64>,
}

/// Body of `POST /users`
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 255, message = "The name is required."))]
    pub name: String,
    #[validate(
        email(message = "The email must be a valid email address."),
        length(max = 255)
    )]
    pub email: String,
    #[validate(length(min = 8, message = "The password must be at least 8 characters long."))]
    pub password: String,
    #[validate(custom(function = "validate_assignable_role"))]
    pub role: Option<Role>,
}

impl From<CreateUserRequest> for NewUser {
    fn from(req: CreateUserRequest) -> Self {
        Self {
            name: req.name,
            email: req.email,
            password: Some(req.password),
            role: req.role,
        }
    }
}

/// Body of `PUT /users/{id}`
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(email, length(max = 255))]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "The password must be at least 8 characters long."))]
    pub password: Option<String>,
    #[validate(custom(function = "validate_assignable_role"))]
    pub role: Option<Role>,
}

impl From<UpdateUserRequest> for UserChanges {
    fn from(req: UpdateUserRequest) -> Self {
        Self {
            name: req.name,
            email: req.email,
            password: req.password,
            role: req.role,
        }
    }
}

/// Body of `POST /auth/register`. Any role sent by the client is ignored.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255, message = "The name is required."))]
    pub name: String,
    #[validate(
        email(message = "The email must be a valid email address."),
        length(max = 255)
    )]
    pub email: String,
    #[validate(length(min = 8, message = "The password must be at least 8 characters long."))]
    pub password: String,
}

/// Body of `POST /auth/login`
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// User plus the freshly issued bearer credential
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthTokenResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub token_type: String,
}

impl AuthTokenResponse {
    pub fn bearer(user: User, access_token: String) -> Self {
        Self {
            user: user.into(),
            access_token,
            token_type: "Bearer".to_string(),
        }
    }
}

/// Kind of mutation an audit entry records
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AuditAction {
    #[sea_orm(string_value = "create")]
    Create,
    #[sea_orm(string_value = "update")]
    Update,
    #[sea_orm(string_value = "delete")]
    Delete,
}

/// Persisted audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuditLogEntry {
    pub id: i64,
    /// Nulled when the subject is deleted
    pub subject_user_id: Option<i64>,
    /// `None` for mutations outside an authenticated context
    pub performed_by: Option<i64>,
    pub action: AuditAction,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub created_at: DateTime<Utc>,
}

//! Users Domain
//!
//! User accounts, bearer-token authentication and an audit trail of every
//! account mutation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │   Handlers   │  ← HTTP endpoints, principal extraction, role gates
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │ AuthService  │  ← register / login / logout / current user
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │ UserService  │  ← lifecycle rules, one transaction per mutation
//! └──┬────────┬──┘
//!    │        │
//! ┌──▼─────┐ ┌▼──────────┐
//! │ Users  │ │ Audit log │  ← stores, run on the caller's connection
//! └────────┘ └───────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_users::{CredentialHasher, UserService, UsersState, handlers};
//!
//! # async fn run(db: sea_orm::DatabaseConnection) {
//! let service = UserService::new(db, CredentialHasher::default());
//! let router = handlers::router(UsersState::new(service));
//! # }
//! ```

pub mod audit;
pub mod auth;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod hasher;
pub mod models;
pub mod repository;
pub mod service;
pub mod tokens;

pub use audit::{AuditFilter, AuditLogStore, AuditRecord};
pub use auth::{AuthService, Principal, TOKEN_NAME};
pub use error::{UserError, UserResult};
pub use handlers::{ApiDoc, ApiResponse, MessageResponse, UsersState};
pub use hasher::CredentialHasher;
pub use models::{
    AuditAction, AuditLogEntry, NewUser, Role, User, UserChanges, UserPage, UserResponse,
};
pub use repository::UserRepository;
pub use service::UserService;
pub use tokens::{AccessTokenStore, PlainTextToken, ResolvedToken};

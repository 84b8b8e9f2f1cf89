//! sea-orm entities for the `users`, `personal_access_tokens` and
//! `user_audit_logs` tables.

pub mod access_token;
pub mod audit_log;
pub mod user;

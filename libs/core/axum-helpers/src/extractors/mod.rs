mod bearer;
mod validated_json;

pub use bearer::BearerToken;
pub use validated_json::ValidatedJson;

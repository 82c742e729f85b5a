mod file_record;
mod shared_access;
mod user;

pub use file_record::{FileRecord, NewFileRecord};
pub use shared_access::SharedAccess;
pub use user::User;

/// Whether a query failed on a UNIQUE constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.is_unique_violation())
}

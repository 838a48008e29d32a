//! SQL for each table family. Every function takes the caller's
//! transaction (as `&Connection`) and returns the raw `rusqlite` result;
//! deciding what a constraint violation means is left to the caller.

pub mod channels;
pub mod messages;
pub mod reactions;
pub mod reads;
pub mod users;

use rusqlite::ffi;

fn extended_code(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => Some(e.extended_code),
        _ => None,
    }
}

/// True when `err` is a UNIQUE or PRIMARY KEY constraint rejection.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        extended_code(err),
        Some(ffi::SQLITE_CONSTRAINT_UNIQUE) | Some(ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

/// True when `err` is a FOREIGN KEY constraint rejection.
pub fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    extended_code(err) == Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}

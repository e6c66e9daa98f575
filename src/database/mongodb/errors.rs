//! Classification of the server command errors.

use mongodb::error::{Error, ErrorKind};

pub const NAMESPACE_NOT_FOUND: i32 = 26;
pub const NAMESPACE_EXISTS: i32 = 48;
pub const DUPLICATE_KEY: i32 = 11000;

/// `createUser` for an existing user.
pub const USER_ALREADY_EXISTS: i32 = 51003;

pub fn command_code(error: &Error) -> Option<i32> {
    match *error.kind {
        ErrorKind::Command(ref command_error) => Some(command_error.code),
        _ => None,
    }
}

pub fn is_user_already_exists(error: &Error) -> bool {
    matches!(command_code(error), Some(USER_ALREADY_EXISTS | DUPLICATE_KEY))
}

pub fn is_namespace_exists(error: &Error) -> bool {
    command_code(error) == Some(NAMESPACE_EXISTS)
}

pub fn is_namespace_not_found(error: &Error) -> bool {
    command_code(error) == Some(NAMESPACE_NOT_FOUND)
}

//! Process exit codes.

pub const SUCCESS: u8 = 0;
pub const GENERAL_ERROR: u8 = 1;
pub const NOT_FOUND: u8 = 3;
pub const AUTH_FAILED: u8 = 4;
pub const VAULT_INVALID: u8 = 5;
pub const PERMISSION_DENIED: u8 = 6;
pub const ALREADY_EXISTS: u8 = 7;
pub const CANCELLED: u8 = 130;

//! Request-level plumbing shared by all routes: bearer-token identity and
//! response security headers.

pub mod auth;
pub mod security_headers;

pub use auth::Principal;

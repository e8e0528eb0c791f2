//! Authentication: password hashing, bearer tokens, sessions.

mod password;
mod service;
mod token;

pub use password::{hash_password, verify_password};
pub use service::{
    AuthService, Authenticator, LoginResponse, Registered, Registration, TokenAuthenticator,
};
pub use token::{SESSION_TOKEN_PREFIX, generate_session_token, hash_session_token};

pub mod pkce;
pub mod refresh_lock;
pub mod session;
pub mod tokens;

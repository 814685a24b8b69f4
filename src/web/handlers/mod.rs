pub mod auth;
pub mod images;
pub mod roast;
pub mod share;
pub mod stats;

pub mod assistant;
pub mod link;
pub mod share;
pub mod stats;

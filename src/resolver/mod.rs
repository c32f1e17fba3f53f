pub mod cache;
pub mod direct;
pub mod engine;
pub mod inference;
pub mod metrics;
pub mod types;

pub use engine::CommandResolver;

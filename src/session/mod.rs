pub mod engine;
pub mod history;
pub mod state;

pub use engine::{CommandReport, VoiceSession};

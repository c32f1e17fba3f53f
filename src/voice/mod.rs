pub mod channel;
pub mod process_tts;
pub mod settings;
pub mod traits;
pub mod types;

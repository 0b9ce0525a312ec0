pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use ai::{AiError, ChatBackend, DeepSeekClient};
pub use config::LabsConfig;
pub use error::{FieldError, LabsError, ValidationReport};

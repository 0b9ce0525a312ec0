pub mod failure;
pub mod session;
pub mod telemetry;
pub mod user;

pub use failure::PedagogicalFailure;
pub use session::GameSession;
pub use telemetry::TelemetrySample;
pub use user::User;

//! Bulk session ingestion: payload validation, the storage gateway, and the
//! atomic pairing transaction.

pub mod ingest;
pub mod payload;
pub mod store;

pub use ingest::ingest_sessions;
pub use payload::{FailurePayload, SessionPayload, SyncRequest, TelemetryPayload};
pub use store::{InMemorySessionStore, PgSessionStore, SessionOverview, SessionStore};

pub mod reports;
pub mod status;
pub mod tutor;

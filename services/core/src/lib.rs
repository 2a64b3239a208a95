pub mod auth;
pub mod endpoint_error;
pub mod operation_error;
pub mod pg;
pub mod telemetry;

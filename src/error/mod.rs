//! Request error taxonomy
//!
//! Every handler returns `Result<_, ApiError>`; the `IntoResponse`
//! conversion in `conversion` turns the error into the JSON envelope.

pub mod conversion;
pub mod types;

pub use types::ApiError;

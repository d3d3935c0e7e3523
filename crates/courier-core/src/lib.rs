pub mod errors;
pub mod frames;
pub mod ids;
pub mod sanitize;

pub use errors::{RelayError, Severity};
pub use frames::{ClientFrame, ServerFrame};
pub use ids::ConnId;

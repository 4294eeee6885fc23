pub mod errors;
pub mod models;
pub mod services;
pub mod session;

// Re-export commonly used types
pub use errors::{TrackingError, TrackingResult};
pub use session::{SessionConfig, TrackingSession};

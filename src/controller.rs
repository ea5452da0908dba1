pub mod controller_handler;

pub use controller_handler::{CaptureSummary, Controller};

pub mod capture;
pub mod codec;
pub mod configuration;
pub mod controller;
pub mod error_handling;
pub mod session;
pub mod shutdown;

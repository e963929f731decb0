//! Middleware module - request logging

pub mod request_log;

pub use request_log::RequestLogLayer;

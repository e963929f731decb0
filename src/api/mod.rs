//! API module - router construction and handlers

pub mod routes;

pub use routes::create_router;

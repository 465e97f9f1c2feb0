// src/commands/mod.rs
mod api;

pub use api::{HandlerResponse, RequestError, RequestHandler, ROUTE_ANALYZE, ROUTE_UPLOAD};

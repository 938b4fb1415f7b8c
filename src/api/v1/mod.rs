/*
 * Responsibility
 * - v1 の入口 (routes() を re-export)
 */
pub mod dto;
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::routes;

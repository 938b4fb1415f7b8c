/*
 * Responsibility
 * - Router 単位の middleware: CORS / HTTP 周り / request pipeline
 */
pub mod cors;
pub mod http;
pub mod pipeline;

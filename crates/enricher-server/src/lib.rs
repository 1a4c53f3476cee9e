//! REST API server: upload, status, download and cancellation routes, DTOs,
//! and OpenAPI documentation.

pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;

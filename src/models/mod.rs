//! Request and Response models for the observer API
//!
//! DTOs used for serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{DeletedRequest, WrittenRequest};
pub use responses::{
    DeletedResponse, ErrorResponse, HealthResponse, RecentKeysResponse, StatsResponse,
    WrittenResponse,
};

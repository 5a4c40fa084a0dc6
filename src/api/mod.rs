//! API Module
//!
//! HTTP surface through which a host persistence layer reports writes and
//! deletes, and reads recently written keys.
//!
//! # Endpoints
//! - `POST /records/written` - Record a create or update
//! - `POST /records/deleted` - Forget a deleted record
//! - `GET /records/:record_type/recent` - Recently written keys
//! - `GET /stats` - Tracker and backing store statistics
//! - `GET /health` - Health check endpoint
//!
//! Send `x-session-id` to include that session's cache.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;

//! Email campaigns and automation flows that target audience segments.
//!
//! Provides REST API endpoints for the campaign and flow editors.
//! Data stored in DashMap; swap for a document store in production.

pub mod error;
pub mod flows;
pub mod handlers;
pub mod models;
pub mod router;
pub mod store;

pub use error::{ApiError, ApiResult};
pub use flows::{validate_flow, FlowIssue, FlowValidation};
pub use handlers::ManagementState;
pub use router::management_router;
pub use store::ManagementStore;

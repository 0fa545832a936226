//! HTTP API handlers for ildhvp-gs

pub mod auth;
pub mod buildinfo;
pub mod content;
pub mod error;
pub mod grade;
pub mod health;
pub mod session;
pub mod sse;

pub use auth::{auth_middleware, AuthUser};
pub use buildinfo::get_build_info;
pub use content::get_content_handler;
pub use error::ApiError;
pub use grade::{set_grade_handler, SetGradeRequest, SetGradeResponse};
pub use health::health_routes;
pub use session::{close_session, create_session, get_session, post_statement};
pub use sse::event_stream;

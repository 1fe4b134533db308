//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! capture listener (:8080)
//!     → /requests        capture.rs (count)
//!     → /static/*        ServeDir over the blob directory
//!     → anything else    capture.rs (capture, fixed greeting)
//!
//! management listener (:8081)
//!     → /view-requests   management.rs (history page)
//!     → /sse             management.rs (live stream)
//! ```

pub mod capture;
pub mod management;
pub mod server;

pub use server::{CaptureState, HttpServer, ManagementState};

//! Request catcher library.
//!
//! Captures every request that reaches the public listener, persists it,
//! serves it back page by page and relays it live to event-stream
//! subscribers.

pub mod broadcast;
pub mod capture;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod storage;

pub use capture::CapturedRequest;
pub use config::CatcherConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

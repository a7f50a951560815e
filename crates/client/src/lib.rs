//! Client side of the folio scheme interceptor.
//!
//! This crate provides URL classification and building for the synthetic
//! scheme, image reference rewriting, the streaming fetch transport, the task
//! lifecycle manager and the request dispatcher that ties them together.

pub mod fetch;
pub mod handler;
pub mod response;
pub mod rewrite;
pub mod route;
pub mod task;

pub use fetch::{FetchClient, FetchConfig, OutboundRequest, StreamingResponse, Transport, UrlError};
pub use handler::{HandlerConfig, SchemeHandler};
pub use response::{Payload, ResponseHead};
pub use rewrite::{ImagePolicy, ImageRewriter};
pub use route::{Route, SchemeUrls, classify};
pub use task::{InterceptedTask, SchemeRequest, TaskId, TaskManager, TaskSink};

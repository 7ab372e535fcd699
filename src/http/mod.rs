//! HTTP plumbing shared by the AI backend and the session sync client.

mod client;
mod sse;

pub use client::{Auth, HttpClient, HttpError};
pub use sse::{SseEvent, SseParser};

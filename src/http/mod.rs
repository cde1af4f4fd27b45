//! Low-level HTTP helper shared by every run API call.

mod client;

pub use client::{HttpClient, decode_json};

//! HTTP transport shared by the auth backend and the request pipeline

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};

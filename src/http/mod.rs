//! HTTP layer: serves site pages rendered with the device-specific module
//! for each request, plus health and metrics endpoints.

pub mod handler;

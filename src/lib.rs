//! Formgate - Abuse Rate Limiting for Form Submissions
//!
//! This crate implements an in-process, multi-tier sliding-window rate
//! limiter keyed by client IP and by email address. Three ascending IP
//! windows throttle bursts and sustained abuse; an independent email tier
//! caps submissions per address and form. It can be embedded as a library
//! or axum middleware, or run as a standalone HTTP service.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;

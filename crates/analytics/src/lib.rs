//! # Meridian Analytics Engine
//!
//! This crate provides the tools for conducting quantitative analysis of a
//! run's performance. It acts as the "unbiased judge" of the system.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** This crate has no knowledge of how a run was executed.
//!   It depends only on `core-types`, and consumes the closed-trade history
//!   and equity curve the accountant produces.
//! - **Stateless Calculation:** The `AnalyticsEngine` is a stateless
//!   calculator. It takes the finished run's data as input and produces a
//!   `PerformanceReport` as output, which makes it highly reliable and easy
//!   to test.
//!
//! ## Public API
//!
//! - `AnalyticsEngine`: The main struct that contains the calculation logic.
//! - `PerformanceReport`: The standardized struct that holds all performance metrics.
//! - `AnalyticsError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod engine;
pub mod error;
pub mod report;

// Re-export the key components to create a clean, public-facing API.
pub use engine::AnalyticsEngine;
pub use error::AnalyticsError;
pub use report::PerformanceReport;

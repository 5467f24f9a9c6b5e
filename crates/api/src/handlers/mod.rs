//! Request handlers.
//!
//! Handlers stay thin: they extract the request, delegate to `typhon_core`
//! and map errors via [`crate::error::AppError`].

pub mod run;

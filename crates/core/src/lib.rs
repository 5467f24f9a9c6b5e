//! Request normalization and supervised evaluator execution.
//!
//! The pipeline is `request::normalize` (client JSON to a canonical
//! [`request::ExecutionRequest`]), then [`evaluator::EvaluatorClient::execute`]
//! (one supervised child process), then [`assemble::assemble`] (outcome to
//! response body and HTTP status). Nothing here knows about HTTP framing.

pub mod assemble;
pub mod coercion;
pub mod error;
pub mod evaluator;
pub mod request;

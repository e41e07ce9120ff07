//! These models represent the objects passed around by the run loop
//!
//! There are several different related formats we need to interact with:
//! - openai messages/tools, sent from the run loop to the neutral provider
//! - anthropic messages/tools, sent from the run loop to the alternate provider
//! - tool call requests and results, exchanged between the run loop and agent functions
//!
//! The internal models follow the openai shape closely, since that is the canonical form
//! every other shape is derived from. Conversions live in `providers::utils`.
pub mod message;
pub mod role;
pub mod tool;

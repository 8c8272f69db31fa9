//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `SeenStatus`: outcome recorded for a URL in the seen-URL ledger
//! - `RunState`: state machine of one crawl run
//! - `ProviderState`: lifecycle of the provider around runs

mod provider_state;
mod run_state;
mod seen_status;

// Re-export main types
pub use provider_state::ProviderState;
pub use run_state::RunState;
pub use seen_status::SeenStatus;

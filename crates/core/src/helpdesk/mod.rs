//! Helpdesk integration.
//!
//! The workflow looks clients up by phone, links them to a ticket and
//! touches that ticket. `Helpdesk` is the seam; `UseDeskClient` talks to
//! the UseDesk HTTP API.

mod types;
mod usedesk;

pub use types::*;
pub use usedesk::UseDeskClient;

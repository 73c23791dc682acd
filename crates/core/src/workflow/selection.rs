//! Ticket tie-break policies.

use crate::config::TicketPolicy;
use crate::helpdesk::TicketId;

/// Ticket ids to check, in order, for an open one.
///
/// `OldestOpen` only ever considers the smallest id: if that ticket is
/// closed, no other ticket is tried. `LatestOpen` walks ids from newest to
/// oldest and takes the first open one.
pub fn candidates(tickets: &[TicketId], policy: TicketPolicy) -> Vec<TicketId> {
    match policy {
        TicketPolicy::OldestOpen => tickets.iter().min().copied().into_iter().collect(),
        TicketPolicy::LatestOpen => {
            let mut ids = tickets.to_vec();
            ids.sort_unstable_by(|a, b| b.cmp(a));
            ids.dedup();
            ids
        }
    }
}

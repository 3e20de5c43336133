use crate::events::LibraryEvent;

/// Trait for circulation event observation
pub trait LibraryObserver {
    /// Called after an operation has changed state
    fn on_event(&self, event: &LibraryEvent);
}

/// Forwards every event to `tracing`
#[derive(Debug)]
pub struct EventLogger;

impl LibraryObserver for EventLogger {
    fn on_event(&self, event: &LibraryEvent) {
        match event {
            LibraryEvent::PromotionSkipped { member_id, item_id } => {
                tracing::warn!(
                    member_id = %member_id,
                    item_id = %item_id,
                    "waitlisted member skipped"
                );
            }
            LibraryEvent::Returned { member_id, item_id, fee } if *fee > 0.0 => {
                tracing::info!(
                    member_id = %member_id,
                    item_id = %item_id,
                    fee,
                    "late return charged"
                );
            }
            other => {
                tracing::debug!(
                    member_id = other.member_id(),
                    item_id = other.item_id(),
                    event = ?other,
                    "library event"
                );
            }
        }
    }
}

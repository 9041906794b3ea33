//! Broadcast channel for forwarder events.
//!
//! Events are informational. Publishing with no subscribers is not an error
//! the forwarder cares about, and a lagging subscriber only loses events.

use forwarder_types::ForwarderEvent;
use tokio::sync::broadcast;

/// Default number of buffered events per subscriber.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Event bus for broadcasting forwarder events to multiple subscribers.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<ForwarderEvent>,
}

impl EventBus {
	/// Creates a bus that buffers up to `capacity` events per subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Each subscriber receives every event published after it subscribed.
	pub fn subscribe(&self) -> broadcast::Receiver<ForwarderEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event. Fails only when nobody is subscribed.
	pub fn publish(
		&self,
		event: ForwarderEvent,
	) -> Result<(), broadcast::error::SendError<ForwarderEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}

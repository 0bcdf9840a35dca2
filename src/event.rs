use std::time::Duration;
use tokio::sync::mpsc;

use crate::connectivity::ConnectivityMonitor;

/// Connectivity transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
  Online,
  Offline,
}

/// Polls connectivity and produces an event on every transition.
///
/// The first observed state is always reported, so a watcher started while
/// online immediately yields [`Event::Online`].
pub struct ConnectivityWatcher {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl ConnectivityWatcher {
  /// Create a watcher polling `monitor` at the given rate
  pub fn new(monitor: ConnectivityMonitor, poll_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
      let mut last: Option<bool> = None;
      loop {
        let connected = monitor.check().await;

        if last != Some(connected) {
          last = Some(connected);
          let event = if connected { Event::Online } else { Event::Offline };
          if tx.send(event).is_err() {
            break;
          }
        }

        tokio::time::sleep(poll_rate).await;
      }
    });

    Self { rx }
  }

  /// Receive the next transition
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::connectivity::ManualNetwork;
  use std::sync::Arc;

  async fn next(watcher: &mut ConnectivityWatcher) -> Event {
    tokio::time::timeout(Duration::from_secs(5), watcher.next())
      .await
      .unwrap()
      .unwrap()
  }

  #[tokio::test]
  async fn reports_initial_state_and_transitions() {
    let network = Arc::new(ManualNetwork::new(false));
    let monitor = ConnectivityMonitor::new(network.clone(), false);
    let mut watcher = ConnectivityWatcher::new(monitor.clone(), Duration::from_millis(5));

    assert_eq!(next(&mut watcher).await, Event::Offline);

    network.set_online(true);
    assert_eq!(next(&mut watcher).await, Event::Online);

    monitor.set_force_offline(true);
    assert_eq!(next(&mut watcher).await, Event::Offline);
  }
}

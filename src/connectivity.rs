use tokio::sync::watch;

/// Whether the device can currently reach the internet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Available,
    Unavailable,
}

/// A notice the screen shows when connectivity changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
    /// Shown for as long as the connection is down.
    NoInternet,
    /// Shown once, when the connection comes back.
    Restored,
}

impl Banner {
    pub fn message(self) -> &'static str {
        match self {
            Banner::NoInternet => "No access to the internet. Please check your connection.",
            Banner::Restored => "Connection successfully restored.",
        }
    }
}

/// Holds the last connectivity report from the platform and lets observers
/// follow it.
///
/// The shell owns the platform network callbacks and feeds every change
/// through [`ConnectivityMonitor::report`].
pub struct ConnectivityMonitor {
    state: watch::Sender<ConnectionState>,
}

impl ConnectivityMonitor {
    pub fn new(initial: ConnectionState) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state }
    }

    /// Record a report. Returns the banner to show when the state changed,
    /// `None` for a repeat of the current state.
    pub fn report(&self, reported: ConnectionState) -> Option<Banner> {
        let changed = self.state.send_if_modified(|state| {
            if *state == reported {
                return false;
            }
            *state = reported;
            true
        });
        if !changed {
            return None;
        }

        tracing::info!(state = ?reported, "Connectivity changed");
        Some(match reported {
            ConnectionState::Available => Banner::Restored,
            ConnectionState::Unavailable => Banner::NoInternet,
        })
    }

    pub fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_available(&self) -> bool {
        self.current() == ConnectionState::Available
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(ConnectionState::Available)
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::types::Coordinate;

/// What the map screen should show.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewState {
    Loading,
    /// Permission granted. The location is absent until the provider has
    /// reported one.
    Success(Option<Coordinate>),
    RevokedPermissions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionEvent {
    Granted,
    Revoked,
}

impl ViewState {
    /// The transition table. Granting keeps a location already known.
    pub fn transition(&self, event: PermissionEvent) -> ViewState {
        match event {
            PermissionEvent::Granted => ViewState::Success(self.location()),
            PermissionEvent::Revoked => ViewState::RevokedPermissions,
        }
    }

    pub fn location(&self) -> Option<Coordinate> {
        match self {
            ViewState::Success(location) => *location,
            _ => None,
        }
    }

    /// Where to center the map, falling back to (0, 0) before the first fix.
    /// `None` while the map is not shown at all.
    pub fn map_center(&self) -> Option<Coordinate> {
        match self {
            ViewState::Success(location) => Some(location.unwrap_or_default()),
            _ => None,
        }
    }
}

/// The platform's answer to a location permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionStatus {
    pub all_granted: bool,
    pub should_show_rationale: bool,
}

impl PermissionStatus {
    /// `None` means the screen should explain the request and ask again
    /// rather than change state.
    pub fn to_event(self) -> Option<PermissionEvent> {
        if self.all_granted {
            Some(PermissionEvent::Granted)
        } else if self.should_show_rationale {
            None
        } else {
            Some(PermissionEvent::Revoked)
        }
    }

    /// Permanently denied: only the system settings can grant it now.
    pub fn needs_settings_shortcut(self) -> bool {
        !self.all_granted && !self.should_show_rationale
    }
}

/// Source of continuous location fixes.
pub trait LocationProvider: Send + Sync {
    /// Start a subscription. Dropping the receiver ends it.
    fn subscribe(&self) -> mpsc::Receiver<Coordinate>;
}

/// Drives [`ViewState`] from permission events and location updates.
///
/// Observers read the state through [`LocationViewState::subscribe`].
pub struct LocationViewState {
    state: Arc<watch::Sender<ViewState>>,
    // Bumped on every event; an update task only publishes while its
    // generation is current.
    generation: Arc<AtomicU64>,
    provider: Arc<dyn LocationProvider>,
    // Update tasks run here, so events may arrive from threads outside the
    // runtime (the platform UI thread).
    runtime: Option<Handle>,
    updates: Mutex<Option<JoinHandle<()>>>,
}

impl LocationViewState {
    /// Build the machine on the current Tokio runtime, if there is one.
    pub fn new(provider: Arc<dyn LocationProvider>) -> Self {
        Self::build(provider, Handle::try_current().ok())
    }

    /// Build the machine with location updates running on `runtime`.
    pub fn with_runtime(provider: Arc<dyn LocationProvider>, runtime: Handle) -> Self {
        Self::build(provider, Some(runtime))
    }

    fn build(provider: Arc<dyn LocationProvider>, runtime: Option<Handle>) -> Self {
        let (state, _) = watch::channel(ViewState::Loading);
        Self {
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
            provider,
            runtime,
            updates: Mutex::new(None),
        }
    }

    pub fn current(&self) -> ViewState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    /// Apply a permission event. Safe to call from any thread.
    pub fn handle(&self, event: PermissionEvent) {
        self.stop_updates();

        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = state.transition(event);
        });
        tracing::debug!(?event, state = ?self.current(), "Permission event handled");

        if event == PermissionEvent::Granted {
            self.start_updates(generation);
        }
    }

    fn start_updates(&self, generation: u64) {
        let Some(runtime) = self
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
        else {
            tracing::warn!("No Tokio runtime available, location updates not started");
            return;
        };

        let mut receiver = self.provider.subscribe();
        let state = Arc::clone(&self.state);
        let current = Arc::clone(&self.generation);

        let handle = runtime.spawn(async move {
            while let Some(location) = receiver.recv().await {
                if !publish_location(&state, &current, generation, location) {
                    break;
                }
            }
            tracing::debug!(generation, "Location updates ended");
        });

        if let Ok(mut slot) = self.updates.lock() {
            *slot = Some(handle);
        }
    }

    fn stop_updates(&self) {
        if let Ok(mut slot) = self.updates.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

/// Publish `location` unless a later event has superseded `generation`.
/// Returns false once the update task should stop.
fn publish_location(
    state: &watch::Sender<ViewState>,
    current: &AtomicU64,
    generation: u64,
    location: Coordinate,
) -> bool {
    state.send_if_modified(|view| {
        if current.load(Ordering::SeqCst) != generation {
            return false;
        }
        *view = ViewState::Success(Some(location));
        true
    })
}

impl Drop for LocationViewState {
    fn drop(&mut self) {
        self.stop_updates();
    }
}

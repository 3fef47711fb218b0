//! Status publisher.
//!
//! Reflects the session state onto every trigger surface. The latest state
//! is persisted so a surface created in a fresh process can synchronize.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use voxdrop_core::error::{Result, VoxdropError};
use voxdrop_core::types::DisplayState;
use voxdrop_queue::StatusStore;

/// Something that shows a start/stop control.
pub trait StatusSurface: Send + Sync {
    /// Stable identifier used for `detach`.
    fn id(&self) -> &str;

    /// Redraw the control for `state`.
    fn render(&self, state: DisplayState) -> Result<()>;
}

/// Surface that logs what it would draw.
#[derive(Debug, Clone)]
pub struct ConsoleSurface {
    id: String,
}

impl ConsoleSurface {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl StatusSurface for ConsoleSurface {
    fn id(&self) -> &str {
        &self.id
    }

    fn render(&self, state: DisplayState) -> Result<()> {
        info!(
            surface = %self.id,
            icon = state.icon(),
            "Trigger surface: {}",
            state.label()
        );
        Ok(())
    }
}

/// Fans the display state out to all attached surfaces.
pub struct StatusPublisher {
    store: Option<StatusStore>,
    surfaces: Mutex<Vec<Arc<dyn StatusSurface>>>,
    latest: watch::Sender<DisplayState>,
}

impl StatusPublisher {
    /// Publisher backed by the persisted status in `store`.
    pub fn new(store: StatusStore) -> Self {
        let initial = store.latest().unwrap_or_else(|e| {
            warn!("Failed to read persisted display status: {}", e);
            DisplayState::Idle
        });
        Self::build(Some(store), initial)
    }

    /// Publisher that keeps the state in memory only.
    pub fn in_memory() -> Self {
        Self::build(None, DisplayState::Idle)
    }

    fn build(store: Option<StatusStore>, initial: DisplayState) -> Self {
        let (latest, _) = watch::channel(initial);
        Self {
            store,
            surfaces: Mutex::new(Vec::new()),
            latest,
        }
    }

    /// Publish `state` to every surface and persist it.
    ///
    /// A failing surface is logged and skipped. Returns the persistence
    /// error, if any, after all surfaces were updated.
    pub fn publish(&self, state: DisplayState) -> Result<()> {
        self.latest.send_replace(state);

        let surfaces = self.snapshot()?;
        if surfaces.is_empty() {
            debug!("No trigger surfaces attached; display state {} not rendered", state);
        }
        for surface in &surfaces {
            if let Err(e) = surface.render(state) {
                warn!(surface = %surface.id(), "Failed to render display state: {}", e);
            }
        }

        if let Some(store) = &self.store {
            store.record(state)?;
        }
        Ok(())
    }

    /// The persisted truth, falling back to the in-memory state when the
    /// store cannot be read.
    pub fn query_latest(&self) -> DisplayState {
        match &self.store {
            Some(store) => store.latest().unwrap_or_else(|e| {
                warn!("Failed to read display status, using in-memory value: {}", e);
                *self.latest.borrow()
            }),
            None => *self.latest.borrow(),
        }
    }

    /// Receiver that observes every published state.
    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.latest.subscribe()
    }

    /// Attach a surface and draw the current state on it immediately.
    pub fn attach(&self, surface: Arc<dyn StatusSurface>) -> Result<()> {
        let state = self.query_latest();
        if let Err(e) = surface.render(state) {
            warn!(surface = %surface.id(), "Failed to render display state: {}", e);
        }
        self.lock_surfaces()?.push(surface);
        Ok(())
    }

    /// Detach a surface by id. Returns whether it was attached.
    pub fn detach(&self, id: &str) -> Result<bool> {
        let mut surfaces = self.lock_surfaces()?;
        let before = surfaces.len();
        surfaces.retain(|s| s.id() != id);
        Ok(surfaces.len() != before)
    }

    pub fn surface_count(&self) -> usize {
        self.lock_surfaces().map(|s| s.len()).unwrap_or(0)
    }

    fn snapshot(&self) -> Result<Vec<Arc<dyn StatusSurface>>> {
        Ok(self.lock_surfaces()?.clone())
    }

    fn lock_surfaces(&self) -> Result<std::sync::MutexGuard<'_, Vec<Arc<dyn StatusSurface>>>> {
        self.surfaces
            .lock()
            .map_err(|e| VoxdropError::Session(format!("Surface list lock poisoned: {}", e)))
    }
}

impl std::fmt::Debug for StatusPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPublisher")
            .field("persisted", &self.store.is_some())
            .field("latest", &*self.latest.borrow())
            .field("surfaces", &self.surface_count())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use voxdrop_queue::Database;

    /// Records every state it is asked to render.
    struct RecordingSurface {
        id: String,
        rendered: Mutex<Vec<DisplayState>>,
        fail: bool,
    }

    impl RecordingSurface {
        fn new(id: &str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                rendered: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn rendered(&self) -> Vec<DisplayState> {
            self.rendered.lock().unwrap().clone()
        }
    }

    impl StatusSurface for RecordingSurface {
        fn id(&self) -> &str {
            &self.id
        }

        fn render(&self, state: DisplayState) -> Result<()> {
            self.rendered.lock().unwrap().push(state);
            if self.fail {
                Err(VoxdropError::Session("surface gone".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn store() -> StatusStore {
        StatusStore::new(Arc::new(Database::in_memory().unwrap()))
    }

    #[test]
    fn test_publish_without_surfaces_is_noop() {
        let publisher = StatusPublisher::in_memory();
        publisher.publish(DisplayState::Active).unwrap();
        assert_eq!(publisher.query_latest(), DisplayState::Active);
    }

    #[test]
    fn test_attach_renders_latest_immediately() {
        let publisher = StatusPublisher::in_memory();
        publisher.publish(DisplayState::Active).unwrap();

        let surface = RecordingSurface::new("home", false);
        publisher.attach(surface.clone()).unwrap();
        assert_eq!(surface.rendered(), vec![DisplayState::Active]);
    }

    #[test]
    fn test_failing_surface_does_not_block_others() {
        let publisher = StatusPublisher::in_memory();
        let broken = RecordingSurface::new("broken", true);
        let healthy = RecordingSurface::new("healthy", false);
        publisher.attach(broken.clone()).unwrap();
        publisher.attach(healthy.clone()).unwrap();

        publisher.publish(DisplayState::Active).unwrap();
        assert_eq!(healthy.rendered(), vec![DisplayState::Idle, DisplayState::Active]);
        assert_eq!(broken.rendered().len(), 2);
    }

    #[test]
    fn test_detach() {
        let publisher = StatusPublisher::in_memory();
        let surface = RecordingSurface::new("lock-screen", false);
        publisher.attach(surface.clone()).unwrap();
        assert_eq!(publisher.surface_count(), 1);

        assert!(publisher.detach("lock-screen").unwrap());
        assert!(!publisher.detach("lock-screen").unwrap());
        publisher.publish(DisplayState::Active).unwrap();
        assert_eq!(surface.rendered(), vec![DisplayState::Idle]);
    }

    #[test]
    fn test_state_persisted_across_publishers() {
        let store = store();
        let first = StatusPublisher::new(store.clone());
        first.publish(DisplayState::Active).unwrap();

        let second = StatusPublisher::new(store);
        assert_eq!(second.query_latest(), DisplayState::Active);
        assert_eq!(*second.subscribe().borrow(), DisplayState::Active);
    }

    #[test]
    fn test_subscribe_sees_publish() {
        let publisher = StatusPublisher::in_memory();
        let rx = publisher.subscribe();
        publisher.publish(DisplayState::Active).unwrap();
        assert_eq!(*rx.borrow(), DisplayState::Active);
    }

    #[test]
    fn test_console_surface_renders() {
        let surface = ConsoleSurface::new("console");
        assert_eq!(surface.id(), "console");
        assert!(surface.render(DisplayState::Active).is_ok());
    }
}

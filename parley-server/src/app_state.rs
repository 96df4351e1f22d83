use crate::store::SharedStore;

// Application state shared across all routes.
#[derive(Clone, Default)]
pub struct AppState {
    pub(crate) store: Option<SharedStore>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.store.is_some())
            .finish()
    }
}

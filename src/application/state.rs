//! Seeds the per-request state store from query parameters.

use serde::Serialize;

use crate::domain::request::RequestQuery;
use crate::domain::state::StateStore;

pub const ACTIVE_THREAD_PARAM: &str = "t";

pub const ACTIVE_THREAD_PATH: &str = "dashboardFeed.activeThread";
pub const MOUNTED_WITH_ACTIVE_THREAD_PATH: &str = "dashboardFeed.mountedWithActiveThread";
pub const SEARCH_OPEN_PATH: &str = "dashboardFeed.search.isOpen";

/// Request-derived initial values for the state tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialState {
    pub active_thread: String,
    pub search_open: bool,
}

impl InitialState {
    /// Missing or empty parameters fall back to an empty string.
    pub fn from_query(query: &RequestQuery) -> Self {
        Self {
            active_thread: query
                .get(ACTIVE_THREAD_PARAM)
                .unwrap_or_default()
                .to_string(),
            search_open: false,
        }
    }

    pub fn into_store(self) -> StateStore {
        let mut store = StateStore::new();
        store.set(ACTIVE_THREAD_PATH, self.active_thread.clone());
        store.set(MOUNTED_WITH_ACTIVE_THREAD_PATH, self.active_thread);
        store.set(SEARCH_OPEN_PATH, self.search_open);
        store
    }
}

/// Fresh store for one request.
pub fn initialize_store(query: &RequestQuery) -> StateStore {
    InitialState::from_query(query).into_store()
}

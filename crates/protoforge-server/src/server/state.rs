// App state for the Axum server
use protoforge_core::ProjectStore;
use protoforge_gen::{Pipeline, ProjectLocks};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    pub fn store(&self) -> &ProjectStore {
        self.pipeline.store()
    }

    pub fn locks(&self) -> &ProjectLocks {
        self.pipeline.locks()
    }
}

#![allow(dead_code)]

use std::sync::Arc;

use clampany::exec::{Executor, ExecutorRegistry};
use clampany::fs::mock::MockFileSystem;
use clampany::persist::ArtifactStore;

pub use clampany_test_utils::builders;
pub use clampany_test_utils::fake_executor;
pub use clampany_test_utils::{init_tracing, join_with_timeout, with_timeout};

pub const RUN_DIR: &str = "runs/run-test";

/// In-memory artifact store rooted at [`RUN_DIR`].
pub fn mem_store() -> (MockFileSystem, ArtifactStore) {
    let fs = MockFileSystem::new();
    let store = ArtifactStore::new(Arc::new(fs.clone()), RUN_DIR, "test");
    (fs, store)
}

/// Registry where both local test roles (`dev`, `ci`) use `executor`.
pub fn registry_with(executor: Arc<dyn Executor>) -> ExecutorRegistry {
    ExecutorRegistry::new()
        .with("dev", Arc::clone(&executor))
        .with("ci", executor)
}

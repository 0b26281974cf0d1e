//! Shared fixtures for unit tests.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::driver::{DriverError, ShardDriver};
use crate::shard::{Adapter, ConnectionSpec, ShardSpec};

/// Shard spec against a local test server, mirroring the usual fixture
/// topology: `foo_db` {foo, feline, canine}, `bar_db` {bar, feline, canine},
/// `honk_db` {honk}.
pub(crate) fn spec(database: &str, tags: &[&str]) -> ShardSpec {
    ShardSpec::new(
        tags.iter().copied().collect(),
        ConnectionSpec {
            host: "localhost".to_string(),
            port: 9506,
            username: "root".to_string(),
            password: "swordfish".to_string(),
            adapter: Adapter::Mysql,
            database: database.to_string(),
            connect_timeout: None,
        },
    )
}

/// In-memory pool handle carrying the database it was opened against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StubPool {
    pub database: String,
}

/// Recording driver: hands out [`StubPool`]s and counts lifecycle calls.
#[derive(Clone, Default)]
pub(crate) struct StubDriver {
    state: Arc<StubState>,
}

#[derive(Default)]
struct StubState {
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    fail_database: Mutex<Option<String>>,
}

impl StubDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    /// Make every `connect` against `database` fail.
    pub fn fail_connects_to(&self, database: &str) {
        *self.state.fail_database.lock().expect("lock poisoned") = Some(database.to_string());
    }
}

impl ShardDriver for StubDriver {
    type Pool = StubPool;

    fn connect(&self, spec: &ConnectionSpec) -> Result<Self::Pool, DriverError> {
        let failing = self.state.fail_database.lock().expect("lock poisoned");
        if failing.as_deref() == Some(spec.database.as_str()) {
            return Err(DriverError::new(format!(
                "cannot reach '{}' on {}:{}",
                spec.database, spec.host, spec.port
            )));
        }
        drop(failing);

        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(StubPool {
            database: spec.database.clone(),
        })
    }

    fn disconnect(&self, _pool: &Self::Pool) -> Result<(), DriverError> {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

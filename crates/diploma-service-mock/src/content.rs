//! In-memory content-addressed storage. Addresses are deterministic
//! counters so tests can assert on exact values.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use diploma_types::{Collaborator, ContentAddress, ContentStore, ServiceError};

#[derive(Debug, Default)]
struct Inner {
    uploads: u32,
    fail_uploads: bool,
}

#[derive(Clone, Default)]
pub struct MockContentStore {
    inner: Arc<Mutex<Inner>>,
}

impl MockContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Result<R, ServiceError> {
        let mut lock = self.inner.lock().map_err(|_| {
            ServiceError::unavailable(Collaborator::ContentStore, "mutex poisoned")
        })?;
        Ok(f(&mut lock))
    }

    pub fn fail_uploads(&self) {
        self.with_inner(|inner| inner.fail_uploads = true)
            .expect("mock content store lock");
    }

    pub fn upload_count(&self) -> u32 {
        self.with_inner(|inner| inner.uploads)
            .expect("mock content store lock")
    }

    fn next_address(&self) -> Result<ContentAddress, ServiceError> {
        self.with_inner(|inner| {
            if inner.fail_uploads {
                return Err(ServiceError::unavailable(
                    Collaborator::ContentStore,
                    "upload failed (injected)",
                ));
            }
            inner.uploads += 1;
            let address = ContentAddress::from_cid(&format!("QmMock{:05}", inner.uploads))
                .expect("well-formed cid");
            Ok(address)
        })?
    }
}

#[async_trait(?Send)]
impl ContentStore for MockContentStore {
    async fn upload_bytes(&self, bytes: &[u8]) -> Result<ContentAddress, ServiceError> {
        if bytes.is_empty() {
            return Err(ServiceError::rejected(
                Collaborator::ContentStore,
                "refusing empty payload",
            ));
        }
        self.next_address()
    }

    async fn upload_json(
        &self,
        _value: &serde_json::Value,
    ) -> Result<ContentAddress, ServiceError> {
        self.next_address()
    }
}

//! Board persistence collaborator.
//!
//! The core never stores boards itself; it hands [`BoardContent`] snapshots to
//! a [`BoardRepository`] and installs loaded content with
//! [`BoardStore::set_board_content`](crate::board::BoardStore::set_board_content).

mod memory;

pub use memory::MemoryStorage;

use crate::board::BoardContent;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Board not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Who can open a saved board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

/// A board to persist. Without an id the repository creates a new board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub visibility: Visibility,
    pub content: BoardContent,
}

impl SaveRequest {
    pub fn new(title: impl Into<String>, content: BoardContent) -> Self {
        Self {
            id: None,
            title: title.into(),
            visibility: Visibility::default(),
            content,
        }
    }
}

/// Trait for board storage backends.
///
/// On native platforms implementations must be Send + Sync. On WASM these
/// bounds are relaxed since it's single-threaded.
#[cfg(not(target_arch = "wasm32"))]
pub trait BoardRepository: Send + Sync {
    /// Save a board, returning its id.
    fn save(&self, request: SaveRequest) -> BoxFuture<'_, StorageResult<String>>;

    /// Load a board's content.
    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<BoardContent>>;
}

/// Trait for board storage backends (WASM version without Send + Sync).
#[cfg(target_arch = "wasm32")]
pub trait BoardRepository {
    /// Save a board, returning its id.
    fn save(&self, request: SaveRequest) -> BoxFuture<'_, StorageResult<String>>;

    /// Load a board's content.
    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<BoardContent>>;
}

#[cfg(test)]
pub(crate) fn block_on<F: Future>(f: F) -> F::Output {
    // Simple blocking executor for tests
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
            return result;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_save_request_wire_shape() {
        let request = SaveRequest::new("Plan", BoardContent::default());
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["visibility"], json!("private"));
        assert!(value.get("id").is_none());

        let parsed: SaveRequest = serde_json::from_value(json!({
            "id": "b1",
            "title": "Plan",
            "content": {}
        }))
        .unwrap();
        assert_eq!(parsed.id.as_deref(), Some("b1"));
        assert_eq!(parsed.visibility, Visibility::Private);
        assert!(parsed.content.is_empty());
    }
}

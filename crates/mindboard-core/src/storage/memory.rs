//! In-memory storage implementation.

use super::{BoardRepository, BoxFuture, SaveRequest, StorageError, StorageResult, Visibility};
use crate::board::BoardContent;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredBoard {
    title: String,
    visibility: Visibility,
    content: BoardContent,
}

/// In-memory storage for testing and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStorage {
    boards: RwLock<HashMap<String, StoredBoard>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Title and visibility of a stored board.
    pub fn metadata(&self, id: &str) -> StorageResult<(String, Visibility)> {
        let boards = self
            .boards
            .read()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        boards
            .get(id)
            .map(|b| (b.title.clone(), b.visibility))
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.boards.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BoardRepository for MemoryStorage {
    fn save(&self, request: SaveRequest) -> BoxFuture<'_, StorageResult<String>> {
        Box::pin(async move {
            let mut boards = self
                .boards
                .write()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            let id = request
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            boards.insert(
                id.clone(),
                StoredBoard {
                    title: request.title,
                    visibility: request.visibility,
                    content: request.content,
                },
            );
            log::debug!("Saved board {}", id);
            Ok(id)
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<BoardContent>> {
        let id = id.to_string();
        Box::pin(async move {
            let boards = self
                .boards
                .read()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            boards
                .get(&id)
                .map(|b| b.content.clone())
                .ok_or(StorageError::NotFound(id))
        })
    }
}

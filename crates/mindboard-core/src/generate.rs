//! AI mindmap generation collaborator.
//!
//! The request itself is delegated to a [`MindmapGenerator`]. This module
//! owns what happens around it: keyword normalization, the per-client
//! single-flight gate, decoding the service's reply and placing the returned
//! labels on the board.

use crate::board::BoardStore;
use crate::collaboration::RealtimeTransport;
use crate::layout::layout;
use crate::shapes::TextNode;
use crate::storage::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a generation round produced nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The service could not be reached. Retryable.
    #[error("Network error: {0}")]
    Network(String),
    /// The service answered with a non-success status.
    #[error("Generation failed ({status}): {message}")]
    Status { status: u16, message: String },
    /// The service answered but returned no labels.
    #[error("Nothing generated")]
    Empty,
}

/// Request body of the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindmapRequest {
    pub keyword: String,
}

/// Success body of the generation service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindmapResponse {
    #[serde(default)]
    pub nodes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Decode a reply of the generation service.
///
/// A non-2xx status becomes [`GenerationError::Status`] carrying the body's
/// `error` text when there is one. A success without labels is
/// [`GenerationError::Empty`].
pub fn parse_reply(status: u16, body: &str) -> Result<Vec<String>, GenerationError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.error)
            .unwrap_or_else(|_| body.trim().to_string());
        return Err(GenerationError::Status { status, message });
    }
    let response: MindmapResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Status {
            status,
            message: format!("Invalid response: {}", e),
        })?;
    if response.nodes.is_empty() {
        return Err(GenerationError::Empty);
    }
    Ok(response.nodes)
}

/// Something that turns a keyword into related labels.
#[cfg(not(target_arch = "wasm32"))]
pub trait MindmapGenerator: Send + Sync {
    /// Generate labels for a trimmed, non-empty keyword.
    fn generate(&self, keyword: &str) -> BoxFuture<'_, Result<Vec<String>, GenerationError>>;
}

/// Something that turns a keyword into related labels (WASM version without
/// Send + Sync).
#[cfg(target_arch = "wasm32")]
pub trait MindmapGenerator {
    /// Generate labels for a trimmed, non-empty keyword.
    fn generate(&self, keyword: &str) -> BoxFuture<'_, Result<Vec<String>, GenerationError>>;
}

/// Trimmed keyword, or `None` when nothing is left to ask for.
pub fn normalize_keyword(keyword: &str) -> Option<String> {
    let keyword = keyword.trim();
    (!keyword.is_empty()).then(|| keyword.to_string())
}

/// Single-flight flag: at most one generation round per client at a time.
#[derive(Debug, Clone, Default)]
pub struct GenerationGate {
    in_flight: Option<String>,
}

impl GenerationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate for `keyword`. Returns the trimmed keyword, or `None`
    /// when the keyword is blank or a round is already running.
    pub fn begin(&mut self, keyword: &str) -> Option<String> {
        if self.in_flight.is_some() {
            log::debug!("Generation already in flight, ignoring {:?}", keyword);
            return None;
        }
        let keyword = normalize_keyword(keyword)?;
        self.in_flight = Some(keyword.clone());
        Some(keyword)
    }

    /// Release the gate, whatever the outcome of the round.
    pub fn finish(&mut self) {
        self.in_flight = None;
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Keyword of the round in flight.
    pub fn keyword(&self) -> Option<&str> {
        self.in_flight.as_deref()
    }
}

/// Holds the gate for one round and releases it when dropped, so an abandoned
/// round does not keep it claimed.
struct GateClaim<'a> {
    gate: &'a mut GenerationGate,
}

impl Drop for GateClaim<'_> {
    fn drop(&mut self) {
        self.gate.finish();
    }
}

/// Lay out generated labels after the existing nodes, add them as one undo
/// step and broadcast them.
pub fn apply_generated(
    store: &mut BoardStore,
    transport: &mut RealtimeTransport,
    texts: &[String],
) -> Result<Vec<TextNode>, GenerationError> {
    if texts.is_empty() {
        return Err(GenerationError::Empty);
    }
    let nodes = layout(texts, store.text_nodes().len());
    store.push_undo_snapshot();
    store.add_text_nodes(nodes.clone());
    transport.broadcast_mindmap_nodes(&nodes);
    log::info!("Added {} mindmap nodes", nodes.len());
    Ok(nodes)
}

/// Run one generation round for `keyword`: ask the generator and return the
/// labels. The caller applies them with [`apply_generated`] once it has the
/// store back.
///
/// Returns `Ok(None)` without calling the generator when the keyword is blank
/// or another round holds the gate. The gate is released when the round ends,
/// including when the returned future is dropped before completing.
pub async fn run_generation<G: MindmapGenerator + ?Sized>(
    generator: &G,
    gate: &mut GenerationGate,
    keyword: &str,
) -> Result<Option<Vec<String>>, GenerationError> {
    let Some(keyword) = gate.begin(keyword) else {
        return Ok(None);
    };
    let claim = GateClaim { gate };
    let result = generator.generate(&keyword).await;
    drop(claim);
    match result {
        Ok(texts) if texts.is_empty() => Err(GenerationError::Empty),
        Ok(texts) => Ok(Some(texts)),
        Err(e) => {
            log::warn!("Mindmap generation for {:?} failed: {}", keyword, e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaboration::tests::{broadcasts, subscribed};
    use crate::layout::{GAP, GRID_LEFT, GRID_TOP};
    use crate::shapes::{NODE_HEIGHT, NODE_WIDTH};
    use crate::storage::block_on;
    use crate::sync::BoardEvent;
    use std::future::Future;
    use std::sync::Mutex;
    use std::task::{Context, Poll, Waker};

    struct FakeGenerator {
        reply: Result<Vec<String>, GenerationError>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeGenerator {
        fn new(reply: Result<Vec<String>, GenerationError>) -> Self {
            Self {
                reply,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl MindmapGenerator for FakeGenerator {
        fn generate(&self, keyword: &str) -> BoxFuture<'_, Result<Vec<String>, GenerationError>> {
            self.calls.lock().unwrap().push(keyword.to_string());
            let reply = self.reply.clone();
            Box::pin(async move { reply })
        }
    }

    /// Never answers.
    struct StalledGenerator;

    impl MindmapGenerator for StalledGenerator {
        fn generate(&self, _keyword: &str) -> BoxFuture<'_, Result<Vec<String>, GenerationError>> {
            Box::pin(std::future::pending())
        }
    }

    fn labels(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_gate_is_single_flight() {
        let mut gate = GenerationGate::new();
        assert_eq!(gate.begin("  rust "), Some("rust".to_string()));
        assert!(gate.is_generating());
        assert_eq!(gate.keyword(), Some("rust"));
        assert_eq!(gate.begin("go"), None);
        gate.finish();
        assert!(!gate.is_generating());
        assert_eq!(gate.begin("   "), None);
        assert!(!gate.is_generating());
    }

    #[test]
    fn test_run_generation_trims_and_releases() {
        let generator = FakeGenerator::new(Ok(labels(&["a", "b"])));
        let mut gate = GenerationGate::new();

        let texts = block_on(run_generation(&generator, &mut gate, " rust ")).unwrap();
        assert_eq!(texts, Some(labels(&["a", "b"])));
        assert_eq!(*generator.calls.lock().unwrap(), vec!["rust".to_string()]);
        assert!(!gate.is_generating());
    }

    #[test]
    fn test_blank_keyword_skips_generator() {
        let generator = FakeGenerator::new(Ok(labels(&["a"])));
        let mut gate = GenerationGate::new();
        assert_eq!(block_on(run_generation(&generator, &mut gate, " \t")), Ok(None));
        assert!(generator.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failures_release_the_gate() {
        let mut gate = GenerationGate::new();

        let empty = FakeGenerator::new(Ok(Vec::new()));
        assert_eq!(
            block_on(run_generation(&empty, &mut gate, "rust")),
            Err(GenerationError::Empty)
        );
        assert!(!gate.is_generating());

        let offline = FakeGenerator::new(Err(GenerationError::Network("offline".into())));
        assert!(matches!(
            block_on(run_generation(&offline, &mut gate, "rust")),
            Err(GenerationError::Network(_))
        ));
        assert!(!gate.is_generating());
    }

    #[test]
    fn test_abandoned_round_releases_the_gate() {
        let mut gate = GenerationGate::new();
        {
            let mut round = Box::pin(run_generation(&StalledGenerator, &mut gate, "rust"));
            let mut cx = Context::from_waker(Waker::noop());
            assert!(round.as_mut().poll(&mut cx).is_pending());
        }
        assert!(!gate.is_generating());

        let generator = FakeGenerator::new(Ok(labels(&["a"])));
        let texts = block_on(run_generation(&generator, &mut gate, "rust")).unwrap();
        assert_eq!(texts, Some(labels(&["a"])));
        assert_eq!(generator.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_apply_generated_places_after_existing_nodes() {
        let mut store = BoardStore::new();
        let mut transport = subscribed(&mut store);
        store.add_text_nodes(vec![TextNode::new("seed", 0.0, 0.0)]);

        let nodes = apply_generated(&mut store, &mut transport, &labels(&["a", "b", "c", "d", "e"]))
            .unwrap();
        assert_eq!(store.text_nodes().len(), 6);
        assert_eq!(store.undo_len(), 1);

        // Index 1..=5: the last one wraps to the second row.
        assert_eq!(nodes[0].x, GRID_LEFT + NODE_WIDTH + GAP);
        assert_eq!(nodes[4].x, GRID_LEFT);
        assert_eq!(nodes[4].y, GRID_TOP + NODE_HEIGHT + GAP);

        let sent = broadcasts(&transport.take_outgoing());
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event, BoardEvent::MindmapNodesAdded { nodes: nodes.clone() });

        assert!(store.undo());
        assert_eq!(store.text_nodes().len(), 1);
    }

    #[test]
    fn test_apply_nothing_is_empty() {
        let mut store = BoardStore::new();
        let mut transport = subscribed(&mut store);
        assert_eq!(
            apply_generated(&mut store, &mut transport, &[]),
            Err(GenerationError::Empty)
        );
        assert!(!store.can_undo());
        assert!(!transport.has_outgoing());
    }

    #[test]
    fn test_parse_reply() {
        assert_eq!(
            parse_reply(200, r#"{"nodes":["a","b"]}"#),
            Ok(labels(&["a", "b"]))
        );
        assert_eq!(parse_reply(200, r#"{"nodes":[]}"#), Err(GenerationError::Empty));
        assert_eq!(parse_reply(200, "{}"), Err(GenerationError::Empty));
        assert_eq!(
            parse_reply(400, r#"{"error":"keyword is required"}"#),
            Err(GenerationError::Status {
                status: 400,
                message: "keyword is required".into(),
            })
        );
        assert_eq!(
            parse_reply(502, "Bad Gateway\n"),
            Err(GenerationError::Status {
                status: 502,
                message: "Bad Gateway".into(),
            })
        );
        assert!(matches!(
            parse_reply(200, "not json"),
            Err(GenerationError::Status { status: 200, .. })
        ));
    }
}

//! Cyclic node collection with round-robin, health-skipping rotation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::capability::CapabilityRegistry;
use crate::clock::{Clock, SystemClock};
use crate::node::{Node, NodeConfig, NodeStatus};

/// Fixed, ordered set of nodes with a shared rotation cursor.
///
/// The cursor points at the node most recently handed out. Every rotation
/// step advances it by one, so consecutive calls resume where the previous
/// one stopped.
pub struct NodeRing {
    nodes: Vec<Arc<Node>>,
    cursor: AtomicUsize,
    capabilities: CapabilityRegistry,
}

impl NodeRing {
    /// Build a ring on the system clock with a fresh capability registry.
    pub fn new<I, S>(urls: I, config: NodeConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_parts(urls, config, Arc::new(SystemClock), CapabilityRegistry::new())
    }

    pub fn with_parts<I, S>(
        urls: I,
        config: NodeConfig,
        clock: Arc<dyn Clock>,
        capabilities: CapabilityRegistry,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let nodes: Vec<Arc<Node>> = urls
            .into_iter()
            .map(|url| Arc::new(Node::new(url, config, clock.clone(), capabilities.clone())))
            .collect();
        // first rotation step lands on the first configured node
        let cursor = nodes.len().saturating_sub(1);
        Self {
            nodes,
            cursor: AtomicUsize::new(cursor),
            capabilities,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// The node the cursor points at.
    pub fn current(&self) -> Option<Arc<Node>> {
        self.nodes.get(self.cursor()).cloned()
    }

    pub fn status(&self) -> Vec<NodeStatus> {
        self.nodes.iter().map(|n| n.status()).collect()
    }

    /// Nodes to try for one logical call, at most one full lap.
    ///
    /// If nothing is working, every node is reset first so the lap is never
    /// empty. Health is re-checked as each candidate is produced.
    pub fn candidates(&self) -> Candidates<'_> {
        if !self.nodes.is_empty() && !self.nodes.iter().any(|n| n.is_working()) {
            tracing::warn!(nodes = self.nodes.len(), "no working nodes left, resetting all");
            for node in &self.nodes {
                node.reset();
            }
        }
        Candidates {
            ring: self,
            remaining: self.nodes.len(),
        }
    }

    /// Move the cursor one step and return its new position.
    fn advance(&self) -> usize {
        let len = self.nodes.len();
        let prev = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % len))
            .unwrap_or_else(|c| c);
        (prev + 1) % len
    }
}

impl std::fmt::Debug for NodeRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRing")
            .field("nodes", &self.nodes)
            .field("cursor", &self.cursor())
            .finish()
    }
}

/// Lazy, bounded walk over a [`NodeRing`].
pub struct Candidates<'a> {
    ring: &'a NodeRing,
    remaining: usize,
}

impl Iterator for Candidates<'_> {
    type Item = Arc<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            self.remaining -= 1;
            let node = &self.ring.nodes[self.ring.advance()];
            if node.is_working() {
                return Some(node.clone());
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

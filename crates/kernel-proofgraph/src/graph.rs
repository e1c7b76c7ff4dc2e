use crate::node::{Node, NodeType};
use kernel_core::types::{LamportClock, NodeId, SignerKeyId};
use kernel_core::{ContentHash, KernelError};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

struct Inner {
    nodes: HashMap<NodeId, Node>,
    heads: Vec<NodeId>,
    lamport: LamportClock,
}

/// An in-memory, append-only DAG of `Node`s. Parents are fixed at
/// insertion time, so the structure cannot contain cycles by
/// construction. Every mutating operation runs under a single internal
/// mutex: multiple threads may call `append` concurrently, but never
/// interleave the read-heads / compute-hash / insert sequence.
pub struct ProofGraph {
    inner: Mutex<Inner>,
}

impl Default for ProofGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ProofGraph {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                nodes: HashMap::new(),
                heads: Vec::new(),
                lamport: 0,
            }),
        }
    }

    /// Append an unsigned node bound to the graph's current heads, then
    /// replace the heads with the new node. Returns the inserted node.
    pub fn append(&self, node_type: NodeType, payload_hash: ContentHash) -> Result<Node, KernelError> {
        let mut inner = self.inner.lock().expect("proofgraph mutex poisoned");
        let parents = inner.heads.clone();
        let lamport = inner.lamport;
        let node = Node::new(node_type, parents, lamport, payload_hash)?;
        inner.lamport += 1;
        inner.heads = vec![node.node_id.clone()];
        inner.nodes.insert(node.node_id.clone(), node.clone());
        Ok(node)
    }

    /// Append a signed node; the signature is bound into `node_hash` so a
    /// forged or stripped signature changes the node's identity.
    pub fn append_signed(
        &self,
        node_type: NodeType,
        payload_hash: ContentHash,
        signature: String,
        signer_key_id: SignerKeyId,
    ) -> Result<Node, KernelError> {
        let mut inner = self.inner.lock().expect("proofgraph mutex poisoned");
        let parents = inner.heads.clone();
        let lamport = inner.lamport;
        let node = Node::new_signed(node_type, parents, lamport, payload_hash, signature, signer_key_id)?;
        inner.lamport += 1;
        inner.heads = vec![node.node_id.clone()];
        inner.nodes.insert(node.node_id.clone(), node.clone());
        Ok(node)
    }

    /// Append a node that explicitly joins multiple parents (e.g. binding
    /// a receipt to both the effect it resolves and a prior obligation
    /// node), instead of the graph's ambient heads.
    pub fn append_joining(
        &self,
        node_type: NodeType,
        parent_ids: Vec<NodeId>,
        payload_hash: ContentHash,
    ) -> Result<Node, KernelError> {
        let mut inner = self.inner.lock().expect("proofgraph mutex poisoned");
        for parent in &parent_ids {
            if !inner.nodes.contains_key(parent) {
                return Err(KernelError::NotFound(format!("proofgraph parent {parent}")));
            }
        }
        let lamport = inner.lamport;
        let node = Node::new(node_type, parent_ids, lamport, payload_hash)?;
        inner.lamport += 1;
        inner.heads = vec![node.node_id.clone()];
        inner.nodes.insert(node.node_id.clone(), node.clone());
        Ok(node)
    }

    pub fn get(&self, node_id: &NodeId) -> Option<Node> {
        let inner = self.inner.lock().expect("proofgraph mutex poisoned");
        inner.nodes.get(node_id).cloned()
    }

    pub fn heads(&self) -> Vec<NodeId> {
        let inner = self.inner.lock().expect("proofgraph mutex poisoned");
        inner.heads.clone()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().expect("proofgraph mutex poisoned");
        inner.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot every node in the graph, ordered by lamport clock. Used by
    /// the evidence bundler, which has no other way to enumerate a graph it
    /// does not otherwise own an iterator over.
    pub fn nodes(&self) -> Vec<Node> {
        let inner = self.inner.lock().expect("proofgraph mutex poisoned");
        let mut nodes: Vec<Node> = inner.nodes.values().cloned().collect();
        nodes.sort_by_key(|n| n.lamport);
        nodes
    }

    /// Walk every node reachable from `node_id` back to its roots,
    /// recomputing each node's hash and checking that its declared
    /// parents exist in the graph. Returns the first break encountered,
    /// deepest parent first, so a caller sees the root cause rather than
    /// a downstream symptom.
    pub fn validate_chain(&self, node_id: &NodeId) -> Result<(), KernelError> {
        let inner = self.inner.lock().expect("proofgraph mutex poisoned");
        let mut visited = HashSet::new();
        let mut stack = vec![node_id.clone()];
        let mut order = Vec::new();

        while let Some(id) = stack.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let node = inner
                .nodes
                .get(&id)
                .ok_or_else(|| KernelError::NotFound(format!("proofgraph node {id}")))?;
            for parent in &node.parent_ids {
                if !inner.nodes.contains_key(parent) {
                    return Err(KernelError::ChainBroken { at: node.lamport });
                }
                stack.push(parent.clone());
            }
            order.push(id);
        }

        // Verify leaves-first so a tampered root is reported at its own
        // lamport clock rather than bubbling up through descendants.
        for id in order.into_iter().rev() {
            let node = inner.nodes.get(&id).expect("node visited above");
            node.verify_self_hash()?;
        }
        Ok(())
    }
}

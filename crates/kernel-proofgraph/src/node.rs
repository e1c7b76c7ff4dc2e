use kernel_core::types::{LamportClock, NodeId, SignerKeyId};
use kernel_core::{Canonical, ContentHash, KernelError};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// What kind of artifact a ProofGraph node binds. Mirrors the three
/// audit-path artifacts that get chained into the graph: a Guardian
/// disposition, the effect it authorized, and the receipt the Executor
/// produced for it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeType {
    Decision,
    Effect,
    Receipt,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Decision => "DECISION",
            NodeType::Effect => "EFFECT",
            NodeType::Receipt => "RECEIPT",
        }
    }
}

/// A single node in the ProofGraph DAG. `node_id` is content-addressed: it
/// is the hex of `node_hash`, so two nodes with identical type, parents,
/// payload hash, and lamport clock collapse to the same identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub node_id: NodeId,
    pub node_type: NodeType,
    pub parent_ids: Vec<NodeId>,
    pub lamport: LamportClock,
    pub payload_hash: ContentHash,
    pub node_hash: ContentHash,
    pub signature: Option<String>,
    pub signer_key_id: Option<SignerKeyId>,
}

impl Node {
    /// Build an unsigned node bound to `parents` and the given lamport
    /// clock. `node_hash` (and therefore `node_id`) is derived from every
    /// field except itself.
    pub fn new(
        node_type: NodeType,
        parent_ids: Vec<NodeId>,
        lamport: LamportClock,
        payload_hash: ContentHash,
    ) -> Result<Self, KernelError> {
        Self::build(node_type, parent_ids, lamport, payload_hash, None, None)
    }

    /// Build a node whose hash additionally binds a detached signature
    /// over the unsigned node, so tampering with the signature itself
    /// invalidates the node's identity.
    pub fn new_signed(
        node_type: NodeType,
        parent_ids: Vec<NodeId>,
        lamport: LamportClock,
        payload_hash: ContentHash,
        signature: String,
        signer_key_id: SignerKeyId,
    ) -> Result<Self, KernelError> {
        Self::build(
            node_type,
            parent_ids,
            lamport,
            payload_hash,
            Some(signature),
            Some(signer_key_id),
        )
    }

    fn build(
        node_type: NodeType,
        parent_ids: Vec<NodeId>,
        lamport: LamportClock,
        payload_hash: ContentHash,
        signature: Option<String>,
        signer_key_id: Option<SignerKeyId>,
    ) -> Result<Self, KernelError> {
        let node_hash = Self::compute_hash(
            &node_type,
            &parent_ids,
            lamport,
            &payload_hash,
            signature.as_deref(),
            signer_key_id.as_ref(),
        )?;
        let node_id = NodeId::new(node_hash.to_hex());
        Ok(Self {
            node_id,
            node_type,
            parent_ids,
            lamport,
            payload_hash,
            node_hash,
            signature,
            signer_key_id,
        })
    }

    fn compute_hash(
        node_type: &NodeType,
        parent_ids: &[NodeId],
        lamport: LamportClock,
        payload_hash: &ContentHash,
        signature: Option<&str>,
        signer_key_id: Option<&SignerKeyId>,
    ) -> Result<ContentHash, KernelError> {
        let value = json!({
            "type": node_type.as_str(),
            "parents": parent_ids.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
            "lamport": lamport,
            "payload_hash": payload_hash.to_string(),
            "signature": signature,
            "signer_key_id": signer_key_id.map(|k| k.as_str()),
        });
        let canonical = Canonical::normalize(&value)?;
        Ok(canonical.content_hash())
    }

    /// Recompute this node's hash from its current fields and compare
    /// against the stored `node_hash`; a mismatch means the node (or the
    /// storage beneath it) was tampered with.
    pub fn verify_self_hash(&self) -> Result<(), KernelError> {
        let recomputed = Self::compute_hash(
            &self.node_type,
            &self.parent_ids,
            self.lamport,
            &self.payload_hash,
            self.signature.as_deref(),
            self.signer_key_id.as_ref(),
        )?;
        if recomputed != self.node_hash {
            return Err(KernelError::HashMismatch {
                expected: self.node_hash.to_string(),
                got: recomputed.to_string(),
            });
        }
        Ok(())
    }

    pub fn is_root(&self) -> bool {
        self.parent_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_hash() -> ContentHash {
        Canonical::normalize(&json!({"op": "write_file"}))
            .unwrap()
            .content_hash()
    }

    #[test]
    fn root_node_has_no_parents() {
        let node = Node::new(NodeType::Decision, vec![], 0, payload_hash()).unwrap();
        assert!(node.is_root());
    }

    #[test]
    fn node_id_is_derived_from_hash() {
        let node = Node::new(NodeType::Decision, vec![], 0, payload_hash()).unwrap();
        assert_eq!(node.node_id.as_str(), node.node_hash.to_hex());
    }

    #[test]
    fn identical_inputs_produce_identical_hash() {
        let a = Node::new(NodeType::Decision, vec![], 0, payload_hash()).unwrap();
        let b = Node::new(NodeType::Decision, vec![], 0, payload_hash()).unwrap();
        assert_eq!(a.node_hash, b.node_hash);
    }

    #[test]
    fn different_parents_produce_different_hash() {
        let a = Node::new(NodeType::Decision, vec![], 0, payload_hash()).unwrap();
        let b = Node::new(
            NodeType::Effect,
            vec![NodeId::new("parent")],
            1,
            payload_hash(),
        )
        .unwrap();
        assert_ne!(a.node_hash, b.node_hash);
    }

    #[test]
    fn self_hash_verification_detects_tampering() {
        let mut node = Node::new(NodeType::Decision, vec![], 0, payload_hash()).unwrap();
        assert!(node.verify_self_hash().is_ok());
        node.lamport = 99;
        assert!(node.verify_self_hash().is_err());
    }
}

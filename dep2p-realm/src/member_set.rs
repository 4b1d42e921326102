// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use std::collections::HashSet;

use dep2p_identity::NodeId;
use tokio::sync::RwLock;

/// The realm's member set: many concurrent reads during protocol routing,
/// rare writes on join/leave — a reader-writer lock per spec §5's
/// shared-resource policy.
#[derive(Default)]
pub struct MemberSet {
    inner: RwLock<HashSet<NodeId>>,
}

impl MemberSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, node_id: NodeId) -> bool {
        self.inner.write().await.insert(node_id)
    }

    pub async fn remove(&self, node_id: &NodeId) -> bool {
        self.inner.write().await.remove(node_id)
    }

    pub async fn contains(&self, node_id: &NodeId) -> bool {
        self.inner.read().await.contains(node_id)
    }

    pub async fn members(&self) -> Vec<NodeId> {
        self.inner.read().await.iter().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> NodeId {
        dep2p_identity::KeyPair::generate().node_id()
    }

    #[tokio::test]
    async fn insert_then_contains() {
        let set = MemberSet::new();
        let node = node();
        assert!(set.insert(node).await);
        assert!(set.contains(&node).await);
        assert_eq!(set.len().await, 1);
    }

    #[tokio::test]
    async fn remove_drops_member() {
        let set = MemberSet::new();
        let node = node();
        set.insert(node).await;
        assert!(set.remove(&node).await);
        assert!(!set.contains(&node).await);
    }

    #[tokio::test]
    async fn duplicate_insert_is_idempotent() {
        let set = MemberSet::new();
        let node = node();
        assert!(set.insert(node).await);
        assert!(!set.insert(node).await);
        assert_eq!(set.len().await, 1);
    }
}

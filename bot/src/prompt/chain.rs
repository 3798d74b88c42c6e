//! Reply-chain traversal. Walking follows the replied-to backlink until it
//! runs out or a message can no longer be fetched; a failed fetch truncates
//! the chain rather than failing the whole prompt.

use async_trait::async_trait;

/// Defensive cap; backlinks strictly decrease in the host platform so a
/// cycle cannot occur, but pathological data should not spin us forever.
pub const MAX_CHAIN_DEPTH: usize = 64;

/// One message reduced to what the compiler needs.
#[derive(Debug, Clone)]
pub struct ChainMessage {
    pub id: u64,
    pub author_id: u64,
    pub content: String,
    /// Replied-to backlink.
    pub referenced: Option<u64>,
    /// Image URLs from attachments and embeds.
    pub images: Vec<String>,
}

/// The host platform's message directory.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn fetch(&self, message_id: u64) -> Option<ChainMessage>;
}

/// Collect the conversation ending at `leaf`, oldest first.
pub async fn walk_chain<S: MessageSource>(source: &S, leaf: ChainMessage) -> Vec<ChainMessage> {
    let mut chain = vec![leaf];
    while chain.len() < MAX_CHAIN_DEPTH {
        let Some(parent_id) = chain.last().and_then(|m| m.referenced) else {
            break;
        };
        match source.fetch(parent_id).await {
            Some(parent) => chain.push(parent),
            // Unfetchable parent: truncate here.
            None => break,
        }
    }
    chain.reverse();
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MemSource {
        messages: HashMap<u64, ChainMessage>,
    }

    #[async_trait]
    impl MessageSource for MemSource {
        async fn fetch(&self, message_id: u64) -> Option<ChainMessage> {
            self.messages.get(&message_id).cloned()
        }
    }

    fn message(id: u64, referenced: Option<u64>) -> ChainMessage {
        ChainMessage {
            id,
            author_id: 100 + id,
            content: format!("message {id}"),
            referenced,
            images: vec![],
        }
    }

    fn source_of(messages: Vec<ChainMessage>) -> MemSource {
        MemSource {
            messages: messages.into_iter().map(|m| (m.id, m)).collect(),
        }
    }

    #[tokio::test]
    async fn walks_to_the_root_oldest_first() {
        let source = source_of(vec![message(1, None), message(2, Some(1))]);
        let chain = walk_chain(&source, message(3, Some(2))).await;
        assert_eq!(
            chain.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn unfetchable_parent_truncates_at_depth() {
        // 3 -> 2 -> 1 -> 99 where 99 is gone: exactly three turns survive.
        let source = source_of(vec![message(1, Some(99)), message(2, Some(1))]);
        let chain = walk_chain(&source, message(3, Some(2))).await;
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].id, 1);
    }

    #[tokio::test]
    async fn single_message_without_backlink() {
        let source = source_of(vec![]);
        let chain = walk_chain(&source, message(7, None)).await;
        assert_eq!(chain.len(), 1);
    }

    #[tokio::test]
    async fn depth_cap_bounds_traversal() {
        let mut messages = vec![];
        for id in 1..200u64 {
            messages.push(message(id, if id > 1 { Some(id - 1) } else { None }));
        }
        let source = source_of(messages);
        let chain = walk_chain(&source, message(200, Some(199))).await;
        assert_eq!(chain.len(), MAX_CHAIN_DEPTH);
    }
}

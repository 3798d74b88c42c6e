//! Serenity-backed adapters for the message and membership directories.

use async_trait::async_trait;
use serenity::all::{ChannelId, Context, GuildId, Message, MessageId, UserId};

use crate::discord::constants::{MEMBER_FETCH_TIMEOUT, MESSAGE_FETCH_TIMEOUT};
use crate::identity::MemberDirectory;
use crate::prompt::chain::{ChainMessage, MessageSource};

/// Reduce a gateway message to what the prompt compiler consumes: image
/// attachments and embed images become URLs on the compiled turn.
pub fn chain_message(msg: &Message) -> ChainMessage {
    let mut images: Vec<String> = msg
        .attachments
        .iter()
        .filter(|attachment| {
            attachment
                .content_type
                .as_ref()
                .is_some_and(|ct| ct.starts_with("image/"))
        })
        .map(|attachment| attachment.proxy_url.clone())
        .collect();
    images.extend(
        msg.embeds
            .iter()
            .filter_map(|embed| embed.image.as_ref().map(|image| image.url.clone())),
    );

    ChainMessage {
        id: msg.id.get(),
        author_id: msg.author.id.get(),
        content: msg.content.clone(),
        referenced: msg
            .message_reference
            .as_ref()
            .and_then(|reference| reference.message_id)
            .map(|id| id.get()),
        images,
    }
}

pub struct SerenityMessageSource<'a> {
    pub ctx: &'a Context,
    pub channel_id: ChannelId,
}

#[async_trait]
impl MessageSource for SerenityMessageSource<'_> {
    async fn fetch(&self, message_id: u64) -> Option<ChainMessage> {
        let fetch = self
            .channel_id
            .message(&self.ctx.http, MessageId::new(message_id));
        match tokio::time::timeout(MESSAGE_FETCH_TIMEOUT, fetch).await {
            Ok(Ok(msg)) => Some(chain_message(&msg)),
            Ok(Err(e)) => {
                tracing::warn!("Failed to fetch message {message_id}: {e}");
                None
            }
            Err(_) => {
                tracing::warn!("Timed out fetching message {message_id}");
                None
            }
        }
    }
}

pub struct SerenityDirectory<'a> {
    pub ctx: &'a Context,
    pub guild_id: GuildId,
}

#[async_trait]
impl MemberDirectory for SerenityDirectory<'_> {
    async fn display_name(&self, user_id: i64) -> Option<String> {
        let lookup = self
            .guild_id
            .member(&self.ctx.http, UserId::new(user_id as u64));
        match tokio::time::timeout(MEMBER_FETCH_TIMEOUT, lookup).await {
            Ok(Ok(member)) => Some(
                member
                    .nick
                    .clone()
                    .unwrap_or_else(|| member.display_name().to_string()),
            ),
            Ok(Err(e)) => {
                tracing::debug!("Member lookup failed for {user_id}: {e}");
                None
            }
            Err(_) => {
                tracing::warn!("Timed out looking up member {user_id}");
                None
            }
        }
    }
}

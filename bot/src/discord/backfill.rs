//! Reconciliation against history: walk every text channel, page through the
//! reactors of each scored reaction, and replay them through the idempotent
//! ledger. Safe to run repeatedly; already-recorded slots contribute no
//! karma.

use serenity::all::{ChannelType, Context, GuildId, Message, MessageReaction, UserId};
use serenity::futures::StreamExt;

use crate::discord::bot::reaction_kind;
use crate::karma::{ReactionKind, ReactionLedger};
use crate::ledger::Ledger;

const REACTOR_PAGE_SIZE: u8 = 100;

pub async fn reconcile_guild(
    ctx: &Context,
    guild_id: GuildId,
    reactions: &ReactionLedger<Ledger>,
) -> eyre::Result<()> {
    tracing::info!("Starting reaction backfill for guild {guild_id}");
    let channels = guild_id.channels(&ctx.http).await?;
    let mut scanned = 0usize;

    for (channel_id, channel) in channels {
        if channel.kind != ChannelType::Text {
            continue;
        }
        let mut messages = channel_id.messages_iter(&ctx.http).boxed();
        while let Some(result) = messages.next().await {
            let message = match result {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!("Stopping history walk in channel {channel_id}: {e}");
                    break;
                }
            };
            scanned += 1;
            for reaction in &message.reactions {
                let emoji = reaction.reaction_type.to_string();
                let Some(kind) = reaction_kind(&emoji) else {
                    continue;
                };
                if let Err(e) =
                    replay_reactors(ctx, guild_id, &message, reaction, &emoji, kind, reactions)
                        .await
                {
                    tracing::warn!(
                        "Failed to replay reactions on message {}: {e}",
                        message.id
                    );
                }
            }
        }
    }

    tracing::info!("Reaction backfill scanned {scanned} messages in guild {guild_id}");
    Ok(())
}

async fn replay_reactors(
    ctx: &Context,
    guild_id: GuildId,
    message: &Message,
    reaction: &MessageReaction,
    emoji: &str,
    kind: ReactionKind,
    reactions: &ReactionLedger<Ledger>,
) -> eyre::Result<()> {
    let mut after: Option<UserId> = None;
    loop {
        let users = message
            .reaction_users(
                &ctx.http,
                reaction.reaction_type.clone(),
                Some(REACTOR_PAGE_SIZE),
                after,
            )
            .await?;
        if users.is_empty() {
            break;
        }
        after = users.last().map(|user| user.id);
        for user in users {
            reactions
                .add(
                    guild_id.get() as i64,
                    message.id.get() as i64,
                    user.id.get() as i64,
                    message.author.id.get() as i64,
                    emoji,
                    kind,
                )
                .await?;
        }
    }
    Ok(())
}

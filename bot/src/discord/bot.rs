use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use rand::RngExt as _;
use serenity::all::{Context, Message, Reaction, Ready, Typing, UserId};
use serenity::async_trait;
use serenity::prelude::*;

use crate::config::{ServerConfig, StaticAssets};
use crate::credit::CreditGate;
use crate::discord::constants::{DOWNVOTE_EMOJI, PROMPT_COST_ESTIMATE, UPVOTE_EMOJI};
use crate::discord::fetch::{chain_message, SerenityDirectory, SerenityMessageSource};
use crate::discord::{backfill, commands, delivery};
use crate::error::BotError;
use crate::identity;
use crate::karma::{ReactionKind, ReactionLedger};
use crate::ledger::Ledger;
use crate::llm::ChatProvider;
use crate::prompt::chain::walk_chain;
use crate::prompt::{collect_participants, compile, CompileContext, GenerationParams};
use crate::safety::{contains_alarming_words, InsultTrigger, CRISIS_MESSAGE};

pub(crate) fn reaction_kind(emoji: &str) -> Option<ReactionKind> {
    match emoji {
        UPVOTE_EMOJI => Some(ReactionKind::Upvote),
        DOWNVOTE_EMOJI => Some(ReactionKind::Downvote),
        _ => None,
    }
}

pub struct Handler {
    ledger: Arc<Ledger>,
    credit: Arc<CreditGate<Ledger>>,
    reactions: Arc<ReactionLedger<Ledger>>,
    provider: ChatProvider,
    config: Arc<ServerConfig>,
    assets: Arc<StaticAssets>,
    insult_trigger: InsultTrigger,
    bot_user_id: ArcSwap<Option<UserId>>,
}

impl Handler {
    pub fn new(
        ledger: Arc<Ledger>,
        credit: Arc<CreditGate<Ledger>>,
        reactions: Arc<ReactionLedger<Ledger>>,
        provider: ChatProvider,
        config: Arc<ServerConfig>,
        assets: Arc<StaticAssets>,
    ) -> Self {
        Handler {
            ledger,
            credit,
            reactions,
            provider,
            config,
            assets,
            insult_trigger: InsultTrigger::new(),
            bot_user_id: ArcSwap::new(Arc::new(None)),
        }
    }

    async fn handle_alarming_words(&self, ctx: &Context, msg: &Message, guild_id: i64) {
        let karma = self
            .ledger
            .karma_of(guild_id, msg.author.id.get() as i64)
            .await
            .inspect_err(|e| tracing::warn!("Failed to load karma for crisis check: {e}"))
            .unwrap_or(0);

        let insult = if karma < 0
            && !self.assets.insults.is_empty()
            && self.insult_trigger.roll().await
        {
            let index = rand::rng().random_range(0..self.assets.insults.len());
            self.assets.insults.get(index).cloned()
        } else {
            None
        };

        let reply = insult.unwrap_or_else(|| CRISIS_MESSAGE.to_string());
        if let Err(e) = msg.reply(&ctx.http, reply).await {
            tracing::error!("Failed to send crisis reply: {e}");
        }
    }

    /// The conversational path: walk the reply chain, compile it, clear the
    /// credit gate, call the model, debit the measured cost, and deliver.
    async fn handle_prompt_chain(
        &self,
        ctx: &Context,
        msg: &Message,
        bot_id: UserId,
    ) -> Result<(), BotError> {
        let Some(guild_id) = msg.guild_id else {
            return Ok(());
        };
        let author_id = msg.author.id.get() as i64;

        if !self.credit.authorize(author_id, PROMPT_COST_ESTIMATE).await? {
            msg.reply(&ctx.http, "Your balance is too low for this command.")
                .await?;
            return Ok(());
        }

        let _typing = Typing::start(ctx.http.clone(), msg.channel_id);

        let source = SerenityMessageSource {
            ctx,
            channel_id: msg.channel_id,
        };
        let chain = walk_chain(&source, chain_message(msg)).await;

        let participants = collect_participants(&chain, bot_id.get());
        let directory = SerenityDirectory { ctx, guild_id };
        let identities =
            identity::resolve_all(self.ledger.as_ref(), &directory, &participants).await;

        let mut abbreviations: HashMap<u64, Vec<(String, String)>> = HashMap::new();
        for message in &chain {
            if abbreviations.contains_key(&message.author_id) {
                continue;
            }
            let rows = self
                .ledger
                .abbreviations_for(guild_id.get() as i64, message.author_id as i64)
                .await
                .inspect_err(|e| tracing::warn!("Failed to load abbreviations: {e}"))
                .unwrap_or_default();
            abbreviations.insert(
                message.author_id,
                rows.into_iter().map(|a| (a.key, a.value)).collect(),
            );
        }

        let compiled = compile(
            &chain,
            &CompileContext {
                bot_id: bot_id.get(),
                personality: &self.assets.default_personality,
                participants: &participants,
                identities: &identities,
                abbreviations: &abbreviations,
                include_directory: self.config.test_guild_id != Some(guild_id.get()),
            },
            GenerationParams::default(),
        );

        match self.provider.complete(&compiled).await {
            Ok(outcome) => {
                // Debit only a confirmed success.
                self.credit.debit(author_id, outcome.cost).await?;
                delivery::reply_chunked(&ctx.http, msg, &outcome.text, outcome.image).await?;
            }
            Err(e) => {
                tracing::error!("Error getting chat response: {e}");
                msg.reply(&ctx.http, format!("Error: {e}")).await?;
            }
        }
        Ok(())
    }

    async fn handle_reaction(&self, ctx: &Context, reaction: &Reaction, added: bool) {
        let Some(guild_id) = reaction.guild_id else {
            return;
        };
        let Some(reactor_id) = reaction.user_id else {
            return;
        };
        let emoji = reaction.emoji.to_string();
        let Some(kind) = reaction_kind(&emoji) else {
            return;
        };

        let result = if added {
            // The reactee is whoever authored the reacted-to message.
            let message = match reaction
                .channel_id
                .message(&ctx.http, reaction.message_id)
                .await
            {
                Ok(message) => message,
                Err(e) => {
                    tracing::error!("Failed to fetch reacted message: {e}");
                    return;
                }
            };
            self.reactions
                .add(
                    guild_id.get() as i64,
                    reaction.message_id.get() as i64,
                    reactor_id.get() as i64,
                    message.author.id.get() as i64,
                    &emoji,
                    kind,
                )
                .await
        } else {
            self.reactions
                .remove(
                    guild_id.get() as i64,
                    reaction.message_id.get() as i64,
                    reactor_id.get() as i64,
                    &emoji,
                    kind,
                )
                .await
                .map(|_| ())
        };

        if let Err(e) = result {
            tracing::error!("Failed to record reaction: {e}");
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!("Bot is ready. Logged in as {}", ready.user.name);
        self.bot_user_id.store(Arc::new(Some(ready.user.id)));

        if self.config.backfill_reactions {
            for guild in &ready.guilds {
                let ctx = ctx.clone();
                let guild_id = guild.id;
                let reactions = self.reactions.clone();
                tokio::spawn(async move {
                    if let Err(e) = backfill::reconcile_guild(&ctx, guild_id, &reactions).await {
                        tracing::error!("Reaction backfill failed for guild {guild_id}: {e}");
                    }
                });
            }
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };
        let Some(bot_id) = **self.bot_user_id.load() else {
            return;
        };

        if self.config.handle_alarming_words && contains_alarming_words(&msg.content) {
            self.handle_alarming_words(&ctx, &msg, guild_id.get() as i64)
                .await;
        }

        // A message opening with the bot mention is either a utility command
        // or conversation.
        let mention = format!("<@{bot_id}>");
        let nick_mention = format!("<@!{bot_id}>");
        let rest = msg
            .content
            .strip_prefix(&mention)
            .or_else(|| msg.content.strip_prefix(&nick_mention))
            .map(str::trim);

        if let Some(rest) = rest {
            if let Some(command) = commands::parse(rest) {
                if let Err(e) = commands::run(
                    command,
                    &ctx,
                    &msg,
                    guild_id.get() as i64,
                    &self.credit,
                    &self.ledger,
                )
                .await
                {
                    tracing::error!("Command failed: {e}");
                }
                return;
            }
            if let Err(e) = self.handle_prompt_chain(&ctx, &msg, bot_id).await {
                tracing::error!("Prompt chain handling failed: {e}");
            }
            return;
        }

        // Replying to one of the bot's messages continues the conversation.
        if msg
            .referenced_message
            .as_ref()
            .is_some_and(|replied| replied.author.id == bot_id)
        {
            if let Err(e) = self.handle_prompt_chain(&ctx, &msg, bot_id).await {
                tracing::error!("Prompt chain handling failed: {e}");
            }
        }
    }

    async fn reaction_add(&self, ctx: Context, reaction: Reaction) {
        self.handle_reaction(&ctx, &reaction, true).await;
    }

    async fn reaction_remove(&self, ctx: Context, reaction: Reaction) {
        self.handle_reaction(&ctx, &reaction, false).await;
    }
}

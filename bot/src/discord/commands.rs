//! Hand-parsed utility commands from the text following the bot mention.
//! Anything that does not parse here is treated as conversation.

use serenity::all::{Context, Message};

use crate::credit::CreditGate;
use crate::discord::constants::DABLOON_RATE;
use crate::error::BotError;
use crate::ledger::Ledger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Tokens,
    Karma,
    AbbrSet(String, String),
    AbbrGet(String),
    AbbrDel(String),
    AbbrList,
}

pub(crate) fn parse(content: &str) -> Option<Command> {
    let mut words = content.split_whitespace();
    match words.next()? {
        "tokens" | "dabloons" => Some(Command::Tokens),
        "karma" => Some(Command::Karma),
        "abbr" => match words.next()? {
            "set" => {
                let key = words.next()?.to_string();
                let value = words.collect::<Vec<_>>().join(" ");
                if value.is_empty() {
                    None
                } else {
                    Some(Command::AbbrSet(key, value))
                }
            }
            "get" => Some(Command::AbbrGet(words.next()?.to_string())),
            "del" => Some(Command::AbbrDel(words.next()?.to_string())),
            "list" => Some(Command::AbbrList),
            _ => None,
        },
        _ => None,
    }
}

pub async fn run(
    command: Command,
    ctx: &Context,
    msg: &Message,
    guild_id: i64,
    credit: &CreditGate<Ledger>,
    ledger: &Ledger,
) -> Result<(), BotError> {
    let user_id = msg.author.id.get() as i64;
    match command {
        Command::Tokens => {
            let account = credit.account(user_id).await?;
            let dabloons = (account.usage_balance * DABLOON_RATE).round() as i64;
            let bank_dabloons = (account.bank_balance * DABLOON_RATE).round() as i64;
            msg.reply(
                &ctx.http,
                format!("Dabloons: **{dabloons}** 🪙\nBank Dabloons: **{bank_dabloons}** 🏦"),
            )
            .await?;
        }
        Command::Karma => {
            let karma = ledger.karma_of(guild_id, user_id).await?;
            msg.reply(&ctx.http, format!("Your karma: **{karma}**"))
                .await?;
        }
        Command::AbbrSet(key, value) => {
            ledger
                .set_abbreviation(guild_id, user_id, &key, &value)
                .await?;
            msg.reply(&ctx.http, format!("Abbreviation `{key}` set."))
                .await?;
        }
        Command::AbbrGet(key) => {
            let value = ledger
                .abbreviations_for(guild_id, user_id)
                .await?
                .into_iter()
                .find(|a| a.key == key)
                .map(|a| a.value);
            match value {
                Some(value) => {
                    let preview: String = value.chars().take(1900).collect();
                    msg.reply(&ctx.http, format!("`{key}`: {preview}")).await?;
                }
                None => {
                    msg.reply(&ctx.http, format!("No abbreviation found for `{key}`."))
                        .await?;
                }
            }
        }
        Command::AbbrDel(key) => {
            let deleted = ledger.delete_abbreviation(guild_id, user_id, &key).await?;
            let reply = if deleted {
                format!("Abbreviation `{key}` deleted.")
            } else {
                format!("No abbreviation found for `{key}`.")
            };
            msg.reply(&ctx.http, reply).await?;
        }
        Command::AbbrList => {
            let abbreviations = ledger.abbreviations_for(guild_id, user_id).await?;
            let reply = if abbreviations.is_empty() {
                "You have no abbreviations.".to_string()
            } else {
                let keys = abbreviations
                    .iter()
                    .map(|a| a.key.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Your abbreviations: {keys}")
            };
            msg.reply(&ctx.http, reply).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_balance_queries() {
        assert_eq!(parse("tokens"), Some(Command::Tokens));
        assert_eq!(parse("dabloons"), Some(Command::Tokens));
        assert_eq!(parse("karma"), Some(Command::Karma));
    }

    #[test]
    fn parses_abbreviation_commands() {
        assert_eq!(
            parse("abbr set brb be right back"),
            Some(Command::AbbrSet(
                "brb".to_string(),
                "be right back".to_string()
            ))
        );
        assert_eq!(parse("abbr get brb"), Some(Command::AbbrGet("brb".into())));
        assert_eq!(parse("abbr del brb"), Some(Command::AbbrDel("brb".into())));
        assert_eq!(parse("abbr list"), Some(Command::AbbrList));
    }

    #[test]
    fn incomplete_commands_do_not_parse() {
        assert_eq!(parse("abbr set brb"), None);
        assert_eq!(parse("abbr"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn conversation_is_not_a_command() {
        assert_eq!(parse("hey how are you"), None);
        assert_eq!(parse("tokenize this sentence"), None);
    }
}

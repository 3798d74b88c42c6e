//! Compiles a reply chain into a role-tagged message list ready for a chat
//! completion call: inline generation directives are extracted and stripped,
//! user macros expanded, numeric identifiers swapped for display names,
//! consecutive assistant turns merged, and image attachments carried along.

pub mod chain;

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{DEFAULT_MODEL_ENGINE, DEFAULT_TEMPERATURE, DEFAULT_TOP_P};
use crate::identity::ResolvedIdentity;
use chain::ChainMessage;

static DIRECTIVE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(usemodel|usetemp|usefreq|usepres|usetopp)\s+(\S+)").unwrap()
});

static MENTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?(\d{17,19})>").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationParams {
            model: DEFAULT_MODEL_ENGINE.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub images: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CompiledPrompt {
    pub system: String,
    pub turns: Vec<Turn>,
    pub params: GenerationParams,
}

pub struct CompileContext<'a> {
    pub bot_id: u64,
    pub personality: &'a str,
    /// Every participant, in discovery order (bot first).
    pub participants: &'a [u64],
    pub identities: &'a HashMap<u64, ResolvedIdentity>,
    /// Per-author macro tables.
    pub abbreviations: &'a HashMap<u64, Vec<(String, String)>>,
    /// Test-guild prompts skip the user directory and memory sections.
    pub include_directory: bool,
}

/// Everyone involved in the chain: the bot (so its turns can be labeled),
/// each author, and every explicitly mentioned user. Order of discovery,
/// deduplicated.
pub fn collect_participants(chain: &[ChainMessage], bot_id: u64) -> Vec<u64> {
    let mut ids = vec![bot_id];
    let mut seen: HashSet<u64> = ids.iter().copied().collect();
    for msg in chain {
        if seen.insert(msg.author_id) {
            ids.push(msg.author_id);
        }
        for capture in MENTION_PATTERN.captures_iter(&msg.content) {
            if let Ok(mentioned) = capture[1].parse::<u64>() {
                if seen.insert(mentioned) {
                    ids.push(mentioned);
                }
            }
        }
    }
    ids
}

/// Literal substring macro expansion.
pub fn expand_abbreviations(text: &str, abbreviations: &[(String, String)]) -> String {
    let mut expanded = text.to_string();
    for (key, value) in abbreviations {
        expanded = expanded.replace(key, value);
    }
    expanded
}

pub fn compile(
    chain: &[ChainMessage],
    ctx: &CompileContext<'_>,
    defaults: GenerationParams,
) -> CompiledPrompt {
    let mut params = defaults;
    let mut entries: Vec<(u64, String, Vec<String>)> = Vec::with_capacity(chain.len());

    for msg in chain {
        // Later messages override earlier ones for the same directive.
        for capture in DIRECTIVE_PATTERN.captures_iter(&msg.content) {
            let value = &capture[2];
            match capture[1].to_lowercase().as_str() {
                "usemodel" => params.model = value.to_string(),
                "usetemp" => {
                    if let Ok(temperature) = value.parse() {
                        params.temperature = temperature;
                    }
                }
                "usetopp" => {
                    if let Ok(top_p) = value.parse() {
                        params.top_p = top_p;
                    }
                }
                // usefreq/usepres are stripped but no longer forwarded.
                _ => {}
            }
        }

        let mut clean = DIRECTIVE_PATTERN
            .replace_all(&msg.content, "")
            .trim()
            .to_string();
        if let Some(stripped) = clean.strip_prefix('!') {
            clean = stripped.to_string();
        }
        if let Some(abbreviations) = ctx.abbreviations.get(&msg.author_id) {
            clean = expand_abbreviations(&clean, abbreviations);
        }

        entries.push((
            msg.author_id,
            format!("{}: {}", msg.author_id, clean),
            msg.images.clone(),
        ));
    }

    // Identifier -> name, longest id first so a shorter id that happens to
    // be a substring of a longer one cannot corrupt it.
    let mut ids: Vec<u64> = ctx.identities.keys().copied().collect();
    ids.sort_by(|a, b| {
        let (a_len, b_len) = (a.to_string().len(), b.to_string().len());
        b_len.cmp(&a_len).then(b.cmp(a))
    });
    for (_, line, _) in &mut entries {
        for id in &ids {
            let token = id.to_string();
            if line.contains(&token) {
                if let Some(identity) = ctx.identities.get(id) {
                    *line = line.replace(&token, &identity.name);
                }
            }
        }
    }

    let mut turns: Vec<Turn> = Vec::with_capacity(entries.len());
    for (author_id, line, images) in entries {
        if author_id == ctx.bot_id {
            // The bot's own turns lose the speaker label; providers reject
            // back-to-back assistant turns, so merge them.
            let text = line
                .split_once(": ")
                .map(|(_, rest)| rest.to_string())
                .unwrap_or(line);
            match turns.last_mut() {
                Some(previous) if previous.role == Role::Assistant => {
                    previous.text.push_str(&text);
                    previous.images.extend(images);
                }
                _ => turns.push(Turn {
                    role: Role::Assistant,
                    text,
                    images,
                }),
            }
        } else {
            turns.push(Turn {
                role: Role::User,
                text: line,
                images,
            });
        }
    }

    let mut system = ctx.personality.to_string();
    if ctx.include_directory {
        system.push_str("\n\nUsers by ID:");
        for id in ctx.participants {
            if let Some(identity) = ctx.identities.get(id) {
                system.push_str(&format!("\n{}: {}", identity.name, id));
            }
        }
        let memories: Vec<&u64> = ctx
            .participants
            .iter()
            .filter(|id| {
                ctx.identities
                    .get(id)
                    .and_then(|i| i.description.as_deref())
                    .is_some_and(|d| !d.is_empty())
            })
            .collect();
        if !memories.is_empty() {
            system.push_str("\n\nMemories:");
            for id in memories {
                if let Some(identity) = ctx.identities.get(id) {
                    if let Some(description) = &identity.description {
                        system.push_str(&format!("\n{}: {}", identity.name, description));
                    }
                }
            }
        }
    }

    CompiledPrompt {
        system,
        turns,
        params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: u64 = 98765432109876543;
    const ALICE: u64 = 11111111111111111;
    const CAROL: u64 = 22222222222222222;

    fn msg(author_id: u64, content: &str) -> ChainMessage {
        ChainMessage {
            id: 1,
            author_id,
            content: content.to_string(),
            referenced: None,
            images: vec![],
        }
    }

    fn identities(pairs: &[(u64, &str)]) -> HashMap<u64, ResolvedIdentity> {
        pairs
            .iter()
            .map(|&(id, name)| {
                (
                    id,
                    ResolvedIdentity {
                        name: name.to_string(),
                        description: None,
                    },
                )
            })
            .collect()
    }

    fn ctx<'a>(
        participants: &'a [u64],
        identities: &'a HashMap<u64, ResolvedIdentity>,
        abbreviations: &'a HashMap<u64, Vec<(String, String)>>,
    ) -> CompileContext<'a> {
        CompileContext {
            bot_id: BOT,
            personality: "You are a bot.",
            participants,
            identities,
            abbreviations,
            include_directory: false,
        }
    }

    #[test]
    fn consecutive_assistant_turns_collapse() {
        let chain = vec![
            msg(ALICE, "a"),
            msg(BOT, "b"),
            msg(BOT, "c"),
            msg(ALICE, "d"),
        ];
        let participants = collect_participants(&chain, BOT);
        let names = identities(&[(BOT, "Bot"), (ALICE, "Alice")]);
        let abbreviations = HashMap::new();
        let compiled = compile(
            &chain,
            &ctx(&participants, &names, &abbreviations),
            GenerationParams::default(),
        );

        let roles: Vec<Role> = compiled.turns.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(compiled.turns[0].text, "Alice: a");
        assert_eq!(compiled.turns[1].text, "bc");
        assert_eq!(compiled.turns[2].text, "Alice: d");
    }

    #[test]
    fn later_directives_override_and_are_stripped() {
        let chain = vec![
            msg(ALICE, "usemodel gpt-4o usetemp 0.5 hello"),
            msg(ALICE, "USETEMP 1.3 usetopp 0.9 there"),
        ];
        let participants = collect_participants(&chain, BOT);
        let names = identities(&[(BOT, "Bot"), (ALICE, "Alice")]);
        let abbreviations = HashMap::new();
        let compiled = compile(
            &chain,
            &ctx(&participants, &names, &abbreviations),
            GenerationParams::default(),
        );

        assert_eq!(compiled.params.model, "gpt-4o");
        assert_eq!(compiled.params.temperature, 1.3);
        assert_eq!(compiled.params.top_p, 0.9);
        assert_eq!(compiled.turns[0].text, "Alice: hello");
        assert_eq!(compiled.turns[1].text, "Alice: there");
    }

    #[test]
    fn invalid_directive_value_keeps_default() {
        let chain = vec![msg(ALICE, "usetemp spicy hi")];
        let participants = collect_participants(&chain, BOT);
        let names = identities(&[(BOT, "Bot"), (ALICE, "Alice")]);
        let abbreviations = HashMap::new();
        let compiled = compile(
            &chain,
            &ctx(&participants, &names, &abbreviations),
            GenerationParams::default(),
        );

        assert_eq!(compiled.params.temperature, DEFAULT_TEMPERATURE);
        // The token is still stripped even though the value did not parse.
        assert_eq!(compiled.turns[0].text, "Alice: hi");
    }

    #[test]
    fn penalty_directives_are_stripped_but_ignored() {
        let chain = vec![msg(ALICE, "usefreq 0.2 usepres 0.1 hello")];
        let participants = collect_participants(&chain, BOT);
        let names = identities(&[(BOT, "Bot"), (ALICE, "Alice")]);
        let abbreviations = HashMap::new();
        let compiled = compile(
            &chain,
            &ctx(&participants, &names, &abbreviations),
            GenerationParams::default(),
        );
        assert_eq!(compiled.turns[0].text, "Alice: hello");
    }

    #[test]
    fn leading_bang_is_stripped() {
        let chain = vec![msg(ALICE, "!hello")];
        let participants = collect_participants(&chain, BOT);
        let names = identities(&[(BOT, "Bot"), (ALICE, "Alice")]);
        let abbreviations = HashMap::new();
        let compiled = compile(
            &chain,
            &ctx(&participants, &names, &abbreviations),
            GenerationParams::default(),
        );
        assert_eq!(compiled.turns[0].text, "Alice: hello");
    }

    #[test]
    fn abbreviations_expand_per_author() {
        let chain = vec![msg(ALICE, "brb in a sec"), msg(CAROL, "brb too")];
        let participants = collect_participants(&chain, BOT);
        let names = identities(&[(BOT, "Bot"), (ALICE, "Alice"), (CAROL, "Carol")]);
        let abbreviations = HashMap::from([(
            ALICE,
            vec![("brb".to_string(), "be right back".to_string())],
        )]);
        let compiled = compile(
            &chain,
            &ctx(&participants, &names, &abbreviations),
            GenerationParams::default(),
        );

        assert_eq!(compiled.turns[0].text, "Alice: be right back in a sec");
        assert_eq!(compiled.turns[1].text, "Carol: brb too", "macros are user-scoped");
    }

    #[test]
    fn mentions_resolve_to_names() {
        let chain = vec![msg(ALICE, &format!("ask <@{CAROL}> about it"))];
        let participants = collect_participants(&chain, BOT);
        assert!(participants.contains(&CAROL));

        let names = identities(&[(BOT, "Bot"), (ALICE, "Alice"), (CAROL, "Carol")]);
        let abbreviations = HashMap::new();
        let compiled = compile(
            &chain,
            &ctx(&participants, &names, &abbreviations),
            GenerationParams::default(),
        );
        assert_eq!(compiled.turns[0].text, "Alice: ask <@Carol> about it");
    }

    #[test]
    fn longer_ids_substitute_before_shorter_prefixes() {
        // One id is a strict prefix of the other; replacing the shorter one
        // first would corrupt the longer.
        let long = 11111111111111111u64;
        let short = 1111111111111111u64;
        let chain = vec![msg(short, &format!("ping {long}"))];
        let participants = collect_participants(&chain, BOT);
        let names = identities(&[(BOT, "Bot"), (long, "Longfellow"), (short, "Shorty")]);
        let abbreviations = HashMap::new();
        let compiled = compile(
            &chain,
            &ctx(&participants, &names, &abbreviations),
            GenerationParams::default(),
        );
        assert_eq!(compiled.turns[0].text, "Shorty: ping Longfellow");
    }

    #[test]
    fn participants_are_seeded_with_bot_and_deduplicated() {
        let chain = vec![
            msg(ALICE, &format!("hi <@{CAROL}>")),
            msg(ALICE, &format!("again <@{CAROL}>")),
        ];
        let participants = collect_participants(&chain, BOT);
        assert_eq!(participants, vec![BOT, ALICE, CAROL]);
    }

    #[test]
    fn directory_and_memories_appear_outside_test_guild() {
        let chain = vec![msg(ALICE, "hello")];
        let participants = collect_participants(&chain, BOT);
        let mut names = identities(&[(BOT, "Bot"), (ALICE, "Alice")]);
        names.get_mut(&ALICE).unwrap().description = Some("collects stamps".to_string());
        let abbreviations = HashMap::new();
        let mut context = ctx(&participants, &names, &abbreviations);
        context.include_directory = true;

        let compiled = compile(&chain, &context, GenerationParams::default());
        assert!(compiled.system.contains(&format!("Alice: {ALICE}")));
        assert!(compiled.system.contains("Alice: collects stamps"));

        context.include_directory = false;
        let compiled = compile(&chain, &context, GenerationParams::default());
        assert_eq!(compiled.system, "You are a bot.");
    }

    #[test]
    fn images_ride_along_and_merge_into_assistant_turns() {
        let mut first = msg(BOT, "look");
        first.images = vec!["https://cdn.example/a.png".to_string()];
        let mut second = msg(BOT, " here");
        second.images = vec!["https://cdn.example/b.png".to_string()];
        let mut user = msg(ALICE, "nice");
        user.images = vec!["https://cdn.example/c.png".to_string()];
        let chain = vec![first, second, user];

        let participants = collect_participants(&chain, BOT);
        let names = identities(&[(BOT, "Bot"), (ALICE, "Alice")]);
        let abbreviations = HashMap::new();
        let compiled = compile(
            &chain,
            &ctx(&participants, &names, &abbreviations),
            GenerationParams::default(),
        );

        assert_eq!(compiled.turns.len(), 2);
        assert_eq!(compiled.turns[0].images.len(), 2);
        assert_eq!(compiled.turns[1].images.len(), 1);
    }

    #[test]
    fn expansion_is_literal_substring_replacement() {
        let abbreviations = vec![("gm".to_string(), "good morning".to_string())];
        assert_eq!(
            expand_abbreviations("gm! dogma", &abbreviations),
            "good morning! dogood morninga"
        );
    }
}

//! Default prompts for each service and a small `{placeholder}` filler.
//!
//! Configuration may override any of these; the defaults keep a bare config
//! file usable.

/// Dungeon Master persona for the running conversation.
pub const DUNGEON_MASTER: &str = r#"You are an expert Dungeons & Dragons 5th Edition Dungeon Master running a solo adventure in the Forgotten Realms.

## Your Role
1. Narrate the world vividly and immersively
2. Control all NPCs with distinct personalities
3. React dynamically to the player's choices
4. Keep continuity with the campaign and any story summaries you were given

## Response Style
- Be descriptive but concise
- Use present tense for narration
- Give the player clear options when appropriate
- Ask clarifying questions if the player's intent is unclear
"#;

/// Condenses older dialogue. Placeholder: `chat_log`.
pub const STORY_SUMMARIZER: &str = r#"You are keeping the story notes for a Dungeons & Dragons game.
Summarize the following exchanges between the player and the Dungeon Master into a short synopsis of the story so far.
Keep names, places, items, promises and unresolved threads. Write in past tense, third person, without commentary.

Chat log:
{chat_log}
"#;

/// Picks one location from a candidate list. Placeholders: `location_list`, `user_input`.
pub const LOCATION_SELECTION: &str = r#"A player wants this kind of adventure:
{user_input}

Choose the single best starting location from this list:
{location_list}

Answer with the exact location name only, as written before the colon."#;

/// Writes the one-shot adventure. Placeholders: `selected_location`,
/// `location_summary`, `location_hierarchy`, `characters`, `creatures`,
/// `items`, `cultural_facts`.
pub const CAMPAIGN_CREATION: &str = r#"Write a Dungeons & Dragons one-shot adventure set in the Forgotten Realms.

## Setting
Location: {selected_location}
Region: {location_hierarchy}
{location_summary}

## Material to draw from
Characters: {characters}
Creatures: {creatures}
Items: {items}
History and culture: {cultural_facts}

Structure it as a module: adventure hook, background, three to five scenes with encounters, climax, and rewards."#;

/// Turns a freeform character description into JSON. The allowed races,
/// classes and backgrounds arrive in a separate system turn.
pub const CHARACTER_CREATION: &str = r#"You help a player create a Dungeons & Dragons 5th Edition character for a Forgotten Realms adventure.
Read the player's description and reply with a single JSON object and nothing else:
{"name": "...", "race": "...", "class": "...", "background": "..."}
Use only the races, classes and backgrounds you were told are allowed. If the player leaves something open, pick the option that best fits the description."#;

/// Prefix for the one-off location summary request.
pub const LOCATION_SUMMARY_PREFIX: &str =
    "Create a summarized version of the following fantasy location wiki:";

/// Replace each `{key}` in `template` with its value.
///
/// The template is scanned once, so text coming from a value is never
/// expanded again. Placeholders without a value are left as they are.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let found = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (*value, close))
        });
        match found {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_replaces_all_occurrences() {
        let filled = fill("{a} and {a} then {b}", &[("a", "x"), ("b", "y")]);
        assert_eq!(filled, "x and x then y");
    }

    #[test]
    fn test_fill_leaves_unknown_placeholders() {
        assert_eq!(fill("{known} {unknown}", &[("known", "k")]), "k {unknown}");
    }

    #[test]
    fn test_fill_does_not_expand_inserted_text() {
        let filled = fill(
            "Options:\n{location_list}\nPitch: {user_input}",
            &[
                ("location_list", "- Candlekeep: guards the text {user_input}"),
                ("user_input", "a heist"),
            ],
        );
        assert_eq!(
            filled,
            "Options:\n- Candlekeep: guards the text {user_input}\nPitch: a heist"
        );
    }

    #[test]
    fn test_fill_stray_braces() {
        assert_eq!(fill("{{a}} {", &[("a", "x")]), "{x} {");
        assert_eq!(fill("} {a", &[("a", "x")]), "} {a");
    }

    #[test]
    fn test_defaults_carry_their_placeholders() {
        assert!(STORY_SUMMARIZER.contains("{chat_log}"));
        assert!(LOCATION_SELECTION.contains("{location_list}"));
        assert!(LOCATION_SELECTION.contains("{user_input}"));
        for key in [
            "selected_location",
            "location_summary",
            "location_hierarchy",
            "characters",
            "creatures",
            "items",
            "cultural_facts",
        ] {
            assert!(CAMPAIGN_CREATION.contains(&format!("{{{key}}}")), "missing {key}");
        }
        assert!(CHARACTER_CREATION.contains(r#""class": "...""#));
    }
}

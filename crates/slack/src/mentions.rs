//! Mention tokens embedded in Slack message text.
//!
//! Users: `<@U123>`, `<@U123|label>` and bare `@U12345678` (8+ id chars).
//! Channels: `<#C123|general>`. Broadcasts: `<!here>`, `<!channel>`,
//! `<!everyone>`. User groups: `<!subteam^S123|@devs>`.

use std::{
    collections::{BTreeSet, HashMap},
    sync::LazyLock,
};

use regex::{Captures, Regex};

use crate::compile;

/// Either an angle-bracket user token (group 1) or a bare `@U...` id
/// (prefix in group 2, id in group 3). Regex has no look-behind, so the bare
/// form captures the preceding character and writes it back.
static USER_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"<@([UW][A-Z0-9]+)(?:\|[^<>]*)?>|(^|[^A-Za-z0-9._%+-])@([UW][A-Z0-9]{8,})\b")
});
static CHANNEL_MENTION: LazyLock<Regex> =
    LazyLock::new(|| compile(r"<#([A-Z0-9]+)(?:\|([^<>]*))?>"));
static BROADCAST_MENTION: LazyLock<Regex> =
    LazyLock::new(|| compile(r"<!(here|channel|everyone)(?:\|[^<>]*)?>"));
static SUBTEAM_MENTION: LazyLock<Regex> =
    LazyLock::new(|| compile(r"<!subteam\^([A-Z0-9]+)(?:\|([^<>]*))?>"));
static DATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| compile(r"<!date\^[^|<>]*\|([^<>]*)>"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MentionKind {
    User,
    Channel,
    Broadcast,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MentionToken {
    pub kind: MentionKind,
    pub id: String,
}

/// All mention tokens in `text`, in order of appearance.
#[must_use]
pub fn extract_mentions(text: &str) -> Vec<MentionToken> {
    let mut found: Vec<(usize, MentionToken)> = Vec::new();

    for caps in USER_MENTION.captures_iter(text) {
        if let Some((pos, id)) = user_id(&caps) {
            found.push((pos, MentionToken {
                kind: MentionKind::User,
                id: id.to_string(),
            }));
        }
    }
    for caps in CHANNEL_MENTION.captures_iter(text) {
        found.push((caps.get(0).map_or(0, |m| m.start()), MentionToken {
            kind: MentionKind::Channel,
            id: caps[1].to_string(),
        }));
    }
    for caps in BROADCAST_MENTION.captures_iter(text) {
        found.push((caps.get(0).map_or(0, |m| m.start()), MentionToken {
            kind: MentionKind::Broadcast,
            id: caps[1].to_string(),
        }));
    }

    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, token)| token).collect()
}

/// Distinct user ids referenced in `text`.
#[must_use]
pub fn user_ids(text: &str) -> BTreeSet<String> {
    extract_mentions(text)
        .into_iter()
        .filter(|token| token.kind == MentionKind::User)
        .map(|token| token.id)
        .collect()
}

/// Replace user mentions with `@name`, falling back to `@<id>` for ids
/// missing from `names`.
#[must_use]
pub fn expand_user_mentions(text: &str, names: &HashMap<String, String>) -> String {
    USER_MENTION
        .replace_all(text, |caps: &Captures<'_>| {
            let prefix = caps.get(2).map_or("", |m| m.as_str());
            let Some((_, id)) = user_id(caps) else {
                return caps[0].to_string();
            };
            let name = names
                .get(id)
                .map(String::as_str)
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(id);
            format!("{prefix}@{name}")
        })
        .into_owned()
}

/// Channel, broadcast, user-group and date tokens to their readable form.
#[must_use]
pub fn convert_structural_mentions(text: &str) -> String {
    let text = CHANNEL_MENTION.replace_all(text, |caps: &Captures<'_>| {
        match caps.get(2).map(|m| m.as_str().trim()) {
            Some(label) if !label.is_empty() => format!("#{label}"),
            _ => format!("#{}", &caps[1]),
        }
    });
    let text = BROADCAST_MENTION.replace_all(&text, "@$1");
    let text = SUBTEAM_MENTION.replace_all(&text, |caps: &Captures<'_>| {
        match caps.get(2).map(|m| m.as_str().trim()) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => format!("@{}", &caps[1]),
        }
    });
    DATE_TOKEN.replace_all(&text, "$1").into_owned()
}

fn user_id<'t>(caps: &Captures<'t>) -> Option<(usize, &'t str)> {
    if let Some(id) = caps.get(1) {
        return caps.get(0).map(|whole| (whole.start(), id.as_str()));
    }
    caps.get(3).map(|id| (id.start() - 1, id.as_str()))
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[test]
    fn extracts_tokens_in_order() {
        let tokens = extract_mentions("<!here> ping <@U1> in <#C9|ops> and @W12345678 again <@U1>");
        let summary: Vec<_> = tokens.iter().map(|t| (t.kind, t.id.as_str())).collect();
        assert_eq!(summary, vec![
            (MentionKind::Broadcast, "here"),
            (MentionKind::User, "U1"),
            (MentionKind::Channel, "C9"),
            (MentionKind::User, "W12345678"),
            (MentionKind::User, "U1"),
        ]);
    }

    #[test]
    fn user_ids_are_distinct() {
        let ids = user_ids("<@U1> <@U1|ada> <@U2>");
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["U1", "U2"]);
    }

    #[rstest]
    #[case("<@U1> hi", "@Ada hi")]
    #[case("<@U1|ada.l> hi", "@Ada hi")]
    #[case("hey @U12345678!", "hey @Grace!")]
    #[case("<@U2> hi", "@U2 hi")]
    #[case("mail bob@U12345678", "mail bob@U12345678")]
    #[case("@U1234 short ids stay", "@U1234 short ids stay")]
    fn expands_user_mentions(#[case] input: &str, #[case] expected: &str) {
        let names = HashMap::from([
            ("U1".to_string(), "Ada".to_string()),
            ("U12345678".to_string(), "Grace".to_string()),
        ]);
        assert_eq!(expand_user_mentions(input, &names), expected);
    }

    #[rstest]
    #[case("see <#C024BE7LR|general>", "see #general")]
    #[case("see <#C024BE7LR>", "see #C024BE7LR")]
    #[case("<!here> deploy", "@here deploy")]
    #[case("<!channel|channel> and <!everyone>", "@channel and @everyone")]
    #[case("cc <!subteam^S0614TZR7|@devs>", "cc @devs")]
    #[case("due <!date^1392734382^{date}|Feb 18, 2014>", "due Feb 18, 2014")]
    fn converts_structural_mentions(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(convert_structural_mentions(input), expected);
    }
}

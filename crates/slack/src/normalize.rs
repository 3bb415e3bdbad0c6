//! Slack markup → plain text.
//!
//! [`normalize`] runs a fixed sequence of transforms:
//!
//! 1. decode HTML entities
//! 2. unwrap links (`<url|label>` → `label (url)`)
//! 3. expand user mentions through a [`NameResolver`]
//! 4. convert channel / broadcast tokens
//! 5. strip quote, emphasis and code markup
//! 6. normalize whitespace
//!
//! Only step 3 awaits. One step can expose markup an earlier step already
//! passed (stripping `<@*U1*>` leaves `<@U1>`), so the whole sequence repeats
//! until a pass changes nothing. The output is therefore a fixed point:
//! normalizing it again returns it unchanged.

use std::{
    collections::{BTreeSet, HashMap},
    sync::LazyLock,
};

use {
    regex::Regex,
    tracing::{debug, trace},
};

use crate::{
    compile,
    mentions::{convert_structural_mentions, expand_user_mentions, user_ids},
    resolve::NameResolver,
};

const ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
];

// Link targets never start with a mention sigil and never contain whitespace.
static LABELED_LINK: LazyLock<Regex> =
    LazyLock::new(|| compile(r"<([^@#!|<>\s][^|<>\s]*)\|([^<>]+)>"));
static BARE_LINK: LazyLock<Regex> = LazyLock::new(|| compile(r"<([^@#!|<>\s][^|<>\s]*)>"));

// Any whitespace except newline, so the quote marker and the final trim
// agree on what leading blank space is.
static QUOTE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?m)^[\s&&[^\n]]*(?:>[\s&&[^\n]]?)+"));
static EMPHASIS: LazyLock<[Regex; 5]> = LazyLock::new(|| {
    [
        compile(r"\*\*(.*?)\*\*"),
        compile(r"\*(.*?)\*"),
        compile(r"__(.*?)__"),
        compile(r"_(.*?)_"),
        compile(r"~(.*?)~"),
    ]
});
static FENCED_CODE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?s)```(.*?)```"));
static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| compile(r"`([^`]*)`"));

static TRAILING_SPACE: LazyLock<Regex> = LazyLock::new(|| compile(r"[\s&&[^\n]]+\n"));
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| compile(r"\n{3,}"));

/// Upper bound on full passes. Every pass that changes the text shortens it
/// or removes a `<`, except mention expansion; only a resolved name that
/// re-creates its own mention could keep changing.
const MAX_PASSES: usize = 64;

/// Convert raw Slack message text into clean plain text.
pub async fn normalize(text: &str, resolver: &dyn NameResolver) -> String {
    let mut names: HashMap<String, String> = HashMap::new();
    let mut current = text.to_string();
    for _ in 0..MAX_PASSES {
        let next = normalize_pass(&current, resolver, &mut names).await;
        if next == current {
            return current;
        }
        current = next;
    }
    debug!(passes = MAX_PASSES, "normalization did not settle, returning last pass");
    current
}

/// One run of steps 1 to 6. Names resolved in earlier passes are reused.
async fn normalize_pass(
    text: &str,
    resolver: &dyn NameResolver,
    names: &mut HashMap<String, String>,
) -> String {
    let text = decode_entities(text);
    let text = unwrap_links(&text);

    let ids = user_ids(&text);
    let text = if ids.is_empty() {
        text
    } else {
        let missing: BTreeSet<String> = ids
            .into_iter()
            .filter(|id| !names.contains_key(id))
            .collect();
        if !missing.is_empty() {
            let resolved = resolver.resolve(&missing).await;
            trace!(ids = missing.len(), resolved = resolved.len(), "expanding user mentions");
            names.extend(resolved);
            // Ids the resolver skipped keep their raw form in later passes too.
            for id in missing {
                names.entry(id.clone()).or_insert(id);
            }
        }
        expand_user_mentions(&text, names)
    };

    let text = convert_structural_mentions(&text);
    let text = strip_formatting(&text);
    normalize_whitespace(&text)
}

/// Replace the HTML entities Slack escapes with their characters.
///
/// Repeats until nothing changes, so `&amp;lt;` ends up as `<`.
#[must_use]
pub fn decode_entities(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = ENTITIES
            .iter()
            .fold(current.clone(), |acc, (entity, literal)| {
                acc.replace(entity, literal)
            });
        if next == current {
            return current;
        }
        current = next;
    }
}

/// `<target|label>` → `label (target)`, `<target>` → `target`, repeated so
/// nested brackets unwrap fully.
#[must_use]
pub fn unwrap_links(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let labeled = LABELED_LINK.replace_all(&current, "$2 ($1)");
        let next = BARE_LINK.replace_all(&labeled, "$1").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Remove block quotes, emphasis pairs and code delimiters, keeping content.
///
/// Unpaired delimiters are left alone. Runs until stable because removing
/// one kind of markup can expose another (a quote marker inside code).
#[must_use]
pub fn strip_formatting(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let mut next = QUOTE_MARKER.replace_all(&current, "").into_owned();
        for pattern in EMPHASIS.iter() {
            next = pattern.replace_all(&next, "$1").into_owned();
        }
        next = FENCED_CODE.replace_all(&next, "$1").into_owned();
        next = INLINE_CODE.replace_all(&next, "$1").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Unify line endings, drop trailing blanks, collapse blank-line runs and
/// trim the whole text (Unicode whitespace, same class as quote markers).
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text = TRAILING_SPACE.replace_all(&text, "\n");
    let text = BLANK_RUN.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Append a reference to the source message, when one is known.
#[must_use]
pub fn append_permalink(description: &str, permalink: Option<&str>) -> String {
    match permalink.map(str::trim).filter(|link| !link.is_empty()) {
        Some(link) if description.is_empty() => format!("Slack message: {link}"),
        Some(link) => format!("{description}\n\nSlack message: {link}"),
        None => description.to_string(),
    }
}

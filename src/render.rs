//! Message body rendering: raw text plus mention list to safe markup.
//!
//! The passes run in a fixed order. The raw text is escaped first, then
//! mentions, custom emoji and bare links are substituted. Each substitution
//! produces an opaque markup segment that later passes never look into,
//! so a link pass cannot rewrite the `src` of an emoji image.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::model::MentionedUser;

/// Base URL of custom emoji assets.
pub const EMOJI_CDN: &str = "https://cdn.discordapp.com/emojis";

/// Shown when a mentioned id is not in the message's mention list.
pub const UNKNOWN_USER: &str = "Unknown User";

static MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&lt;@!?(\d+)&gt;").expect("mention regex pattern is valid"));
static EMOJI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&lt;(a?):(\w+):(\d+)&gt;").expect("emoji regex pattern is valid")
});
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s]+").expect("URL regex pattern is valid"));

/// Escape every HTML-significant character.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    /// Escaped user text, still open to substitution.
    Text(String),
    /// Markup we generated; passed through untouched.
    Markup(String),
}

/// Run one substitution pass over the text segments.
fn substitute<F>(segments: Vec<Segment>, re: &Regex, mut replace: F) -> Vec<Segment>
where
    F: FnMut(&Captures<'_>) -> String,
{
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        let text = match segment {
            Segment::Text(text) => text,
            markup => {
                out.push(markup);
                continue;
            }
        };

        let mut last = 0;
        for caps in re.captures_iter(&text) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.start() > last {
                out.push(Segment::Text(text[last..whole.start()].to_string()));
            }
            out.push(Segment::Markup(replace(&caps)));
            last = whole.end();
        }
        if last < text.len() {
            out.push(Segment::Text(text[last..].to_string()));
        }
    }
    out
}

/// Renders message bodies for one viewer.
#[derive(Debug, Clone, Default)]
pub struct ContentRenderer {
    viewer_id: Option<String>,
}

impl ContentRenderer {
    /// `viewer_id` is the signed-in user; mentions of it get a distinct style.
    pub fn new(viewer_id: Option<String>) -> Self {
        Self { viewer_id }
    }

    pub fn render(&self, raw_text: &str, mentions: &[MentionedUser]) -> String {
        let segments = vec![Segment::Text(escape_html(raw_text))];
        let segments = substitute(segments, &MENTION_RE, |caps| {
            self.mention_markup(&caps[1], mentions)
        });
        let segments = substitute(segments, &EMOJI_RE, |caps| {
            emoji_markup(!caps[1].is_empty(), &caps[2], &caps[3])
        });
        let segments = substitute(segments, &URL_RE, |caps| link_markup(&caps[0]));

        segments
            .into_iter()
            .map(|s| match s {
                Segment::Text(t) | Segment::Markup(t) => t,
            })
            .collect()
    }

    fn mention_markup(&self, user_id: &str, mentions: &[MentionedUser]) -> String {
        let name = mentions
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| escape_html(&u.username))
            .unwrap_or_else(|| UNKNOWN_USER.to_string());
        let class = if self.viewer_id.as_deref() == Some(user_id) {
            "mention mention-self"
        } else {
            "mention"
        };
        format!(r#"<span class="{class}">@{name}</span>"#)
    }
}

fn emoji_markup(animated: bool, name: &str, id: &str) -> String {
    let ext = if animated { "gif" } else { "png" };
    format!(r#"<img class="emoji" src="{EMOJI_CDN}/{id}.{ext}" alt=":{name}:" title=":{name}:">"#)
}

/// `url` comes from escaped text, so it is already safe inside an attribute.
fn link_markup(url: &str) -> String {
    format!(r#"<a href="{url}" target="_blank" rel="noopener noreferrer">{url}</a>"#)
}

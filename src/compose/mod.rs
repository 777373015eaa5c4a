//! Reply composition.
//!
//! Splices processed links back into the original post and wraps the result
//! with the user's header and footer.

/// Per-user formatting options applied to every reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    pub header: String,
    pub footer: String,
    /// Keep the original post text around the links.
    pub include_text: bool,
}

impl Layout {
    pub fn new(header: Option<&str>, footer: Option<&str>, include_text: bool) -> Self {
        Self {
            header: header.unwrap_or_default().to_string(),
            footer: footer.unwrap_or_default().to_string(),
            include_text,
        }
    }
}

/// Replace each link with its replacement, in order, one occurrence at a time.
///
/// Every call replaces the first remaining literal occurrence of the link, so
/// a URL repeated `n` times needs `n` entries to be fully substituted.
pub fn substitute<L, R>(text: &str, links: &[L], replacements: &[R]) -> String
where
    L: AsRef<str>,
    R: AsRef<str>,
{
    debug_assert_eq!(links.len(), replacements.len());
    links
        .iter()
        .zip(replacements)
        .fold(text.to_string(), |acc, (link, replacement)| {
            acc.replacen(link.as_ref(), replacement.as_ref(), 1)
        })
}

/// Build the reply body.
///
/// With text included the whole post is kept with links substituted.
/// Otherwise only the non-empty replacements are listed, one per line.
/// Returns `None` when there is nothing worth sending: text excluded and
/// every replacement empty.
pub fn compose<L, R>(text: &str, links: &[L], replacements: &[R], layout: &Layout) -> Option<String>
where
    L: AsRef<str>,
    R: AsRef<str>,
{
    let body = if layout.include_text {
        substitute(text, links, replacements)
    } else {
        let kept: Vec<&str> = replacements
            .iter()
            .map(|r| r.as_ref())
            .filter(|r| !r.is_empty())
            .collect();
        if kept.is_empty() {
            return None;
        }
        kept.join("\n")
    };

    Some(format!("{}\n{}\n\n{}", layout.header, body, layout.footer))
}

//! Slash-command parsing.

/// A bot command recognised in a text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Api,
    AddHeader,
    RemoveHeader,
    AddFooter,
    RemoveFooter,
    EnableText,
    DisableText,
    Settings,
}

impl Command {
    /// Parse the leading command of `text`.
    ///
    /// Accepts an optional `@botname` suffix (`/api@my_bot`) and ignores
    /// anything after the command word. Unknown commands yield `None` so the
    /// message is handled like any other post.
    ///
    /// ```
    /// use linkrelay::relay::Command;
    ///
    /// assert_eq!(Command::parse("/api@relay_bot"), Some(Command::Api));
    /// assert_eq!(Command::parse("/add_footer now please"), Some(Command::AddFooter));
    /// assert_eq!(Command::parse("/unknown"), None);
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim_start().split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split_once('@').map_or(name, |(name, _bot)| name);

        let command = match name {
            "start" => Command::Start,
            "api" => Command::Api,
            "add_header" => Command::AddHeader,
            "remove_header" => Command::RemoveHeader,
            "add_footer" => Command::AddFooter,
            "remove_footer" => Command::RemoveFooter,
            "enable_text" => Command::EnableText,
            "disable_text" => Command::DisableText,
            "settings" => Command::Settings,
            _ => return None,
        };
        Some(command)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Api => "api",
            Command::AddHeader => "add_header",
            Command::RemoveHeader => "remove_header",
            Command::AddFooter => "add_footer",
            Command::RemoveFooter => "remove_footer",
            Command::EnableText => "enable_text",
            Command::DisableText => "disable_text",
            Command::Settings => "settings",
        }
    }
}

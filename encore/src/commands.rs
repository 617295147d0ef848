/// Slash commands the bot understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Auth,
    Help,
    Favorites,
    Concerts,
    ChangeCity,
    Unknown(String),
}

impl Command {
    /// `None` for plain text. Arguments and a `@botname` suffix are ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        if name.is_empty() {
            return None;
        }

        let command = match name.to_lowercase().as_str() {
            "start" => Command::Start,
            "auth" => Command::Auth,
            "help" => Command::Help,
            "favorites" | "favourites" => Command::Favorites,
            "concerts" => Command::Concerts,
            "changecity" | "city" => Command::ChangeCity,
            _ => Command::Unknown(name.to_string()),
        };
        Some(command)
    }

    pub fn name(&self) -> &str {
        match self {
            Command::Start => "start",
            Command::Auth => "auth",
            Command::Help => "help",
            Command::Favorites => "favorites",
            Command::Concerts => "concerts",
            Command::ChangeCity => "changecity",
            Command::Unknown(name) => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/auth"), Some(Command::Auth));
        assert_eq!(Command::parse("/help"), Some(Command::Help));
        assert_eq!(Command::parse("/favorites"), Some(Command::Favorites));
        assert_eq!(Command::parse("/concerts"), Some(Command::Concerts));
        assert_eq!(Command::parse("/changecity"), Some(Command::ChangeCity));
        assert_eq!(Command::parse("/city"), Some(Command::ChangeCity));
    }

    #[test]
    fn ignores_bot_suffix_and_arguments() {
        assert_eq!(Command::parse("/start@encore_bot"), Some(Command::Start));
        assert_eq!(Command::parse("  /Help me please"), Some(Command::Help));
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(Command::parse("Berlin"), None);
        assert_eq!(Command::parse("Saint Petersburg /start"), None);
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("/"), None);
    }

    #[test]
    fn unknown_commands_keep_their_name() {
        assert_eq!(
            Command::parse("/weather"),
            Some(Command::Unknown("weather".to_string()))
        );
    }
}

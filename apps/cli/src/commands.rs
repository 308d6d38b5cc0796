use shared::domain::{ChannelId, GuildId};

/// One line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Login(String),
    Logout,
    Status,
    Guilds,
    Guild(GuildId),
    Dms,
    Dm(ChannelId),
    Hub,
    Channels,
    Channel(ChannelId),
    Messages,
    Refresh,
    Send(String),
    Quit,
}

pub const HELP: &str = "\
commands:
  /login <token>      verify a bot token and open a session
  /logout             forget the stored token
  /status             show the current selection
  /guilds             list guilds
  /guild <id>         select a guild
  /dms                list direct conversations
  /dm <id>            open a direct conversation
  /hub                leave guild mode
  /channels           list the selected guild's text channels
  /channel <id>       select a channel
  /messages           show the loaded messages
  /refresh            refetch messages for the selected channel
  /send <text>        post a message (plain lines are sent too)
  /quit               exit";

/// Lines without a leading `/` are sent as messages.
pub fn parse_line(line: &str) -> Result<Option<ReplCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(body) = line.strip_prefix('/') else {
        return Ok(Some(ReplCommand::Send(line.to_string())));
    };
    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };

    let required = |what: &str| {
        if rest.is_empty() {
            Err(format!("usage: /{name} <{what}>"))
        } else {
            Ok(rest.to_string())
        }
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "help" | "?" => ReplCommand::Help,
        "login" => ReplCommand::Login(required("token")?),
        "logout" => ReplCommand::Logout,
        "status" => ReplCommand::Status,
        "guilds" => ReplCommand::Guilds,
        "guild" => ReplCommand::Guild(GuildId::new(required("id")?)),
        "dms" => ReplCommand::Dms,
        "dm" => ReplCommand::Dm(ChannelId::new(required("id")?)),
        "hub" => ReplCommand::Hub,
        "channels" => ReplCommand::Channels,
        "channel" => ReplCommand::Channel(ChannelId::new(required("id")?)),
        "messages" => ReplCommand::Messages,
        "refresh" => ReplCommand::Refresh,
        "send" => ReplCommand::Send(required("text")?),
        "quit" | "exit" => ReplCommand::Quit,
        other => return Err(format!("unknown command '/{other}', try /help")),
    };
    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_sent() {
        assert_eq!(
            parse_line("  hello there "),
            Ok(Some(ReplCommand::Send("hello there".into())))
        );
        assert_eq!(parse_line("   "), Ok(None));
    }

    #[test]
    fn commands_take_arguments() {
        assert_eq!(
            parse_line("/guild 123"),
            Ok(Some(ReplCommand::Guild(GuildId::new("123"))))
        );
        assert_eq!(
            parse_line("/LOGIN  abc.def "),
            Ok(Some(ReplCommand::Login("abc.def".into())))
        );
        assert_eq!(parse_line("/quit"), Ok(Some(ReplCommand::Quit)));
    }

    #[test]
    fn missing_arguments_and_unknown_commands_are_errors() {
        assert_eq!(parse_line("/channel"), Err("usage: /channel <id>".to_string()));
        assert!(parse_line("/bogus").unwrap_err().contains("/bogus"));
    }
}

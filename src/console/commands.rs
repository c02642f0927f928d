use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Connect,
    Disconnect,
    Play(String),
    Pause,
    Resume,
    Stop,
    Skip,
    Repeat(String),
    Shuffle,
    Clear,
    Volume(i64),
    NowPlaying,
    Queue,
    History,
    Status,
    /// Pretend every human left the voice channel
    Empty,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Unknown command '{0}' - try 'help'")]
    Unknown(String),

    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),

    #[error("'{0}' is not a number")]
    InvalidNumber(String),
}

/// Blank lines parse to `None`. Command words are case-insensitive, arguments are kept as typed.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "connect" | "join" => ConsoleCommand::Connect,
        "disconnect" | "leave" | "out" => ConsoleCommand::Disconnect,
        "play" | "p" => ConsoleCommand::Play(required(rest, "play")?.to_string()),
        "pause" => ConsoleCommand::Pause,
        "resume" => ConsoleCommand::Resume,
        "stop" => ConsoleCommand::Stop,
        "skip" | "next" => ConsoleCommand::Skip,
        "repeat" | "loop" => ConsoleCommand::Repeat(required(rest, "repeat")?.to_string()),
        "shuffle" => ConsoleCommand::Shuffle,
        "clear" => ConsoleCommand::Clear,
        "volume" | "vol" => {
            let value = required(rest, "volume")?;
            let volume = value
                .parse::<i64>()
                .map_err(|_| ParseError::InvalidNumber(value.to_string()))?;
            ConsoleCommand::Volume(volume)
        }
        "np" | "song" => ConsoleCommand::NowPlaying,
        "queue" | "q" => ConsoleCommand::Queue,
        "history" => ConsoleCommand::History,
        "status" => ConsoleCommand::Status,
        "empty" => ConsoleCommand::Empty,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        _ => return Err(ParseError::Unknown(word.to_string())),
    };

    Ok(Some(command))
}

fn required<'a>(rest: &'a str, command: &'static str) -> Result<&'a str, ParseError> {
    if rest.is_empty() {
        Err(ParseError::MissingArgument(command))
    } else {
        Ok(rest)
    }
}

pub const HELP: &str = "\
join | connect            join the voice channel
leave | disconnect | out  clear the queue and leave
play | p <query or url>   queue a song or playlist
pause / resume / stop
skip | next
repeat | loop <off|track|queue>
shuffle / clear
volume <0-100>
np | song                 what's playing
queue | q                 what's next
history / status
empty                     simulate everyone leaving the channel
quit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        assert_eq!(parse_line("join").unwrap(), Some(ConsoleCommand::Connect));
        assert_eq!(parse_line("OUT").unwrap(), Some(ConsoleCommand::Disconnect));
        assert_eq!(parse_line("next").unwrap(), Some(ConsoleCommand::Skip));
        assert_eq!(parse_line("np").unwrap(), Some(ConsoleCommand::NowPlaying));
        assert_eq!(parse_line("q").unwrap(), Some(ConsoleCommand::Queue));
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn test_arguments_are_kept_verbatim() {
        assert_eq!(
            parse_line("p  Heavy Is the Crown ").unwrap(),
            Some(ConsoleCommand::Play("Heavy Is the Crown".to_string()))
        );
        assert_eq!(
            parse_line("loop Track").unwrap(),
            Some(ConsoleCommand::Repeat("Track".to_string()))
        );
        assert_eq!(parse_line("volume -20").unwrap(), Some(ConsoleCommand::Volume(-20)));
    }

    #[test]
    fn test_bad_input() {
        assert_eq!(parse_line("play"), Err(ParseError::MissingArgument("play")));
        assert_eq!(parse_line("volume loud"), Err(ParseError::InvalidNumber("loud".to_string())));
        assert_eq!(parse_line("dance"), Err(ParseError::Unknown("dance".to_string())));
    }
}

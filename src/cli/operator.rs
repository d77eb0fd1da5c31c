//! Line-oriented operator commands for a running station

use crate::error::{TunecastError, TunecastResult};
use crate::voting::VoterId;
use std::str::FromStr;

/// One parsed operator line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    Skip,
    Genre(String),
    Mood(String),
    Artist(String),
    /// Ballot for `genre` cast by `voter`
    Vote { genre: String, voter: VoterId },
    /// Close the running vote now
    Finish,
    /// Decide the running vote for a genre
    Force(String),
    Status,
    Stop,
    Help,
}

impl OperatorCommand {
    pub const USAGE: &'static [&'static str] = &[
        "skip                    next track now",
        "genre <name>            switch to a genre",
        "mood <name>             switch to a mood",
        "artist <name>           play one artist",
        "vote <genre> <voter>    cast a ballot in the running vote",
        "finish                  close the running vote",
        "force <genre>           decide the running vote",
        "status                  show station status",
        "stop                    stop the station and exit",
        "help                    show this list",
    ];
}

impl FromStr for OperatorCommand {
    type Err = TunecastError;

    fn from_str(line: &str) -> TunecastResult<Self> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match verb.to_lowercase().as_str() {
            "skip" | "next" => Ok(Self::Skip),
            "genre" => Ok(Self::Genre(argument(verb, rest)?)),
            "mood" => Ok(Self::Mood(argument(verb, rest)?)),
            "artist" => Ok(Self::Artist(argument(verb, rest)?)),
            "vote" => parse_vote(rest),
            "finish" => Ok(Self::Finish),
            "force" => Ok(Self::Force(argument(verb, rest)?)),
            "status" => Ok(Self::Status),
            "stop" | "quit" | "exit" => Ok(Self::Stop),
            "help" | "?" => Ok(Self::Help),
            "" => Err(TunecastError::InvalidInput("empty command".to_string())),
            other => Err(TunecastError::InvalidInput(format!(
                "unknown command '{}'",
                other
            ))),
        }
    }
}

fn argument(verb: &str, rest: &str) -> TunecastResult<String> {
    if rest.is_empty() {
        return Err(TunecastError::InvalidInput(format!("{} needs a value", verb)));
    }
    Ok(rest.to_string())
}

// The voter id is the last token so genres may contain spaces
fn parse_vote(rest: &str) -> TunecastResult<OperatorCommand> {
    let usage = || TunecastError::InvalidInput("usage: vote <genre> <voter>".to_string());
    let (genre, voter) = rest.rsplit_once(char::is_whitespace).ok_or_else(usage)?;
    let voter = voter.parse::<VoterId>().map_err(|_| usage())?;
    let genre = genre.trim();
    if genre.is_empty() {
        return Err(usage());
    }
    Ok(OperatorCommand::Vote {
        genre: genre.to_string(),
        voter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_verbs() {
        assert_eq!("skip".parse::<OperatorCommand>().unwrap(), OperatorCommand::Skip);
        assert_eq!(" STOP ".parse::<OperatorCommand>().unwrap(), OperatorCommand::Stop);
        assert_eq!("finish".parse::<OperatorCommand>().unwrap(), OperatorCommand::Finish);
        assert_eq!(
            "force lofi".parse::<OperatorCommand>().unwrap(),
            OperatorCommand::Force("lofi".to_string())
        );
        assert!("force".parse::<OperatorCommand>().is_err());
    }

    #[test]
    fn keeps_multi_word_arguments() {
        assert_eq!(
            "genre русский рок".parse::<OperatorCommand>().unwrap(),
            OperatorCommand::Genre("русский рок".to_string())
        );
        assert_eq!(
            "artist  Miles Davis ".parse::<OperatorCommand>().unwrap(),
            OperatorCommand::Artist("Miles Davis".to_string())
        );
    }

    #[test]
    fn vote_takes_trailing_voter() {
        assert_eq!(
            "vote русский рок 42".parse::<OperatorCommand>().unwrap(),
            OperatorCommand::Vote {
                genre: "русский рок".to_string(),
                voter: 42
            }
        );
        assert!("vote rock".parse::<OperatorCommand>().is_err());
        assert!("vote rock alice".parse::<OperatorCommand>().is_err());
    }

    #[test]
    fn rejects_missing_argument_and_unknown_verbs() {
        assert!(matches!(
            "mood".parse::<OperatorCommand>(),
            Err(TunecastError::InvalidInput(_))
        ));
        assert!("dance".parse::<OperatorCommand>().is_err());
        assert!("".parse::<OperatorCommand>().is_err());
    }
}

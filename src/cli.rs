use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use codec_prefs::{DEFAULT_PROPERTY_PREFIX, MediaKind, MoveDirection, format::FormatParseError};

/// `NAME/RATE` as typed on the command line, e.g. `speex/16000`.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatArg {
    pub encoding: String,
    pub clock_rate: f64,
}

impl std::str::FromStr for FormatArg {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (encoding, clock_rate) = codec_prefs::format::parse_encoding_key(s.trim())?;
        Ok(FormatArg {
            encoding,
            clock_rate,
        })
    }
}

impl std::fmt::Display for FormatArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&codec_prefs::format::preference_key(
            &self.encoding,
            self.clock_rate,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    Up,
    Down,
}

impl From<Direction> for MoveDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => MoveDirection::Up,
            Direction::Down => MoveDirection::Down,
        }
    }
}

#[derive(Parser)]
#[command(name = "codec-prefs", version, about = "Inspect and edit codec priorities")]
pub struct Cli {
    /// JSON file the priorities are persisted to.
    #[arg(
        long,
        global = true,
        env = "CODEC_PREFS_CONFIG",
        default_value = "codec-preferences.json"
    )]
    pub config: PathBuf,

    /// Key prefix of the persisted priorities.
    #[arg(long, global = true, env = "CODEC_PREFS_PREFIX", default_value = DEFAULT_PROPERTY_PREFIX)]
    pub prefix: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Supported encodings by priority; `--all` adds disabled ones.
    List {
        kind: Option<MediaKind>,

        #[arg(long)]
        all: bool,
    },

    /// Print the priority of `NAME/RATE`.
    Get { format: FormatArg },

    /// Set the priority of `NAME/RATE`; 0 disables it.
    Set {
        format: FormatArg,

        #[arg(allow_negative_numbers = true)]
        priority: i32,
    },

    /// Move an enabled encoding one place up or down.
    Move {
        kind: MediaKind,
        format: FormatArg,
        direction: Direction,
    },

    /// Order the codecs of an SDP offer read from `file` ("-" for stdin).
    Negotiate { file: PathBuf },

    /// Interactive prompt accepting the commands above.
    Shell,

    /// Serve the HTTP API.
    Serve {
        #[arg(long, env = "CODEC_PREFS_LISTEN", default_value = "localhost:8080")]
        listen: String,
    },
}

/// One line typed into the shell.
#[derive(Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: Command,
}

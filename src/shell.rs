use std::sync::Arc;

use clap::Parser;
use codec_prefs::EncodingConfiguration;
use rustyline::{DefaultEditor, error::ReadlineError};
use tracing::{debug, error};

use crate::cli::{Command, ShellLine};

/// Reads commands until EOF or `quit`, running each against `config`.
pub fn run(config: Arc<EncodingConfiguration>) -> anyhow::Result<()> {
    let mut rl = DefaultEditor::new()?;
    println!("codec-prefs shell, type 'help' for commands, 'quit' to leave");

    loop {
        let line = match rl.readline("codecs> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit") {
            break;
        }
        rl.add_history_entry(line)?;

        let parsed = match ShellLine::try_parse_from(line.split_whitespace()) {
            Ok(parsed) => parsed,
            Err(e) => {
                // clap renders help and usage errors itself
                let _ = e.print();
                continue;
            }
        };

        match parsed.command {
            Command::Shell | Command::Serve { .. } => {
                println!("not available inside the shell");
            }
            command => {
                debug!("Shell command: {:?}", command);
                if let Err(e) = crate::execute(&config, command) {
                    error!("{:#}", e);
                }
            }
        }
    }
    Ok(())
}

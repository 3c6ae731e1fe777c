use crate::load_upload;
use crate::presentation::Theme;
use docqa_core::{QaCoordinator, Session, SessionState};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

const HELP: &str = "\
commands:
  open <path>      upload a PDF, replacing the current one
  ask <question>   answer a question about the current PDF
  <question>       same as ask
  status           show the session state
  help             show this message
  quit             leave the shell";

#[derive(Debug, PartialEq, Eq)]
enum ShellCommand {
    Open(PathBuf),
    Ask(String),
    Status,
    Help,
    Quit,
    Empty,
}

impl ShellCommand {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        match head {
            "" => Self::Empty,
            "open" => Self::Open(PathBuf::from(rest)),
            "ask" => Self::Ask(rest.to_string()),
            "status" if rest.is_empty() => Self::Status,
            "help" if rest.is_empty() => Self::Help,
            "quit" | "exit" if rest.is_empty() => Self::Quit,
            _ => Self::Ask(line.to_string()),
        }
    }
}

/// Reads commands from stdin until `quit` or end of input. Failures are
/// rendered and the loop keeps going.
pub async fn run(
    coordinator: &QaCoordinator,
    theme: &Theme,
    file: Option<PathBuf>,
) -> std::io::Result<()> {
    let mut session = Session::new();
    println!("{}\n\nType `help` for commands.", theme.header());

    if let Some(path) = file {
        open(&mut session, theme, path).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match ShellCommand::parse(&line) {
            ShellCommand::Empty => {}
            ShellCommand::Help => println!("{HELP}"),
            ShellCommand::Quit => break,
            ShellCommand::Status => println!("{}", status_line(&session)),
            ShellCommand::Open(path) => open(&mut session, theme, path).await,
            ShellCommand::Ask(question) => {
                if session.document().is_some() && !question.is_empty() {
                    eprintln!("{}", theme.progress);
                }
                match session.process(coordinator, &question).await {
                    Ok(answer) => print!("{}", theme.render_answer(answer)),
                    Err(error) => println!("{}", theme.render_error(&error)),
                }
            }
        }
    }

    debug!(session = %session.id(), "shell closed");
    Ok(())
}

async fn open(session: &mut Session, theme: &Theme, path: PathBuf) {
    match load_upload(&path).await {
        Ok(document) => {
            println!("Loaded {}", document.name);
            session.upload(document);
        }
        Err(error) => {
            session.fail(&error);
            println!("{}", theme.render_error(&error));
        }
    }
}

fn status_line(session: &Session) -> String {
    let state = match session.state() {
        SessionState::Idle => "idle",
        SessionState::DocumentUploaded => "document uploaded",
        SessionState::Processing => "processing",
        SessionState::AnswerReady => "answer ready",
        SessionState::Error => "error",
    };
    let document = session
        .document()
        .map(|document| document.name.as_str())
        .unwrap_or("none");

    let mut line = format!("state: {state}, document: {document}");
    if let Some(error) = session.last_error() {
        line.push_str(&format!(", last error: {error}"));
    }
    line
}

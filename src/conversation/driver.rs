//! Event loop driving a [`ConversationController`]

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::ConversationController;
use crate::voice::EventStream;

/// A request from the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartCapture,
    StopCapture,
    /// Typed input
    Submit(String),
    /// A preset question
    Ask(String),
    Clear,
    Quit,
}

impl Command {
    /// Parse a line typed at the chat prompt
    ///
    /// Lines starting with `/` are commands; anything else is submitted as
    /// text. Returns `None` for blank lines and unknown commands.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Some(Self::Submit(line.to_string()));
        };

        let (name, argument) = rest
            .split_once(char::is_whitespace)
            .map_or((rest, ""), |(name, argument)| (name, argument.trim()));

        match name {
            "listen" => Some(Self::StartCapture),
            "stop" => Some(Self::StopCapture),
            "ask" if !argument.is_empty() => Some(Self::Ask(argument.to_string())),
            "clear" => Some(Self::Clear),
            "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Run until `commands` closes or a [`Command::Quit`] arrives
///
/// Commands, capability events and status deadlines are handled one at a
/// time, so the controller is never touched concurrently. Capture and
/// playback are stopped before returning.
pub async fn run(
    mut controller: ConversationController,
    mut commands: mpsc::Receiver<Command>,
    mut events: EventStream,
) -> ConversationController {
    tracing::debug!("conversation loop started");

    loop {
        let deadline = controller.status_deadline();

        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Quit) | None => break,
                Some(command) => apply(&mut controller, command).await,
            },
            Some(event) = events.recv() => controller.handle_event(event).await,
            () = wait_until(deadline) => {
                controller.expire_status(Instant::now());
            }
        }
    }

    controller.shutdown();
    tracing::debug!("conversation loop stopped");
    controller
}

async fn apply(controller: &mut ConversationController, command: Command) {
    match command {
        Command::StartCapture => {
            controller.start_capture();
        }
        Command::StopCapture => controller.stop_capture(),
        Command::Submit(text) => {
            controller.submit_text(&text).await;
        }
        Command::Ask(question) => {
            tracing::debug!(%question, "preset question");
            controller.ask(&question).await;
        }
        Command::Clear => controller.clear(),
        Command::Quit => {}
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

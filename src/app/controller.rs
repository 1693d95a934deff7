use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::common::Label;
use crate::coordinator::Session;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Train(Label),
    Run,
    Stop,
    Status,
    Reset(Option<Label>),
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let verb = words.next().unwrap_or_default().to_ascii_lowercase();
        let arg = words.next();
        match (verb.as_str(), arg) {
            ("train", Some(label)) => label.parse().map(Command::Train),
            ("train", None) => Err("train needs a label: off | on".to_string()),
            ("run", None) => Ok(Command::Run),
            ("stop", None) => Ok(Command::Stop),
            ("status", None) => Ok(Command::Status),
            ("reset", None) => Ok(Command::Reset(None)),
            ("reset", Some(label)) => label.parse().map(|l| Command::Reset(Some(l))),
            ("help", _) | ("?", _) => Ok(Command::Help),
            ("quit", None) | ("exit", None) => Ok(Command::Quit),
            (other, _) => Err(format!("unknown command '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

const HELP: &str = "commands: train off | train on | run | stop | status | reset [off|on] | quit";

/// Line-oriented control surface: maps typed commands onto the session.
pub struct ConsoleController {
    session: Arc<Session>,
    training_task: Option<JoinHandle<Result<(), AppError>>>,
}

impl ConsoleController {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            training_task: None,
        }
    }

    pub async fn run<R>(&mut self, input: R, shutdown: CancellationToken) -> Result<(), AppError>
    where
        R: AsyncBufRead + Unpin,
    {
        let watcher = self.spawn_touched_watcher();
        info!("{}", HELP);

        let mut lines = input.lines();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match line.parse::<Command>() {
                        Ok(command) => {
                            if self.handle(command).await == Flow::Quit {
                                break;
                            }
                        }
                        Err(e) => warn!("{}. {}", e, HELP),
                    }
                }
            }
        }

        if let Some(task) = self.training_task.take() {
            task.abort();
        }
        if let Err(e) = self.session.stop_inference().await {
            error!("Inference ended with error: {}", e);
        }
        watcher.abort();
        Ok(())
    }

    pub async fn handle(&mut self, command: Command) -> Flow {
        match command {
            Command::Train(label) => self.start_training(label),
            Command::Run => match self.session.start_inference().await {
                Ok(()) => info!("Watching. Press 'stop' to end"),
                Err(e) => warn!("Cannot start inference: {}", e),
            },
            Command::Stop => match self.session.stop_inference().await {
                Ok(Some(exit)) => info!("Stopped after {} cycles", exit.cycles),
                Ok(None) => info!("Inference is not running"),
                Err(e) => error!("Inference ended with error: {}", e),
            },
            Command::Status => {
                let status = self.session.status().await;
                match serde_json::to_string_pretty(&status) {
                    Ok(json) => println!("{}", json),
                    Err(e) => error!("Failed to render status: {}", e),
                }
            }
            Command::Reset(label) => {
                let result = match label {
                    Some(label) => self.session.reset_label(label).await,
                    None => self.session.reset().await,
                };
                if let Err(e) = result {
                    warn!("Cannot reset: {}", e);
                }
            }
            Command::Help => info!("{}", HELP),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Waits for the background training run, if any.
    pub async fn finish_training(&mut self) -> Result<(), AppError> {
        match self.training_task.take() {
            Some(task) => task.await.map_err(|e| AppError::Task(e.to_string()))?,
            None => Ok(()),
        }
    }

    fn start_training(&mut self, label: Label) {
        if let Some(task) = &self.training_task {
            if !task.is_finished() {
                let busy = AppError::Busy {
                    active: self.session.mode(),
                };
                warn!("Cannot train {}: {}", label, busy);
                return;
            }
        }
        let session = self.session.clone();
        self.training_task = Some(tokio::spawn(async move {
            match session.train(label).await {
                Ok(_) => Ok(()),
                Err(e) => {
                    error!("[{}] Training failed: {}", label, e);
                    Err(e)
                }
            }
        }));
    }

    fn spawn_touched_watcher(&self) -> JoinHandle<()> {
        let mut touched = self.session.touched();
        tokio::spawn(async move {
            while touched.changed().await.is_ok() {
                if *touched.borrow_and_update() {
                    warn!("Touched");
                } else {
                    info!("Not touched");
                }
            }
        })
    }
}

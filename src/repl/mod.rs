//! REPL (Read-Eval-Print Loop) driving the engine rack

use crate::audio::midi::MidiOutputHandle;
use crate::audio::runner::StepEvent;
use crate::commands::preset::load_and_apply;
use crate::commands::{create_registry, CommandContext, CommandRegistry, CommandResult};
use crate::rack::Rack;
use crate::repl::watcher::FileWatcher;
use anyhow::{anyhow, Context, Result};
use colored::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use notify::{Event, EventKind};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::Path;
use std::sync::Arc;
use std::thread;

pub mod watcher;

/// Types of events the REPL loop handles
enum ReplEvent {
    Input(Result<String, ReadlineError>),
}

/// Interactive shell around the three engines
pub struct Repl {
    registry: CommandRegistry,
    ctx: CommandContext,
    steps: Receiver<StepEvent>,

    // Event channels
    tx_input: Sender<ReplEvent>,
    rx_input: Receiver<ReplEvent>,
    tx_watcher: Sender<notify::Result<Event>>,
    rx_watcher: Receiver<notify::Result<Event>>,

    // File watcher
    watcher: Option<FileWatcher>,
}

impl Repl {
    /// Create a new REPL instance with every engine stopped
    pub fn new() -> Result<Self> {
        let midi_out = Arc::new(MidiOutputHandle::new()?);
        let rack = Rack::new(midi_out)?;
        let steps = rack.steps().clone();

        let (tx_input, rx_input) = unbounded();
        let (tx_watcher, rx_watcher) = unbounded();

        Ok(Repl {
            registry: create_registry(),
            ctx: CommandContext::new(rack),
            steps,
            tx_input,
            rx_input,
            tx_watcher,
            rx_watcher,
            watcher: None,
        })
    }

    pub fn context(&mut self) -> &mut CommandContext {
        &mut self.ctx
    }

    /// Run one line through the registry. Returns false when the REPL
    /// should exit.
    pub fn handle_line(&mut self, line: &str) -> bool {
        if line.is_empty() {
            return true;
        }
        match self.registry.execute(line, &mut self.ctx) {
            CommandResult::Success => {}
            CommandResult::Message(msg) => println!("{}", msg),
            CommandResult::Exit => return false,
            CommandResult::Error(e) => {
                println!("{} {}", "Error:".bright_red().bold(), e.red());
            }
            CommandResult::Watch(path) => self.watch(&path),
            CommandResult::NotACommand => {
                println!(
                    "{} Unknown command '{}'. Type '{}' for the command list",
                    "Error:".bright_red().bold(),
                    line,
                    "help".bright_green()
                );
            }
        }
        true
    }

    /// Apply a preset now and re-apply it whenever the file changes
    fn watch(&mut self, path: &str) {
        self.apply_preset(path);

        if self.watcher.is_none() {
            match FileWatcher::new(self.tx_watcher.clone()) {
                Ok(w) => self.watcher = Some(w),
                Err(e) => println!("{} Failed to create watcher: {}", "Error:".red(), e),
            }
        }

        if let Some(w) = &mut self.watcher {
            if let Err(e) = w.watch(path) {
                println!("{} Failed to watch {}: {}", "Error:".red(), path, e);
            } else {
                println!("{} Watching {} for changes...", "👀".bright_cyan(), path.bright_green());
            }
        }
    }

    fn apply_preset(&mut self, path: &str) {
        match load_and_apply(path, &mut self.ctx) {
            CommandResult::Message(msg) => println!("{}", msg),
            CommandResult::Error(e) => println!("{} {}", "Error:".bright_red().bold(), e.red()),
            _ => {}
        }
    }

    fn on_file_event(&mut self, event: Event) {
        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            return;
        }
        for path in event.paths {
            println!("{} File changed: {}", "⚡".bright_yellow(), path.display());
            self.apply_preset(&path.to_string_lossy());
        }
    }

    fn on_step(&self, event: StepEvent) {
        if !self.ctx.monitor {
            return;
        }
        let marker = if event.notice.fired {
            "●".bright_yellow()
        } else {
            "○".dimmed()
        };
        println!(
            "{} {:<6} ring {} step {:>3}",
            marker, event.engine, event.notice.ring, event.notice.step
        );
    }

    /// Start the REPL loop
    pub fn run(&mut self) -> Result<()> {
        println!(
            "{} {}",
            "🎛 ".bright_yellow(),
            "Pulsar generative rhythm engines".bright_cyan().bold()
        );
        println!(
            "Try: {}, {}, {}",
            "note on C4 E4 G4".cyan(),
            "start arp".cyan(),
            "euclid set 5 16".cyan()
        );
        println!(
            "Type '{}' for more information, '{}' or {} to exit.\n",
            "help".bright_green(),
            "quit".bright_red(),
            "Ctrl+C".bright_red()
        );

        let mut editor = DefaultEditor::new().context("failed to open the line editor")?;
        let tx_input = self.tx_input.clone();

        thread::spawn(move || loop {
            let prompt = format!("{} ", "pulsar>".bright_magenta().bold());
            match editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if !line.is_empty() {
                        let _ = editor.add_history_entry(&line);
                    }
                    if tx_input.send(ReplEvent::Input(Ok(line))).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    let _ = tx_input.send(ReplEvent::Input(Err(err)));
                    break;
                }
            }
        });

        let rx_input = self.rx_input.clone();
        let rx_watcher = self.rx_watcher.clone();
        let steps = self.steps.clone();

        loop {
            crossbeam_channel::select! {
                recv(rx_input) -> msg => match msg {
                    Ok(ReplEvent::Input(Ok(line))) => {
                        if !self.handle_line(&line) {
                            break;
                        }
                    }
                    Ok(ReplEvent::Input(Err(ReadlineError::Interrupted)))
                    | Ok(ReplEvent::Input(Err(ReadlineError::Eof))) => break,
                    Ok(ReplEvent::Input(Err(err))) => {
                        println!(
                            "{} {}",
                            "Error reading input:".bright_red().bold(),
                            err.to_string().red()
                        );
                        break;
                    }
                    Err(_) => break,
                },

                recv(rx_watcher) -> msg => match msg {
                    Ok(Ok(event)) => self.on_file_event(event),
                    Ok(Err(e)) => println!("{} Watch error: {}", "Error:".red(), e),
                    Err(_) => break,
                },

                recv(steps) -> msg => {
                    if let Ok(event) = msg {
                        self.on_step(event);
                    }
                }
            }
        }

        println!("{} 🎵", "Goodbye!".bright_cyan());
        self.ctx.rack.shutdown();
        Ok(())
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new().expect("Failed to create REPL")
    }
}

/// Convenience function to start the REPL, optionally applying a preset first
pub fn start(preset: Option<&str>) -> Result<()> {
    let mut repl = Repl::new().map_err(|e| anyhow!("Failed to initialize REPL: {:#}", e))?;
    if let Some(path) = preset {
        if !Path::new(path).exists() {
            return Err(anyhow!("preset {} does not exist", path));
        }
        repl.apply_preset(path);
    }
    repl.run()
}

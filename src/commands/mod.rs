//! Command registry for REPL commands
//!
//! Every command is a prefix plus a handler; the longest registered prefix
//! that matches the input wins, so `ring count 3` reaches `ring count`
//! rather than `ring`.

pub mod arp;
pub mod euclid;
pub mod general;
pub mod midi;
pub mod preset;
pub mod ring;

use crate::audio::midi::MidiInputHandle;
use crate::rack::{Rack, Target};
use std::str::FromStr;

/// Result of executing a command
#[derive(Debug)]
pub enum CommandResult {
    /// Command executed successfully, continue REPL
    Success,
    /// Command executed, show this message
    Message(String),
    /// Exit the REPL
    Exit,
    /// No registered command matches the input
    NotACommand,
    /// Error occurred
    Error(String),
    /// Watch a preset file and re-apply it on every change
    Watch(String),
}

/// Context passed to command handlers
pub struct CommandContext {
    pub rack: Rack,
    pub midi_in: MidiInputHandle,
    /// Print every played step as it happens
    pub monitor: bool,
}

impl CommandContext {
    pub fn new(rack: Rack) -> Self {
        Self {
            rack,
            midi_in: MidiInputHandle::new(),
            monitor: false,
        }
    }
}

/// A command handler function
pub type CommandHandler = fn(&str, &mut CommandContext) -> CommandResult;

/// Registry of available commands
pub struct CommandRegistry {
    /// Sorted by prefix length descending for longest-match-first lookup
    commands: Vec<(String, CommandHandler)>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// Register a command with its prefix
    pub fn register(&mut self, prefix: &str, handler: CommandHandler) {
        self.commands.push((prefix.to_string(), handler));
        self.commands.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Execute a command, returning NotACommand if no match found
    pub fn execute(&self, input: &str, ctx: &mut CommandContext) -> CommandResult {
        for (prefix, handler) in &self.commands {
            if input == prefix || input.starts_with(&format!("{} ", prefix)) {
                let args = input[prefix.len()..].trim();
                return handler(args, ctx);
            }
        }
        CommandResult::NotACommand
    }

    /// Get all registered command prefixes
    pub fn list_commands(&self) -> Vec<&str> {
        self.commands.iter().map(|(p, _)| p.as_str()).collect()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a fully populated command registry with all built-in commands
pub fn create_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    // Euclidean gate
    registry.register("euclid", euclid::cmd_euclid_show);
    registry.register("euclid set", euclid::cmd_euclid_set);
    registry.register("euclid pulses", euclid::cmd_euclid_pulses);
    registry.register("euclid steps", euclid::cmd_euclid_steps);
    registry.register("euclid offset", euclid::cmd_euclid_offset);
    registry.register("euclid note", euclid::cmd_euclid_note);

    // Ring sequencer
    registry.register("ring", ring::cmd_ring_show);
    registry.register("ring count", ring::cmd_ring_count);
    registry.register("ring toggle", ring::cmd_ring_toggle);
    registry.register("ring fill", ring::cmd_ring_fill);
    registry.register("ring clear", ring::cmd_ring_clear);
    registry.register("ring root", ring::cmd_ring_root);
    registry.register("ring scale", ring::cmd_ring_scale);
    registry.register("ring traversal", ring::cmd_ring_traversal);
    registry.register("ring gate", ring::cmd_ring_gate);
    registry.register("ring velocity", ring::cmd_ring_velocity);

    // Arpeggiator and held notes
    registry.register("arp", arp::cmd_arp_show);
    registry.register("arp mode", arp::cmd_arp_mode);
    registry.register("arp prob", arp::cmd_arp_probability);
    registry.register("arp chaos", arp::cmd_arp_chaos);
    registry.register("arp octaves", arp::cmd_arp_octaves);
    registry.register("arp gate", arp::cmd_arp_gate);
    registry.register("arp velocity", arp::cmd_arp_velocity);
    registry.register("note on", arp::cmd_note_on);
    registry.register("note off", arp::cmd_note_off);
    registry.register("note clear", arp::cmd_note_clear);
    registry.register("notes", arp::cmd_notes);

    // MIDI commands
    registry.register("midi devices", midi::cmd_midi_devices);
    registry.register("midi connect", midi::cmd_midi_connect);
    registry.register("midi disconnect", midi::cmd_midi_disconnect);
    registry.register("midi channel", midi::cmd_midi_channel);
    registry.register("midi status", midi::cmd_midi_status);
    registry.register("midi panic", midi::cmd_midi_panic);
    registry.register("midi in devices", midi::cmd_midi_in_devices);
    registry.register("midi in connect", midi::cmd_midi_in_connect);
    registry.register("midi in disconnect", midi::cmd_midi_in_disconnect);

    // Presets
    registry.register("preset load", preset::cmd_preset_load);
    registry.register("preset save", preset::cmd_preset_save);
    registry.register("preset show", preset::cmd_preset_show);

    // General commands
    registry.register("start", general::cmd_start);
    registry.register("stop", general::cmd_stop);
    registry.register("tempo", general::cmd_tempo);
    registry.register("subdivision", general::cmd_subdivision);
    registry.register("status", general::cmd_status);
    registry.register("monitor", general::cmd_monitor);
    registry.register("help", general::cmd_help);
    registry.register("quit", general::cmd_quit);
    registry.register("exit", general::cmd_quit);
    registry.register("watch", general::cmd_watch);

    registry
}

/// Parse one argument, naming it in the error
pub(crate) fn parse_arg<T: FromStr>(arg: &str, what: &str) -> Result<T, String> {
    arg.parse::<T>()
        .map_err(|_| format!("Invalid {}: '{}'", what, arg))
}

/// Split an optional leading engine name off the arguments
pub(crate) fn split_target(args: &str) -> (Target, &str) {
    let mut parts = args.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("");
    match Target::from_name(first) {
        Some(target) if !first.is_empty() => (target, parts.next().unwrap_or("").trim()),
        _ => (Target::All, args),
    }
}

/// Turn an engine call into a REPL result
pub(crate) fn report<T>(result: anyhow::Result<T>, message: impl FnOnce(T) -> String) -> CommandResult {
    match result {
        Ok(value) => CommandResult::Message(message(value)),
        Err(e) => CommandResult::Error(format!("{:#}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::midi::MidiOutputHandle;
    use std::sync::Arc;

    pub(crate) fn context() -> CommandContext {
        let midi = Arc::new(MidiOutputHandle::new().unwrap());
        CommandContext::new(Rack::new(midi).unwrap())
    }

    fn run(registry: &CommandRegistry, ctx: &mut CommandContext, input: &str) -> CommandResult {
        registry.execute(input, ctx)
    }

    #[test]
    fn test_longest_prefix_wins() {
        fn short(_: &str, _: &mut CommandContext) -> CommandResult {
            CommandResult::Message("short".into())
        }
        fn long(args: &str, _: &mut CommandContext) -> CommandResult {
            CommandResult::Message(format!("long {}", args))
        }
        let mut registry = CommandRegistry::new();
        registry.register("ring", short);
        registry.register("ring count", long);
        let mut ctx = context();

        match registry.execute("ring count 3", &mut ctx) {
            CommandResult::Message(m) => assert_eq!(m, "long 3"),
            other => panic!("unexpected {:?}", other),
        }
        match registry.execute("ring", &mut ctx) {
            CommandResult::Message(m) => assert_eq!(m, "short"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            registry.execute("ringcount", &mut ctx),
            CommandResult::NotACommand
        ));
        assert_eq!(registry.list_commands(), vec!["ring count", "ring"]);
    }

    #[test]
    fn test_split_target() {
        assert_eq!(split_target("arp 140"), (Target::Arp, "140"));
        assert_eq!(split_target("140"), (Target::All, "140"));
        assert_eq!(split_target("ring"), (Target::Ring, ""));
        assert_eq!(split_target(""), (Target::All, ""));
    }

    #[test]
    fn test_full_registry_edits_engines() {
        let registry = create_registry();
        let mut ctx = context();

        assert!(matches!(run(&registry, &mut ctx, "euclid set 3 8 1"), CommandResult::Message(_)));
        assert_eq!(ctx.rack.euclid.inspect(|e| (e.pulses(), e.steps(), e.offset())), (3, 8, 1));

        assert!(matches!(run(&registry, &mut ctx, "ring count 2"), CommandResult::Message(_)));
        assert_eq!(ctx.rack.ring.inspect(|e| e.ring_count()), 2);
        assert!(matches!(run(&registry, &mut ctx, "ring count 0"), CommandResult::Error(_)));

        assert!(matches!(run(&registry, &mut ctx, "note on C4"), CommandResult::Message(_)));
        assert!(ctx.rack.held.contains(60));

        assert!(matches!(run(&registry, &mut ctx, "tempo arp 150"), CommandResult::Message(_)));
        assert_eq!(ctx.rack.tempo(Target::Arp), 150.0);
        assert!(matches!(run(&registry, &mut ctx, "tempo -5"), CommandResult::Error(_)));

        assert!(matches!(run(&registry, &mut ctx, "quit"), CommandResult::Exit));
        assert!(matches!(run(&registry, &mut ctx, "dance"), CommandResult::NotACommand));
    }
}

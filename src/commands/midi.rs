//! MIDI REPL commands

use crate::audio::midi::{MidiChannelMode, MidiInputHandle, MidiOutputHandle};
use crate::commands::{CommandContext, CommandResult};
use crate::rack::{ARP_TRACK, EUCLID_TRACK, RING_TRACK};
use colored::*;

fn port_list(title: &str, ports: anyhow::Result<Vec<String>>, connect_hint: &str) -> CommandResult {
    match ports {
        Ok(ports) if ports.is_empty() => CommandResult::Message(
            "No MIDI ports found. Make sure a MIDI device or virtual port is connected."
                .yellow()
                .to_string(),
        ),
        Ok(ports) => {
            let mut output = format!("{}\n", title.bold());
            for (i, port) in ports.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, port.cyan()));
            }
            output.push_str(&format!("\n{} {}", "Use".dimmed(), connect_hint.green()));
            CommandResult::Message(output)
        }
        Err(e) => CommandResult::Error(format!("Failed to list MIDI ports: {}", e)),
    }
}

/// Handle `midi devices` command - list available MIDI output ports
pub fn cmd_midi_devices(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    port_list(
        "🎹 Available MIDI Output Ports:",
        MidiOutputHandle::list_ports(),
        "midi connect <port name>",
    )
}

/// Handle `midi connect <port>` command - connect to a MIDI output port
pub fn cmd_midi_connect(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error(
            "Usage: midi connect <port name>\nUse 'midi devices' to see available ports"
                .to_string(),
        );
    }
    match ctx.rack.midi_out.connect(args) {
        Ok(name) => CommandResult::Message(format!("🎹 Connected to MIDI port: {}", name.green())),
        Err(e) => CommandResult::Error(format!("Failed to connect to '{}': {:#}", args, e)),
    }
}

/// Handle `midi disconnect` command
pub fn cmd_midi_disconnect(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    match ctx.rack.midi_out.disconnect() {
        Ok(()) => CommandResult::Message("🎹 Disconnected from MIDI, notes go to the log".to_string()),
        Err(e) => CommandResult::Error(format!("Failed to disconnect: {}", e)),
    }
}

fn describe_mode(mode: MidiChannelMode) -> String {
    match mode {
        MidiChannelMode::PerTrack => format!(
            "Per-track (euclid→Ch {}, ring→Ch {}, arp→Ch {})",
            EUCLID_TRACK + 1,
            RING_TRACK + 1,
            ARP_TRACK + 1
        ),
        MidiChannelMode::Mono(ch) => format!("Mono (all engines→Channel {})", ch + 1),
    }
}

/// Handle `midi channel [1-16|auto]` command
pub fn cmd_midi_channel(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let handle = &ctx.rack.midi_out;
    if args.is_empty() {
        return CommandResult::Message(format!(
            "🎹 Current MIDI channel mode: {}",
            describe_mode(handle.channel_mode())
        ));
    }

    let channel_arg = args.to_lowercase();
    let mode = if channel_arg == "auto" || channel_arg == "per-track" || channel_arg == "pertrack" {
        MidiChannelMode::PerTrack
    } else {
        match channel_arg.parse::<u8>() {
            Ok(ch) if (1..=16).contains(&ch) => MidiChannelMode::Mono(ch - 1),
            Ok(_) => {
                return CommandResult::Error(
                    "Channel must be 1-16, or 'auto' for per-track mode".to_string(),
                )
            }
            Err(_) => {
                return CommandResult::Error(
                    "Usage: midi channel <1-16|auto>\n  1-16: Send every engine to this channel\n  auto: Each engine uses its own channel"
                        .to_string(),
                )
            }
        }
    };
    handle.set_channel_mode(mode);
    CommandResult::Message(
        format!("🎹 MIDI channel mode: {}", describe_mode(mode))
            .green()
            .to_string(),
    )
}

/// Handle `midi status` command - show MIDI connection status
pub fn cmd_midi_status(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    let handle = &ctx.rack.midi_out;
    let mut output = format!("{}\n", "🎹 MIDI Status:".bold());

    match handle.connected_port() {
        Some(name) => {
            output.push_str(&format!("  Output: {}\n", "Connected".green().bold()));
            output.push_str(&format!("  Port: {}\n", name.cyan()));
        }
        None => output.push_str(&format!("  Output: {}\n", "Not connected".yellow())),
    }
    output.push_str(&format!("  Channel mode: {}\n", describe_mode(handle.channel_mode())));
    output.push_str(&format!("  Sounding notes: {}\n", handle.active_notes()));
    output.push_str(&format!(
        "  Pending jittered notes: {}\n",
        ctx.rack.dispatcher.pending()
    ));
    match ctx.midi_in.connected_port() {
        Some(name) => output.push_str(&format!("  Input: {}", name.cyan())),
        None => output.push_str(&format!("  Input: {}", "Not connected".yellow())),
    }

    CommandResult::Message(output)
}

/// Handle `midi panic` command - send All Notes Off to all channels
pub fn cmd_midi_panic(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    ctx.rack.dispatcher.clear();
    match ctx.rack.midi_out.panic_all() {
        Ok(()) => CommandResult::Message(
            "🎹 MIDI Panic: All Notes Off sent to all channels"
                .yellow()
                .to_string(),
        ),
        Err(e) => CommandResult::Error(format!("Failed to send MIDI panic: {}", e)),
    }
}

/// Handle `midi in devices` - list MIDI input ports
pub fn cmd_midi_in_devices(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    port_list(
        "🎹 Available MIDI Input Ports:",
        MidiInputHandle::list_ports(),
        "midi in connect <port name>",
    )
}

/// Handle `midi in connect <port>` - hold notes played on a keyboard
pub fn cmd_midi_in_connect(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error(
            "Usage: midi in connect <port name>\nUse 'midi in devices' to see available ports"
                .to_string(),
        );
    }
    let held = ctx.rack.held.clone();
    match ctx.midi_in.connect(args, held) {
        Ok(name) => CommandResult::Message(format!(
            "🎹 Listening on {}; held keys feed the arpeggiator",
            name.green()
        )),
        Err(e) => CommandResult::Error(format!("Failed to connect to '{}': {:#}", args, e)),
    }
}

/// Handle `midi in disconnect`
pub fn cmd_midi_in_disconnect(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    if ctx.midi_in.disconnect() {
        CommandResult::Message("🎹 MIDI input disconnected".to_string())
    } else {
        CommandResult::Message("MIDI input was not connected".yellow().to_string())
    }
}

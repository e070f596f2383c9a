//! General REPL commands (help, quit, transport, status)

use crate::commands::{parse_arg, report, split_target, CommandContext, CommandResult};
use crate::rack::Target;
use colored::*;
use pulsar_core::engine::Engine;

/// Handle `help` command
pub fn cmd_help(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    print_help();
    CommandResult::Success
}

/// Handle `quit` or `exit` command
pub fn cmd_quit(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    CommandResult::Exit
}

/// Handle `start [engine]`
pub fn cmd_start(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let target = match crate::rack::Rack::target(args) {
        Ok(t) => t,
        Err(e) => return CommandResult::Error(e.to_string()),
    };
    report(ctx.rack.start(target), |n| {
        if n == 0 {
            format!("{} already running", target).yellow().to_string()
        } else {
            format!("▶ Started {}", target).bright_green().to_string()
        }
    })
}

/// Handle `stop [engine]`
pub fn cmd_stop(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let target = match crate::rack::Rack::target(args) {
        Ok(t) => t,
        Err(e) => return CommandResult::Error(e.to_string()),
    };
    if ctx.rack.stop(target) == 0 {
        CommandResult::Message(format!("{} not running", target).yellow().to_string())
    } else {
        CommandResult::Message(format!("■ Stopped {}", target).bright_red().to_string())
    }
}

/// Handle `tempo [engine] [bpm]` command
pub fn cmd_tempo(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let (target, rest) = split_target(args);
    if rest.is_empty() {
        let line = match target {
            Target::All => format!(
                "Tempo: euclid {:.1} / ring {:.1} / arp {:.1} BPM",
                ctx.rack.tempo(Target::Euclid),
                ctx.rack.tempo(Target::Ring),
                ctx.rack.tempo(Target::Arp)
            ),
            t => format!("{} tempo: {:.1} BPM", t, ctx.rack.tempo(t)),
        };
        return CommandResult::Message(line);
    }

    let bpm = match parse_arg::<f32>(rest, "tempo") {
        Ok(bpm) => bpm,
        Err(e) => return CommandResult::Error(e),
    };
    report(ctx.rack.set_tempo(target, bpm), |_| {
        format!("🎵 {} tempo set to {:.1} BPM", target, bpm)
            .bright_green()
            .to_string()
    })
}

/// Handle `subdivision [engine] <ticks per beat>`
pub fn cmd_subdivision(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let (target, rest) = split_target(args);
    if rest.is_empty() {
        return CommandResult::Error("Usage: subdivision [engine] <ticks per beat>".to_string());
    }
    let subdivision = match parse_arg::<u32>(rest, "subdivision") {
        Ok(s) => s,
        Err(e) => return CommandResult::Error(e),
    };
    report(ctx.rack.set_subdivision(target, subdivision), |_| {
        format!("{} subdivision set to {}", target, subdivision)
    })
}

/// Handle `status`
pub fn cmd_status(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    let rack = &ctx.rack;
    let mut out = format!("{}\n", "Engines:".bold());
    let lines = [
        rack.euclid.inspect(|e| engine_line(e)),
        rack.ring.inspect(|e| engine_line(e)),
        rack.arp.inspect(|e| engine_line(e)),
    ];
    for line in lines {
        out.push_str(&format!("  {}\n", line));
    }

    let held = rack.held.snapshot();
    out.push_str(&format!(
        "{} {}\n",
        "Held:".bold(),
        if held.is_empty() {
            "none".dimmed().to_string()
        } else {
            held.iter()
                .map(|&n| crate::audio::midi::note_name(n))
                .collect::<Vec<_>>()
                .join(" ")
        }
    ));
    out.push_str(&format!(
        "{} {}",
        "MIDI out:".bold(),
        rack.midi_out
            .connected_port()
            .unwrap_or_else(|| "not connected (notes go to the log)".to_string())
    ));
    if let Some(port) = ctx.midi_in.connected_port() {
        out.push_str(&format!("\n{} {}", "MIDI in:".bold(), port));
    }
    CommandResult::Message(out)
}

fn engine_line(engine: &dyn Engine) -> String {
    let transport = engine.transport();
    let state = if engine.is_running() {
        "running".bright_green()
    } else {
        "stopped".dimmed()
    };
    format!(
        "{:<7} {:<8} {:>6.1} BPM  1/{}",
        engine.name(),
        state,
        transport.bpm(),
        transport.subdivision()
    )
}

/// Handle `monitor [on|off]`
pub fn cmd_monitor(args: &str, ctx: &mut CommandContext) -> CommandResult {
    ctx.monitor = match args {
        "" => !ctx.monitor,
        "on" => true,
        "off" => false,
        _ => return CommandResult::Error("Usage: monitor [on|off]".to_string()),
    };
    CommandResult::Message(format!(
        "Step monitor {}",
        if ctx.monitor { "on" } else { "off" }
    ))
}

/// Handle `watch <preset file>` command
pub fn cmd_watch(args: &str, _ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: watch <preset.json>".to_string());
    }
    CommandResult::Watch(args.to_string())
}

/// Print help information
fn print_help() {
    println!("{}", "🎛  Pulsar Help".bold());
    println!("{}", "==============".bold());
    println!();
    println!("Engines are {}, {} and {}; [engine] defaults to all of them.",
        "euclid".cyan(), "ring".cyan(), "arp".cyan());
    println!();
    println!("{}", "Transport:".green());
    println!("  {}          - Start engines", "start [engine]".cyan());
    println!("  {}           - Stop and rewind engines", "stop [engine]".cyan());
    println!("  {}     - Show or set tempo", "tempo [engine] [bpm]".cyan());
    println!("  {} - Ticks per beat", "subdivision [engine] <n>".cyan());
    println!("  {}                  - Engine overview", "status".cyan());
    println!("  {}        - Print every played step", "monitor [on|off]".cyan());
    println!();
    println!("{}", "Euclidean Gate:".green());
    println!("  {}                  - Show the pattern", "euclid".cyan());
    println!("  {}  - Regenerate the pattern", "euclid set <p> <s> [o]".cyan());
    println!("  {}  - Change one parameter", "euclid pulses|steps|offset <n>".cyan());
    println!("  {} - Event forwarded on onsets", "euclid note <note> [vel] [secs]".cyan());
    println!();
    println!("{}", "Ring Sequencer:".green());
    println!("  {}                    - Show the rings", "ring".cyan());
    println!("  {}           - Number of rings (1-8)", "ring count <n>".cyan());
    println!("  {}    - Flip one cell", "ring toggle <ring> <step>".cyan());
    println!("  {} - Euclidean fill of one ring", "ring fill <ring> <pulses> [o]".cyan());
    println!("  {}              - Clear every cell", "ring clear".cyan());
    println!("  {}  - Pitch mapping", "ring root <note> | scale <name>".cyan());
    println!("  {}  - spiral or lockstep", "ring traversal <mode>".cyan());
    println!("  {}  - Note shape", "ring gate <0-1> | velocity <0-127>".cyan());
    println!();
    println!("{}", "Arpeggiator:".green());
    println!("  {}                     - Show settings", "arp".cyan());
    println!("  {}  - up, down, updown, random, drunk", "arp mode <mode>".cyan());
    println!("  {}  - Amounts in 0-1", "arp prob <p> | chaos <c> | gate <g>".cyan());
    println!("  {}  - Octave sweep and velocity", "arp octaves <1-4> | velocity <v>".cyan());
    println!("  {}  - Hold or release notes", "note on|off <note>...".cyan());
    println!("  {}  - Release all / list held", "note clear | notes".cyan());
    println!();
    println!("{}", "MIDI Commands:".green());
    println!("  {}       - List MIDI output ports", "midi devices".cyan());
    println!("  {} - Connect to MIDI port", "midi connect <port>".cyan());
    println!("  {}    - Disconnect MIDI", "midi disconnect".cyan());
    println!("  {}     - Set channel (1-16 or 'auto')", "midi channel".cyan());
    println!("  {}        - Show MIDI status", "midi status".cyan());
    println!("  {}         - All notes off (panic)", "midi panic".cyan());
    println!("  {} - Feed held notes from a keyboard", "midi in devices|connect|disconnect".cyan());
    println!();
    println!("{}", "Presets:".green());
    println!("  {}   - Apply a JSON preset", "preset load <file>".cyan());
    println!("  {}   - Save the current state", "preset save <file>".cyan());
    println!("  {}          - Print the current state", "preset show".cyan());
    println!("  {}        - Re-apply a preset on every save", "watch <file>".cyan());
    println!();
    println!("{}", "Other Commands:".green());
    println!("  {}              - Show this help", "help".bright_green());
    println!("  {}              - Exit the REPL", "quit".bright_red());
}

//! Arpeggiator and held-note commands

use crate::audio::midi::{note_name, parse_note};
use crate::commands::{parse_arg, report, CommandContext, CommandResult};
use colored::*;
use pulsar_core::config::PatternMode;
use pulsar_core::engine::ArpeggiatorEngine;

fn describe(engine: &ArpeggiatorEngine) -> String {
    format!(
        "mode {}  prob {:.2}  chaos {:.2}  octaves {}  gate {:.2}  vel {}",
        engine.pattern_mode().name().cyan(),
        engine.probability(),
        engine.chaos(),
        engine.octave_range(),
        engine.gate_length(),
        engine.config().velocity
    )
}

fn held_line(notes: &[u8]) -> String {
    if notes.is_empty() {
        return "No notes held".dimmed().to_string();
    }
    let names: Vec<String> = notes.iter().map(|&n| note_name(n)).collect();
    format!("Held: {}", names.join(" ").cyan())
}

/// Handle `arp`
pub fn cmd_arp_show(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if !args.is_empty() {
        return CommandResult::Error(format!("Unknown arp command '{}'. Try 'help'", args));
    }
    CommandResult::Message(format!(
        "{}\n{}",
        ctx.rack.arp.inspect(describe),
        held_line(&ctx.rack.held.snapshot())
    ))
}

/// Handle `arp mode <up|down|updown|random|drunk>`
pub fn cmd_arp_mode(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let Some(mode) = PatternMode::from_name(args) else {
        let names: Vec<&str> = PatternMode::ALL.iter().map(|m| m.name()).collect();
        return CommandResult::Error(format!(
            "Unknown mode '{}'. Available: {}",
            args,
            names.join(", ")
        ));
    };
    report(
        ctx.rack.arp.update(|e| {
            e.set_pattern_mode(mode);
            Ok(())
        }),
        |_| format!("Arp mode set to {}", mode.name().cyan()),
    )
}

fn set_amount(
    args: &str,
    what: &str,
    ctx: &mut CommandContext,
    apply: fn(&mut ArpeggiatorEngine, f32) -> pulsar_core::Result<()>,
    read: fn(&ArpeggiatorEngine) -> f32,
) -> CommandResult {
    let value = match parse_arg::<f32>(args, what) {
        Ok(v) => v,
        Err(e) => return CommandResult::Error(e),
    };
    report(
        ctx.rack.arp.update(|e| {
            apply(e, value)?;
            Ok(read(e))
        }),
        |stored| format!("Arp {} set to {:.2}", what, stored),
    )
}

/// Handle `arp prob <0-1>`
pub fn cmd_arp_probability(args: &str, ctx: &mut CommandContext) -> CommandResult {
    set_amount(
        args,
        "probability",
        ctx,
        ArpeggiatorEngine::set_probability,
        ArpeggiatorEngine::probability,
    )
}

/// Handle `arp chaos <0-1>`
pub fn cmd_arp_chaos(args: &str, ctx: &mut CommandContext) -> CommandResult {
    set_amount(args, "chaos", ctx, ArpeggiatorEngine::set_chaos, ArpeggiatorEngine::chaos)
}

/// Handle `arp gate <fraction>`
pub fn cmd_arp_gate(args: &str, ctx: &mut CommandContext) -> CommandResult {
    set_amount(
        args,
        "gate",
        ctx,
        ArpeggiatorEngine::set_gate_length,
        ArpeggiatorEngine::gate_length,
    )
}

/// Handle `arp octaves <1-4>`
pub fn cmd_arp_octaves(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let octaves = match parse_arg::<u8>(args, "octave range") {
        Ok(o) => o,
        Err(e) => return CommandResult::Error(e),
    };
    report(
        ctx.rack.arp.update(|e| {
            e.set_octave_range(octaves);
            Ok(e.octave_range())
        }),
        |stored| format!("Arp sweeps {} octave(s)", stored),
    )
}

/// Handle `arp velocity <0-127>`
pub fn cmd_arp_velocity(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let velocity = match parse_arg::<u8>(args, "velocity") {
        Ok(v) => v,
        Err(e) => return CommandResult::Error(e),
    };
    report(
        ctx.rack.arp.update(|e| {
            e.set_velocity(velocity);
            Ok(())
        }),
        |_| format!("Arp velocity set to {}", velocity.min(127)),
    )
}

/// Parse every whitespace-separated note, failing on the first bad one
fn parse_notes(args: &str) -> Result<Vec<u8>, String> {
    if args.is_empty() {
        return Err("expected at least one note".to_string());
    }
    args.split_whitespace()
        .map(|s| parse_note(s).ok_or_else(|| format!("Invalid note: '{}'", s)))
        .collect()
}

/// Handle `note on <note>...`
pub fn cmd_note_on(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let notes = match parse_notes(args) {
        Ok(n) => n,
        Err(e) => return CommandResult::Error(e),
    };
    for &n in &notes {
        if let Err(e) = ctx.rack.held.note_on(n) {
            return CommandResult::Error(e.to_string());
        }
    }
    CommandResult::Message(held_line(&ctx.rack.held.snapshot()))
}

/// Handle `note off <note>...`
pub fn cmd_note_off(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let notes = match parse_notes(args) {
        Ok(n) => n,
        Err(e) => return CommandResult::Error(e),
    };
    for &n in &notes {
        if let Err(e) = ctx.rack.held.note_off(n) {
            return CommandResult::Error(e.to_string());
        }
    }
    CommandResult::Message(held_line(&ctx.rack.held.snapshot()))
}

/// Handle `note clear`
pub fn cmd_note_clear(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    ctx.rack.held.clear();
    CommandResult::Message(held_line(&[]))
}

/// Handle `notes`
pub fn cmd_notes(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    CommandResult::Message(held_line(&ctx.rack.held.snapshot()))
}

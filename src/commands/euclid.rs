//! Euclidean gate commands

use crate::audio::midi::{note_name, parse_note};
use crate::commands::{parse_arg, report, CommandContext, CommandResult};
use colored::*;
use pulsar_core::engine::{Engine, EuclideanEngine};
use pulsar_core::types::TriggerEvent;

/// Render a pattern as `x . . x`, marking the step the next tick reads
pub(crate) fn render_cells(cells: &[bool], cursor: Option<usize>) -> String {
    cells
        .iter()
        .enumerate()
        .map(|(i, &on)| {
            let glyph = if on { "x" } else { "." };
            if Some(i) == cursor {
                glyph.on_bright_black().bold().to_string()
            } else if on {
                glyph.bright_yellow().to_string()
            } else {
                glyph.dimmed().to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn describe(engine: &EuclideanEngine) -> String {
    let cursor = engine.is_running().then(|| engine.current_step());
    format!(
        "E({},{}) +{}  [{}]",
        engine.pulses(),
        engine.steps(),
        engine.offset(),
        render_cells(engine.pattern().as_slice(), cursor)
    )
}

/// Handle `euclid`
pub fn cmd_euclid_show(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if !args.is_empty() {
        return CommandResult::Error(format!("Unknown euclid command '{}'. Try 'help'", args));
    }
    let note = ctx.rack.euclid.inspect(|e| e.config().note);
    CommandResult::Message(format!(
        "{}\nforwarding {} vel {} for {:.3}s",
        ctx.rack.euclid.inspect(describe),
        note_name(note.pitch),
        note.velocity,
        note.duration_secs
    ))
}

/// Handle `euclid set <pulses> <steps> [offset]`
pub fn cmd_euclid_set(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let parts: Vec<&str> = args.split_whitespace().collect();
    if parts.len() < 2 || parts.len() > 3 {
        return CommandResult::Error("Usage: euclid set <pulses> <steps> [offset]".to_string());
    }
    let parsed = (|| {
        let pulses = parse_arg::<usize>(parts[0], "pulses")?;
        let steps = parse_arg::<usize>(parts[1], "steps")?;
        let offset = match parts.get(2) {
            Some(o) => parse_arg::<usize>(o, "offset")?,
            None => 0,
        };
        Ok::<_, String>((pulses, steps, offset))
    })();
    let (pulses, steps, offset) = match parsed {
        Ok(values) => values,
        Err(e) => return CommandResult::Error(e),
    };
    report(
        ctx.rack.euclid.update(|e| {
            e.set_pattern(pulses, steps, offset);
            Ok(describe(e))
        }),
        |line| line,
    )
}

fn edit_one(
    args: &str,
    what: &str,
    ctx: &mut CommandContext,
    apply: fn(&mut EuclideanEngine, usize),
) -> CommandResult {
    let value = match parse_arg::<usize>(args, what) {
        Ok(v) => v,
        Err(e) => return CommandResult::Error(e),
    };
    report(
        ctx.rack.euclid.update(|e| {
            apply(e, value);
            Ok(describe(e))
        }),
        |line| line,
    )
}

/// Handle `euclid pulses <n>`
pub fn cmd_euclid_pulses(args: &str, ctx: &mut CommandContext) -> CommandResult {
    edit_one(args, "pulses", ctx, EuclideanEngine::set_pulses)
}

/// Handle `euclid steps <n>`
pub fn cmd_euclid_steps(args: &str, ctx: &mut CommandContext) -> CommandResult {
    edit_one(args, "steps", ctx, EuclideanEngine::set_steps)
}

/// Handle `euclid offset <n>`
pub fn cmd_euclid_offset(args: &str, ctx: &mut CommandContext) -> CommandResult {
    edit_one(args, "offset", ctx, EuclideanEngine::set_offset)
}

/// Handle `euclid note <note> [velocity] [seconds]` and `euclid note off`
pub fn cmd_euclid_note(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let parts: Vec<&str> = args.split_whitespace().collect();
    if parts.is_empty() {
        return CommandResult::Error(
            "Usage: euclid note <note> [velocity] [seconds] | euclid note off".to_string(),
        );
    }
    if parts[0] == "off" {
        return report(
            ctx.rack.euclid.update(|e| {
                e.clear_incoming();
                Ok(())
            }),
            |_| "Euclid onsets now pass silently".to_string(),
        );
    }

    let Some(pitch) = parse_note(parts[0]) else {
        return CommandResult::Error(format!("Invalid note: '{}'", parts[0]));
    };
    let velocity = match parts.get(1).map(|v| parse_arg::<u8>(v, "velocity")) {
        Some(Err(e)) => return CommandResult::Error(e),
        Some(Ok(v)) => v,
        None => 100,
    };
    let duration = match parts.get(2).map(|d| parse_arg::<f32>(d, "duration")) {
        Some(Err(e)) => return CommandResult::Error(e),
        Some(Ok(d)) => d,
        None => 0.1,
    };
    let event = TriggerEvent::new(pitch, velocity, duration);
    report(
        ctx.rack.euclid.update(|e| {
            e.set_incoming(event);
            Ok(())
        }),
        |_| {
            format!(
                "Euclid forwards {} vel {} for {:.3}s",
                note_name(event.pitch).cyan(),
                event.velocity,
                event.duration_secs
            )
        },
    )
}

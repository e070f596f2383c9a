//! Ring sequencer commands

use crate::audio::midi::{note_name, parse_note};
use crate::commands::euclid::render_cells;
use crate::commands::{parse_arg, report, CommandContext, CommandResult};
use colored::*;
use pulsar_core::config::Traversal;
use pulsar_core::engine::{Engine, RingSequencerEngine};
use pulsar_core::Scale;

fn describe(engine: &RingSequencerEngine) -> String {
    let mut out = format!(
        "{} rings, {} from {} ({})\n",
        engine.ring_count(),
        engine.scale().name(),
        note_name(engine.root_note()),
        engine.traversal().name()
    );
    let running = engine.is_running();
    for (r, ring) in engine.rings().iter().enumerate() {
        let visiting = match engine.traversal() {
            Traversal::Spiral => engine.current_ring() == r,
            Traversal::Lockstep => true,
        };
        let cursor = (running && visiting).then(|| ring.current_step());
        out.push_str(&format!(
            "  {} {:<4} [{}]\n",
            format!("{}", r).bold(),
            note_name(engine.pitch_for_ring(r)),
            render_cells(ring.cells(), cursor)
        ));
    }
    out.trim_end().to_string()
}

/// Handle `ring`
pub fn cmd_ring_show(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if !args.is_empty() {
        return CommandResult::Error(format!("Unknown ring command '{}'. Try 'help'", args));
    }
    CommandResult::Message(ctx.rack.ring.inspect(describe))
}

/// Handle `ring count <n>`
pub fn cmd_ring_count(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let count = match parse_arg::<usize>(args, "ring count") {
        Ok(c) => c,
        Err(e) => return CommandResult::Error(e),
    };
    report(ctx.rack.ring.set_ring_count(count), |_| {
        format!("Ring sequencer now has {} rings", count)
    })
}

/// Handle `ring toggle <ring> <step>`
pub fn cmd_ring_toggle(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let parts: Vec<&str> = args.split_whitespace().collect();
    if parts.len() != 2 {
        return CommandResult::Error("Usage: ring toggle <ring> <step>".to_string());
    }
    let (ring, step) = match (
        parse_arg::<usize>(parts[0], "ring"),
        parse_arg::<usize>(parts[1], "step"),
    ) {
        (Ok(r), Ok(s)) => (r, s),
        (Err(e), _) | (_, Err(e)) => return CommandResult::Error(e),
    };
    report(
        ctx.rack.ring.update(|e| Ok(e.toggle_cell(ring, step)?)),
        |on| format!("Ring {} step {} {}", ring, step, if on { "on" } else { "off" }),
    )
}

/// Handle `ring fill <ring> <pulses> [offset]`
pub fn cmd_ring_fill(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let parts: Vec<&str> = args.split_whitespace().collect();
    if parts.len() < 2 || parts.len() > 3 {
        return CommandResult::Error("Usage: ring fill <ring> <pulses> [offset]".to_string());
    }
    let parsed = (|| {
        let ring = parse_arg::<usize>(parts[0], "ring")?;
        let pulses = parse_arg::<usize>(parts[1], "pulses")?;
        let offset = match parts.get(2) {
            Some(o) => parse_arg::<usize>(o, "offset")?,
            None => 0,
        };
        Ok::<_, String>((ring, pulses, offset))
    })();
    let (ring, pulses, offset) = match parsed {
        Ok(values) => values,
        Err(e) => return CommandResult::Error(e),
    };
    report(
        ctx.rack.ring.update(|e| {
            e.fill_ring(ring, pulses, offset)?;
            Ok(describe(e))
        }),
        |table| table,
    )
}

/// Handle `ring clear`
pub fn cmd_ring_clear(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    report(
        ctx.rack.ring.update(|e| {
            e.clear();
            Ok(())
        }),
        |_| "All ring cells cleared".to_string(),
    )
}

/// Handle `ring root <note>`
pub fn cmd_ring_root(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let Some(root) = parse_note(args) else {
        return CommandResult::Error(format!("Invalid note: '{}'", args));
    };
    report(
        ctx.rack.ring.update(|e| {
            e.set_root_note(root);
            Ok(())
        }),
        |_| format!("Ring root set to {}", note_name(root).cyan()),
    )
}

/// Handle `ring scale <name>`
pub fn cmd_ring_scale(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let Some(scale) = Scale::from_name(args) else {
        let names: Vec<&str> = Scale::ALL.iter().map(|s| s.name()).collect();
        return CommandResult::Error(format!(
            "Unknown scale '{}'. Available: {}",
            args,
            names.join(", ")
        ));
    };
    report(
        ctx.rack.ring.update(|e| {
            e.set_scale(scale);
            Ok(())
        }),
        |_| format!("Ring scale set to {}", scale.name().cyan()),
    )
}

/// Handle `ring traversal <spiral|lockstep>`
pub fn cmd_ring_traversal(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let Some(traversal) = Traversal::from_name(args) else {
        return CommandResult::Error("Usage: ring traversal <spiral|lockstep>".to_string());
    };
    report(
        ctx.rack.ring.update(|e| {
            e.set_traversal(traversal);
            Ok(())
        }),
        |_| format!("Ring traversal set to {}", traversal.name()),
    )
}

/// Handle `ring gate <fraction>`
pub fn cmd_ring_gate(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let gate = match parse_arg::<f32>(args, "gate length") {
        Ok(g) => g,
        Err(e) => return CommandResult::Error(e),
    };
    report(
        ctx.rack.ring.update(|e| Ok(e.set_gate_length(gate)?)),
        |_| format!("Ring gate set to {}", args),
    )
}

/// Handle `ring velocity <0-127>`
pub fn cmd_ring_velocity(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let velocity = match parse_arg::<u8>(args, "velocity") {
        Ok(v) => v,
        Err(e) => return CommandResult::Error(e),
    };
    report(
        ctx.rack.ring.update(|e| {
            e.set_velocity(velocity);
            Ok(())
        }),
        |_| format!("Ring velocity set to {}", velocity.min(127)),
    )
}

//! Preset commands

use crate::commands::{CommandContext, CommandResult};
use crate::preset::Preset;
use colored::*;

/// Load and apply a preset file, reporting what changed
pub(crate) fn load_and_apply(path: &str, ctx: &mut CommandContext) -> CommandResult {
    let applied = Preset::load(path).and_then(|preset| preset.apply(&mut ctx.rack));
    match applied {
        Ok(lines) if lines.is_empty() => {
            CommandResult::Message(format!("Preset {} is empty, nothing changed", path))
        }
        Ok(lines) => CommandResult::Message(format!(
            "{} {}\n  {}",
            "📂 Applied".bright_green(),
            path,
            lines.join("\n  ")
        )),
        Err(e) => CommandResult::Error(format!("{:#}", e)),
    }
}

/// Handle `preset load <file>`
pub fn cmd_preset_load(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: preset load <file.json>".to_string());
    }
    load_and_apply(args, ctx)
}

/// Handle `preset save <file>`
pub fn cmd_preset_save(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: preset save <file.json>".to_string());
    }
    match Preset::capture(&ctx.rack).save(args) {
        Ok(()) => CommandResult::Message(format!("💾 Saved preset to {}", args.green())),
        Err(e) => CommandResult::Error(format!("{:#}", e)),
    }
}

/// Handle `preset show`
pub fn cmd_preset_show(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    match Preset::capture(&ctx.rack).to_json() {
        Ok(json) => CommandResult::Message(json),
        Err(e) => CommandResult::Error(format!("{:#}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::context;

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("pulsar-cmd-{}.json", std::process::id()));
        let path = path.to_string_lossy().to_string();

        let mut ctx = context();
        ctx.rack.held.note_on(55).unwrap();
        assert!(matches!(cmd_preset_save(&path, &mut ctx), CommandResult::Message(_)));

        let mut other = context();
        assert!(matches!(cmd_preset_load(&path, &mut other), CommandResult::Message(_)));
        std::fs::remove_file(&path).ok();
        assert_eq!(other.rack.held.snapshot(), vec![55]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let mut ctx = context();
        assert!(matches!(
            cmd_preset_load("/no/such/preset.json", &mut ctx),
            CommandResult::Error(_)
        ));
        assert!(matches!(cmd_preset_load("", &mut ctx), CommandResult::Error(_)));
    }

    #[test]
    fn test_show_is_json() {
        let mut ctx = context();
        match cmd_preset_show("", &mut ctx) {
            CommandResult::Message(json) => assert!(Preset::from_json(&json).is_ok()),
            other => panic!("unexpected {:?}", other),
        }
    }
}

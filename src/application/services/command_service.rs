//! Help and menu rendering over a registry snapshot

use crate::domain::entities::{Command, CommandRegistry};

/// Category-grouped command menu. Owner-only commands are listed for the owner only.
pub fn render_menu(registry: &CommandRegistry, bot_name: &str, prefix: &str, for_owner: bool) -> String {
    let mut menu = format!("*{}* command menu\n", bot_name);

    for category in registry.categories() {
        let visible: Vec<_> = registry
            .list()
            .iter()
            .filter(|c| c.category == category)
            .filter(|c| for_owner || !c.flags.owner_only)
            .collect();
        if visible.is_empty() {
            continue;
        }

        menu.push_str(&format!("\n*{}*\n", category.to_uppercase()));
        for cmd in visible {
            menu.push_str(&format!(
                "  {}{} - {}\n",
                prefix,
                cmd.name,
                cmd.description.as_deref().unwrap_or("")
            ));
        }
    }

    menu.push_str(&format!("\nSend {}help <command> for details.", prefix));
    menu
}

/// Detailed help for a single command
pub fn render_command_help(cmd: &Command, prefix: &str) -> String {
    let mut help = format!(
        "{}{} - {}",
        prefix,
        cmd.name,
        cmd.description.as_deref().unwrap_or("No description")
    );
    help.push_str(&format!("\nUsage: {}", cmd.usage_line(prefix)));
    if !cmd.aliases.is_empty() {
        let aliases: Vec<String> = cmd.aliases.iter().map(|a| format!("{}{}", prefix, a)).collect();
        help.push_str(&format!("\nAliases: {}", aliases.join(", ")));
    }

    let mut scope = Vec::new();
    if cmd.flags.owner_only {
        scope.push("owner only");
    }
    if cmd.flags.group_only {
        scope.push("groups only");
    }
    if cmd.flags.private_only {
        scope.push("private chat only");
    }
    if cmd.flags.restricted {
        scope.push("requires permission");
    }
    if !scope.is_empty() {
        help.push_str(&format!("\nAccess: {}", scope.join(", ")));
    }
    help
}

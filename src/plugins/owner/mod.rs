//! Owner commands - grants, reloads and plugin status

use std::fmt::Write as _;

use crate::application::errors::{HandlerResult, PluginError};
use crate::application::handle::Invocation;
use crate::domain::entities::{Command, Jid};
use crate::plugins::trait_def::{Plugin, PluginContext};

pub struct OwnerPlugin;

impl Plugin for OwnerPlugin {
    fn name(&self) -> &str {
        "owner"
    }

    fn description(&self) -> &str {
        "Permission grants and plugin management"
    }

    fn init(&self, ctx: &mut PluginContext<'_>) -> Result<(), PluginError> {
        ctx.register_command(
            Command::new("grant")
                .with_description("Allow a user or chat to run a restricted command")
                .with_usage("<command> [number|jid|here]")
                .with_category("owner")
                .owner_only()
                .with_handler(grant),
        )?;

        ctx.register_command(
            Command::new("revoke")
                .with_description("Remove a grant")
                .with_usage("<command> [number|jid|here]")
                .with_category("owner")
                .owner_only()
                .with_handler(revoke),
        )?;

        ctx.register_command(
            Command::new("perms")
                .with_description("List grants")
                .with_usage("[number|jid|here]")
                .with_category("owner")
                .owner_only()
                .with_handler(perms),
        )?;

        ctx.register_command(
            Command::new("reload")
                .with_description("Reload all plugins")
                .with_category("owner")
                .owner_only()
                .with_handler(reload),
        )?;

        ctx.register_command(
            Command::new("plugins")
                .with_description("Show plugin load status")
                .with_category("owner")
                .owner_only()
                .with_handler(plugins),
        )?;

        Ok(())
    }
}

/// Who a grant applies to: the arguments from `from` on, then the quoted
/// sender, then the first mention. Phone numbers may contain spaces.
fn target(inv: &Invocation, from: usize) -> Option<String> {
    let arg = inv.args.get(from..).filter(|rest| !rest.is_empty()).map(|rest| rest.join(" "));
    match arg.as_deref() {
        Some(a) if a.eq_ignore_ascii_case("here") => Some(inv.message.chat_id.clone()),
        Some(a) => Jid::resolve(a).map(|j| j.to_bare()),
        None => inv
            .message
            .quoted
            .as_ref()
            .and_then(|q| q.participant.clone())
            .or_else(|| inv.message.mentions.first().cloned()),
    }
}

async fn grant(inv: Invocation) -> HandlerResult {
    let Some(name) = inv.arg(0) else {
        return Err(inv.invalid_args());
    };
    let Some(identity) = target(&inv, 1) else {
        return Err(inv.invalid_args());
    };

    let prefix = inv.bot.prefix().to_string();
    let registry = inv.bot.registry();
    let Some(command) = registry.get(name) else {
        inv.reply(format!("No command named {}{}.", prefix, name.to_lowercase())).await?;
        return Ok(());
    };
    if command.flags.owner_only {
        inv.reply(format!("{}{} is owner only and cannot be granted.", prefix, command.name))
            .await?;
        return Ok(());
    }

    let added = inv.bot.permissions().grant(&identity, &command.name).await?;
    let text = if added {
        format!("Granted {}{} to {}.", prefix, command.name, identity)
    } else {
        format!("{} already has {}{}.", identity, prefix, command.name)
    };
    inv.reply(text).await?;
    Ok(())
}

async fn revoke(inv: Invocation) -> HandlerResult {
    let Some(name) = inv.arg(0) else {
        return Err(inv.invalid_args());
    };
    let Some(identity) = target(&inv, 1) else {
        return Err(inv.invalid_args());
    };

    // Accept names of commands that are no longer loaded
    let name = inv
        .bot
        .registry()
        .get(name)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| name.to_lowercase());

    let removed = inv.bot.permissions().revoke(&identity, &name).await?;
    let prefix = inv.bot.prefix();
    let text = if removed {
        format!("Revoked {}{} from {}.", prefix, name, identity)
    } else {
        format!("{} had no grant for {}{}.", identity, prefix, name)
    };
    inv.reply(text).await?;
    Ok(())
}

async fn perms(inv: Invocation) -> HandlerResult {
    let prefix = inv.bot.prefix();

    let text = if inv.arg(0).is_some() || inv.message.quoted.is_some() {
        let Some(identity) = target(&inv, 0) else {
            return Err(inv.invalid_args());
        };
        let commands = inv.bot.permissions().grants_for(&identity).await;
        if commands.is_empty() {
            format!("{} has no grants.", identity)
        } else {
            let list: Vec<String> = commands.iter().map(|c| format!("{}{}", prefix, c)).collect();
            format!("{}: {}", identity, list.join(", "))
        }
    } else {
        let grants = inv.bot.permissions().list().await;
        if grants.is_empty() {
            "No grants.".to_string()
        } else {
            let mut out = String::from("*Grants*\n");
            for (identity, commands) in &grants {
                let list: Vec<String> = commands.iter().map(|c| format!("{}{}", prefix, c)).collect();
                let _ = writeln!(out, "{}: {}", identity, list.join(", "));
            }
            out.trim_end().to_string()
        }
    };

    inv.reply(text).await?;
    Ok(())
}

async fn reload(inv: Invocation) -> HandlerResult {
    let report = inv.bot.reload_plugins().await;
    let mut text = format!(
        "Reloaded: {} plugins, {} commands.",
        report.succeeded.len(),
        report.commands
    );
    for failure in &report.failed {
        let _ = write!(text, "\nFailed: {} ({})", failure.name, failure.error);
    }
    inv.reply(text).await?;
    Ok(())
}

async fn plugins(inv: Invocation) -> HandlerResult {
    let Some(report) = inv.bot.last_load_report() else {
        inv.reply("Plugins have not been loaded yet.").await?;
        return Ok(());
    };

    let mut text = String::from("*Plugins*");
    for name in &report.succeeded {
        let _ = write!(text, "\n[ok] {}", name);
    }
    for failure in &report.failed {
        let _ = write!(text, "\n[failed] {}: {}", failure.name, failure.error);
    }
    for name in &report.skipped {
        let _ = write!(text, "\n[disabled] {}", name);
    }
    let _ = write!(text, "\n\n{} commands registered.", inv.bot.registry().len());
    inv.reply(text).await?;
    Ok(())
}

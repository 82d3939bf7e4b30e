//! General commands available to everyone

use crate::application::errors::PluginError;
use crate::application::handle::Invocation;
use crate::application::services::command_service::{render_command_help, render_menu};
use crate::application::services::stats::format_uptime;
use crate::domain::entities::Command;
use crate::plugins::trait_def::{Plugin, PluginContext};

pub struct GeneralPlugin;

impl Plugin for GeneralPlugin {
    fn name(&self) -> &str {
        "general"
    }

    fn description(&self) -> &str {
        "Help menu, ping and bot status"
    }

    fn init(&self, ctx: &mut PluginContext<'_>) -> Result<(), PluginError> {
        ctx.register_command(
            Command::new("help")
                .with_description("Show the command menu")
                .with_aliases(["menu"])
                .with_usage("[command]")
                .with_category("general")
                .with_handler(help),
        )?;

        ctx.register_command(
            Command::new("ping")
                .with_description("Check the bot is alive")
                .with_category("general")
                .with_handler(|inv: Invocation| async move {
                    let latency = chrono::Utc::now() - inv.message.timestamp;
                    let text = if latency.num_seconds() < 60 {
                        format!("Pong! ({} ms)", latency.num_milliseconds().max(0))
                    } else {
                        "Pong!".to_string()
                    };
                    inv.reply(text).await?;
                    Ok(())
                }),
        )?;

        ctx.register_command(
            Command::new("stats")
                .with_description("Uptime and counters")
                .with_aliases(["status"])
                .with_category("general")
                .with_handler(stats),
        )?;

        Ok(())
    }
}

async fn help(inv: Invocation) -> crate::application::errors::HandlerResult {
    let registry = inv.bot.registry();
    let prefix = inv.bot.prefix();

    let text = match inv.arg(0) {
        Some(name) => {
            let name = name.strip_prefix(prefix).unwrap_or(name);
            match registry.get(name) {
                Some(cmd) if !cmd.flags.owner_only || inv.is_owner() => render_command_help(cmd, prefix),
                _ => format!("No command named {}{}.", prefix, name.to_lowercase()),
            }
        }
        None => render_menu(&registry, &inv.bot.settings().name, prefix, inv.is_owner()),
    };

    inv.reply(text).await?;
    Ok(())
}

async fn stats(inv: Invocation) -> crate::application::errors::HandlerResult {
    let s = inv.bot.stats();
    let text = format!(
        "*{}* status\n\
         Uptime: {}\n\
         Commands loaded: {}\n\
         Messages seen: {}\n\
         Commands run: {}\n\
         Errors: {}\n\
         Denied: {}",
        inv.bot.settings().name,
        format_uptime(s.uptime_secs),
        s.commands_registered,
        s.messages_received,
        s.commands_executed,
        s.errors,
        s.denied,
    );
    inv.reply(text).await?;
    Ok(())
}

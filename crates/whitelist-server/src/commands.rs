//! Inbound command handlers
//!
//! Every failure is turned into response text plus a structured kind here;
//! nothing propagates past this boundary.

use tracing::{info, warn};
use whitelist_core::{Binding, ListMode, Result, WhitelistError};
use whitelist_rcon::OnlineStatus;

use crate::orchestrator::{AdminDeleteOutcome, BindOutcome, BindingService};
use crate::protocol::{Request, Response};

/// Command definition for `help`
#[derive(Debug, Clone)]
pub struct CommandDef {
    pub name: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
    pub admin_only: bool,
}

/// Get list of available commands
pub fn list_commands() -> Vec<CommandDef> {
    vec![
        CommandDef {
            name: "bind",
            usage: "bind <gameId>",
            description: "Bind a game ID to your account and add it to the whitelist. Example: bind Yun_mo_an",
            admin_only: false,
        },
        CommandDef {
            name: "unbind",
            usage: "unbind <gameId>",
            description: "Remove one of your game IDs from the whitelist",
            admin_only: false,
        },
        CommandDef {
            name: "query",
            usage: "query [ownerId]",
            description: "List your bound game IDs (administrators may name another owner)",
            admin_only: false,
        },
        CommandDef {
            name: "online",
            usage: "online",
            description: "Show players currently online",
            admin_only: false,
        },
        CommandDef {
            name: "ping",
            usage: "ping",
            description: "Check the connection to the game server",
            admin_only: false,
        },
        CommandDef {
            name: "admin-bind",
            usage: "admin-bind <gameId> <ownerId>",
            description: "Bind a game ID to another account",
            admin_only: true,
        },
        CommandDef {
            name: "admin-delete",
            usage: "admin-delete <gameId|#id>",
            description: "Delete a binding even if the server cannot be reached",
            admin_only: true,
        },
        CommandDef {
            name: "raw",
            usage: "raw <console command>",
            description: "Run any console command verbatim (unrestricted)",
            admin_only: true,
        },
        CommandDef {
            name: "help",
            usage: "help",
            description: "Show this message",
            admin_only: false,
        },
    ]
}

fn usage_of(name: &str) -> &'static str {
    list_commands()
        .into_iter()
        .find(|c| c.name == name)
        .map(|c| c.usage)
        .unwrap_or("help")
}

fn arg<'a>(args: &'a [String], index: usize, command: &str) -> Result<&'a str> {
    args.get(index).map(String::as_str).ok_or_else(|| {
        WhitelistError::InvalidFormat(format!("missing argument. Usage: {}", usage_of(command)))
    })
}

/// Handle one request
pub async fn handle_command(service: &BindingService, request: &Request) -> Response {
    let requester = request.requester();
    let result = match request.command.as_str() {
        "bind" => match arg(&request.args, 0, "bind") {
            Ok(game_id) => service
                .bind(&requester, game_id)
                .await
                .map(|o| render_bind(&o, service.list_mode())),
            Err(e) => Err(e),
        },
        "unbind" => match arg(&request.args, 0, "unbind") {
            Ok(game_id) => service.unbind(&requester, game_id).await.map(|b| {
                format!(
                    "Game ID {} has been unbound and removed from the whitelist",
                    b.game_id
                )
            }),
            Err(e) => Err(e),
        },
        "admin-bind" => handle_admin_bind(service, request).await,
        "admin-delete" => match arg(&request.args, 0, "admin-delete") {
            Ok(identifier) => service
                .admin_delete(&requester, identifier)
                .await
                .map(|o| render_admin_delete(&o)),
            Err(e) => Err(e),
        },
        "query" => match request.args.first() {
            Some(owner_id) => service
                .query_other(&requester, owner_id)
                .await
                .map(|list| render_bindings(owner_id, &list)),
            None => service
                .query_own(&requester)
                .await
                .map(|list| render_bindings("you", &list)),
        },
        "raw" => {
            let text = request.args.join(" ");
            service.raw_command(&requester, &text).await.map(|out| {
                if out.trim().is_empty() {
                    "(no output)".to_string()
                } else {
                    out
                }
            })
        }
        "online" => service.online(&requester).await.map(|s| render_online(&s)),
        "ping" => service.ping(&requester).await.map(|_| {
            format!(
                "Connection to the game server works. Requester: {} ({})",
                requester.id, requester.name
            )
        }),
        "help" => Ok(render_help()),
        other => Err(WhitelistError::InvalidFormat(format!(
            "unknown command {:?}, try help",
            other
        ))),
    };

    match result {
        Ok(text) => {
            info!("{} by {} succeeded", request.command, requester.id);
            Response::success(request.id.clone(), text)
        }
        Err(e) => {
            warn!(
                "{} by {} failed [{:?}]: {}",
                request.command,
                requester.id,
                e.kind(),
                e
            );
            Response::failure(Some(request.id.clone()), &e)
        }
    }
}

async fn handle_admin_bind(service: &BindingService, request: &Request) -> Result<String> {
    let game_id = arg(&request.args, 0, "admin-bind")?;
    let owner_id = arg(&request.args, 1, "admin-bind")?;
    let outcome = service
        .admin_bind(&request.requester(), game_id, owner_id)
        .await?;
    Ok(format!(
        "Game ID {} bound to {} by administrator",
        outcome.binding.game_id, outcome.binding.owner_id
    ))
}

fn render_bind(outcome: &BindOutcome, mode: ListMode) -> String {
    let binding = &outcome.binding;
    let mut text = format!(
        "Game ID {} is now bound to {} ({})",
        binding.game_id, binding.owner_id, binding.owner_display_name
    );
    if mode == ListMode::Native && !outcome.remote_response.is_empty() {
        text.push_str("\nServer: ");
        text.push_str(&outcome.remote_response);
    }
    text
}

fn render_admin_delete(outcome: &AdminDeleteOutcome) -> String {
    let binding = &outcome.binding;
    let mut text = format!(
        "Deleted binding #{} ({}, owner {})",
        binding.id, binding.game_id, binding.owner_id
    );
    if let Some(warning) = &outcome.remote_warning {
        text.push_str("\nWarning: whitelist removal on the server failed: ");
        text.push_str(warning);
    }
    text
}

fn render_bindings(owner: &str, bindings: &[Binding]) -> String {
    if bindings.is_empty() {
        return format!("No game IDs bound to {}", owner);
    }
    let mut text = format!("Game IDs bound to {}:", owner);
    for binding in bindings {
        text.push_str(&format!(
            "\n#{} {} (bound {})",
            binding.id,
            binding.game_id,
            binding.created_at_display()
        ));
    }
    text
}

fn render_online(status: &OnlineStatus) -> String {
    if status.online == 0 {
        return format!("Online players: nobody is online (0/{})", status.max);
    }
    format!(
        "Online players ({}/{}): {}",
        status.online,
        status.max,
        status.players.join(", ")
    )
}

fn render_help() -> String {
    let mut text = String::from("Whitelist commands:");
    for def in list_commands() {
        let marker = if def.admin_only { " [admin]" } else { "" };
        text.push_str(&format!("\n{}{} - {}", def.usage, marker, def.description));
    }
    text
}

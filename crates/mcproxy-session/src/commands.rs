//! In-game command interception.
//!
//! Commands registered here never reach the server: a matching client
//! `CommandRequest` is dropped after invoking the bound executor, and the
//! registered entries are appended to server-origin `AvailableCommands`
//! packets so the client autocompletes them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use mcproxy_proto::packets::{CommandEntry, Packet};
use tracing::debug;

use crate::handler::{lock, Handler};

/// Executor invoked with the arguments after the command name. The return
/// value is reserved for chaining and currently unused.
pub type CommandFn = Box<dyn FnMut(&[String]) -> bool + Send>;

pub struct IngameCommand {
    pub entry: CommandEntry,
    pub exec: CommandFn,
}

/// Shared command table, populated before the proxy loops start.
pub type CommandRegistry = Arc<Mutex<HashMap<String, IngameCommand>>>;

pub fn new_registry() -> CommandRegistry {
    Arc::new(Mutex::new(HashMap::new()))
}

pub fn register(registry: &CommandRegistry, entry: CommandEntry, exec: CommandFn) {
    lock(registry).insert(entry.name.clone(), IngameCommand { entry, exec });
}

/// The distinguished command handler installed by the proxy.
pub fn command_handler(registry: CommandRegistry) -> Handler {
    Handler {
        name: "Commands",
        packet_callback: Some(Box::new(move |pk, _to_server, _received, _pre_login| {
            match pk {
                Packet::CommandRequest(req) => {
                    let line = req.command_line.trim_start_matches('/');
                    let mut parts = line.split_whitespace();
                    let name = parts.next().unwrap_or_default().to_string();
                    let args: Vec<String> = parts.map(str::to_string).collect();

                    let mut registry = lock(&registry);
                    if let Some(cmd) = registry.get_mut(&name) {
                        debug!(command = %name, "intercepted in-game command");
                        (cmd.exec)(&args);
                        return Ok(None); // never forwarded
                    }
                    Ok(Some(Packet::CommandRequest(req)))
                }
                Packet::AvailableCommands(mut ac) => {
                    let registry = lock(&registry);
                    ac.commands.extend(registry.values().map(|c| c.entry.clone()));
                    Ok(Some(Packet::AvailableCommands(ac)))
                }
                other => Ok(Some(other)),
            }
        })),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{new_handlers, run_packet_callbacks};
    use bytes::Bytes;
    use mcproxy_proto::packets::{AvailableCommands, CommandOrigin, CommandRequest};
    use std::time::Instant;

    fn request(line: &str) -> Packet {
        Packet::CommandRequest(CommandRequest {
            command_line: line.into(),
            origin: CommandOrigin::player(),
            internal: false,
            version: 36,
        })
    }

    #[test]
    fn matching_command_is_dropped_and_executed() {
        let registry = new_registry();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let calls2 = calls.clone();
        register(
            &registry,
            CommandEntry::new("zoom", "Map zoom"),
            Box::new(move |args| {
                lock(&calls2).push(args.to_vec());
                true
            }),
        );

        let handlers = new_handlers();
        lock(&handlers).push(command_handler(registry));

        let out = run_packet_callbacks(&handlers, request("/zoom 3"), true, Instant::now(), false)
            .unwrap();
        assert!(out.is_none(), "intercepted command must not be forwarded");
        assert_eq!(*lock(&calls), vec![vec!["3".to_string()]]);
    }

    #[test]
    fn unknown_command_is_forwarded() {
        let registry = new_registry();
        let handlers = new_handlers();
        lock(&handlers).push(command_handler(registry));

        let out = run_packet_callbacks(&handlers, request("/hello"), true, Instant::now(), false)
            .unwrap();
        assert!(matches!(out, Some(Packet::CommandRequest(_))));
    }

    #[test]
    fn available_commands_gains_entries() {
        let registry = new_registry();
        register(
            &registry,
            CommandEntry::new("pause", "Pause capture"),
            Box::new(|_| true),
        );
        let handlers = new_handlers();
        lock(&handlers).push(command_handler(registry));

        let pk = Packet::AvailableCommands(AvailableCommands {
            commands: vec![CommandEntry::new("gamemode", "server command")],
            trailer: Bytes::new(),
        });
        let out = run_packet_callbacks(&handlers, pk, false, Instant::now(), false)
            .unwrap()
            .unwrap();
        match out {
            Packet::AvailableCommands(ac) => {
                assert_eq!(ac.commands.len(), 2);
                assert!(ac.commands.iter().any(|c| c.name == "pause"));
            }
            other => panic!("unexpected {}", other.name()),
        }
    }
}

//! Slash command handling (/open, /dm, /close, /find, etc.).

use crossbeam_channel::Sender;

use crate::model::{Channel, ChannelId};
use crate::protocol::BackendAction;
use crate::sorter::filter_by_name;
use crate::state::ClientState;

const HELP: &str = "Commands: /dms, /guilds, /guild <id|name>, /open <channel>, /dm <user id>, \
                    /close [channel], /find <term>, /quit. Anything else is sent to the open channel.";

/// Handle one line of user input.
/// Returns false when the user asked to quit.
pub fn handle_input(input: &str, state: &mut ClientState, action_tx: &Sender<BackendAction>) -> bool {
    let s = input.trim();
    if s.is_empty() {
        return true;
    }

    let Some(cmdline) = s.strip_prefix('/') else {
        send_text(s, state, action_tx);
        return true;
    };

    let mut parts = cmdline.trim().splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("").to_lowercase();
    let arg = parts.next().unwrap_or("").trim();

    match cmd.as_str() {
        "dms" => {
            if state.dms.is_empty() {
                state.say("No direct messages");
            }
            let dms: Vec<&Channel> = state.dms.iter().collect();
            for line in state.channel_lines(&dms) {
                state.say(line);
            }
        }
        "guilds" | "servers" => {
            if state.guilds.is_empty() {
                state.say("No servers");
            }
            let lines: Vec<String> = state
                .guilds
                .iter()
                .map(|g| format!("  {} ({})", g.name, g.id))
                .collect();
            for line in lines {
                state.say(line);
            }
        }
        "guild" | "server" => {
            if arg.is_empty() {
                state.say("Usage: /guild <id|name>");
            } else if let Some(guild) = state.find_guild(arg) {
                let _ = action_tx.send(BackendAction::SelectGuild(guild.id.clone()));
            } else {
                state.say(format!("No server matching '{}'", arg));
            }
        }
        "open" | "o" => {
            if arg.is_empty() {
                state.say("Usage: /open <channel>");
            } else if let Some(channel) = state.find_channel(arg) {
                let _ = action_tx.send(BackendAction::SelectChannel(channel.id.clone()));
            } else {
                state.say(format!("No single channel matching '{}' (try /find)", arg));
            }
        }
        "dm" => {
            if arg.is_empty() {
                state.say("Usage: /dm <user id>");
            } else {
                let _ = action_tx.send(BackendAction::OpenDm {
                    recipient_id: arg.to_string(),
                });
            }
        }
        "close" => {
            let target: Option<ChannelId> = if arg.is_empty() {
                state.active_channel.clone()
            } else {
                state.find_channel(arg).map(|c| c.id.clone())
            };
            match target {
                Some(id) => {
                    let _ = action_tx.send(BackendAction::CloseChannel(id));
                }
                None if arg.is_empty() => state.say("Usage: /close [channel]"),
                None => state.say(format!("No single channel matching '{}'", arg)),
            }
        }
        "find" | "f" => {
            let all = state.all_channels();
            let matches = filter_by_name(&all, arg);
            let lines = if matches.is_empty() {
                vec![format!("Nothing matches '{}'", arg)]
            } else {
                state.channel_lines(&matches)
            };
            for line in lines {
                state.say(line);
            }
        }
        "quit" | "exit" => {
            let _ = action_tx.send(BackendAction::Shutdown);
            return false;
        }
        "help" => {
            state.say(HELP);
        }
        unknown => {
            state.say(format!("Unknown command: /{}", unknown));
        }
    }
    true
}

fn send_text(text: &str, state: &mut ClientState, action_tx: &Sender<BackendAction>) {
    if state.active_channel.is_none() {
        state.say("Open a channel first with /open <channel>");
        return;
    }
    let _ = action_tx.send(BackendAction::InputChanged {
        text: text.to_string(),
    });
    let _ = action_tx.send(BackendAction::SendMessage {
        text: text.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChannelKind, Guild, GuildId};
    use crossbeam_channel::{unbounded, Receiver};

    fn setup() -> (ClientState, Sender<BackendAction>, Receiver<BackendAction>) {
        let mut state = ClientState::new();
        state.dms = vec![
            Channel {
                id: ChannelId::new("1"),
                kind: ChannelKind::Dm { recipients: vec![] },
                name: "alice".into(),
            },
            Channel {
                id: ChannelId::new("2"),
                kind: ChannelKind::Dm { recipients: vec![] },
                name: "bob".into(),
            },
        ];
        state.guilds = vec![Guild {
            id: GuildId::new("9"),
            name: "Rust".into(),
        }];
        let (tx, rx) = unbounded();
        (state, tx, rx)
    }

    #[test]
    fn test_open_and_close() {
        let (mut state, tx, rx) = setup();
        assert!(handle_input("/open bob", &mut state, &tx));
        assert!(matches!(rx.try_recv(), Ok(BackendAction::SelectChannel(id)) if id.as_str() == "2"));

        state.active_channel = Some(ChannelId::new("2"));
        handle_input("/close", &mut state, &tx);
        assert!(matches!(rx.try_recv(), Ok(BackendAction::CloseChannel(id)) if id.as_str() == "2"));

        handle_input("/close alice", &mut state, &tx);
        assert!(matches!(rx.try_recv(), Ok(BackendAction::CloseChannel(id)) if id.as_str() == "1"));
    }

    #[test]
    fn test_unknown_channel_is_reported_locally() {
        let (mut state, tx, rx) = setup();
        handle_input("/open zed", &mut state, &tx);
        assert!(rx.try_recv().is_err());
        assert!(state.drain_output()[0].contains("No single channel matching 'zed'"));
    }

    #[test]
    fn test_plain_text_needs_active_channel() {
        let (mut state, tx, rx) = setup();
        handle_input("hello", &mut state, &tx);
        assert!(rx.try_recv().is_err());

        state.active_channel = Some(ChannelId::new("1"));
        handle_input("hello there", &mut state, &tx);
        assert!(matches!(rx.try_recv(), Ok(BackendAction::InputChanged { text }) if text == "hello there"));
        assert!(matches!(rx.try_recv(), Ok(BackendAction::SendMessage { text }) if text == "hello there"));
    }

    #[test]
    fn test_guild_dm_and_quit() {
        let (mut state, tx, rx) = setup();
        handle_input("/guild rust", &mut state, &tx);
        assert!(matches!(rx.try_recv(), Ok(BackendAction::SelectGuild(id)) if id.as_str() == "9"));

        handle_input("/dm 42", &mut state, &tx);
        assert!(matches!(rx.try_recv(), Ok(BackendAction::OpenDm { recipient_id }) if recipient_id == "42"));

        assert!(!handle_input("/quit", &mut state, &tx));
        assert!(matches!(rx.try_recv(), Ok(BackendAction::Shutdown)));
    }

    #[test]
    fn test_find_filters_case_insensitively() {
        let (mut state, tx, _rx) = setup();
        handle_input("/find ALI", &mut state, &tx);
        let out = state.drain_output();
        assert_eq!(out, vec!["  alice (1)".to_string()]);

        handle_input("/find nobody", &mut state, &tx);
        assert!(state.drain_output()[0].contains("Nothing matches"));
    }

    #[test]
    fn test_unknown_command() {
        let (mut state, tx, _rx) = setup();
        assert!(handle_input("/frobnicate", &mut state, &tx));
        assert_eq!(state.drain_output(), vec!["Unknown command: /frobnicate".to_string()]);
    }
}

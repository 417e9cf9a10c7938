use std::sync::Arc;

use anyhow::{bail, Context};
use rustcord_lib::channels::{ChatEvent, EventChannel, PresenceEvent, SessionEvent};
use rustcord_lib::config::ClientConfig;
use rustcord_lib::state::{AuthProvider, ConnectionStatus, Identity};
use rustcord_lib::transport::WsConnector;
use rustcord_lib::{spawn_session, SessionHandle};
use rustcord_protocol::PresenceStatus;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    endpoint: Option<String>,
    passphrase: Option<String>,
    username: String,
    id: Option<String>,
    email: Option<String>,
    avatar: Option<String>,
    provider: Option<String>,
}

fn parse_args() -> Args {
    let mut args = std::env::args().skip(1);
    let mut parsed = Args::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--endpoint" => parsed.endpoint = args.next(),
            "--passphrase" => parsed.passphrase = args.next(),
            "--username" => parsed.username = args.next().unwrap_or_default(),
            "--id" => parsed.id = args.next(),
            "--email" => parsed.email = args.next(),
            "--avatar" => parsed.avatar = args.next(),
            "--provider" => parsed.provider = args.next(),
            other => tracing::warn!(arg = other, "ignoring unknown argument"),
        }
    }
    parsed
}

impl Args {
    fn identity(&self) -> anyhow::Result<Identity> {
        if self.username.trim().is_empty() {
            bail!("--username is required");
        }
        let provider = match self.provider.as_deref() {
            None => AuthProvider::Google,
            Some(name) => AuthProvider::from_name(name)
                .with_context(|| format!("unknown provider {name:?}, expected google or github"))?,
        };

        let mut identity = Identity::from_oauth_callback(
            provider,
            self.username.trim(),
            self.email.clone(),
            self.avatar.clone(),
        );
        if let Some(id) = self.id.as_ref().filter(|id| !id.is_empty()) {
            identity.id.clone_from(id);
        }
        Ok(identity)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args();
    let mut config = ClientConfig::from_env()?;
    if let Some(endpoint) = args.endpoint.clone() {
        config.endpoint = endpoint;
    }
    if let Some(passphrase) = args.passphrase.clone() {
        config.passphrase = passphrase;
    }
    config.validate()?;
    let identity = args.identity()?;

    tracing::info!(endpoint = %config.endpoint, user = %identity.id, "rustcord starting");

    let (observer, mut events) = EventChannel::new();
    let handle = spawn_session(&config, identity, WsConnector, Arc::new(observer));

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if render(&event) {
                    break;
                }
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => handle_line(&handle, &line),
                Ok(None) => {
                    stdin_open = false;
                    handle.logout();
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    stdin_open = false;
                    handle.logout();
                }
            },
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn handle_line(handle: &SessionHandle, line: &str) {
    let line = line.trim_end_matches(['\r', '\n']);
    match line.split_once(' ').map_or((line, ""), |(cmd, rest)| (cmd, rest.trim())) {
        ("/quit", _) => handle.logout(),
        ("/who", _) => {
            let roster = handle.roster();
            println!("-- {} online, {} known --", handle.online_count(), roster.len());
            for entry in roster {
                println!("   {:<8} {}", entry.status.as_str(), entry.username);
            }
        }
        ("/status", raw) => match PresenceStatus::from_wire(raw) {
            Some(status) => handle.set_status(status),
            None => println!("-- usage: /status online|idle|dnd|offline --"),
        },
        _ => handle.send_message(line),
    }
}

/// Print one event. Returns true once the session has closed.
fn render(event: &SessionEvent) -> bool {
    match event {
        SessionEvent::Chat(chat) => {
            let message = chat.message();
            match chat {
                ChatEvent::SystemMessage { .. } => println!("** {}", message.content),
                _ => println!("<{}> {}", message.author, message.content),
            }
        }
        SessionEvent::Presence(PresenceEvent::RosterReplaced { online_count, .. }) => {
            println!("-- roster updated, {online_count} online --");
        }
        SessionEvent::Presence(PresenceEvent::UserUpdated { entry, online_count }) => {
            println!("-- {} is {} ({online_count} online) --", entry.username, entry.status);
        }
        SessionEvent::Presence(PresenceEvent::RosterCleared) => {}
        SessionEvent::Status(status) => {
            match &status.detail {
                Some(detail) => println!("-- {:?}: {detail} --", status.status),
                None => println!("-- {:?} --", status.status),
            }
            return status.status == ConnectionStatus::Closed;
        }
    }
    false
}

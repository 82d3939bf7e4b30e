//! Fakes shared by unit tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::application::errors::{BotError, StorageError};
use crate::application::handle::{BotHandle, BotSettings};
use crate::application::messaging::{DispatchPolicy, MessageDispatcher, MessageParser};
use crate::application::services::PermissionService;
use crate::domain::entities::{InboundEvent, Jid, MessageContext, MessageKey, MessagePayload, OutgoingMessage};
use crate::domain::traits::{Bot, BotInfo, Grants, PermissionStore};
use crate::plugins::manager::PluginLoader;
use crate::plugins::trait_def::PluginRecord;

pub const OWNER: &str = "6281100000000@s.whatsapp.net";
pub const USER: &str = "6281200000000@s.whatsapp.net";

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

fn next_id() -> String {
    format!("MSG{:06}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

pub fn dm_event(sender: &str, text: &str) -> InboundEvent {
    InboundEvent {
        key: MessageKey {
            remote_jid: sender.to_string(),
            from_me: false,
            id: next_id(),
            participant: None,
        },
        push_name: Some("Tester".to_string()),
        message_timestamp: Some(1_700_000_000),
        message: Some(MessagePayload::text(text)),
    }
}

pub fn group_event(group: &str, sender: &str, text: &str) -> InboundEvent {
    InboundEvent {
        key: MessageKey {
            remote_jid: group.to_string(),
            from_me: false,
            id: next_id(),
            participant: Some(sender.to_string()),
        },
        push_name: Some("Tester".to_string()),
        message_timestamp: Some(1_700_000_000),
        message: Some(MessagePayload::text(text)),
    }
}

/// Normalized context for `text` sent by `sender` in `chat`
pub fn context(chat: &str, sender: &str, text: &str) -> MessageContext {
    let event = if chat.ends_with("@g.us") {
        group_event(chat, sender, text)
    } else {
        dm_event(sender, text)
    };
    MessageParser::new(".")
        .normalize(event)
        .expect("test event should normalize")
}

/// In-memory grant store that can be told to fail writes
#[derive(Default)]
pub struct MemoryStore {
    grants: Mutex<Grants>,
    fail: AtomicBool,
}

impl MemoryStore {
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn load(&self) -> Result<Grants, StorageError> {
        Ok(self.grants.lock().unwrap().clone())
    }

    async fn grant(&self, identity: &str, command: &str) -> Result<(), StorageError> {
        self.check()?;
        self.grants
            .lock()
            .unwrap()
            .entry(identity.to_string())
            .or_default()
            .insert(command.to_string());
        Ok(())
    }

    async fn revoke(&self, identity: &str, command: &str) -> Result<bool, StorageError> {
        self.check()?;
        let mut grants = self.grants.lock().unwrap();
        let removed = grants
            .get_mut(identity)
            .map(|set| set.remove(command))
            .unwrap_or(false);
        if grants.get(identity).is_some_and(|set| set.is_empty()) {
            grants.remove(identity);
        }
        Ok(removed)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Bot that records everything sent through it
#[derive(Default)]
pub struct RecordingBot {
    sent: Mutex<Vec<OutgoingMessage>>,
}

impl RecordingBot {
    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|m| m.content.as_text().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Bot for RecordingBot {
    async fn start(&self, _events: mpsc::Sender<InboundEvent>) -> Result<(), BotError> {
        Ok(())
    }

    async fn send(&self, message: OutgoingMessage) -> Result<String, BotError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(message);
        Ok(format!("OUT{}", sent.len()))
    }

    fn bot_info(&self) -> BotInfo {
        BotInfo {
            id: Some("6289900000000@s.whatsapp.net".to_string()),
            name: "test-bot".to_string(),
        }
    }
}

pub struct Harness {
    pub handle: BotHandle,
    pub dispatcher: MessageDispatcher,
    pub bot: Arc<RecordingBot>,
    pub store: Arc<MemoryStore>,
}

fn settings() -> BotSettings {
    BotSettings {
        name: "test-bot".to_string(),
        prefix: ".".to_string(),
        owner: Jid::parse(OWNER).expect("owner jid"),
    }
}

async fn build(records: Vec<PluginRecord>, policy: DispatchPolicy) -> Harness {
    let bot = Arc::new(RecordingBot::default());
    let store = Arc::new(MemoryStore::default());
    let permissions = PermissionService::load(store.clone(), settings().owner)
        .await
        .expect("memory store loads");
    let handle = BotHandle::new(bot.clone(), permissions, settings(), PluginLoader::new(records));
    let dispatcher = MessageDispatcher::new(handle.clone(), MessageParser::new("."), policy);
    Harness {
        handle,
        dispatcher,
        bot,
        store,
    }
}

pub async fn harness() -> Harness {
    build(Vec::new(), DispatchPolicy::default()).await
}

pub async fn harness_with(policy: DispatchPolicy) -> Harness {
    build(Vec::new(), policy).await
}

/// Harness whose loader knows `records`; plugins are not loaded yet
pub async fn harness_with_plugins(records: Vec<PluginRecord>) -> Harness {
    build(records, DispatchPolicy::default()).await
}

pub async fn handle_with_plugins(records: Vec<PluginRecord>) -> BotHandle {
    harness_with_plugins(records).await.handle
}

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::fmt;

pub const USER_SERVER: &str = "s.whatsapp.net";
pub const LEGACY_USER_SERVER: &str = "c.us";
pub const GROUP_SERVER: &str = "g.us";
pub const LID_SERVER: &str = "lid";
pub const STATUS_BROADCAST: &str = "status@broadcast";

static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9]+").expect("static regex"));

/// A WhatsApp address (`user[:device]@server`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    pub user: String,
    pub device: Option<u16>,
    pub server: String,
}

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            device: None,
            server: server.into(),
        }
    }

    /// Parse a full JID. The legacy `c.us` server is folded into `s.whatsapp.net`.
    pub fn parse(input: &str) -> Option<Self> {
        let (user_part, server) = input.trim().split_once('@')?;
        if server.is_empty() {
            return None;
        }

        let (user, device) = match user_part.split_once(':') {
            Some((user, device)) => (user, device.parse::<u16>().ok()),
            None => (user_part, None),
        };

        let server = if server == LEGACY_USER_SERVER {
            USER_SERVER
        } else {
            server
        };

        Some(Self {
            user: user.to_string(),
            device,
            server: server.to_string(),
        })
    }

    /// Build a user JID from a phone number written in any format (`+62 812-3456`).
    pub fn from_phone(input: &str) -> Option<Self> {
        let digits = NON_DIGITS.replace_all(input, "");
        if digits.is_empty() {
            return None;
        }
        Some(Self::new(digits.into_owned(), USER_SERVER))
    }

    /// Accept either a JID or a bare phone number (with optional leading `@` mention)
    pub fn resolve(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.contains('@') && !input.starts_with('@') {
            Self::parse(input)
        } else {
            Self::from_phone(input.trim_start_matches('@'))
        }
    }

    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER
    }

    pub fn is_user(&self) -> bool {
        self.server == USER_SERVER || self.server == LID_SERVER
    }

    /// `user@server` without the device suffix
    pub fn to_bare(&self) -> String {
        format!("{}@{}", self.user, self.server)
    }

    /// Two addresses belong to the same account regardless of device
    pub fn same_user(&self, other: &Jid) -> bool {
        self.user == other.user && self.server == other.server
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.device {
            Some(device) => write!(f, "{}:{}@{}", self.user, device, self.server),
            None => write!(f, "{}@{}", self.user, self.server),
        }
    }
}

/// Normalize an identity string to its bare JID form, falling back to the raw input
pub fn bare(input: &str) -> String {
    Jid::parse(input)
        .map(|j| j.to_bare())
        .unwrap_or_else(|| input.trim().to_string())
}

pub fn is_group_jid(input: &str) -> bool {
    input.ends_with("@g.us")
}

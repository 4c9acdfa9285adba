//! Implementation of the Java Minecraft ping protocol.
//! [Server List Ping](https://wiki.vg/Server_List_Ping)

use std::time::Duration;

use serde::Deserialize;

/// Protocol version announced in the handshake when the caller has no
/// preference (1.15.2). Servers answer status requests for any version.
pub const DEFAULT_PROTOCOL_VERSION: i32 = 578;

/// Configuration for pinging a Java server.
///
/// # Examples
///
/// ```
/// use pyng::Java;
/// use std::time::Duration;
///
/// let java_config = Java {
///     server_address: "mc.hypixel.net".to_string(),
///     timeout: Some(Duration::from_secs(10)),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Java {
    /// The java server address.
    ///
    /// This can be either an IP or a hostname, and both may optionally have a
    /// port at the end.
    ///
    /// SRV resolution will be performed on hostnames without a port.
    ///
    /// # Examples
    ///
    /// ```text
    /// test.server.com
    /// test.server.com:19384
    /// 13.212.76.209
    /// 13.212.76.209:23193
    /// ```
    pub server_address: String,
    /// Upper bound for the dial and for each step of the exchange.
    pub timeout: Option<Duration>,
    /// Protocol version sent in the handshake.
    pub protocol_version: i32,
}

impl Default for Java {
    fn default() -> Self {
        Self {
            server_address: String::new(),
            timeout: None,
            protocol_version: DEFAULT_PROTOCOL_VERSION,
        }
    }
}

/// The server status reponse
///
/// More information can be found [here](https://wiki.vg/Server_List_Ping).
/// Keys that are not listed here are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct JavaResponse {
    /// The version of the server.
    pub version: Version,
    /// Information about online players
    pub players: Players,
    /// The description of the server (MOTD).
    #[serde(default)]
    pub description: Chat,
    /// The server icon (a Base64-encoded PNG image)
    pub favicon: Option<String>,
    /// Does this server enforce server signing?
    #[serde(rename = "enforcesSecureChat")]
    pub enforces_secure_chat: Option<bool>,
}

impl JavaResponse {
    /// Parse the JSON document carried by a status response packet.
    ///
    /// # Errors
    /// Malformed JSON or a field of the wrong type.
    pub fn from_json(document: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(document)
    }
}

/// Information about the server's version
#[derive(Debug, Clone, Deserialize)]
pub struct Version {
    /// The name of the version the server is running
    ///
    /// In practice this comes in a large variety of different formats.
    pub name: String,
    /// See [Protocol Version Numbers](https://wiki.vg/Protocol_version_numbers)
    pub protocol: i64,
}

/// An online player of the server.
#[derive(Debug, Clone, Deserialize)]
pub struct Player {
    /// The name of the player.
    pub name: String,
    /// The player's UUID
    pub id: String,
}

/// The stats for players on the server.
#[derive(Debug, Clone, Deserialize)]
pub struct Players {
    /// The max amount of players.
    pub max: i64,
    /// The amount of players online.
    pub online: i64,
    /// A preview of which players are online
    ///
    /// In practice servers often don't send this or use it for more advertising
    pub sample: Option<Vec<Player>>,
}

/// A chat component. Only the text is interpreted; formatting is kept as raw
/// JSON so that any component a server sends is accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Chat {
    String(String),
    Text {
        text: String,
        #[serde(default)]
        extra: Vec<Chat>,
    },
    Other(serde_json::Value),
}

impl Default for Chat {
    fn default() -> Self {
        Self::String(String::new())
    }
}

impl Chat {
    /// The plain text of this component and all of its children.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out
    }

    fn push_text(&self, out: &mut String) {
        match self {
            Self::String(s) => out.push_str(s),
            Self::Text { text, extra } => {
                out.push_str(text);
                for child in extra {
                    child.push_text(out);
                }
            }
            Self::Other(_) => {}
        }
    }
}

//! LiveReload protocol messages
//!
//! Browser extensions connect over WebSocket, send `hello`, and expect a
//! `hello` back before they act on `reload` commands.

use serde::{Deserialize, Serialize};

/// Protocol version announced in the handshake.
pub const PROTOCOL_OFFICIAL_7: &str = "http://livereload.com/protocols/official-7";

/// Name reported to connecting clients.
pub const SERVER_NAME: &str = "assetflow";

/// Message sent from the server to browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ServerMessage {
    Hello {
        protocols: Vec<String>,
        #[serde(rename = "serverName")]
        server_name: String,
    },
    Reload {
        path: String,
        #[serde(rename = "liveCSS")]
        live_css: bool,
    },
}

impl ServerMessage {
    pub fn hello() -> Self {
        ServerMessage::Hello {
            protocols: vec![PROTOCOL_OFFICIAL_7.to_string()],
            server_name: SERVER_NAME.to_string(),
        }
    }

    /// Reload `path`; stylesheets are swapped in place by the client.
    pub fn reload(path: impl Into<String>) -> Self {
        ServerMessage::Reload { path: path.into(), live_css: true }
    }
}

/// Message sent from browsers to the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ClientMessage {
    Hello {
        #[serde(default)]
        protocols: Vec<String>,
    },
    Info {
        #[serde(default)]
        url: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

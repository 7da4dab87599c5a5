//! Protocol-neutral page events.
//!
//! The browser adapter translates its own protocol events into [`PageEvent`]
//! so load detection never depends on a particular CDP client.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Empty identifiers come from malformed events.
            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Network request identifier, unique within one navigation context
    RequestId
);
string_id!(
    /// Identifier of a single document-load attempt within a frame
    LoaderId
);
string_id!(
    /// Frame identifier
    FrameId
);

/// Resource category reported with each request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Document,
    Stylesheet,
    Image,
    Media,
    Font,
    Script,
    TextTrack,
    Xhr,
    Fetch,
    Prefetch,
    EventSource,
    WebSocket,
    Manifest,
    SignedExchange,
    Ping,
    CspViolationReport,
    Preflight,
    Other,
}

impl ResourceKind {
    /// Parse the CDP resource type name. Unknown names map to `Other`.
    pub fn from_cdp(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "document" => ResourceKind::Document,
            "stylesheet" => ResourceKind::Stylesheet,
            "image" => ResourceKind::Image,
            "media" => ResourceKind::Media,
            "font" => ResourceKind::Font,
            "script" => ResourceKind::Script,
            "texttrack" => ResourceKind::TextTrack,
            "xhr" => ResourceKind::Xhr,
            "fetch" => ResourceKind::Fetch,
            "prefetch" => ResourceKind::Prefetch,
            "eventsource" => ResourceKind::EventSource,
            "websocket" => ResourceKind::WebSocket,
            "manifest" => ResourceKind::Manifest,
            "signedexchange" => ResourceKind::SignedExchange,
            "ping" => ResourceKind::Ping,
            "cspviolationreport" => ResourceKind::CspViolationReport,
            "preflight" => ResourceKind::Preflight,
            _ => ResourceKind::Other,
        }
    }

    /// Kinds that never settle on their own and are not tracked at all.
    pub fn is_noisy(&self) -> bool {
        matches!(
            self,
            ResourceKind::EventSource
                | ResourceKind::WebSocket
                | ResourceKind::Media
                | ResourceKind::TextTrack
                | ResourceKind::Ping
                | ResourceKind::Manifest
        )
    }

    /// Kinds that may be held open as long polls.
    pub fn is_long_poll_candidate(&self) -> bool {
        matches!(self, ResourceKind::Xhr | ResourceKind::Fetch)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Document => "Document",
            ResourceKind::Stylesheet => "Stylesheet",
            ResourceKind::Image => "Image",
            ResourceKind::Media => "Media",
            ResourceKind::Font => "Font",
            ResourceKind::Script => "Script",
            ResourceKind::TextTrack => "TextTrack",
            ResourceKind::Xhr => "XHR",
            ResourceKind::Fetch => "Fetch",
            ResourceKind::Prefetch => "Prefetch",
            ResourceKind::EventSource => "EventSource",
            ResourceKind::WebSocket => "WebSocket",
            ResourceKind::Manifest => "Manifest",
            ResourceKind::SignedExchange => "SignedExchange",
            ResourceKind::Ping => "Ping",
            ResourceKind::CspViolationReport => "CSPViolationReport",
            ResourceKind::Preflight => "Preflight",
            ResourceKind::Other => "Other",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subset of browser events load detection cares about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PageEvent {
    FrameNavigated {
        frame_id: FrameId,
        parent_id: Option<FrameId>,
        loader_id: LoaderId,
    },
    RequestWillBeSent {
        request_id: RequestId,
        loader_id: LoaderId,
        frame_id: Option<FrameId>,
        kind: ResourceKind,
        url: String,
    },
    LoadingFinished {
        request_id: RequestId,
    },
    LoadingFailed {
        request_id: RequestId,
        error_text: String,
    },
    Lifecycle {
        frame_id: FrameId,
        loader_id: LoaderId,
        name: String,
    },
}

impl PageEvent {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            PageEvent::FrameNavigated { .. } => "frameNavigated",
            PageEvent::RequestWillBeSent { .. } => "requestWillBeSent",
            PageEvent::LoadingFinished { .. } => "loadingFinished",
            PageEvent::LoadingFailed { .. } => "loadingFailed",
            PageEvent::Lifecycle { .. } => "lifecycleEvent",
        }
    }
}

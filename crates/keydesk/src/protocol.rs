use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum size of a JSON-lines frame on the Unix socket (64 KiB).
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Broadcast channel used for every signer/session notification.
pub const MAIN_ACTION_CHANNEL: &str = "main:action";

/// Status strings a backend reports before it can be offered to callers.
pub const NOT_READY_STATUSES: [&str; 2] = ["initial", "Invalid sequence"];

// ---------------------------------------------------------------------------
// Signers
// ---------------------------------------------------------------------------

/// Which family of signing backend a signer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerKind {
    Ledger,
    Trezor,
    Hot,
}

impl fmt::Display for SignerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerKind::Ledger => write!(f, "ledger"),
            SignerKind::Trezor => write!(f, "trezor"),
            SignerKind::Hot => write!(f, "hot"),
        }
    }
}

/// Snapshot of a signer as shown to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSummary {
    pub id: String,
    /// `None` only for the placeholder returned when no signer is selected.
    #[serde(rename = "type")]
    pub kind: Option<SignerKind>,
    pub status: String,
    pub accounts: Vec<String>,
    pub index: usize,
}

impl SignerSummary {
    /// Placeholder summary returned after the current signer is cleared.
    pub fn empty() -> Self {
        Self {
            id: String::new(),
            kind: None,
            status: String::new(),
            accounts: Vec::new(),
            index: 0,
        }
    }

    /// Whether this signer may be listed to callers.
    pub fn is_ready(&self) -> bool {
        !NOT_READY_STATUSES.contains(&self.status.as_str())
    }
}

/// Which panel the UI should show for the current signer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerView {
    #[default]
    Default,
}

// ---------------------------------------------------------------------------
// Sign requests
// ---------------------------------------------------------------------------

/// Lifecycle status of a sign request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Declined,
    Error,
    Success,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// A queued ask to sign something, correlated by `handler_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignRequest {
    pub handler_id: String,
    #[serde(default)]
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    /// Caller origin, e.g. the dapp URL that asked for the signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// What is being signed. Carried verbatim for observers.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl SignRequest {
    pub fn new(handler_id: impl Into<String>) -> Self {
        Self {
            handler_id: handler_id.into(),
            status: RequestStatus::Pending,
            notice: None,
            origin: None,
            account: None,
            payload: serde_json::Value::Null,
        }
    }
}

// ---------------------------------------------------------------------------
// Settings store vocabulary
// ---------------------------------------------------------------------------

/// Direction for cycling through secondary connection presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "->")]
    Next,
    #[serde(rename = "<-")]
    Previous,
}

/// Which connection a toggle applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionNode {
    Local,
    Secondary,
}

impl ConnectionNode {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionNode::Local => "local",
            ConnectionNode::Secondary => "secondary",
        }
    }
}

/// A per-origin permission grant request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub handler_id: String,
    pub account: String,
    pub origin: String,
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A request sent from the CLI (or any local caller) to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    // -- Signer selection --
    /// List every ready signer.
    ListSigners,
    /// Make a signer current.
    SelectSigner { id: String },
    /// Unset the current signer.
    ClearSigner,
    /// Change the selected account index of the current signer.
    SetAccountIndex { index: usize },
    /// Enter a PIN on a specific signer (it need not be current).
    SetPin { id: String, pin: String },
    /// Ask the current signer to show/verify its address.
    VerifyAddress {
        #[serde(default)]
        display: bool,
    },

    // -- Signing --
    GetAccounts,
    GetCoinbase,
    /// EIP-191 sign a message (hex `0x..` or UTF-8 text) with `address`.
    SignPersonal { message: String, address: String },
    /// Sign an unsigned transaction payload (hex).
    SignTransaction { raw_tx: String },

    // -- Request queue --
    AddRequest { request: SignRequest },
    RemoveRequest { handler_id: String },
    DeclineRequest { handler_id: String },
    SetRequestPending { handler_id: String },
    SetRequestError { handler_id: String, message: String },
    SetRequestSuccess { handler_id: String },
    /// List queued requests of the current signer.
    ListRequests,

    // -- Settings store --
    SelectNetwork { network: String },
    SelectSecondary { direction: Direction },
    SetSecondaryCustom { target: String },
    ToggleConnection { node: ConnectionNode },
    /// Merge provider-reported status into the local connection.
    SetLocal { status: serde_json::Value },
    /// Merge provider-reported status into the secondary connection.
    SetSecondary { status: serde_json::Value },
    SetLaunch { launch: bool },
    ToggleLaunch,
    ToggleReveal,
    GiveAccess { request: AccessRequest, access: bool },
    ToggleAccess { account: String, handler_id: String },
    ClearPermissions { account: String },
    SyncPath {
        path: String,
        value: serde_json::Value,
    },
    GetState {
        #[serde(default)]
        path: Option<String>,
    },

    // -- Daemon lifecycle --
    /// Shut down the daemon.
    Shutdown,
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// A response sent from the daemon to a connected client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Connection established.
    Hello { version: String },
    /// Request succeeded with optional data.
    Ok { data: Option<serde_json::Value> },
    /// Request failed.
    Error { code: String, message: String },
    /// Asynchronous broadcast.
    Event {
        channel: String,
        #[serde(flatten)]
        event: Event,
    },
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Broadcast notifications about signer and request state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// A signer became current.
    SetSigner { summary: SignerSummary },
    /// The current signer was unset.
    UnsetSigner { summary: SignerSummary },
    /// The UI should switch the signer panel to `view`.
    SetSignerView { view: SignerView },
    /// The UI should reveal itself because a request arrived.
    ShowTray,
    /// The request queue of a signer changed.
    SignerUpdated {
        id: String,
        requests: Vec<SignRequest>,
    },
    /// A signer was registered or removed.
    SignersChanged,
    /// The settings store changed at `path`.
    StateChanged { path: String },
}

/// An event tagged with the channel it was broadcast on.
#[derive(Debug, Clone, PartialEq)]
pub struct Broadcast {
    pub channel: String,
    pub event: Event,
}

// ---------------------------------------------------------------------------
// Data types returned in Ok.data
// ---------------------------------------------------------------------------

/// Result of a PIN entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinStatus {
    pub status: String,
}

impl PinStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Result of a message or transaction signing operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureResult {
    pub signature: String,
}

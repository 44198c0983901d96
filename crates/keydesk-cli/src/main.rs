use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use keydesk::client::{NodeClient, default_socket_path};
use keydesk::protocol::{AccessRequest, ConnectionNode, Direction, Request, SignRequest};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keydesk", about = "keydesk CLI")]
struct Cli {
    /// Path to the node daemon's Unix socket.
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Step {
    Next,
    Prev,
}

#[derive(Clone, Copy, ValueEnum)]
enum Node {
    Local,
    Secondary,
}

#[derive(Subcommand)]
enum Command {
    // -- Signers --
    /// List ready signers.
    Signers,
    /// Make a signer current.
    Select {
        /// Signer id (see `keydesk signers`).
        id: String,
    },
    /// Unset the current signer.
    Clear,
    /// Change the selected account of the current signer.
    SetIndex {
        index: usize,
    },
    /// Enter a PIN on a signer (prompts for the PIN).
    Pin {
        /// Signer id.
        id: String,
    },
    /// Ask the current signer to verify its address on-device.
    Verify {
        /// Show the address on the device screen.
        #[arg(long)]
        display: bool,
    },

    // -- Signing --
    /// List accounts of the current signer.
    Accounts,
    /// Show the selected account of the current signer.
    Coinbase,
    /// Sign a message (text, or hex with a 0x prefix).
    SignMessage {
        /// Address expected to sign; must be the selected account.
        address: String,
        message: String,
    },
    /// Sign an unsigned transaction payload (hex).
    SignTx {
        raw_tx: String,
    },

    // -- Request queue --
    /// List requests queued on the current signer.
    Requests,
    /// Queue a sign request on the current signer.
    Add {
        handler_id: String,
        /// Origin asking for the signature.
        #[arg(long)]
        origin: Option<String>,
        /// Target account.
        #[arg(long)]
        account: Option<String>,
        /// What is being signed, as JSON.
        #[arg(long)]
        payload: Option<String>,
    },
    /// Drop a request immediately.
    Remove {
        handler_id: String,
    },
    /// Decline a request.
    Decline {
        handler_id: String,
    },
    /// Mark a request as waiting on the signer.
    Pending {
        handler_id: String,
    },
    /// Mark a request as failed with the signer's error message.
    Fail {
        handler_id: String,
        message: String,
    },
    /// Mark a request as signed.
    Succeed {
        handler_id: String,
    },

    // -- Settings --
    /// Print settings, or the value at a dotted path.
    State {
        path: Option<String>,
    },
    /// Write a JSON value at a dotted path outside `main`.
    Set {
        path: String,
        value: String,
    },
    /// Switch networks.
    Network {
        name: String,
    },
    /// Cycle the secondary connection preset.
    Secondary {
        #[arg(value_enum)]
        step: Step,
    },
    /// Set the custom secondary connection target.
    Custom {
        target: String,
    },
    /// Turn a connection on or off.
    Toggle {
        #[arg(value_enum)]
        node: Node,
    },
    /// Set or toggle launch on login.
    Launch {
        /// Omit to toggle.
        on: Option<bool>,
    },
    /// Toggle revealing the window.
    Reveal,
    /// Grant (or with --deny, refuse) an origin access to an account.
    Grant {
        account: String,
        handler_id: String,
        origin: String,
        #[arg(long)]
        deny: bool,
    },
    /// Flip an existing grant.
    ToggleAccess {
        account: String,
        handler_id: String,
    },
    /// Forget every grant of an account.
    ClearPermissions {
        account: String,
    },

    // -- Daemon --
    /// Stream events from the daemon until interrupted.
    Watch,
    /// Stop the node daemon.
    Down,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let socket_path = cli.socket.unwrap_or_else(default_socket_path);

    match cli.command {
        Command::Watch => cmd_watch(&socket_path).await,
        Command::Down => {
            let mut client = connect(&socket_path).await?;
            client.request(Request::Shutdown).await?;
            println!("Node stopped.");
            Ok(())
        }
        command => {
            let req = to_request(command)?;
            let mut client = connect(&socket_path).await?;
            let data = client.request(req).await?;
            print_json(&data);
            Ok(())
        }
    }
}

fn to_request(command: Command) -> Result<Request> {
    let req = match command {
        Command::Signers => Request::ListSigners,
        Command::Select { id } => Request::SelectSigner { id },
        Command::Clear => Request::ClearSigner,
        Command::SetIndex { index } => Request::SetAccountIndex { index },
        Command::Pin { id } => {
            let pin = rpassword::prompt_password(format!("Enter PIN for {id}: "))
                .context("failed to read PIN")?;
            Request::SetPin {
                id,
                pin: pin.trim().to_string(),
            }
        }
        Command::Verify { display } => Request::VerifyAddress { display },

        Command::Accounts => Request::GetAccounts,
        Command::Coinbase => Request::GetCoinbase,
        Command::SignMessage { address, message } => Request::SignPersonal { message, address },
        Command::SignTx { raw_tx } => Request::SignTransaction { raw_tx },

        Command::Requests => Request::ListRequests,
        Command::Add {
            handler_id,
            origin,
            account,
            payload,
        } => {
            let mut request = SignRequest::new(handler_id);
            request.origin = origin;
            request.account = account;
            if let Some(payload) = payload {
                request.payload =
                    serde_json::from_str(&payload).context("invalid JSON payload")?;
            }
            Request::AddRequest { request }
        }
        Command::Remove { handler_id } => Request::RemoveRequest { handler_id },
        Command::Decline { handler_id } => Request::DeclineRequest { handler_id },
        Command::Pending { handler_id } => Request::SetRequestPending { handler_id },
        Command::Fail {
            handler_id,
            message,
        } => Request::SetRequestError {
            handler_id,
            message,
        },
        Command::Succeed { handler_id } => Request::SetRequestSuccess { handler_id },

        Command::State { path } => Request::GetState { path },
        Command::Set { path, value } => Request::SyncPath {
            path,
            value: serde_json::from_str(&value).context("value must be JSON")?,
        },
        Command::Network { name } => Request::SelectNetwork { network: name },
        Command::Secondary { step } => Request::SelectSecondary {
            direction: match step {
                Step::Next => Direction::Next,
                Step::Prev => Direction::Previous,
            },
        },
        Command::Custom { target } => Request::SetSecondaryCustom { target },
        Command::Toggle { node } => Request::ToggleConnection {
            node: match node {
                Node::Local => ConnectionNode::Local,
                Node::Secondary => ConnectionNode::Secondary,
            },
        },
        Command::Launch { on: Some(launch) } => Request::SetLaunch { launch },
        Command::Launch { on: None } => Request::ToggleLaunch,
        Command::Reveal => Request::ToggleReveal,
        Command::Grant {
            account,
            handler_id,
            origin,
            deny,
        } => Request::GiveAccess {
            request: AccessRequest {
                handler_id,
                account,
                origin,
            },
            access: !deny,
        },
        Command::ToggleAccess {
            account,
            handler_id,
        } => Request::ToggleAccess {
            account,
            handler_id,
        },
        Command::ClearPermissions { account } => Request::ClearPermissions { account },

        Command::Watch => anyhow::bail!("watch streams events, it is not a request"),
        Command::Down => Request::Shutdown,
    };
    Ok(req)
}

async fn cmd_watch(socket_path: &std::path::Path) -> Result<()> {
    let mut client = connect(socket_path).await?;
    eprintln!("Connected to keydesk-node {}. Waiting for events...", client.version());
    loop {
        tokio::select! {
            event = client.next_event() => {
                let b = event?;
                let event = serde_json::to_value(&b.event)?;
                println!("{} {}", b.channel, serde_json::to_string(&event)?);
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

async fn connect(socket_path: &std::path::Path) -> Result<NodeClient> {
    NodeClient::connect(socket_path).await.with_context(|| {
        format!(
            "failed to connect to node at {}. Is the daemon running? Try: keydesk-node",
            socket_path.display()
        )
    })
}

fn print_json(data: &Option<serde_json::Value>) {
    if let Some(v) = data {
        match serde_json::to_string_pretty(v) {
            Ok(text) => println!("{text}"),
            Err(_) => println!("{v}"),
        }
    }
}

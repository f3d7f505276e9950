//! Command-line surface, matching the external interface table one flag
//! at a time: `-s`/`--lonion` (local onion-id), `-n`/`--nickname`,
//! `-l`/`--lport` (local listening port), `-d`/`--ronion` (remote
//! onion-id to dial on startup), `-r`/`--rport` (remote port).
//! `-h`/`--help` is generated for free by `clap`.

use clap::Parser;

use crate::constants::DEFAULT_PORT;
use crate::error::EngineError;
use crate::identity::{Identity, is_valid_nickname, is_valid_onion_id, is_valid_port};

#[derive(Debug, Parser)]
#[command(name = "dchat", about = "Serverless peer-to-peer terminal chat")]
pub struct Cli {
    /// This node's own onion-id.
    #[arg(short = 's', long = "lonion")]
    pub lonion: String,

    /// Nickname shown to peers.
    #[arg(short = 'n', long = "nickname")]
    pub nickname: String,

    /// Local port to listen on.
    #[arg(short = 'l', long = "lport", default_value_t = DEFAULT_PORT)]
    pub lport: u16,

    /// Onion-id of a peer to dial on startup. Omit to wait for inbound
    /// connections only.
    #[arg(short = 'd', long = "ronion", requires = "rport")]
    pub ronion: Option<String>,

    /// Port of the peer named by `--ronion`.
    #[arg(short = 'r', long = "rport", requires = "ronion")]
    pub rport: Option<u16>,
}

/// A validated, engine-ready configuration derived from [`Cli`].
#[derive(Debug, Clone)]
pub struct Config {
    pub identity: Identity,
    pub nickname: String,
    pub initial_peer: Option<Identity>,
}

impl Cli {
    /// Validates the parsed arguments against the identity formats,
    /// turning a bad flag into `EngineError::Configuration` rather than a
    /// panic.
    pub fn into_config(self) -> Result<Config, EngineError> {
        if !is_valid_onion_id(&self.lonion) {
            return Err(EngineError::Configuration(format!(
                "--lonion '{}' is not a valid onion-id",
                self.lonion
            )));
        }
        if !is_valid_nickname(&self.nickname) {
            return Err(EngineError::Configuration(format!(
                "--nickname '{}' is invalid",
                self.nickname
            )));
        }
        if !is_valid_port(self.lport) {
            return Err(EngineError::Configuration(format!(
                "--lport {} is invalid",
                self.lport
            )));
        }

        let initial_peer = match (self.ronion, self.rport) {
            (Some(onion_id), Some(port)) => {
                if !is_valid_onion_id(&onion_id) {
                    return Err(EngineError::Configuration(format!(
                        "--ronion '{onion_id}' is not a valid onion-id"
                    )));
                }
                if !is_valid_port(port) {
                    return Err(EngineError::Configuration(format!(
                        "--rport {port} is invalid"
                    )));
                }
                Some(Identity::new(onion_id, port))
            }
            (None, None) => None,
            // `requires` on both flags makes this unreachable via the CLI
            // parser itself, but `Config` may also be built directly by
            // callers (e.g. tests) that skip `clap`.
            _ => {
                return Err(EngineError::Configuration(
                    "--ronion and --rport must be given together".to_string(),
                ));
            }
        };

        Ok(Config {
            identity: Identity::new(self.lonion, self.lport),
            nickname: self.nickname,
            initial_peer,
        })
    }
}

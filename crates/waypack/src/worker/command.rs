//! Commands accepted by the content worker.
//!
//! The wire shape is a tagged JSON object (`{"type": "DOWNLOAD", ...}`)
//! so commands can cross a process boundary unchanged; inside the
//! process they travel over an mpsc channel as [`WorkerMessage`].

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::EngineResult;

/// A command for the content worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum WorkerCommand {
    /// Fetch a pack fresh from the network and store it for offline use.
    #[serde(rename = "DOWNLOAD")]
    Download {
        id: String,
        /// Optional asset URLs to prefetch alongside the pack data.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assets: Option<Vec<String>>,
    },
    /// Drop a pack's stored data. Idempotent.
    #[serde(rename = "REMOVE")]
    Remove { id: String },
    /// Promote a staged shell version immediately.
    #[serde(rename = "ACTIVATE_UPDATE")]
    ActivateUpdate,
}

/// Channel envelope around a command. `reply` is present when the
/// issuer wants the outcome; fire-and-forget notifications leave it
/// empty.
#[derive(Debug)]
pub struct WorkerMessage {
    pub command: WorkerCommand,
    pub reply: Option<oneshot::Sender<EngineResult<()>>>,
}

impl WorkerMessage {
    pub fn notify(command: WorkerCommand) -> Self {
        Self {
            command,
            reply: None,
        }
    }

    pub fn request(command: WorkerCommand) -> (Self, oneshot::Receiver<EngineResult<()>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                command,
                reply: Some(tx),
            },
            rx,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_round_trips_through_json() {
        let command = WorkerCommand::Download {
            id: "tokyo".to_string(),
            assets: Some(vec!["/images/tokyo-hero.jpg".to_string()]),
        };

        let json = serde_json::to_string(&command).unwrap();
        assert!(json.contains("\"type\":\"DOWNLOAD\""));
        let parsed: WorkerCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, command);
    }

    #[test]
    fn download_without_assets_omits_the_field() {
        let command = WorkerCommand::Download {
            id: "paris".to_string(),
            assets: None,
        };

        let json = serde_json::to_string(&command).unwrap();
        assert!(!json.contains("assets"));
    }

    #[test]
    fn parses_commands_from_the_documented_shapes() {
        let download: WorkerCommand =
            serde_json::from_str(r#"{"type":"DOWNLOAD","id":"tokyo"}"#).unwrap();
        assert_eq!(
            download,
            WorkerCommand::Download {
                id: "tokyo".to_string(),
                assets: None,
            }
        );

        let remove: WorkerCommand =
            serde_json::from_str(r#"{"type":"REMOVE","id":"tokyo"}"#).unwrap();
        assert_eq!(
            remove,
            WorkerCommand::Remove {
                id: "tokyo".to_string(),
            }
        );

        let activate: WorkerCommand =
            serde_json::from_str(r#"{"type":"ACTIVATE_UPDATE"}"#).unwrap();
        assert_eq!(activate, WorkerCommand::ActivateUpdate);
    }

    #[test]
    fn unknown_command_types_are_rejected() {
        let result = serde_json::from_str::<WorkerCommand>(r#"{"type":"SELF_DESTRUCT"}"#);
        assert!(result.is_err());
    }
}

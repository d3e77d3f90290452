//! CLI channel adapter for interactive terminal sessions.
//!
//! Provides a simple stdin/stdout based channel for local testing and
//! development. Lines are text messages; `/image <path>` sends a file from
//! disk as an image message.

use crate::handler::PluginHandler;
use crate::message::{InboundMessage, Reply};
use gemimg_common::Result;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};

/// CLI channel - stdin/stdout, always available, zero deps.
pub struct CliChannel {
    handler: Arc<PluginHandler>,
    user_id: String,
}

impl CliChannel {
    pub fn new(handler: Arc<PluginHandler>) -> Self {
        Self {
            handler,
            user_id: "cli-user".to_string(),
        }
    }

    /// Read lines until EOF or `/quit`, dispatching each to the handler.
    pub async fn run(&self) -> Result<()> {
        let stdin = io::stdin();
        let reader = BufReader::new(stdin);
        let mut lines = reader.lines();

        println!("gemimg interactive mode. /image <path> sends an image, /quit exits.");
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if line == "/quit" || line == "/exit" {
                break;
            }

            let message = match line.strip_prefix("/image ") {
                Some(path) => match std::fs::read(path.trim()) {
                    Ok(bytes) => InboundMessage::image(&self.user_id, bytes),
                    Err(e) => {
                        println!("[cannot read {path}: {e}]");
                        continue;
                    }
                },
                None => InboundMessage::text(&self.user_id, line),
            };

            match self.handler.handle(message).await {
                Some(replies) => {
                    for reply in replies {
                        print_reply(&reply);
                    }
                }
                None => println!("[not handled]"),
            }
        }
        Ok(())
    }
}

fn print_reply(reply: &Reply) {
    match reply {
        Reply::Text { text } => println!("{text}"),
        Reply::Image { bytes } => println!("[Image: {} bytes]", bytes.len()),
    }
}

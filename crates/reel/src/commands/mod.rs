//! Command handlers.

pub mod config_cmd;
pub mod send;
pub mod watch;

use std::sync::Arc;

use reel_core::{ResponseMessage, ResponseStatus, Subscription, Transport, Unsubscribe, WsClient};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;

/// A live connection for the duration of one command.
pub struct Session {
    client: WsClient,
    cancel: CancellationToken,
    pub url: String,
    pub format: OutputFormat,
}

impl Session {
    /// Resolve configuration and start connecting in the background.
    pub fn open(global: &GlobalOpts) -> Result<Self, CliError> {
        let cfg = reel_config::load_config_or_default();
        let client_config = config::resolve_client_config(global, &cfg)?;
        let format = config::output_format(global, &cfg);

        let cancel = CancellationToken::new();
        let client = client_config.connect(cancel.clone())?;

        Ok(Self {
            client,
            cancel,
            url: client_config.url.to_string(),
            format,
        })
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::new(self.client.clone())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Forward every channel of `sub` into `tx`, errors as `error` messages.
pub fn relay_all(
    sub: &Subscription<Value>,
    tx: &mpsc::UnboundedSender<ResponseMessage>,
) -> Vec<Unsubscribe> {
    let message_type = sub.message_type().clone();
    let errors = tx.clone();

    vec![
        sub.on_snapshot(relay(tx)),
        sub.on_update(relay(tx)),
        sub.on_success(relay(tx)),
        sub.on_error(move |text| {
            let _ = errors.send(ResponseMessage {
                message_type: message_type.clone(),
                status: ResponseStatus::Error,
                data: None,
                error: Some(text.to_owned()),
            });
        }),
    ]
}

fn relay(
    tx: &mpsc::UnboundedSender<ResponseMessage>,
) -> impl Fn(&ResponseMessage) + Send + Sync + 'static {
    let tx = tx.clone();
    move |message: &ResponseMessage| {
        let _ = tx.send(message.clone());
    }
}

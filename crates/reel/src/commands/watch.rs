//! `reel watch`: stream one message type until interrupted.

use reel_core::{ConnectionState, Subscription, SubscriptionOptions};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::{Session, relay_all};

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let session = Session::open(global)?;

    let options = SubscriptionOptions {
        immediate: true,
        retry_on_reconnect: !args.no_retry,
        once: args.once,
    };
    let sub: Subscription<Value> =
        Subscription::new(session.transport(), args.message_type.as_str(), options);

    let (tx, mut messages) = mpsc::unbounded_channel();
    let _handlers = relay_all(&sub, &tx);
    drop(tx);

    let (state_tx, mut states) = mpsc::unbounded_channel();
    let _state = sub.on_state_change(move |state, prev| {
        let _ = state_tx.send((state, prev));
    });

    tracing::info!(message_type = %sub.message_type(), url = %session.url, "watching");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            message = messages.recv() => {
                let Some(message) = message else { break };
                output::print_output(
                    &output::render_message(session.format, &message),
                    global.quiet,
                );
                if args.once {
                    break;
                }
            }
            Some((state, prev)) = states.recv() => {
                tracing::info!(%state, prev = ?prev, "connection state changed");
                if state == ConnectionState::Failed {
                    return Err(CliError::ConnectionFailed {
                        url: session.url.clone(),
                        reason: "the server refused the connection or retries ran out".into(),
                    });
                }
            }
        }
    }

    sub.close();
    Ok(())
}

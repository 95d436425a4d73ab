//! `reel send`: one request, one reply.

use std::time::Duration;

use reel_core::{ResponseStatus, Subscription, SubscriptionOptions};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::cli::{GlobalOpts, SendArgs};
use crate::error::CliError;
use crate::output;

use super::{Session, relay_all};

/// Parse a request body; it must be a JSON object.
pub fn parse_body(raw: &str) -> Result<Value, CliError> {
    let body: Value = serde_json::from_str(raw)?;
    if !body.is_object() {
        return Err(CliError::Validation {
            field: "body".into(),
            reason: "expected a JSON object".into(),
        });
    }
    Ok(body)
}

pub async fn handle(args: SendArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let body = parse_body(&args.body)?;
    let session = Session::open(global)?;

    // Bind before sending so the reply cannot slip past.
    let sub: Subscription<Value> = Subscription::new(
        session.transport(),
        args.message_type.as_str(),
        SubscriptionOptions::default().immediate().once(),
    );
    let (tx, mut replies) = mpsc::unbounded_channel();
    let _handlers = relay_all(&sub, &tx);
    drop(tx);

    sub.send(&body)?;
    tracing::debug!(message_type = %sub.message_type(), "request queued");

    let reply = tokio::time::timeout(Duration::from_secs(args.timeout), replies.recv())
        .await
        .map_err(|_| CliError::Timeout {
            seconds: args.timeout,
        })?
        .ok_or_else(|| CliError::ConnectionFailed {
            url: session.url.clone(),
            reason: "the subscription ended before a reply arrived".into(),
        })?;

    output::print_output(&output::render_message(session.format, &reply), global.quiet);

    if reply.status == ResponseStatus::Error {
        return Err(CliError::Rejected {
            message: reply.error_description().to_owned(),
        });
    }
    Ok(())
}

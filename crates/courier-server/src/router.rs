use chrono::Utc;
use courier_core::sanitize;
use courier_core::{ConnId, RelayError, ServerFrame};

use crate::client::ClientHub;
use crate::registry::SessionRegistry;

/// Route one directed message: resolve the sender's identity, validate and
/// sanitize the payload, resolve the recipient, then deliver the identical
/// frame to recipient and sender (echo) so both observe the same record.
///
/// Any `Err` means nothing was delivered to anyone. The one asymmetric case
/// is a recipient that disconnects between resolution and delivery: its copy
/// is dropped (logged, not an error) and the sender still gets the echo —
/// there is no retry.
pub fn route(
    hub: &ClientHub,
    registry: &SessionRegistry,
    sender: &ConnId,
    to: Option<&str>,
    text: Option<&str>,
) -> Result<(), RelayError> {
    let from = registry
        .identity_of(sender)
        .ok_or(RelayError::SenderUnidentified)?;
    let (to, text) = sanitize::validate_message(to, text)?;
    let recipient_conn = registry
        .resolve(&to)
        .ok_or(RelayError::RecipientNotFound)?;

    let frame = ServerFrame::PrivateMessage {
        text: sanitize::sanitize(&text),
        timestamp: Utc::now().to_rfc3339(),
        from: from.clone(),
        to: to.clone(),
    };

    if !hub.send_to(&recipient_conn, &frame) {
        tracing::warn!(
            conn_id = %recipient_conn,
            username = %to,
            "Recipient vanished before delivery, frame dropped"
        );
    }
    hub.send_to(sender, &frame);

    tracing::debug!(username = %from, to = %to, "Message routed");
    Ok(())
}

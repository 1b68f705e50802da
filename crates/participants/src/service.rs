use std::sync::Arc;

use async_trait::async_trait;
use domain::{Command, Reply};
use messaging::{ConsumedMessage, MessageBus, MessageHandler};

use crate::error::ParticipantError;

/// A participant's local business logic: given a command, produce a
/// reply. Returning `Err` means an infrastructure failure occurred
/// (e.g. the database is unreachable) — the command must NOT be
/// acknowledged so the bus redelivers it. A business failure (unknown
/// command, validation failure) is represented as `Ok(Reply::failure(..))`,
/// which IS acknowledged.
#[async_trait]
pub trait ParticipantService: Send + Sync {
    async fn handle(&self, command: Command) -> Result<Reply, ParticipantError>;
}

/// Wires a [`ParticipantService`] to a command topic and reply topic
/// over a [`MessageBus`], following the participant contract: consume
/// the command topic as a dedicated consumer group, execute the local
/// transaction, publish the reply keyed by saga id, and acknowledge
/// only after the reply was durably published.
pub async fn serve<B, S>(
    bus: Arc<B>,
    service: Arc<S>,
    command_topic: &str,
    reply_topic: &str,
    group: &str,
) -> messaging::Result<()>
where
    B: MessageBus + 'static,
    S: ParticipantService + 'static,
{
    let reply_topic = reply_topic.to_string();
    let handler: MessageHandler = {
        let bus = bus.clone();
        let service = service.clone();
        Arc::new(move |message: ConsumedMessage| {
            let bus = bus.clone();
            let service = service.clone();
            let reply_topic = reply_topic.clone();
            Box::pin(async move {
                let command: Command = match serde_json::from_slice(&message.payload) {
                    Ok(command) => command,
                    Err(err) => {
                        tracing::warn!(error = %err, "malformed command, discarding");
                        return true;
                    }
                };

                let saga_id = command.saga_id;
                let reply = match service.handle(command).await {
                    Ok(reply) => reply,
                    Err(err) => {
                        tracing::error!(error = %err, %saga_id, "infrastructure failure handling command");
                        return false;
                    }
                };

                let bytes = match serde_json::to_vec(&reply) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        tracing::error!(error = %err, "failed to encode reply");
                        return false;
                    }
                };

                match bus.publish(&reply_topic, &saga_id.to_string(), &bytes).await {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::error!(error = %err, "failed to publish reply, leaving command unacknowledged");
                        false
                    }
                }
            })
        })
    };

    bus.consume(&[command_topic], group, handler).await
}

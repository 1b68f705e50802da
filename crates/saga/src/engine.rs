//! The orchestrator engine: the three public entry points described in
//! the saga's component design — ingress, reply, and compensation.
//!
//! The engine itself holds no saga state in memory. Every call resolves
//! the saga's current state from the event log before deciding what to
//! do, so a crash between "append" and "acknowledge" is always safe to
//! replay.

use std::collections::HashMap;
use std::sync::Arc;

use common::{OrderId, SagaId};
use domain::{Command, CommandType, OrderPayload, OutcomeStatus, Reply, SagaEvent, Step, TerminalOutcome, ORDER_FULFILLMENT};
use event_store::{EventLogStore, SagaEventRecord, SagaState};
use messaging::MessageBus;

use crate::aggregate::SagaInstance;
use crate::error::{Result, SagaError};
use crate::state_machine::{self, Action};

/// Coordinates saga progression over an event log and a message bus.
pub struct Orchestrator<E, M> {
    event_log: Arc<E>,
    bus: Arc<M>,
    ingress_topic: String,
    outcome_topic: String,
}

impl<E, M> Orchestrator<E, M>
where
    E: EventLogStore,
    M: MessageBus,
{
    pub fn new(
        event_log: Arc<E>,
        bus: Arc<M>,
        ingress_topic: impl Into<String>,
        outcome_topic: impl Into<String>,
    ) -> Self {
        Self {
            event_log,
            bus,
            ingress_topic: ingress_topic.into(),
            outcome_topic: outcome_topic.into(),
        }
    }

    pub fn ingress_topic(&self) -> &str {
        &self.ingress_topic
    }

    /// Handles a new order payload arriving on the ingress topic.
    ///
    /// Generates a saga id, ensures `order_id` is present, appends the
    /// PENDING event, and issues the first forward command.
    #[tracing::instrument(skip(self, raw_payload))]
    pub async fn handle_ingress(&self, raw_payload: &[u8]) -> Result<SagaId> {
        let value: serde_json::Value = serde_json::from_slice(raw_payload)
            .map_err(|err| SagaError::MalformedIngress(err.to_string()))?;

        let mut payload = OrderPayload::from_json(&value).map_err(SagaError::Domain)?;
        let order_id = match payload.order_id.take() {
            Some(id) => id
                .parse::<uuid::Uuid>()
                .map(OrderId::from_uuid)
                .unwrap_or_else(|_| OrderId::new()),
            None => OrderId::new(),
        };

        let saga_id = SagaId::new();
        let mut context = payload.into_context();
        context.insert("order_id".to_string(), serde_json::json!(order_id));

        self.event_log
            .append(SagaEventRecord::new(
                saga_id,
                order_id,
                SagaState::Pending,
                serde_json::to_value(SagaEvent::started(saga_id, order_id, context.clone()))?,
                None,
            ))
            .await?;

        let first = ORDER_FULFILLMENT.first();
        self.publish_command(first.command_topic, saga_id, order_id, first.forward_command, context)
            .await?;

        metrics::counter!("sagas_started_total").increment(1);
        Ok(saga_id)
    }

    /// Handles a reply arriving on `reply_topic`.
    ///
    /// Malformed payloads are logged and discarded (acknowledged) per
    /// the error handling contract; unknown saga ids are likewise
    /// acknowledged and dropped with a warning.
    #[tracing::instrument(skip(self, raw_payload), fields(reply_topic))]
    pub async fn handle_reply(&self, reply_topic: &str, raw_payload: &[u8]) -> Result<()> {
        let reply: Reply = match serde_json::from_slice(raw_payload) {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(topic = reply_topic, error = %err, "malformed reply, discarding");
                return Ok(());
            }
        };

        let records = self.event_log.history(reply.saga_id).await?;
        if records.is_empty() {
            tracing::warn!(saga_id = %reply.saga_id, "reply for unknown saga, discarding");
            return Ok(());
        }
        let instance = SagaInstance::from_records(&records)?;

        let order_id = instance
            .order_id
            .ok_or_else(|| SagaError::MalformedIngress("saga instance missing order_id".to_string()))?;
        let data = serde_json::to_value(&instance.context)?;

        let action = state_machine::next_action(
            instance.state,
            reply_topic,
            reply.success,
            reply.data.clone(),
            reply.message.clone(),
        );

        match action {
            Action::Ignore => {
                tracing::debug!(saga_id = %reply.saga_id, "reply ignored: stale or duplicate");
                Ok(())
            }
            Action::Advance {
                completed_command,
                next_state,
                command,
                command_topic,
                context,
            } => {
                self.advance(
                    reply.saga_id,
                    order_id,
                    completed_command,
                    next_state,
                    command,
                    command_topic,
                    data,
                    context,
                )
                .await
            }
            Action::Complete {
                completed_command,
                completed_state,
                context,
            } => {
                self.complete(reply.saga_id, order_id, completed_command, completed_state, data, context)
                    .await
            }
            Action::Compensate { completed, reason } => {
                self.dispatch_compensation(reply.saga_id, order_id, data, completed, reason)
                    .await
            }
        }
    }

    async fn advance(
        &self,
        saga_id: SagaId,
        order_id: OrderId,
        completed_command: CommandType,
        next_state: SagaState,
        command: CommandType,
        command_topic: &'static str,
        mut merged_context: serde_json::Value,
        new_data: HashMap<String, serde_json::Value>,
    ) -> Result<()> {
        merge_context(&mut merged_context, &new_data);
        let context_map = context_as_map(&merged_context)?;

        self.event_log
            .append(SagaEventRecord::new(
                saga_id,
                order_id,
                next_state,
                serde_json::to_value(SagaEvent::step_completed(completed_command, context_map.clone()))?,
                None,
            ))
            .await?;

        self.publish_command(command_topic, saga_id, order_id, command, context_map)
            .await?;
        Ok(())
    }

    async fn complete(
        &self,
        saga_id: SagaId,
        order_id: OrderId,
        completed_command: CommandType,
        completed_state: SagaState,
        mut merged_context: serde_json::Value,
        new_data: HashMap<String, serde_json::Value>,
    ) -> Result<()> {
        merge_context(&mut merged_context, &new_data);
        let context_map = context_as_map(&merged_context)?;

        self.event_log
            .append(SagaEventRecord::new(
                saga_id,
                order_id,
                completed_state,
                serde_json::to_value(SagaEvent::step_completed(completed_command, context_map.clone()))?,
                None,
            ))
            .await?;

        self.event_log
            .append(SagaEventRecord::new(
                saga_id,
                order_id,
                SagaState::Completed,
                serde_json::to_value(SagaEvent::completed(context_map.clone()))?,
                None,
            ))
            .await?;

        let outcome = TerminalOutcome {
            saga_id,
            order_id,
            status: OutcomeStatus::Completed,
            timestamp: chrono::Utc::now(),
            data: context_map,
        };
        self.publish_outcome(saga_id, &outcome).await?;
        metrics::counter!("sagas_completed_total").increment(1);
        Ok(())
    }

    /// Compensation dispatcher: emits compensation commands in reverse
    /// order of the forward steps already completed, then marks the
    /// saga FAILED without waiting for compensation replies to land.
    #[tracing::instrument(skip(self, merged_context))]
    async fn dispatch_compensation(
        &self,
        saga_id: SagaId,
        order_id: OrderId,
        merged_context: serde_json::Value,
        completed: Vec<&'static Step>,
        reason: String,
    ) -> Result<()> {
        self.event_log
            .append(SagaEventRecord::new(
                saga_id,
                order_id,
                SagaState::Compensating,
                serde_json::to_value(SagaEvent::compensation_started(reason.clone()))?,
                Some(reason.clone()),
            ))
            .await?;

        let context_map = context_as_map(&merged_context)?;
        for step in completed.iter().rev() {
            self.publish_command(
                step.compensation_topic,
                saga_id,
                order_id,
                step.compensation_command,
                context_map.clone(),
            )
            .await?;

            self.event_log
                .append(SagaEventRecord::new(
                    saga_id,
                    order_id,
                    SagaState::Compensating,
                    serde_json::to_value(SagaEvent::compensation_step_completed(
                        step.compensation_command,
                    ))?,
                    None,
                ))
                .await?;
        }

        self.event_log
            .append(SagaEventRecord::new(
                saga_id,
                order_id,
                SagaState::Failed,
                serde_json::to_value(SagaEvent::failed(reason.clone()))?,
                Some(reason),
            ))
            .await?;

        let outcome = TerminalOutcome {
            saga_id,
            order_id,
            status: OutcomeStatus::Failed,
            timestamp: chrono::Utc::now(),
            data: context_map,
        };
        self.publish_outcome(saga_id, &outcome).await?;
        metrics::counter!("sagas_failed_total").increment(1);
        Ok(())
    }

    async fn publish_command(
        &self,
        topic: &str,
        saga_id: SagaId,
        order_id: OrderId,
        command_type: CommandType,
        payload: HashMap<String, serde_json::Value>,
    ) -> Result<()> {
        let command = Command::new(saga_id, order_id, command_type, payload);
        let bytes = serde_json::to_vec(&command)?;
        self.bus.publish(topic, &saga_id.to_string(), &bytes).await?;
        Ok(())
    }

    async fn publish_outcome(&self, saga_id: SagaId, outcome: &TerminalOutcome) -> Result<()> {
        let bytes = serde_json::to_vec(outcome)?;
        self.bus
            .publish(&self.outcome_topic, &saga_id.to_string(), &bytes)
            .await?;
        Ok(())
    }
}

fn merge_context(base: &mut serde_json::Value, updates: &HashMap<String, serde_json::Value>) {
    if !base.is_object() {
        *base = serde_json::json!({});
    }
    let object = base.as_object_mut().expect("base coerced to object above");
    for (key, value) in updates {
        object.insert(key.clone(), value.clone());
    }
}

fn context_as_map(value: &serde_json::Value) -> Result<HashMap<String, serde_json::Value>> {
    serde_json::from_value(value.clone()).map_err(SagaError::Serialization)
}

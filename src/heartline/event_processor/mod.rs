use std::sync::Arc;

use tokio::sync::mpsc::Receiver;

use crate::heartline::Heartline;
use crate::heartline::error::{HeartlineError, Result};
use crate::types::ChangeEvent;

mod event_handlers;

impl Heartline {
    /// Start the event processing loop in a background task
    pub(crate) fn start_event_processing_loop(
        self: Arc<Self>,
        receiver: Receiver<ChangeEvent>,
        shutdown_receiver: Receiver<()>,
    ) {
        tokio::spawn(async move {
            self.process_events(receiver, shutdown_receiver).await;
        });
    }

    /// Shutdown event processing gracefully
    pub async fn shutdown_event_processing(&self) -> Result<()> {
        match self.shutdown_sender.send(()).await {
            Ok(_) => Ok(()),
            Err(_) => Ok(()), // Expected if processor already shut down
        }
    }

    /// Queue a change event for asynchronous processing.
    pub async fn queue_event(&self, event: ChangeEvent) -> Result<()> {
        self.event_sender
            .send(event)
            .await
            .map_err(|_| HeartlineError::EventQueueClosed)
    }

    /// Main event processing loop
    async fn process_events(&self, mut receiver: Receiver<ChangeEvent>, mut shutdown: Receiver<()>) {
        tracing::debug!(
            target: "heartline::event_processor::process_events",
            "Starting event processing loop"
        );

        let mut shutting_down = false;

        loop {
            tokio::select! {
                Some(event) = receiver.recv() => {
                    tracing::debug!(
                        target: "heartline::event_processor::process_events",
                        "Received event for processing"
                    );

                    // Handler errors never stop the loop; the triggering write
                    // already succeeded and the trigger source redelivers.
                    match event {
                        ChangeEvent::MessageCreated { chat_id, message_id, message } => {
                            if let Err(e) = self
                                .on_chat_message_created(&chat_id, &message_id, &message)
                                .await
                            {
                                tracing::error!(
                                    target: "heartline::event_processor::process_events",
                                    "Error processing new message in chat {}: {}",
                                    chat_id,
                                    e
                                );
                            }
                        }
                        ChangeEvent::ProfileUpdated { user_id, before, after } => {
                            if let Err(e) = self
                                .on_member_profile_updated(&user_id, &before, &after)
                                .await
                            {
                                tracing::error!(
                                    target: "heartline::event_processor::process_events",
                                    "Error processing profile update for {}: {}",
                                    user_id,
                                    e
                                );
                            }
                        }
                    }
                }
                Some(_) = shutdown.recv(), if !shutting_down => {
                    tracing::info!(
                        target: "heartline::event_processor::process_events",
                        "Received shutdown signal, finishing current queue..."
                    );
                    shutting_down = true;
                    // Continue processing remaining events in queue, but don't wait for new shutdown signals
                }
                else => {
                    if shutting_down {
                        tracing::debug!(
                            target: "heartline::event_processor::process_events",
                            "Queue flushed, shutting down event processor"
                        );
                    } else {
                        tracing::debug!(
                            target: "heartline::event_processor::process_events",
                            "All channels closed, exiting event processing loop"
                        );
                    }
                    break;
                }
            }
        }
    }
}

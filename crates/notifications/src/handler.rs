use std::sync::Arc;

use async_trait::async_trait;

use messaging::{
    HandlerError, Message, MessageHandler, NOTIFICATION_QUEUE, NotificationRequest, SEND_EMAIL,
};

use crate::log::DeliveryLog;
use crate::{NotificationDispatcher, NotificationError};

/// Dispatches `send_email` messages from the notification queue.
///
/// A failed send is acknowledged like a successful one: the delivery log
/// keeps the failure and a later redelivery of the same token retries it.
pub struct NotificationHandler<L: DeliveryLog + ?Sized> {
    dispatcher: Arc<NotificationDispatcher<L>>,
}

impl<L: DeliveryLog + ?Sized> NotificationHandler<L> {
    pub fn new(dispatcher: Arc<NotificationDispatcher<L>>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl<L: DeliveryLog + ?Sized + 'static> MessageHandler for NotificationHandler<L> {
    fn queue(&self) -> &'static str {
        NOTIFICATION_QUEUE
    }

    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        if message.kind != SEND_EMAIL {
            return Err(HandlerError::Permanent(format!(
                "unexpected message kind {}",
                message.kind
            )));
        }
        let request: NotificationRequest = message
            .decode()
            .map_err(|e| HandlerError::Permanent(format!("malformed notification: {e}")))?;

        match self.dispatcher.dispatch(&request).await {
            Ok(_) => Ok(()),
            Err(NotificationError::Store(e)) if e.is_transient() => {
                Err(HandlerError::Transient(e.to_string()))
            }
            Err(e) => Err(HandlerError::Permanent(e.to_string())),
        }
    }
}

use std::sync::Arc;

use async_trait::async_trait;

use messaging::{
    HandlerError, InventoryDecrement, Message, MessageHandler, PRODUCT_STOCK_QUEUE, UPDATE_STOCK,
};

use crate::store::StockStore;
use crate::{InventoryError, InventoryLedger};

/// Applies `update_stock` messages from the product stock queue.
pub struct StockUpdateHandler<S: StockStore + ?Sized> {
    ledger: Arc<InventoryLedger<S>>,
}

impl<S: StockStore + ?Sized> StockUpdateHandler<S> {
    pub fn new(ledger: Arc<InventoryLedger<S>>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl<S: StockStore + ?Sized + 'static> MessageHandler for StockUpdateHandler<S> {
    fn queue(&self) -> &'static str {
        PRODUCT_STOCK_QUEUE
    }

    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        if message.kind != UPDATE_STOCK {
            return Err(HandlerError::Permanent(format!(
                "unexpected message kind {}",
                message.kind
            )));
        }
        let event: InventoryDecrement = message
            .decode()
            .map_err(|e| HandlerError::Permanent(format!("malformed decrement: {e}")))?;

        match self
            .ledger
            .decrement(&event.product_id, event.quantity, &event.idempotency_token)
            .await
        {
            Ok(_) => Ok(()),
            Err(InventoryError::Store(e)) if e.is_transient() => {
                Err(HandlerError::Transient(e.to_string()))
            }
            Err(e) => Err(HandlerError::Permanent(e.to_string())),
        }
    }
}

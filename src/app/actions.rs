use std::time::Duration;

use anyhow::Result;

use crate::api::{ApiClient, Carried, Completion, Operation, Payload, RequestWorker, Ticket};
use crate::checkout::CheckoutOrder;
use crate::model::{Car, CarDraft, InventoryItem, ItemDraft, ResourceKind, User, UserDraft};
use crate::store::{EntityKey, SaveRequest};

/// Typed front for the request worker: each method queues one API call and
/// returns the ticket its completion will carry.
pub struct Dispatcher {
    worker: RequestWorker,
}

impl Dispatcher {
    pub fn new(worker: RequestWorker) -> Self {
        Self { worker }
    }

    pub fn spawn(client: ApiClient) -> Result<Self> {
        Ok(Self::new(RequestWorker::spawn(client)?))
    }

    pub fn refresh<E: Carried>(&mut self) -> Ticket {
        self.worker.submit(E::KIND, Operation::Refresh, None, |client| {
            client.list::<E>().map(E::into_payload)
        })
    }

    pub fn save<E: Carried>(&mut self, request: SaveRequest) -> Ticket {
        let SaveRequest { key, id, body } = request;
        self.worker
            .submit(E::KIND, Operation::Save, Some(key), move |client| {
                client
                    .update::<E>(id, body)
                    .map(|entity| E::into_payload(vec![entity]))
            })
    }

    pub fn delete<E: Carried>(&mut self, key: EntityKey, id: i64) -> Ticket {
        self.worker
            .submit(E::KIND, Operation::Delete, Some(key), move |client| {
                client.delete(E::KIND, id).map(|_| Payload::Empty)
            })
    }

    pub fn create_item(&mut self, draft: ItemDraft) -> Ticket {
        self.worker
            .submit(ResourceKind::Inventory, Operation::Create, None, move |client| {
                client
                    .create_item(&draft)
                    .map(|item| InventoryItem::into_payload(vec![item]))
            })
    }

    pub fn create_user(&mut self, draft: UserDraft) -> Ticket {
        self.worker
            .submit(ResourceKind::Users, Operation::Create, None, move |client| {
                client
                    .create_user(&draft)
                    .map(|user| User::into_payload(vec![user]))
            })
    }

    pub fn add_cars(&mut self, drafts: Vec<CarDraft>) -> Ticket {
        self.worker
            .submit(ResourceKind::Cars, Operation::Create, None, move |client| {
                client.add_cars(&drafts).map(Car::into_payload)
            })
    }

    pub fn checkout(&mut self, order: CheckoutOrder) -> Ticket {
        self.worker
            .submit(ResourceKind::Inventory, Operation::Checkout, None, move |client| {
                client.checkout(&order).map(Payload::Receipt)
            })
    }

    pub fn drain(&mut self) -> Vec<Completion> {
        self.worker.drain()
    }

    pub fn wait(&mut self, timeout: Duration) -> Option<Completion> {
        self.worker.wait(timeout)
    }

    pub fn in_flight(&self) -> usize {
        self.worker.in_flight()
    }
}

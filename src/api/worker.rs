use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result as AnyResult};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::api::ApiClient;
use crate::checkout::CheckoutReceipt;
use crate::error::{Error, Result};
use crate::model::{Car, Entity, InventoryItem, LogEntry, ResourceKind, User};
use crate::store::EntityKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Refresh,
    Create,
    Save,
    Delete,
    Checkout,
}

/// Identifies a submitted request so its completion can be routed back to
/// the row that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub id: u64,
    pub kind: ResourceKind,
    pub op: Operation,
    pub key: Option<EntityKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Items(Vec<InventoryItem>),
    Users(Vec<User>),
    Cars(Vec<Car>),
    Logs(Vec<LogEntry>),
    Receipt(CheckoutReceipt),
}

/// Entities that can travel through the worker channel.
pub trait Carried: Entity {
    fn into_payload(rows: Vec<Self>) -> Payload;
    fn from_payload(payload: Payload) -> Result<Vec<Self>>;
}

macro_rules! carried {
    ($entity:ty, $variant:ident) => {
        impl Carried for $entity {
            fn into_payload(rows: Vec<Self>) -> Payload {
                Payload::$variant(rows)
            }

            fn from_payload(payload: Payload) -> Result<Vec<Self>> {
                match payload {
                    Payload::$variant(rows) => Ok(rows),
                    other => Err(Error::InvalidResponse(format!(
                        "expected {} rows, got {other:?}",
                        <$entity as Entity>::KIND
                    ))),
                }
            }
        }
    };
}

carried!(InventoryItem, Items);
carried!(User, Users);
carried!(Car, Cars);
carried!(LogEntry, Logs);

#[derive(Debug)]
pub struct Completion {
    pub ticket: Ticket,
    pub result: Result<Payload>,
}

type JobFn = Box<dyn FnOnce(&ApiClient) -> Result<Payload> + Send>;

struct Job {
    ticket: Ticket,
    run: JobFn,
}

/// One background thread that executes requests in submission order and
/// reports each outcome on a completion channel.
pub struct RequestWorker {
    jobs: Option<Sender<Job>>,
    completions: Receiver<Completion>,
    handle: Option<JoinHandle<()>>,
    undelivered: Vec<Completion>,
    next_id: u64,
    in_flight: usize,
}

impl RequestWorker {
    pub fn spawn(client: ApiClient) -> AnyResult<Self> {
        let (job_tx, job_rx) = unbounded::<Job>();
        let (done_tx, done_rx) = unbounded::<Completion>();
        let handle = thread::Builder::new()
            .name("stocktui-requests".to_string())
            .spawn(move || {
                for job in job_rx.iter() {
                    let result = (job.run)(&client);
                    if done_tx
                        .send(Completion {
                            ticket: job.ticket,
                            result,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                tracing::debug!("request worker stopped");
            })
            .context("spawning request worker thread")?;
        Ok(Self {
            jobs: Some(job_tx),
            completions: done_rx,
            handle: Some(handle),
            undelivered: Vec::new(),
            next_id: 1,
            in_flight: 0,
        })
    }

    pub fn submit<F>(&mut self, kind: ResourceKind, op: Operation, key: Option<EntityKey>, run: F) -> Ticket
    where
        F: FnOnce(&ApiClient) -> Result<Payload> + Send + 'static,
    {
        let ticket = Ticket {
            id: self.next_id,
            kind,
            op,
            key,
        };
        self.next_id += 1;
        self.in_flight += 1;
        tracing::debug!(id = ticket.id, %kind, ?op, "queueing request");

        let job = Job {
            ticket,
            run: Box::new(run),
        };
        let sent = match &self.jobs {
            Some(jobs) => jobs.send(job).is_ok(),
            None => false,
        };
        if !sent {
            self.undelivered.push(Completion {
                ticket,
                result: Err(Error::Network("request worker is not running".to_string())),
            });
        }
        ticket
    }

    /// Every completion available right now, without blocking.
    pub fn drain(&mut self) -> Vec<Completion> {
        let mut done = std::mem::take(&mut self.undelivered);
        done.extend(self.completions.try_iter());
        self.in_flight = self.in_flight.saturating_sub(done.len());
        done
    }

    /// Blocks for the next completion, up to `timeout`.
    pub fn wait(&mut self, timeout: Duration) -> Option<Completion> {
        if let Some(done) = self.undelivered.pop() {
            self.in_flight = self.in_flight.saturating_sub(1);
            return Some(done);
        }
        match self.completions.recv_timeout(timeout) {
            Ok(done) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                Some(done)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

impl Drop for RequestWorker {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

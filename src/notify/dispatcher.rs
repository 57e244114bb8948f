use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{
    sync::{
        Mutex,
        mpsc::{self, Receiver, error::TrySendError},
    },
    task::{JoinHandle, JoinSet},
    time::timeout,
};
use tracing::{error, info, warn};

use super::{Channel, DeliveryError, Event, Notification};
use crate::{config::NotifyConfig, database::Repository, models::Aggregate};

/// A committed change waiting to be announced.
#[derive(Debug)]
pub struct Job {
    pub event: Event,
    pub aggregate: Aggregate,
}

/// Producer side of the notification queue. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    sender: mpsc::Sender<Job>,
}

/// Worker tasks behind a [`Dispatcher`].
pub struct Workers {
    handles: Vec<JoinHandle<()>>,
}

struct Context {
    repository: Arc<dyn Repository>,
    channels: Vec<Arc<dyn Channel>>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn start(
        repository: Arc<dyn Repository>,
        channels: Vec<Arc<dyn Channel>>,
        config: NotifyConfig,
    ) -> (Self, Workers) {
        let (sender, receiver) = mpsc::channel(config.queue.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        if channels.is_empty() {
            warn!("No notification channels configured, notifications will only be logged");
        }

        let context = Arc::new(Context {
            repository,
            channels,
            timeout: config.timeout,
        });

        let handles = (0..config.workers.max(1))
            .map(|worker| tokio::spawn(work(worker, receiver.clone(), context.clone())))
            .collect();

        (Self { sender }, Workers { handles })
    }

    /// Queues a notification without waiting. False when it was dropped.
    pub fn dispatch(&self, event: Event, aggregate: Aggregate) -> bool {
        match self.sender.try_send(Job { event, aggregate }) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                warn!(
                    kind = %job.aggregate.kind,
                    id = %job.aggregate.id,
                    event = ?job.event,
                    "Notification queue full, dropping notification"
                );
                false
            }
            Err(TrySendError::Closed(job)) => {
                warn!(
                    kind = %job.aggregate.kind,
                    id = %job.aggregate.id,
                    event = ?job.event,
                    "Notification workers stopped, dropping notification"
                );
                false
            }
        }
    }
}

impl Workers {
    /// Resolves once every queued job is handled. Only finishes after all
    /// [`Dispatcher`] clones are dropped.
    pub async fn drain(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Notification worker crashed: {e}");
            }
        }
    }
}

async fn work(worker: usize, receiver: Arc<Mutex<Receiver<Job>>>, context: Arc<Context>) {
    loop {
        let job = receiver.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };
        handle(&context, job).await;
    }

    info!(worker, "Notification worker stopped");
}

async fn handle(context: &Context, job: Job) {
    let Job { event, aggregate } = job;

    let line_items = match context
        .repository
        .line_items(aggregate.kind, aggregate.id)
        .await
    {
        Ok(items) => items,
        Err(e) => {
            error!(kind = %aggregate.kind, id = %aggregate.id, "Failed to load equipment for notification: {e}");
            Vec::new()
        }
    };

    info!(
        kind = %aggregate.kind,
        id = %aggregate.id,
        event = ?event,
        equipment = line_items.len(),
        "Sending notification"
    );

    let notification = Arc::new(Notification {
        event,
        aggregate,
        line_items,
        at: Utc::now(),
    });

    let mut deliveries = JoinSet::new();
    for channel in &context.channels {
        let channel = channel.clone();
        let notification = notification.clone();
        let limit = context.timeout;

        deliveries.spawn(async move {
            let name = channel.name();
            match deliver(&*channel, &notification, limit).await {
                Ok(()) => info!(channel = name, "Notification delivered"),
                Err(e @ DeliveryError::Timeout(_)) => {
                    warn!(channel = name, "Notification abandoned: {e}")
                }
                Err(e) => error!(channel = name, "Notification failed: {e}"),
            }
        });
    }

    while let Some(result) = deliveries.join_next().await {
        if let Err(e) = result {
            error!("Notification delivery task crashed: {e}");
        }
    }
}

/// One delivery attempt, cut off after `limit`.
async fn deliver(
    channel: &dyn Channel,
    notification: &Notification,
    limit: Duration,
) -> Result<(), DeliveryError> {
    timeout(limit, channel.deliver(notification))
        .await
        .unwrap_or_else(|_| Err(DeliveryError::Timeout(limit)))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::{
        database::MemoryRepository,
        models::{AggregateDraft, Kind, LineItemBatch, LineItemDraft},
        notify::channel::fakes::{Failing, Gated, Recording, Slow},
    };

    fn stock() -> Aggregate {
        AggregateDraft {
            name: "Spare switches".to_string(),
            contact_name: "Jane".to_string(),
            ..Default::default()
        }
        .into_aggregate(Kind::Stock, Utc::now())
        .unwrap()
    }

    fn config(workers: usize, queue: usize) -> NotifyConfig {
        NotifyConfig {
            workers,
            queue,
            timeout: Duration::from_secs(10),
        }
    }

    #[tokio::test]
    async fn test_failing_channel_does_not_block_others() {
        let repository = Arc::new(MemoryRepository::new());
        let aggregate = stock();
        repository.insert(&aggregate).await.unwrap();
        let items = LineItemBatch {
            equipments: vec![LineItemDraft {
                part_number: "SFP-10G".to_string(),
                quantity: 8,
                description: String::new(),
            }],
        }
        .into_items(Kind::Stock, aggregate.id, Utc::now())
        .unwrap();
        repository.insert_line_items(&items).await.unwrap();

        let chat = Arc::new(Recording::default());
        let channels: Vec<Arc<dyn Channel>> = vec![Arc::new(Failing), chat.clone()];
        let (dispatcher, workers) = Dispatcher::start(repository, channels, config(1, 4));

        assert!(dispatcher.dispatch(Event::Registered, aggregate.clone()));
        drop(dispatcher);
        workers.drain().await;

        let received = chat.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].aggregate.id, aggregate.id);
        assert_eq!(received[0].line_items, items);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_channel_is_cut_off() {
        let chat = Arc::new(Recording::default());
        let channels: Vec<Arc<dyn Channel>> =
            vec![Arc::new(Slow(Duration::from_secs(3600))), chat.clone()];
        let (dispatcher, workers) =
            Dispatcher::start(Arc::new(MemoryRepository::new()), channels, config(1, 4));

        assert!(dispatcher.dispatch(Event::Stage2Reached, stock()));
        drop(dispatcher);

        let started = tokio::time::Instant::now();
        workers.drain().await;

        assert_eq!(chat.count(), 1);
        assert!(started.elapsed() < Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deliver_reports_timeout() {
        let notification = Notification {
            event: Event::Stage2Reached,
            aggregate: stock(),
            line_items: Vec::new(),
            at: Utc::now(),
        };
        let limit = Duration::from_secs(10);

        let result = deliver(&Slow(Duration::from_secs(3600)), &notification, limit).await;
        assert!(matches!(&result, Err(DeliveryError::Timeout(after)) if *after == limit));
        assert_eq!(result.unwrap_err().to_string(), "Timed out after 10s");

        assert!(deliver(&Recording::default(), &notification, limit).await.is_ok());
        assert!(matches!(
            deliver(&Failing, &notification, limit).await,
            Err(DeliveryError::Message(_))
        ));
    }

    #[tokio::test]
    async fn test_full_queue_drops_jobs() {
        let gated = Arc::new(Gated::new());
        let channels: Vec<Arc<dyn Channel>> = vec![gated.clone()];
        let (dispatcher, workers) =
            Dispatcher::start(Arc::new(MemoryRepository::new()), channels, config(1, 1));

        // the single worker picks this one up and blocks on the gate
        assert!(dispatcher.dispatch(Event::Registered, stock()));
        gated.started.notified().await;

        assert!(dispatcher.dispatch(Event::Registered, stock()));
        assert!(!dispatcher.dispatch(Event::Registered, stock()));

        gated.release.add_permits(2);
        drop(dispatcher);
        workers.drain().await;

        assert_eq!(gated.inner.count(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_after_shutdown() {
        let (dispatcher, workers) =
            Dispatcher::start(Arc::new(MemoryRepository::new()), Vec::new(), config(2, 4));

        let spare = dispatcher.clone();
        drop(dispatcher);
        for handle in &workers.handles {
            handle.abort();
        }
        workers.drain().await;

        assert!(!spare.dispatch(Event::Registered, stock()));
    }
}

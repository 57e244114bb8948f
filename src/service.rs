use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    database::Repository,
    error::AppError,
    models::{
        Aggregate, AggregateDraft, AggregateUpdate, Kind, LineItem, LineItemBatch, ListQuery, Page,
    },
    notify::{Dispatcher, Event},
    transition,
};

/// Read-merge-save rounds before giving up on a hot record.
const SAVE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub aggregate: Aggregate,
    pub notified: bool,
}

/// Project and stock operations, shared by both kinds.
#[derive(Clone)]
pub struct AggregateService {
    repository: Arc<dyn Repository>,
    dispatcher: Dispatcher,
}

impl AggregateService {
    pub fn new(repository: Arc<dyn Repository>, dispatcher: Dispatcher) -> Self {
        Self {
            repository,
            dispatcher,
        }
    }

    pub async fn create(&self, kind: Kind, draft: AggregateDraft) -> Result<Aggregate, AppError> {
        let aggregate = draft.into_aggregate(kind, Utc::now())?;
        self.repository.insert(&aggregate).await?;

        info!(%kind, id = %aggregate.id, name = %aggregate.name, "Record created");
        Ok(aggregate)
    }

    pub async fn get(&self, kind: Kind, id: Uuid) -> Result<Aggregate, AppError> {
        self.repository
            .get(kind, id)
            .await?
            .ok_or(AppError::NotFound(kind.label()))
    }

    pub async fn list(&self, kind: Kind, query: &ListQuery) -> Result<Page<Aggregate>, AppError> {
        self.repository.list(kind, query).await
    }

    /// Applies a partial update and, when it moves the record from stage 1 to
    /// stage 2, queues the stage-2 notification after the write lands.
    pub async fn update(
        &self,
        kind: Kind,
        id: Uuid,
        update: &AggregateUpdate,
    ) -> Result<UpdateOutcome, AppError> {
        for attempt in 1..=SAVE_ATTEMPTS {
            let prior = self.get(kind, id).await?;
            let decision = transition::evaluate(prior.status, update);

            if !prior.status.can_move_to(decision.status) {
                return Err(AppError::InvalidTransition {
                    from: prior.status.to_string(),
                    to: decision.status.to_string(),
                });
            }

            let mut next = prior.clone();
            update.merge_into(&mut next)?;
            next.status = decision.status;
            next.updated_time = Some(Utc::now());

            if !self.repository.save(&next, prior.version).await? {
                debug!(%kind, %id, attempt, "Record changed underneath update, retrying");
                continue;
            }
            next.version = prior.version + 1;

            if decision.notify {
                info!(%kind, %id, "Record reached stage 2, queueing notification");
                self.dispatcher.dispatch(Event::Stage2Reached, next.clone());
            }

            return Ok(UpdateOutcome {
                aggregate: next,
                notified: decision.notify,
            });
        }

        Err(AppError::Conflict)
    }

    pub async fn delete(&self, kind: Kind, id: Uuid) -> Result<(), AppError> {
        if !self.repository.delete(kind, id).await? {
            return Err(AppError::NotFound(kind.label()));
        }

        info!(%kind, %id, "Record deleted");
        Ok(())
    }

    /// Stores the equipment lines and queues the intake summary.
    pub async fn add_line_items(
        &self,
        kind: Kind,
        id: Uuid,
        batch: LineItemBatch,
    ) -> Result<Vec<LineItem>, AppError> {
        let aggregate = self.get(kind, id).await?;
        let items = batch.into_items(kind, id, Utc::now())?;
        self.repository.insert_line_items(&items).await?;

        info!(%kind, %id, count = items.len(), "Equipment added");
        self.dispatcher.dispatch(Event::Registered, aggregate);

        Ok(items)
    }

    pub async fn line_items(&self, kind: Kind, id: Uuid) -> Result<Vec<LineItem>, AppError> {
        self.get(kind, id).await?;
        self.repository.line_items(kind, id).await
    }
}

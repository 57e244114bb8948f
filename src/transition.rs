//! # Stage transitions
//!
//! Records start at `stage1`. The first update that supplies any delivery detail while the record
//! is still at `stage1` moves it to `stage2` and is the one update that announces it.
//!
//! - An explicit `status` in the update always wins over the automatic move and never notifies
//! - Updates to a record already at `stage2` or beyond never notify, delivery details or not
//! - Blank delivery fields do not count as supplied
use crate::models::{AggregateUpdate, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub status: Stage,
    pub notify: bool,
}

/// Decides the stored status after applying `update` to a record at `prior`.
pub fn evaluate(prior: Stage, update: &AggregateUpdate) -> Decision {
    if let Some(status) = update.status {
        return Decision {
            status,
            notify: false,
        };
    }

    if prior == Stage::Stage1 && update.delivery.has_any() {
        return Decision {
            status: Stage::Stage2,
            notify: true,
        };
    }

    Decision {
        status: prior,
        notify: false,
    }
}

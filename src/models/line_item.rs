use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stage::Kind;
use crate::error::AppError;

/// Equipment line on a project or stock record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub kind: Kind,
    pub part_number: String,
    pub quantity: i64,
    #[serde(default)]
    pub description: String,
    pub created_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItemDraft {
    pub part_number: String,
    pub quantity: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItemBatch {
    pub equipments: Vec<LineItemDraft>,
}

impl LineItemBatch {
    pub fn into_items(
        self,
        kind: Kind,
        parent_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<LineItem>, AppError> {
        if self.equipments.is_empty() {
            return Err(AppError::MalformedPayload(
                "at least one equipment is required".to_string(),
            ));
        }

        self.equipments
            .into_iter()
            .map(|draft| {
                if draft.part_number.trim().is_empty() {
                    return Err(AppError::MalformedPayload(
                        "part_number is required".to_string(),
                    ));
                }
                if draft.quantity <= 0 {
                    return Err(AppError::MalformedPayload(
                        "quantity must be greater than zero".to_string(),
                    ));
                }

                Ok(LineItem {
                    id: Uuid::new_v4(),
                    parent_id,
                    kind,
                    part_number: draft.part_number.trim().to_string(),
                    quantity: draft.quantity,
                    description: draft.description.trim().to_string(),
                    created_time: now,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(part_number: &str, quantity: i64) -> LineItemDraft {
        LineItemDraft {
            part_number: part_number.to_string(),
            quantity,
            description: String::new(),
        }
    }

    #[test]
    fn test_batch_builds_items() {
        let parent = Uuid::new_v4();
        let batch = LineItemBatch {
            equipments: vec![draft("WS-C2960", 4), draft("SFP-10G", 8)],
        };

        let items = batch.into_items(Kind::Stock, parent, Utc::now()).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.parent_id == parent));
        assert!(items.iter().all(|item| item.kind == Kind::Stock));
    }

    #[test]
    fn test_batch_rejects_empty_and_invalid() {
        let parent = Uuid::new_v4();

        let empty = LineItemBatch { equipments: vec![] };
        assert!(empty.into_items(Kind::Project, parent, Utc::now()).is_err());

        let zero = LineItemBatch {
            equipments: vec![draft("WS-C2960", 0)],
        };
        assert!(zero.into_items(Kind::Project, parent, Utc::now()).is_err());

        let blank = LineItemBatch {
            equipments: vec![draft(" ", 1)],
        };
        assert!(blank.into_items(Kind::Project, parent, Utc::now()).is_err());
    }
}

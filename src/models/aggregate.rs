use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stage::{Kind, Stage};
use crate::{
    error::AppError,
    utils::{blank_as_none, is_valid_email, non_empty, parse_date},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(rename = "contact_name")]
    pub name: String,
    #[serde(rename = "contact_phone", default)]
    pub phone: String,
    #[serde(rename = "contact_email", default)]
    pub email: String,
}

/// Stage-2 details. Any of them showing up on a `Stage1` record moves it on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_delivery_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_delivery_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_contract_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_requirements: Option<String>,
}

/// A project or stock record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub id: Uuid,
    pub kind: Kind,
    pub name: String,
    #[serde(flatten)]
    pub contact: Contact,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub remark: String,
    #[serde(flatten)]
    pub delivery: Delivery,
    pub status: Stage,
    pub version: u64,
    pub created_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_time: Option<DateTime<Utc>>,
}

impl Aggregate {
    /// Most recent change, used for list ordering.
    pub fn touched_at(&self) -> DateTime<Utc> {
        self.updated_time.unwrap_or(self.created_time)
    }
}

/// Stage-2 fields as they arrive over the wire. Empty strings mean "leave as is".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryInput {
    pub expected_delivery_period: Option<String>,
    pub expected_delivery_date: Option<String>,
    pub expected_contract_period: Option<String>,
    pub contract_start_date: Option<String>,
    pub contract_end_date: Option<String>,
    pub delivery_address: Option<String>,
    pub special_requirements: Option<String>,
}

impl DeliveryInput {
    pub fn has_any(&self) -> bool {
        [
            &self.expected_delivery_period,
            &self.expected_delivery_date,
            &self.expected_contract_period,
            &self.contract_start_date,
            &self.contract_end_date,
            &self.delivery_address,
            &self.special_requirements,
        ]
        .into_iter()
        .any(|field| non_empty(field.as_deref()).is_some())
    }

    /// Overwrites only the provided fields of `delivery`.
    pub fn merge_into(&self, delivery: &mut Delivery) -> Result<(), AppError> {
        if let Some(value) = non_empty(self.expected_delivery_period.as_deref()) {
            delivery.expected_delivery_period = Some(value.to_string());
        }
        if let Some(value) = non_empty(self.expected_delivery_date.as_deref()) {
            delivery.expected_delivery_date = Some(parse_date("expected_delivery_date", value)?);
        }
        if let Some(value) = non_empty(self.expected_contract_period.as_deref()) {
            delivery.expected_contract_period = Some(value.to_string());
        }
        if let Some(value) = non_empty(self.contract_start_date.as_deref()) {
            delivery.contract_start_date = Some(parse_date("contract_start_date", value)?);
        }
        if let Some(value) = non_empty(self.contract_end_date.as_deref()) {
            delivery.contract_end_date = Some(parse_date("contract_end_date", value)?);
        }
        if let Some(value) = non_empty(self.delivery_address.as_deref()) {
            delivery.delivery_address = Some(value.to_string());
        }
        if let Some(value) = non_empty(self.special_requirements.as_deref()) {
            delivery.special_requirements = Some(value.to_string());
        }

        Ok(())
    }
}

/// Create payload for both projects and stocks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AggregateDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub contact_name: String,
    #[serde(default)]
    pub contact_phone: String,
    #[serde(default)]
    pub contact_email: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub remark: String,
    #[serde(flatten)]
    pub delivery: DeliveryInput,
}

impl AggregateDraft {
    pub fn into_aggregate(self, kind: Kind, now: DateTime<Utc>) -> Result<Aggregate, AppError> {
        require("name", &self.name)?;
        require("contact_name", &self.contact_name)?;

        if kind == Kind::Project {
            require("contact_phone", &self.contact_phone)?;
            require("contact_email", &self.contact_email)?;
            require("owner", &self.owner)?;

            if self.delivery.has_any() {
                return Err(AppError::MalformedPayload(
                    "delivery details are added by updating a project".to_string(),
                ));
            }
        }

        if !self.contact_email.trim().is_empty() && !is_valid_email(&self.contact_email) {
            return Err(AppError::MalformedPayload(
                "contact_email is not a valid email".to_string(),
            ));
        }

        let mut delivery = Delivery::default();
        self.delivery.merge_into(&mut delivery)?;

        Ok(Aggregate {
            id: Uuid::new_v4(),
            kind,
            name: self.name.trim().to_string(),
            contact: Contact {
                name: self.contact_name.trim().to_string(),
                phone: self.contact_phone.trim().to_string(),
                email: self.contact_email.trim().to_string(),
            },
            owner: self.owner.trim().to_string(),
            remark: self.remark.trim().to_string(),
            delivery,
            status: Stage::Stage1,
            version: 0,
            created_time: now,
            updated_time: None,
        })
    }
}

/// Partial update. Absent or empty fields never clobber stored values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AggregateUpdate {
    pub name: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub owner: Option<String>,
    pub remark: Option<String>,
    #[serde(flatten)]
    pub delivery: DeliveryInput,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub status: Option<Stage>,
}

impl AggregateUpdate {
    /// Applies every provided field except `status`, which the stage
    /// transition decides.
    pub fn merge_into(&self, aggregate: &mut Aggregate) -> Result<(), AppError> {
        if let Some(email) = non_empty(self.contact_email.as_deref()) {
            if !is_valid_email(email) {
                return Err(AppError::MalformedPayload(
                    "contact_email is not a valid email".to_string(),
                ));
            }
            aggregate.contact.email = email.to_string();
        }

        overwrite(&mut aggregate.name, &self.name);
        overwrite(&mut aggregate.contact.name, &self.contact_name);
        overwrite(&mut aggregate.contact.phone, &self.contact_phone);
        overwrite(&mut aggregate.owner, &self.owner);
        overwrite(&mut aggregate.remark, &self.remark);

        self.delivery.merge_into(&mut aggregate.delivery)
    }
}

fn overwrite(target: &mut String, value: &Option<String>) {
    if let Some(value) = non_empty(value.as_deref()) {
        *target = value.to_string();
    }
}

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::MalformedPayload(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_draft() -> AggregateDraft {
        AggregateDraft {
            name: "Campus network refresh".to_string(),
            contact_name: "Jane".to_string(),
            contact_phone: "02-1234-5678".to_string(),
            contact_email: "jane@example.com".to_string(),
            owner: "Lee".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_draft_starts_at_stage1() {
        let aggregate = project_draft()
            .into_aggregate(Kind::Project, Utc::now())
            .unwrap();

        assert_eq!(aggregate.status, Stage::Stage1);
        assert_eq!(aggregate.version, 0);
        assert_eq!(aggregate.delivery, Delivery::default());
    }

    #[test]
    fn test_project_draft_requires_contact_details() {
        let draft = AggregateDraft {
            owner: String::new(),
            ..project_draft()
        };

        assert!(matches!(
            draft.into_aggregate(Kind::Project, Utc::now()),
            Err(AppError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_stock_draft_keeps_delivery_but_stays_stage1() {
        let draft = AggregateDraft {
            name: "Spare switches".to_string(),
            contact_name: "Jane".to_string(),
            delivery: DeliveryInput {
                expected_delivery_date: Some("2025-06-01".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let aggregate = draft.into_aggregate(Kind::Stock, Utc::now()).unwrap();
        assert_eq!(aggregate.status, Stage::Stage1);
        assert_eq!(
            aggregate.delivery.expected_delivery_date,
            NaiveDate::from_ymd_opt(2025, 6, 1)
        );
    }

    #[test]
    fn test_update_leaves_unset_fields_alone() {
        let mut aggregate = project_draft()
            .into_aggregate(Kind::Project, Utc::now())
            .unwrap();
        aggregate.delivery.delivery_address = Some("1 Harbour Rd".to_string());

        let update = AggregateUpdate {
            name: Some(String::new()),
            contact_name: Some("Janet".to_string()),
            delivery: DeliveryInput {
                delivery_address: Some("   ".to_string()),
                special_requirements: Some("fragile".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        update.merge_into(&mut aggregate).unwrap();

        assert_eq!(aggregate.name, "Campus network refresh");
        assert_eq!(aggregate.contact.name, "Janet");
        assert_eq!(
            aggregate.delivery.delivery_address.as_deref(),
            Some("1 Harbour Rd")
        );
        assert_eq!(
            aggregate.delivery.special_requirements.as_deref(),
            Some("fragile")
        );
    }

    #[test]
    fn test_update_rejects_bad_dates() {
        let mut aggregate = project_draft()
            .into_aggregate(Kind::Project, Utc::now())
            .unwrap();
        let update = AggregateUpdate {
            delivery: DeliveryInput {
                contract_start_date: Some("soon".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(update.merge_into(&mut aggregate).is_err());
    }

    #[test]
    fn test_has_any_ignores_blank_fields() {
        let blank = DeliveryInput {
            delivery_address: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(!blank.has_any());

        let filled = DeliveryInput {
            expected_contract_period: Some("12 months".to_string()),
            ..Default::default()
        };
        assert!(filled.has_any());
    }

    #[test]
    fn test_blank_status_is_unset() {
        let update: AggregateUpdate = serde_json::from_value(serde_json::json!({
            "delivery_address": "123 Main St",
            "status": "",
        }))
        .unwrap();
        assert_eq!(update.status, None);
        assert!(update.delivery.has_any());

        let update: AggregateUpdate =
            serde_json::from_value(serde_json::json!({ "status": " completed " })).unwrap();
        assert_eq!(update.status, Some(Stage::Completed));

        let update: AggregateUpdate =
            serde_json::from_value(serde_json::json!({ "status": null })).unwrap();
        assert_eq!(update.status, None);

        assert!(
            serde_json::from_value::<AggregateUpdate>(serde_json::json!({ "status": "stage9" }))
                .is_err()
        );
    }

    #[test]
    fn test_aggregate_json_shape() {
        let aggregate = project_draft()
            .into_aggregate(Kind::Project, Utc::now())
            .unwrap();
        let value = serde_json::to_value(&aggregate).unwrap();

        assert_eq!(value["contact_name"], "Jane");
        assert_eq!(value["status"], "stage1");
        assert!(value.get("delivery_address").is_none());

        let back: Aggregate = serde_json::from_value(value).unwrap();
        assert_eq!(back, aggregate);
    }
}

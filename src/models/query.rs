use serde::{Deserialize, Serialize};

use super::{aggregate::Aggregate, stage::Stage};
use crate::utils::{blank_as_none, non_empty, page_count};

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub name: Option<String>,
    pub contact_name: Option<String>,
    pub owner: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub status: Option<Stage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub pages: u32,
}

impl ListQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn matches(&self, aggregate: &Aggregate) -> bool {
        contains(&aggregate.name, self.name.as_deref())
            && contains(&aggregate.contact.name, self.contact_name.as_deref())
            && contains(&aggregate.owner, self.owner.as_deref())
            && self.status.is_none_or(|status| aggregate.status == status)
    }

    /// Filters, orders by last change (newest first) and cuts out one page.
    pub fn paginate(&self, aggregates: impl IntoIterator<Item = Aggregate>) -> Page<Aggregate> {
        let mut matching: Vec<Aggregate> = aggregates
            .into_iter()
            .filter(|aggregate| self.matches(aggregate))
            .collect();
        matching.sort_by(|a, b| b.touched_at().cmp(&a.touched_at()));

        let (page, limit) = (self.page(), self.limit());
        let total = matching.len();
        let offset = ((page - 1) as usize).saturating_mul(limit as usize);

        Page {
            items: matching.into_iter().skip(offset).take(limit as usize).collect(),
            page,
            limit,
            total,
            pages: page_count(total, limit),
        }
    }
}

fn contains(haystack: &str, needle: Option<&str>) -> bool {
    match non_empty(needle) {
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::models::{AggregateDraft, Kind};

    fn stock(name: &str, minutes_ago: i64) -> Aggregate {
        AggregateDraft {
            name: name.to_string(),
            contact_name: "Jane".to_string(),
            ..Default::default()
        }
        .into_aggregate(Kind::Stock, Utc::now() - Duration::minutes(minutes_ago))
        .unwrap()
    }

    #[test]
    fn test_orders_newest_first_and_pages() {
        let query = ListQuery {
            limit: Some(2),
            ..Default::default()
        };
        let page = query.paginate(vec![stock("old", 30), stock("new", 1), stock("mid", 10)]);

        let names: Vec<_> = page.items.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["new", "mid"]);
        assert_eq!(page.total, 3);
        assert_eq!(page.pages, 2);
    }

    #[test]
    fn test_updated_time_wins_over_created_time() {
        let mut revived = stock("revived", 60);
        revived.updated_time = Some(Utc::now());

        let page = ListQuery::default().paginate(vec![stock("fresh", 5), revived]);
        assert_eq!(page.items[0].name, "revived");
    }

    #[test]
    fn test_filters() {
        let mut shipped = stock("Router batch", 1);
        shipped.status = Stage::Stage2;

        let query = ListQuery {
            name: Some("router".to_string()),
            status: Some(Stage::Stage2),
            ..Default::default()
        };
        let page = query.paginate(vec![shipped, stock("Router spares", 2), stock("Cables", 3)]);

        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "Router batch");
    }

    #[test]
    fn test_blank_status_filter_matches_everything() {
        let query: ListQuery =
            serde_json::from_value(serde_json::json!({ "status": "", "name": "" })).unwrap();
        assert_eq!(query.status, None);

        let mut shipped = stock("Router batch", 1);
        shipped.status = Stage::Stage2;
        assert_eq!(query.paginate(vec![shipped, stock("Cables", 2)]).total, 2);

        let query: ListQuery = serde_json::from_value(serde_json::json!({ "status": "stage2" })).unwrap();
        assert_eq!(query.status, Some(Stage::Stage2));
    }

    #[test]
    fn test_limit_is_clamped() {
        let query = ListQuery {
            page: Some(0),
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), MAX_LIMIT);
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    api::{timestamp, Card},
    catalog::{device, reason},
    ticket::Status,
};

/// Archive search refinements, sent JSON-encoded in the `filters` query
/// parameter.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    #[serde(default)]
    pub status: StatusBucket,
    pub group_by: Option<GroupBy>,
    pub reason: Option<reason::Id>,
    #[serde(default, with = "timestamp::option")]
    pub date_start: Option<OffsetDateTime>,
    #[serde(default, with = "timestamp::option")]
    pub date_end: Option<OffsetDateTime>,
    #[serde(alias = "deviceID")]
    pub device_id: Option<device::Id>,
}

/// Coarse status selection of the archive.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum StatusBucket {
    Closed,
    InProgress,
    #[default]
    All,
}

impl StatusBucket {
    pub fn admits(self, status: Status) -> bool {
        match self {
            Self::Closed => status == Status::Closed,
            Self::InProgress => {
                matches!(status, Status::InWork | Status::WorksDone)
            }
            Self::All => true,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupBy {
    Month,
    Reason,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(flatten)]
    pub tickets: Listing,
    pub filters: Facets,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Listing {
    Tickets(Vec<Card>),
    /// Keyed by `YYYY-MM` or by reason id, depending on [`GroupBy`].
    GroupedTickets(BTreeMap<String, Vec<Card>>),
}

/// Filter values available within the searched scope.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Facets {
    /// Distinct creation times, newest first.
    #[serde(with = "timestamp::list")]
    pub available_dates: Vec<OffsetDateTime>,
    pub reasons: Vec<ReasonFacet>,
    /// Present only when searching by client.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub devices: Option<Vec<DeviceFacet>>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasonFacet {
    pub id: reason::Id,
    pub title: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFacet {
    pub id: device::Id,
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_unknown_filter_keys() {
        let filters: Filters = serde_json::from_str(
            r#"{
                "department": "ignored",
                "status": "in-progress",
                "groupBy": "month",
                "deviceID": "00000000-0000-0000-0000-000000000007",
                "dateStart": "2024-01-01T00:00:00Z"
            }"#,
        )
        .unwrap();

        assert_eq!(filters.status, StatusBucket::InProgress);
        assert_eq!(filters.group_by, Some(GroupBy::Month));
        assert_eq!(filters.device_id, Some(device::Id::from(7)));
        assert!(filters.date_start.is_some());
        assert_eq!(filters.reason, None);
    }

    #[test]
    fn buckets_statuses() {
        use Status as S;

        let admitted = |bucket: StatusBucket| {
            S::ALL
                .into_iter()
                .filter(|s| bucket.admits(*s))
                .collect::<Vec<_>>()
        };

        assert_eq!(admitted(StatusBucket::Closed), [S::Closed]);
        assert_eq!(
            admitted(StatusBucket::InProgress),
            [S::InWork, S::WorksDone],
        );
        assert_eq!(admitted(StatusBucket::All), S::ALL);
    }

    #[test]
    fn flattens_listing_key() {
        let response = Response {
            tickets: Listing::GroupedTickets(BTreeMap::new()),
            filters: Facets::default(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("groupedTickets").is_some());
        assert!(json["filters"].get("devices").is_none());
        assert_eq!(json["filters"]["availableDates"], serde_json::json!([]));
    }
}

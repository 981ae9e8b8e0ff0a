use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum GroupType {
    /// Direct members are users.
    UsersGroup,
    /// Direct members are other groups.
    GroupsGroup,
}

impl TryFrom<u8> for GroupType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GroupType::UsersGroup),
            1 => Ok(GroupType::GroupsGroup),
            other => Err(format!("unknown group type {other}")),
        }
    }
}

impl From<GroupType> for u8 {
    fn from(value: GroupType) -> Self {
        match value {
            GroupType::UsersGroup => 0,
            GroupType::GroupsGroup => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStatus {
    pub id: String,
    pub name: String,
    pub short_name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: String,
    pub start_time: String,
    pub end_time: String,
}

impl TimeSlot {
    /// `09:00 AM - 10:30 AM`, or the raw strings when they are not `HH:mm:ss`.
    pub fn label(&self) -> String {
        format!(
            "{} - {}",
            display_time(&self.start_time),
            display_time(&self.end_time)
        )
    }
}

fn display_time(raw: &str) -> String {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map(|time| time.format("%I:%M %p").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    pub group_type: GroupType,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub schedule_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

impl UserSummary {
    pub fn display_name(&self) -> String {
        title_case(&format!("{} {}", self.first_name, self.last_name))
    }
}

fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// A group together with its immediate members, as returned by the hierarchy
/// lookup and embedded in every group report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDetail {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    pub group_type: GroupType,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub schedule_id: Option<String>,
    #[serde(default)]
    pub groups: Vec<GroupSummary>,
    #[serde(default)]
    pub users: Vec<UserSummary>,
}

impl GroupDetail {
    pub fn summary(&self) -> GroupSummary {
        GroupSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            color: self.color.clone(),
            group_type: self.group_type,
            disabled: self.disabled,
            schedule_id: self.schedule_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStatusCount {
    pub attendance_status_id: String,
    /// `None` means nothing was recorded, which is not the same as zero.
    #[serde(default)]
    pub count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotReport {
    pub time_slot_id: String,
    #[serde(default)]
    pub attendance_status_counts: Vec<AttendanceStatusCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayReport {
    #[serde(deserialize_with = "calendar_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub time_slot_reports: Vec<TimeSlotReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReport {
    pub user: UserSummary,
    #[serde(default)]
    pub day_reports: Vec<DayReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupReport {
    pub group: GroupDetail,
    #[serde(default)]
    pub day_reports: Vec<DayReport>,
    #[serde(default)]
    pub time_slots: Vec<TimeSlot>,
    #[serde(default)]
    pub attendance_statuses: Vec<AttendanceStatus>,
    #[serde(default)]
    pub user_reports: Vec<UserReport>,
}

/// The normalized query handed to the report endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ReportQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub group_id: Option<String>,
    pub topic_ids: Option<Vec<String>>,
    pub time_slot_ids: Option<Vec<String>>,
    /// Weekday indices, 0 = Sunday; sent as `days`.
    pub days_of_week: Option<Vec<u8>>,
    pub attendance_status_ids: Option<Vec<String>>,
    pub is_user_report: Option<bool>,
}

impl ReportQuery {
    pub fn for_group(&self, group_id: &str) -> ReportQuery {
        ReportQuery {
            group_id: Some(group_id.to_string()),
            is_user_report: None,
            ..self.clone()
        }
    }

    pub fn for_users_of(&self, group_id: &str) -> ReportQuery {
        ReportQuery {
            group_id: Some(group_id.to_string()),
            is_user_report: Some(true),
            ..self.clone()
        }
    }

    /// URL query pairs. Unset and empty fields are omitted; list fields
    /// repeat their key once per element.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();

        if let Some(date) = self.start_date {
            pairs.push(("startDate", date.format("%Y-%m-%d").to_string()));
        }
        if let Some(date) = self.end_date {
            pairs.push(("endDate", date.format("%Y-%m-%d").to_string()));
        }
        if let Some(group_id) = self.group_id.as_ref().filter(|id| !id.is_empty()) {
            pairs.push(("groupId", group_id.clone()));
        }
        push_list(&mut pairs, "topicIds", self.topic_ids.as_deref());
        push_list(&mut pairs, "timeSlotIds", self.time_slot_ids.as_deref());
        if let Some(days) = &self.days_of_week {
            pairs.extend(days.iter().map(|day| ("days", day.to_string())));
        }
        push_list(
            &mut pairs,
            "attendanceStatusIds",
            self.attendance_status_ids.as_deref(),
        );
        if let Some(flag) = self.is_user_report {
            pairs.push(("isUserReport", flag.to_string()));
        }

        pairs
    }
}

fn push_list(pairs: &mut Vec<(&'static str, String)>, key: &'static str, values: Option<&[String]>) {
    if let Some(values) = values {
        pairs.extend(values.iter().map(|value| (key, value.clone())));
    }
}

fn calendar_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let head = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_type_travels_as_integer() {
        let summary: GroupSummary = serde_json::from_str(
            r#"{"id":"g1","name":"Choir","color":null,"groupType":1,"disabled":false}"#,
        )
        .unwrap();
        assert_eq!(summary.group_type, GroupType::GroupsGroup);

        let bad = serde_json::from_str::<GroupSummary>(
            r#"{"id":"g1","name":"Choir","groupType":7}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn day_report_accepts_date_times() {
        let report: DayReport = serde_json::from_str(
            r#"{"date":"2024-01-03T00:00:00+03:00","timeSlotReports":[]}"#,
        )
        .unwrap();
        assert_eq!(report.date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    }

    #[test]
    fn null_and_missing_counts_stay_unknown() {
        let counts: Vec<AttendanceStatusCount> = serde_json::from_str(
            r#"[{"attendanceStatusId":"a","count":null},{"attendanceStatusId":"b"},{"attendanceStatusId":"c","count":0}]"#,
        )
        .unwrap();
        assert_eq!(counts[0].count, None);
        assert_eq!(counts[1].count, None);
        assert_eq!(counts[2].count, Some(0));
    }

    #[test]
    fn query_pairs_skip_unset_and_repeat_lists() {
        let query = ReportQuery {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            topic_ids: Some(vec![]),
            days_of_week: Some(vec![1, 3]),
            attendance_status_ids: Some(vec!["p".to_string(), "a".to_string()]),
            ..Default::default()
        }
        .for_users_of("g9");

        assert_eq!(
            query.to_query_pairs(),
            vec![
                ("startDate", "2024-01-01".to_string()),
                ("groupId", "g9".to_string()),
                ("days", "1".to_string()),
                ("days", "3".to_string()),
                ("attendanceStatusIds", "p".to_string()),
                ("attendanceStatusIds", "a".to_string()),
                ("isUserReport", "true".to_string()),
            ]
        );
    }

    #[test]
    fn labels_read_like_a_clock() {
        let slot = TimeSlot {
            id: "t1".to_string(),
            start_time: "09:00:00".to_string(),
            end_time: "13:30:00".to_string(),
        };
        assert_eq!(slot.label(), "09:00 AM - 01:30 PM");

        let user = UserSummary {
            id: "u1".to_string(),
            first_name: "aVERY".to_string(),
            last_name: "lee".to_string(),
            picture: None,
            disabled: false,
        };
        assert_eq!(user.display_name(), "Avery Lee");
    }
}

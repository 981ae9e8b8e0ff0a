use chrono::NaiveDate;

use crate::models::{AttendanceStatus, GroupSummary, ReportQuery, TimeSlot, TopicSummary};

/// The operator's filter, minus the root group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportQueryForm {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub days_of_week: Option<Vec<u8>>,
    pub time_slots: Option<Vec<TimeSlot>>,
    pub topics: Option<Vec<TopicSummary>>,
    pub attendance_statuses: Option<Vec<AttendanceStatus>>,
}

/// A partial update. `None` leaves a field alone; `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct QueryPatch {
    pub start_date: Option<Option<NaiveDate>>,
    pub end_date: Option<Option<NaiveDate>>,
    pub days_of_week: Option<Option<Vec<u8>>>,
    pub time_slots: Option<Option<Vec<TimeSlot>>>,
    pub topics: Option<Option<Vec<TopicSummary>>>,
    pub attendance_statuses: Option<Option<Vec<AttendanceStatus>>>,
}

impl QueryPatch {
    pub fn date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            start_date: Some(start),
            end_date: Some(end),
            ..Default::default()
        }
    }

    pub fn days_of_week(mut self, days: Option<Vec<u8>>) -> Self {
        self.days_of_week = Some(days);
        self
    }

    pub fn time_slots(mut self, slots: Option<Vec<TimeSlot>>) -> Self {
        self.time_slots = Some(slots);
        self
    }

    pub fn topics(mut self, topics: Option<Vec<TopicSummary>>) -> Self {
        self.topics = Some(topics);
        self
    }

    pub fn attendance_statuses(mut self, statuses: Option<Vec<AttendanceStatus>>) -> Self {
        self.attendance_statuses = Some(statuses);
        self
    }
}

/// Holds the active filter and the selected root group.
#[derive(Debug, Clone, Default)]
pub struct ReportQueryState {
    form: ReportQueryForm,
    root: Option<GroupSummary>,
    revision: u64,
}

impl ReportQueryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn form(&self) -> &ReportQueryForm {
        &self.form
    }

    pub fn root_group(&self) -> Option<&GroupSummary> {
        self.root.as_ref()
    }

    /// Bumped by every `update_query`.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replace-merge; no validation.
    pub fn update_query(&mut self, patch: QueryPatch) -> u64 {
        let form = &mut self.form;
        if let Some(value) = patch.start_date {
            form.start_date = value;
        }
        if let Some(value) = patch.end_date {
            form.end_date = value;
        }
        if let Some(value) = patch.days_of_week {
            form.days_of_week = value;
        }
        if let Some(value) = patch.time_slots {
            form.time_slots = value;
        }
        if let Some(value) = patch.topics {
            form.topics = value;
        }
        if let Some(value) = patch.attendance_statuses {
            form.attendance_statuses = value;
        }

        self.revision += 1;
        self.revision
    }

    /// The filter flattened to id lists, without a group id.
    pub fn get_query(&self) -> ReportQuery {
        let form = &self.form;
        ReportQuery {
            start_date: form.start_date,
            end_date: form.end_date,
            group_id: None,
            topic_ids: form
                .topics
                .as_ref()
                .map(|topics| topics.iter().map(|t| t.id.clone()).collect()),
            time_slot_ids: form
                .time_slots
                .as_ref()
                .map(|slots| slots.iter().map(|s| s.id.clone()).collect()),
            days_of_week: form.days_of_week.clone(),
            attendance_status_ids: form
                .attendance_statuses
                .as_ref()
                .map(|statuses| statuses.iter().map(|s| s.id.clone()).collect()),
            is_user_report: None,
        }
    }

    pub fn set_root_group(&mut self, summary: GroupSummary) {
        self.root = Some(summary);
    }
}

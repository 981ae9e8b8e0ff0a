use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLoadingState {
    pub group_id: String,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// What a row should show, derived from its loading entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus<'a> {
    /// No fetch has been issued for this group.
    Idle,
    Loading,
    Failed(&'a str),
    Ready,
}

/// Per-group fetch status. Entries are upserted, never removed.
#[derive(Debug, Clone, Default)]
pub struct GroupLoadingRegistry {
    states: HashMap<String, GroupLoadingState>,
}

impl GroupLoadingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_group_loading_state(&mut self, group_id: &str, is_loading: bool, error: Option<String>) {
        match self.states.get_mut(group_id) {
            Some(state) => {
                state.is_loading = is_loading;
                state.error = error;
            }
            None => {
                self.states.insert(
                    group_id.to_string(),
                    GroupLoadingState {
                        group_id: group_id.to_string(),
                        is_loading,
                        error,
                    },
                );
            }
        }
    }

    pub fn get(&self, group_id: &str) -> Option<&GroupLoadingState> {
        self.states.get(group_id)
    }

    pub fn status(&self, group_id: &str) -> RowStatus<'_> {
        match self.states.get(group_id) {
            None => RowStatus::Idle,
            Some(state) if state.is_loading => RowStatus::Loading,
            Some(GroupLoadingState {
                error: Some(message),
                ..
            }) => RowStatus::Failed(message),
            Some(_) => RowStatus::Ready,
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

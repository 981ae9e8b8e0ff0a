use crate::error::{ReportError, Result};
use crate::models::{GroupDetail, GroupSummary, GroupType};

/// Handle to a tree node. A handle to a detached node stops resolving even
/// after its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    pub fn index(self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    Collapsed,
    Groups,
    Users,
}

#[derive(Debug, Clone)]
pub struct GroupViewNode {
    pub group_id: String,
    pub data: Option<GroupSummary>,
    /// Depth from the root (root = 0).
    pub level: usize,
    pub children: Vec<NodeId>,
    pub expansion: Expansion,
}

impl GroupViewNode {
    fn new(group_id: String, data: Option<GroupSummary>, level: usize) -> Self {
        Self {
            group_id,
            data,
            level,
            children: Vec::new(),
            expansion: Expansion::Collapsed,
        }
    }

    pub fn show_users(&self) -> bool {
        self.expansion == Expansion::Users
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandOutcome {
    /// Children replaced by one node per subgroup.
    Groups(Vec<NodeId>),
    /// Users group: the per-user listing should be shown.
    Users,
    /// Groups group without subgroups.
    Nothing,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<GroupViewNode>,
}

/// Lazily expanded tree of visited groups.
///
/// Nodes live in an arena. Replacing a node's children releases the old
/// subtree and its slots are reused, so the arena never holds more slots
/// than the largest tree seen at once.
#[derive(Debug, Clone)]
pub struct GroupTree {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

impl GroupTree {
    pub fn new(root: GroupSummary) -> Self {
        Self::from_root(GroupViewNode::new(root.id.clone(), Some(root), 0))
    }

    #[cfg(test)]
    pub fn with_root_id(group_id: &str) -> Self {
        Self::from_root(GroupViewNode::new(group_id.to_string(), None, 0))
    }

    fn from_root(root: GroupViewNode) -> Self {
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(root),
            }],
            free: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId {
            index: 0,
            generation: 0,
        }
    }

    pub fn root_group_id(&self) -> &str {
        self.node(self.root())
            .map(|root| root.group_id.as_str())
            .unwrap_or_default()
    }

    /// Number of nodes currently attached.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node(&self, id: NodeId) -> Option<&GroupViewNode> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut GroupViewNode> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(ReportError::UnknownNode(id.index))
    }

    fn alloc(&mut self, node: GroupViewNode) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.generation = slot.generation.wrapping_add(1);
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    /// Free `id` and everything beneath it.
    fn release(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(slot) = self
                .slots
                .get_mut(id.index)
                .filter(|slot| slot.generation == id.generation)
            else {
                continue;
            };
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
                self.free.push(id.index);
            }
        }
    }

    /// Expand `id` using the group detail from its latest report.
    pub fn expand(&mut self, id: NodeId, group: &GroupDetail) -> Result<ExpandOutcome> {
        match group.group_type {
            GroupType::UsersGroup => {
                self.node_mut(id)?.expansion = Expansion::Users;
                Ok(ExpandOutcome::Users)
            }
            GroupType::GroupsGroup if group.groups.is_empty() => {
                self.node_mut(id)?;
                Ok(ExpandOutcome::Nothing)
            }
            GroupType::GroupsGroup => {
                let children = self.replace_children(id, &group.groups)?;
                Ok(ExpandOutcome::Groups(children))
            }
        }
    }

    /// Bring an expanded node's children in line with a newer report.
    ///
    /// Returns the new children when they had to be replaced; an unchanged
    /// subgroup list keeps the existing nodes.
    pub fn refresh(&mut self, id: NodeId, group: &GroupDetail) -> Result<Option<Vec<NodeId>>> {
        let node = self.node(id).ok_or(ReportError::UnknownNode(id.index))?;
        if node.expansion != Expansion::Groups {
            return Ok(None);
        }

        let current: Vec<&str> = node
            .children
            .iter()
            .filter_map(|child| self.node(*child))
            .map(|child| child.group_id.as_str())
            .collect();
        let latest: Vec<&str> = group.groups.iter().map(|g| g.id.as_str()).collect();
        if current == latest {
            return Ok(None);
        }

        self.replace_children(id, &group.groups).map(Some)
    }

    fn replace_children(&mut self, id: NodeId, subgroups: &[GroupSummary]) -> Result<Vec<NodeId>> {
        let node = self.node_mut(id)?;
        let level = node.level + 1;
        let old = std::mem::take(&mut node.children);
        for child in old {
            self.release(child);
        }

        let children: Vec<NodeId> = subgroups
            .iter()
            .map(|summary| {
                self.alloc(GroupViewNode::new(summary.id.clone(), Some(summary.clone()), level))
            })
            .collect();

        let node = self.node_mut(id)?;
        node.children = children.clone();
        node.expansion = Expansion::Groups;
        Ok(children)
    }

    /// Reachable nodes in depth-first pre-order.
    pub fn visible(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![self.root()];

        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(node) = self.node(id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }

        order
    }

    pub fn find_visible(&self, group_id: &str) -> Option<NodeId> {
        self.visible()
            .into_iter()
            .find(|id| self.node(*id).is_some_and(|node| node.group_id == group_id))
    }
}

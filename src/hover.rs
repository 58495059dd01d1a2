use kuchiki::NodeRef;
use std::collections::BTreeMap;

use crate::locator::UnitId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverEvent {
    Enter,
    Leave,
}

#[derive(Debug, Clone)]
struct HoverGroup {
    container: NodeRef,
    members: Vec<UnitId>,
}

/// Groups of units sharing a container, and the enter/leave listener bound to
/// each group. The host toolkit turns pointer signals into
/// [`HoverEvent`]s; only groups with a live listener react.
#[derive(Debug, Default)]
pub struct HoverRegistry {
    groups: Vec<HoverGroup>,
    listeners: BTreeMap<ListenerId, GroupId>,
    next_listener: usize,
}

impl HoverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `unit` to the group for `container`, creating and subscribing the
    /// group on first use.
    pub fn join(&mut self, container: &NodeRef, unit: UnitId) -> GroupId {
        let group = match self.group_for(container) {
            Some(group) => group,
            None => {
                self.groups.push(HoverGroup {
                    container: container.clone(),
                    members: Vec::new(),
                });
                let group = GroupId(self.groups.len() - 1);
                self.subscribe(group);
                group
            }
        };
        let members = &mut self.groups[group.0].members;
        if !members.contains(&unit) {
            members.push(unit);
        }
        group
    }

    pub fn group_for(&self, container: &NodeRef) -> Option<GroupId> {
        self.groups
            .iter()
            .position(|group| group.container == *container)
            .map(GroupId)
    }

    pub fn members(&self, group: GroupId) -> &[UnitId] {
        self.groups
            .get(group.0)
            .map(|group| group.members.as_slice())
            .unwrap_or(&[])
    }

    pub fn container(&self, group: GroupId) -> Option<&NodeRef> {
        self.groups.get(group.0).map(|group| &group.container)
    }

    pub fn subscribe(&mut self, group: GroupId) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.insert(id, group);
        id
    }

    pub fn unsubscribe(&mut self, listener: ListenerId) -> bool {
        self.listeners.remove(&listener).is_some()
    }

    pub fn is_bound(&self, group: GroupId) -> bool {
        self.listeners.values().any(|bound| *bound == group)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Drops every listener and group. Returns how many listeners were removed.
    pub fn clear(&mut self) -> usize {
        let ids: Vec<ListenerId> = self.listeners.keys().copied().collect();
        let removed = ids.into_iter().filter(|id| self.unsubscribe(*id)).count();
        self.groups.clear();
        removed
    }
}

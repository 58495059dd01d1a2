use kuchiki::{Node, NodeRef};
use std::collections::{BTreeMap, HashMap};

use crate::document::{self, INDICATOR_ATTR};
use crate::error::StateError;
use crate::hover::{GroupId, HoverEvent, HoverRegistry};
use crate::locator::{TextUnit, UnitId};

/// Per-unit bookkeeping needed to undo a translation.
#[derive(Debug, Clone)]
pub struct UnitRecord {
    unit: TextUnit,
    original: String,
    translated: Option<String>,
    indicator: Option<NodeRef>,
    group: Option<GroupId>,
}

impl UnitRecord {
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn translated(&self) -> Option<&str> {
        self.translated.as_deref()
    }

    pub fn has_indicator(&self) -> bool {
        self.indicator.is_some()
    }

    pub fn group(&self) -> Option<GroupId> {
        self.group
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    pub indicator: bool,
    pub hover: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevertSummary {
    pub restored: usize,
    pub listeners_removed: usize,
}

#[derive(Debug, Default)]
pub struct NodeStateStore {
    records: BTreeMap<UnitId, UnitRecord>,
    identities: HashMap<usize, (NodeRef, UnitId)>,
    hover: HoverRegistry,
    revertible: bool,
}

fn node_key(node: &NodeRef) -> usize {
    &**node as *const Node as usize
}

impl NodeStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relabels freshly located units with the ids this store already holds
    /// for their text nodes. A node keeps one id across scans until revert.
    pub fn identify(&mut self, units: Vec<TextUnit>) -> Vec<TextUnit> {
        units.into_iter().map(|unit| self.resolve(&unit)).collect()
    }

    fn resolve(&mut self, unit: &TextUnit) -> TextUnit {
        let next = UnitId(self.identities.len());
        let (_, id) = self
            .identities
            .entry(node_key(unit.node()))
            .or_insert_with(|| (unit.node().clone(), next));
        TextUnit::new(*id, unit.node().clone())
    }

    /// Records the original text of `unit`. Later captures of the same text
    /// node keep the first value.
    pub fn capture(&mut self, unit: &TextUnit, original: &str) {
        let unit = self.resolve(unit);
        self.records.entry(unit.id()).or_insert_with(|| UnitRecord {
            unit: unit.clone(),
            original: original.to_string(),
            translated: None,
            indicator: None,
            group: None,
        });
    }

    /// Stores the translation and writes it into the document.
    pub fn commit(&mut self, unit: &TextUnit, translated: &str) {
        let unit = self.resolve(unit);
        if let Some(record) = self.records.get_mut(&unit.id()) {
            record.translated = Some(translated.to_string());
        }
        unit.set_text(translated);
    }

    /// Marks the container of `unit` as translated. The first marked
    /// container stays the one cleared on revert.
    pub fn mark_indicator(&mut self, unit: &TextUnit) {
        let unit = self.resolve(unit);
        let Some(record) = self.records.get_mut(&unit.id()) else {
            return;
        };
        if record.indicator.is_some() {
            return;
        }
        if let Some(container) = unit.container() {
            document::set_attr(&container, INDICATOR_ATTR, "true");
            record.indicator = Some(container);
        }
    }

    pub fn join_hover_group(&mut self, unit: &TextUnit) -> Option<GroupId> {
        let unit = self.resolve(unit);
        let record = self.records.get_mut(&unit.id())?;
        let container = unit.container()?;
        let group = self.hover.join(&container, unit.id());
        record.group = Some(group);
        Some(group)
    }

    /// Capture, commit and decorate in one step, as done for every accepted
    /// translation of a completed batch.
    pub fn apply(&mut self, unit: &TextUnit, translated: &str, options: ApplyOptions) {
        let unit = self.resolve(unit);
        let original = unit.text();
        self.capture(&unit, &original);
        self.commit(&unit, translated);
        if options.indicator {
            self.mark_indicator(&unit);
        }
        if options.hover {
            self.join_hover_group(&unit);
        }
    }

    /// Arms [`NodeStateStore::revert`] once a session has finished.
    pub fn mark_completed(&mut self) {
        self.revertible = true;
    }

    pub fn is_revertible(&self) -> bool {
        self.revertible
    }

    pub fn record(&self, unit: UnitId) -> Option<&UnitRecord> {
        self.records.get(&unit)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn hover(&self) -> &HoverRegistry {
        &self.hover
    }

    pub fn hover_group_of(&self, unit: UnitId) -> Option<GroupId> {
        self.records.get(&unit).and_then(|record| record.group)
    }

    /// Shows the original text of every member while the pointer is over the
    /// group. Stored values are untouched.
    pub fn on_enter(&self, group: GroupId) {
        self.dispatch(group, HoverEvent::Enter);
    }

    /// Puts the translated text back.
    pub fn on_leave(&self, group: GroupId) {
        self.dispatch(group, HoverEvent::Leave);
    }

    pub fn dispatch(&self, group: GroupId, event: HoverEvent) {
        if !self.hover.is_bound(group) {
            return;
        }
        for member in self.hover.members(group) {
            let Some(record) = self.records.get(member) else {
                continue;
            };
            match event {
                HoverEvent::Enter => record.unit.set_text(&record.original),
                HoverEvent::Leave => {
                    if let Some(translated) = record.translated.as_deref() {
                        record.unit.set_text(translated);
                    }
                }
            }
        }
    }

    /// Restores every captured unit to its original text and forgets all
    /// state.
    pub fn revert(&mut self) -> Result<RevertSummary, StateError> {
        if !self.revertible {
            return Err(StateError::NothingToRevert);
        }
        let restored = self.records.len();
        for record in self.records.values() {
            record.unit.set_text(&record.original);
            if let Some(container) = &record.indicator {
                document::remove_attr(container, INDICATOR_ATTR);
            }
        }
        let listeners_removed = self.hover.clear();
        self.records.clear();
        self.identities.clear();
        self.revertible = false;
        Ok(RevertSummary {
            restored,
            listeners_removed,
        })
    }
}

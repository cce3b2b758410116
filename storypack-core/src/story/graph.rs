//! Story topology as plain data: stages, action nodes, and slot-tagged edges.
//!
//! A stage declares up to two outbound slots (`Ok`, `Home`). Each declared
//! slot carries at most one [`Transition`] to an action node, which lists the
//! stages the player may land on. The entry stage doubles as the pack identity.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use uuid::Uuid;

use crate::error::{PackError, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotRole {
    Ok,
    Home,
}

impl SlotRole {
    pub const ALL: [SlotRole; 2] = [SlotRole::Ok, SlotRole::Home];
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ControlSettings {
    pub wheel: bool,
    pub ok: bool,
    pub home: bool,
    pub pause: bool,
    pub autoplay: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageNode {
    pub id: Uuid,
    pub name: Option<String>,
    /// Asset names; resolved against `StoryPack::assets`.
    pub image: Option<String>,
    pub audio: Option<String>,
    pub controls: ControlSettings,
    pub slots: BTreeSet<SlotRole>,
}

impl StageNode {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            name: None,
            image: None,
            audio: None,
            controls: ControlSettings::default(),
            slots: BTreeSet::new(),
        }
    }

    pub fn with_slots(mut self, slots: &[SlotRole]) -> Self {
        self.slots.extend(slots.iter().copied());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionNode {
    pub id: Uuid,
    pub name: Option<String>,
    /// Stage ids, in menu order.
    pub options: Vec<Uuid>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub action: Uuid,
    /// Option selected when the transition fires.
    pub option: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoryGraph {
    stages: Vec<StageNode>,
    actions: Vec<ActionNode>,
    transitions: BTreeMap<(Uuid, SlotRole), Transition>,
    entry: Uuid,
}

impl StoryGraph {
    pub fn new(entry: StageNode) -> Self {
        let id = entry.id;
        Self {
            stages: vec![entry],
            actions: Vec::new(),
            transitions: BTreeMap::new(),
            entry: id,
        }
    }

    pub fn entry(&self) -> Uuid {
        self.entry
    }

    pub fn stages(&self) -> &[StageNode] {
        &self.stages
    }

    pub fn actions(&self) -> &[ActionNode] {
        &self.actions
    }

    pub fn stage(&self, id: Uuid) -> Option<&StageNode> {
        self.stages.iter().find(|s| s.id == id)
    }

    pub fn action(&self, id: Uuid) -> Option<&ActionNode> {
        self.actions.iter().find(|a| a.id == id)
    }

    pub fn stage_index(&self, id: Uuid) -> Option<usize> {
        self.stages.iter().position(|s| s.id == id)
    }

    pub fn action_index(&self, id: Uuid) -> Option<usize> {
        self.actions.iter().position(|a| a.id == id)
    }

    pub fn transition(&self, stage: Uuid, slot: SlotRole) -> Option<&Transition> {
        self.transitions.get(&(stage, slot))
    }

    /// All edges as `(source stage, slot, transition)`.
    pub fn transitions(&self) -> impl Iterator<Item = (Uuid, SlotRole, &Transition)> {
        self.transitions.iter().map(|(&(s, r), t)| (s, r, t))
    }

    pub fn add_stage(&mut self, stage: StageNode) -> Result<()> {
        if self.stage(stage.id).is_some() || self.action(stage.id).is_some() {
            return Err(PackError::invalid_graph(format!(
                "duplicate node id {}",
                stage.id
            )));
        }
        self.stages.push(stage);
        Ok(())
    }

    pub fn add_action(&mut self, action: ActionNode) -> Result<()> {
        if self.stage(action.id).is_some() || self.action(action.id).is_some() {
            return Err(PackError::invalid_graph(format!(
                "duplicate node id {}",
                action.id
            )));
        }
        self.actions.push(action);
        Ok(())
    }

    /// Declare an outbound slot. Returns false when it already existed.
    pub fn add_slot(&mut self, stage: Uuid, slot: SlotRole) -> Result<bool> {
        let node = self.stage_mut(stage)?;
        Ok(node.slots.insert(slot))
    }

    /// Link a declared slot to an action node, replacing any previous edge.
    pub fn connect(
        &mut self,
        stage: Uuid,
        slot: SlotRole,
        transition: Transition,
    ) -> Result<Option<Transition>> {
        let node = self.stage(stage).ok_or_else(|| unknown_stage(stage))?;
        if !node.slots.contains(&slot) {
            return Err(PackError::invalid_graph(format!(
                "stage {stage} has no {slot:?} slot"
            )));
        }
        let action = self
            .action(transition.action)
            .ok_or_else(|| unknown_action(transition.action))?;
        check_option(action, transition.option)?;
        Ok(self.transitions.insert((stage, slot), transition))
    }

    /// Drop the edge leaving `slot`, then the slot itself.
    ///
    /// Either both go or nothing changes: the only failure (unknown stage)
    /// is detected before any mutation.
    pub fn remove_slot(&mut self, stage: Uuid, slot: SlotRole) -> Result<Option<Transition>> {
        let idx = self.stage_index(stage).ok_or_else(|| unknown_stage(stage))?;
        let removed = self.transitions.remove(&(stage, slot));
        self.stages[idx].slots.remove(&slot);
        Ok(removed)
    }

    /// Action nodes that can land on `stage`, with the option index pointing at it.
    pub fn inbound(&self, stage: Uuid) -> Vec<(Uuid, u16)> {
        let mut out = Vec::new();
        for a in &self.actions {
            for (i, opt) in a.options.iter().enumerate() {
                if *opt == stage {
                    out.push((a.id, i as u16));
                }
            }
        }
        out
    }

    /// Structural integrity of the topology alone; asset references are checked by the pack.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.stages.len() + self.actions.len());
        for id in self.stages.iter().map(|s| s.id).chain(self.actions.iter().map(|a| a.id)) {
            if !seen.insert(id) {
                return Err(PackError::invalid_graph(format!("duplicate node id {id}")));
            }
        }
        if self.stage(self.entry).is_none() {
            return Err(PackError::invalid_graph(format!(
                "entry stage {} is missing",
                self.entry
            )));
        }
        for a in &self.actions {
            for opt in &a.options {
                if self.stage(*opt).is_none() {
                    return Err(PackError::invalid_graph(format!(
                        "action {} lists unknown stage {opt}",
                        a.id
                    )));
                }
            }
        }
        for (&(stage, slot), t) in &self.transitions {
            let node = self.stage(stage).ok_or_else(|| unknown_stage(stage))?;
            if !node.slots.contains(&slot) {
                return Err(PackError::invalid_graph(format!(
                    "edge leaves undeclared {slot:?} slot of stage {stage}"
                )));
            }
            let action = self.action(t.action).ok_or_else(|| unknown_action(t.action))?;
            check_option(action, t.option)?;
        }
        Ok(())
    }

    pub(crate) fn from_parts(
        stages: Vec<StageNode>,
        actions: Vec<ActionNode>,
        transitions: BTreeMap<(Uuid, SlotRole), Transition>,
        entry: Uuid,
    ) -> Result<Self> {
        let g = Self {
            stages,
            actions,
            transitions,
            entry,
        };
        g.validate()?;
        Ok(g)
    }

    fn stage_mut(&mut self, id: Uuid) -> Result<&mut StageNode> {
        self.stages
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| unknown_stage(id))
    }
}

fn check_option(action: &ActionNode, option: u16) -> Result<()> {
    // An empty action node ends the story; its only valid option is 0.
    if action.options.is_empty() && option == 0 {
        return Ok(());
    }
    if usize::from(option) >= action.options.len() {
        return Err(PackError::invalid_graph(format!(
            "option {option} out of range for action {} ({} options)",
            action.id,
            action.options.len()
        )));
    }
    Ok(())
}

fn unknown_stage(id: Uuid) -> PackError {
    PackError::invalid_graph(format!("unknown stage {id}"))
}

fn unknown_action(id: Uuid) -> PackError {
    PackError::invalid_graph(format!("unknown action {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_stage_graph() -> (StoryGraph, Uuid, Uuid, Uuid) {
        let cover = Uuid::new_v4();
        let next = Uuid::new_v4();
        let menu = Uuid::new_v4();
        let mut g = StoryGraph::new(StageNode::new(cover).with_slots(&[SlotRole::Ok, SlotRole::Home]));
        g.add_stage(StageNode::new(next)).unwrap();
        g.add_action(ActionNode {
            id: menu,
            name: None,
            options: vec![next],
        })
        .unwrap();
        g.connect(cover, SlotRole::Ok, Transition { action: menu, option: 0 })
            .unwrap();
        (g, cover, next, menu)
    }

    #[test]
    fn remove_slot_drops_edge_and_slot() {
        let (mut g, cover, _, menu) = two_stage_graph();
        let removed = g.remove_slot(cover, SlotRole::Ok).unwrap();
        assert_eq!(removed, Some(Transition { action: menu, option: 0 }));
        assert!(g.transition(cover, SlotRole::Ok).is_none());
        assert!(!g.stage(cover).unwrap().slots.contains(&SlotRole::Ok));
        assert!(g.stage(cover).unwrap().slots.contains(&SlotRole::Home));
        g.validate().unwrap();
    }

    #[test]
    fn remove_slot_on_unknown_stage_changes_nothing() {
        let (mut g, ..) = two_stage_graph();
        let before = g.clone();
        assert!(g.remove_slot(Uuid::new_v4(), SlotRole::Ok).is_err());
        assert_eq!(g, before);
    }

    #[test]
    fn connect_requires_declared_slot() {
        let (mut g, _, next, menu) = two_stage_graph();
        let err = g
            .connect(next, SlotRole::Ok, Transition { action: menu, option: 0 })
            .unwrap_err();
        assert!(matches!(err, PackError::InvalidGraph(_)));
        assert!(g.add_slot(next, SlotRole::Ok).unwrap());
        assert!(!g.add_slot(next, SlotRole::Ok).unwrap());
        g.connect(next, SlotRole::Ok, Transition { action: menu, option: 0 })
            .unwrap();
    }

    #[test]
    fn connect_rejects_out_of_range_option() {
        let (mut g, cover, _, menu) = two_stage_graph();
        assert!(
            g.connect(cover, SlotRole::Home, Transition { action: menu, option: 3 })
                .is_err()
        );
    }

    #[test]
    fn inbound_lists_action_options() {
        let (g, cover, next, menu) = two_stage_graph();
        assert_eq!(g.inbound(next), vec![(menu, 0)]);
        assert!(g.inbound(cover).is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let (mut g, cover, ..) = two_stage_graph();
        assert!(g.add_stage(StageNode::new(cover)).is_err());
    }
}

// src/chain/state.rs

//! Chain State: the ordered arena of in-flight groups.
//!
//! Groups are keyed by a monotonically increasing [`GroupId`], so iteration
//! order of the arena is submission order and the last entry is the only
//! group still open for membership. Everything here is plain bookkeeping:
//! no awaits, no caller code. The controller holds it behind one mutex.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::chain::latch::Latch;
use crate::chain::unit::{UnitHandle, UnitId, UnitState};

/// Handle of a group inside the chain arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Kind of a group, fixed at creation.
#[derive(Debug)]
pub(crate) enum GroupKind {
    /// One sequential continuation.
    Barrier,
    /// A trigger latch plus one or more member units that start together.
    Cohort { trigger: Latch },
}

#[derive(Debug)]
pub(crate) struct Group {
    kind: GroupKind,
    units: Vec<UnitHandle>,
}

/// Units of a sealed group, captured for its successor's drain join.
#[derive(Debug, Clone)]
pub(crate) struct Predecessor {
    pub(crate) id: GroupId,
    pub(crate) units: Vec<UnitHandle>,
}

impl Predecessor {
    /// Resolve once every captured unit is terminal, whatever the outcome.
    pub(crate) async fn drained(&self) {
        futures::future::join_all(self.units.iter().map(|unit| unit.wait())).await;
    }
}

#[derive(Debug, Default)]
pub(crate) struct ChainState {
    groups: BTreeMap<GroupId, Group>,
    next_group: u64,
    next_unit: u64,
    shut_down: bool,
}

impl ChainState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub(crate) fn len(&self) -> usize {
        self.groups.len()
    }

    pub(crate) fn next_unit_id(&mut self) -> UnitId {
        let id = UnitId(self.next_unit);
        self.next_unit += 1;
        id
    }

    fn next_group_id(&mut self) -> GroupId {
        let id = GroupId(self.next_group);
        self.next_group += 1;
        id
    }

    /// The current last group, captured as the wait target for a group
    /// about to be appended (which seals it for good).
    ///
    /// An empty chain is first seeded with an already-completed barrier, so
    /// the very first submission always has something to wait on.
    pub(crate) fn anchor(&mut self) -> Predecessor {
        if let Some((id, group)) = self.groups.last_key_value() {
            return Predecessor {
                id: *id,
                units: group.units.clone(),
            };
        }

        let units = vec![UnitHandle::resolved(self.next_unit_id(), UnitState::Completed)];
        let id = self.next_group_id();
        self.groups.insert(
            id,
            Group {
                kind: GroupKind::Barrier,
                units: units.clone(),
            },
        );
        debug!(group = %id, "seeded chain with completed barrier");
        Predecessor { id, units }
    }

    pub(crate) fn push_barrier(&mut self, unit: UnitHandle) -> GroupId {
        let id = self.next_group_id();
        self.groups.insert(
            id,
            Group {
                kind: GroupKind::Barrier,
                units: vec![unit],
            },
        );
        id
    }

    pub(crate) fn push_cohort(&mut self, trigger: Latch, first: UnitHandle) -> GroupId {
        let id = self.next_group_id();
        self.groups.insert(
            id,
            Group {
                kind: GroupKind::Cohort { trigger },
                units: vec![first],
            },
        );
        id
    }

    /// Add a member to the last group if it is an open cohort.
    ///
    /// Returns the cohort's id and trigger, or `None` (and leaves the unit
    /// unattached) when the last group is not a cohort.
    pub(crate) fn join_cohort(&mut self, unit: UnitHandle) -> Option<(GroupId, Latch)> {
        let (id, group) = self.groups.iter_mut().next_back()?;
        match &group.kind {
            GroupKind::Cohort { trigger } => {
                let trigger = trigger.clone();
                group.units.push(unit);
                Some((*id, trigger))
            }
            GroupKind::Barrier => None,
        }
    }

    /// Drop a drained group. Returns whether it was still tracked.
    pub(crate) fn remove(&mut self, id: GroupId) -> bool {
        self.groups.remove(&id).is_some()
    }

    /// Mark the chain shut down and forget every group. Returns `false` if
    /// it was already shut down.
    pub(crate) fn shut_down(&mut self) -> bool {
        if self.shut_down {
            return false;
        }
        self.shut_down = true;
        self.groups.clear();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::unit;

    fn pending_unit(state: &mut ChainState) -> UnitHandle {
        let id = state.next_unit_id();
        unit::pending(id).1
    }

    fn last_id(state: &ChainState) -> GroupId {
        *state.groups.last_key_value().unwrap().0
    }

    fn unit_count(state: &ChainState, id: GroupId) -> usize {
        state.groups[&id].units.len()
    }

    #[test]
    fn anchor_seeds_empty_chain_with_completed_barrier() {
        let mut state = ChainState::new();
        let seed = state.anchor();
        assert_eq!(state.len(), 1);
        assert_eq!(seed.units.len(), 1);
        assert_eq!(seed.units[0].state(), UnitState::Completed);
        assert!(matches!(state.groups[&seed.id].kind, GroupKind::Barrier));

        let again = state.anchor();
        assert_eq!(again.id, seed.id);
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn barrier_is_never_joined() {
        let mut state = ChainState::new();
        state.anchor();
        let u = pending_unit(&mut state);
        let barrier = state.push_barrier(u.clone());

        assert!(state.join_cohort(u).is_none());
        assert_eq!(unit_count(&state, barrier), 1);
    }

    #[test]
    fn members_join_last_cohort() {
        let mut state = ChainState::new();
        state.anchor();
        let first = pending_unit(&mut state);
        let cohort = state.push_cohort(Latch::new(), first);

        let second = pending_unit(&mut state);
        let (joined, _) = state.join_cohort(second).expect("cohort is open");
        assert_eq!(joined, cohort);
        assert_eq!(unit_count(&state, cohort), 2);
    }

    #[test]
    fn barrier_seals_previous_cohort() {
        let mut state = ChainState::new();
        state.anchor();
        let first = pending_unit(&mut state);
        let cohort = state.push_cohort(Latch::new(), first);

        let captured = state.anchor();
        assert_eq!(captured.id, cohort);
        let seq = pending_unit(&mut state);
        state.push_barrier(seq);

        let late = pending_unit(&mut state);
        assert!(state.join_cohort(late).is_none());
        assert_eq!(unit_count(&state, cohort), 1);
    }

    #[test]
    fn groups_are_ordered_and_removed_from_front() {
        let mut state = ChainState::new();
        let seed = state.anchor().id;
        let u1 = pending_unit(&mut state);
        let g1 = state.push_barrier(u1);
        let u2 = pending_unit(&mut state);
        let g2 = state.push_barrier(u2);

        assert!(seed < g1 && g1 < g2);
        assert_eq!(last_id(&state), g2);

        assert!(state.remove(seed));
        assert!(!state.remove(seed));
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn shut_down_clears_once() {
        let mut state = ChainState::new();
        state.anchor();
        assert!(state.shut_down());
        assert_eq!(state.len(), 0);
        assert!(state.is_shut_down());
        assert!(!state.shut_down());
    }

    #[tokio::test]
    async fn predecessor_drains_on_any_terminal_state() {
        let mut state = ChainState::new();
        state.anchor();
        let (ok, ok_handle) = unit::pending(state.next_unit_id());
        let (bad, bad_handle) = unit::pending(state.next_unit_id());
        let predecessor = Predecessor {
            id: last_id(&state),
            units: vec![ok_handle, bad_handle],
        };

        ok.finish(UnitState::Completed);
        bad.finish(UnitState::Faulted);
        tokio::time::timeout(std::time::Duration::from_secs(1), predecessor.drained())
            .await
            .expect("faulted unit must not block the drain");
    }
}

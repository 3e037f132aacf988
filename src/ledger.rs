// 5.0 ledger.rs: the authoritative position table. the only component that
// mutates position state.
//
// All reads and writes go through one mutex, so transitions on the same id
// observe a total order and one-shot edges (accept, settle, close, exercise)
// can succeed at most once: the edge check and the mutation happen inside a
// single critical section. Critical sections are pure in-memory work, nothing
// blocks while holding the lock.

use crate::position::{LifecycleEvent, Position, PositionKind, PositionState};
use crate::types::{PartyId, PositionId, Timestamp};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Position {0} not found")]
    NotFound(PositionId),

    #[error("Illegal transition: {event} from {from} on position {id}")]
    IllegalTransition {
        id: PositionId,
        from: PositionState,
        event: &'static str,
    },

    #[error("Duplicate position id {0} (allocator bug)")]
    DuplicateId(PositionId),
}

/// A position about to be created. The ledger assigns the id and the initial
/// state; callers never supply either.
#[derive(Debug, Clone)]
pub struct PositionDraft {
    pub owner: PartyId,
    pub kind: PositionKind,
}

#[derive(Debug, Default)]
struct LedgerInner {
    positions: HashMap<PositionId, Position>,
    next_id: u64,
}

#[derive(Debug, Default)]
pub struct PositionLedger {
    inner: Mutex<LedgerInner>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LedgerInner {
                positions: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Store a draft under a fresh id. Swaps start `Proposed`; futures and
    /// options start `Open` (their collateral is confirmed before creation).
    pub fn create(&self, draft: PositionDraft, now: Timestamp) -> Result<Position, LedgerError> {
        let mut inner = self.inner.lock();

        let id = PositionId(inner.next_id);
        inner.next_id += 1;

        let state = match draft.kind {
            PositionKind::Swap(_) => PositionState::Proposed,
            PositionKind::Futures(_) | PositionKind::Options(_) => PositionState::Open,
        };

        let position = Position {
            id,
            owner: draft.owner,
            kind: draft.kind,
            state,
            opened_at: now,
            updated_at: now,
        };

        if inner.positions.insert(id, position.clone()).is_some() {
            return Err(LedgerError::DuplicateId(id));
        }
        Ok(position)
    }

    pub fn get(&self, id: PositionId) -> Result<Position, LedgerError> {
        self.inner
            .lock()
            .positions
            .get(&id)
            .cloned()
            .ok_or(LedgerError::NotFound(id))
    }

    /// Apply one state-machine edge atomically. On failure the position is
    /// untouched.
    pub fn transition(
        &self,
        id: PositionId,
        event: &LifecycleEvent,
        now: Timestamp,
    ) -> Result<Position, LedgerError> {
        let mut inner = self.inner.lock();
        let position = inner.positions.get_mut(&id).ok_or(LedgerError::NotFound(id))?;

        let from = position.state;
        position
            .apply(event, now)
            .map_err(|()| LedgerError::IllegalTransition {
                id,
                from,
                event: event.name(),
            })?;

        Ok(position.clone())
    }

    /// Snapshot of every position the party is on either side of, ordered by id.
    pub fn list_by_owner(&self, party: &PartyId) -> Vec<Position> {
        let inner = self.inner.lock();
        let mut out: Vec<_> = inner
            .positions
            .values()
            .filter(|p| p.involves(party))
            .cloned()
            .collect();
        out.sort_by_key(|p| p.id);
        out
    }

    /// Every non-terminal position, ordered by id. Keeper sweeps iterate this.
    pub fn list_open(&self) -> Vec<Position> {
        let inner = self.inner.lock();
        let mut out: Vec<_> = inner
            .positions
            .values()
            .filter(|p| !p.is_terminal())
            .cloned()
            .collect();
        out.sort_by_key(|p| p.id);
        out
    }

    pub fn len(&self) -> usize {
        self.inner.lock().positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().positions.is_empty()
    }
}

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use shared::domain::ItemId;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityPhase {
    /// Nothing in flight for the entity.
    Idle,
    /// A mutation is running, possibly with more queued behind it.
    Pending,
}

/// Sent by a slot that leaves the line before its turn: the receiver it was
/// still waiting on, so the next slot keeps waiting on the same predecessor.
struct Handoff(Option<oneshot::Receiver<Handoff>>);

struct QueueTail {
    depth: usize,
    /// Resolves when the most recently enqueued slot leaves the line.
    released: Option<oneshot::Receiver<Handoff>>,
}

/// Per-entity FIFO of mutations. Each slot waits for the one enqueued just
/// before it on the same id; different ids never wait on each other.
#[derive(Clone, Default)]
pub(crate) struct EntityQueues {
    tails: Arc<Mutex<HashMap<ItemId, QueueTail>>>,
}

impl EntityQueues {
    /// Takes the next place in line for `id`. The position is fixed here,
    /// not when the slot is first awaited.
    pub(crate) fn enqueue(&self, id: ItemId) -> QueueSlot {
        let (release, released) = oneshot::channel();
        let mut tails = self.tails.lock().unwrap_or_else(PoisonError::into_inner);
        let tail = tails.entry(id).or_insert(QueueTail {
            depth: 0,
            released: None,
        });
        tail.depth += 1;
        let predecessor = tail.released.replace(released);
        QueueSlot {
            id,
            predecessor,
            release: Some(release),
            queues: self.clone(),
        }
    }

    pub(crate) fn phase(&self, id: ItemId) -> EntityPhase {
        if self.queued(id) > 0 {
            EntityPhase::Pending
        } else {
            EntityPhase::Idle
        }
    }

    pub(crate) fn queued(&self, id: ItemId) -> usize {
        self.tails
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map_or(0, |tail| tail.depth)
    }

    fn release(&self, id: ItemId) {
        let mut tails = self.tails.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tail) = tails.get_mut(&id) {
            tail.depth = tail.depth.saturating_sub(1);
            if tail.depth == 0 {
                tails.remove(&id);
            }
        }
    }
}

/// A place in an entity's queue. Dropping it, whether after completion or
/// because the owning future was abandoned, lets the next slot move up.
///
/// A slot dropped before its turn hands whatever it was waiting on to its
/// successor, so an abandoned request in the middle of the line never lets
/// the next one overtake the request still running in front of it.
pub(crate) struct QueueSlot {
    id: ItemId,
    predecessor: Option<oneshot::Receiver<Handoff>>,
    release: Option<oneshot::Sender<Handoff>>,
    queues: EntityQueues,
}

impl QueueSlot {
    /// Resolves once every earlier slot for the same id has been released.
    pub(crate) async fn ready(&mut self) {
        while let Some(predecessor) = self.predecessor.as_mut() {
            // A closed sender means the predecessor finished its turn.
            self.predecessor = match predecessor.await {
                Ok(Handoff(next)) => next,
                Err(_) => None,
            };
        }
    }
}

impl Drop for QueueSlot {
    fn drop(&mut self) {
        if let (Some(waiting_on), Some(release)) = (self.predecessor.take(), self.release.take()) {
            // The successor may be gone as well; nothing is waiting then.
            let _ = release.send(Handoff(Some(waiting_on)));
        }
        self.queues.release(self.id);
    }
}

use crate::config::{
    BLOCK_INTERVAL_MILLIS, SYNC_CHUNK_SIZE, SYNC_CHUNK_TIMEOUT_SECS, SYNC_IN_FLIGHT_PER_PEER,
    SYNC_PEER_CHUNK_BUDGET, SYNC_ROUND_SIZE, SYNC_UNFIT_COOLDOWN_SECS,
};
use arcadia_common::{block::BlockNum, time::TimestampMillis};
use log::{debug, info, warn};
use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

// A contiguous range of block numbers fetched as one unit
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Chunk {
    pub start: BlockNum,
    pub end: BlockNum,
}

impl Chunk {
    pub fn contains(&self, num: BlockNum) -> bool {
        self.start <= num && num <= self.end
    }
}

// Snapshot of one candidate peer, taken when scheduling
#[derive(Clone, Copy, Debug)]
pub struct PeerCandidate {
    pub id: u64,
    pub lib_num: BlockNum,
    pub rtt_ns: i64,
}

// An assignment the caller must turn into a SyncRequest
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Assignment {
    pub peer_id: u64,
    pub chunk: Chunk,
}

struct InFlight {
    chunk: Chunk,
    peer_id: u64,
    next_expected: BlockNum,
    last_progress: Instant,
}

#[derive(Default)]
struct PeerSyncStats {
    in_flight: usize,
    budget: u32,
    consecutive_fails: u32,
    unfit_until: Option<Instant>,
}

// Outcome of feeding one block into the controller
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BlockProgress {
    // block was not part of any assigned chunk
    Unsolicited,
    InChunk,
    ChunkComplete,
}

// Partitions the missing block range into chunks, keeps a bounded number
// in flight across eligible peers and reassigns on stall or peer loss.
// Pure state machine: all I/O stays with the caller.
pub struct SyncController {
    // highest peer LIB observed when sync started
    target: BlockNum,
    pending: VecDeque<Chunk>,
    in_flight: Vec<InFlight>,
    stats: HashMap<u64, PeerSyncStats>,
    active: bool,
}

impl SyncController {
    pub fn new() -> Self {
        Self {
            target: 0,
            pending: VecDeque::new(),
            in_flight: Vec::new(),
            stats: HashMap::new(),
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn target(&self) -> BlockNum {
        self.target
    }

    // A node enters cluster sync when a peer's irreversible chain is ahead
    // of our head and our head is stale by more than half a production
    // round
    pub fn should_sync(
        our_head: BlockNum,
        head_time: TimestampMillis,
        now: TimestampMillis,
        peer_lib: BlockNum,
    ) -> bool {
        peer_lib > our_head
            && now.saturating_sub(head_time) > BLOCK_INTERVAL_MILLIS * SYNC_ROUND_SIZE / 2
    }

    // Partition [our_head + 1, target] into chunks. Extends the target on
    // repeated calls while a sync is running.
    pub fn start(&mut self, our_head: BlockNum, target: BlockNum) {
        let from = if self.active {
            if target <= self.target {
                return;
            }
            self.target + 1
        } else {
            info!(
                "entering sync mode: head {} behind cluster lib {}",
                our_head, target
            );
            our_head + 1
        };

        let mut start = from;
        while start <= target {
            let end = target.min(start + SYNC_CHUNK_SIZE - 1);
            self.pending.push_back(Chunk { start, end });
            start = end + 1;
        }
        self.target = target;
        self.active = true;
    }

    // Schedule as many chunks as the in-flight policy allows.
    // Eligible peers must hold the chunk (lib >= end) and be neither
    // unfit nor out of budget. Least-loaded wins, RTT breaks ties.
    pub fn schedule(&mut self, candidates: &[PeerCandidate], now: Instant) -> Vec<Assignment> {
        let mut assignments = Vec::new();
        if !self.active {
            return assignments;
        }

        let eligible: Vec<_> = candidates
            .iter()
            .filter(|candidate| {
                let stats = self.stats.entry(candidate.id).or_insert_with(|| {
                    PeerSyncStats {
                        budget: SYNC_PEER_CHUNK_BUDGET,
                        ..Default::default()
                    }
                });
                match stats.unfit_until {
                    Some(until) if until > now => false,
                    _ => true,
                }
            })
            .copied()
            .collect();

        if eligible.is_empty() {
            return assignments;
        }

        let depth_target = eligible.len() * SYNC_IN_FLIGHT_PER_PEER;
        while self.in_flight.len() < depth_target {
            let Some(chunk) = self.pending.front().copied() else {
                break;
            };

            // least loaded peer able to serve the chunk, lowest RTT on ties
            let best = eligible
                .iter()
                .filter(|candidate| candidate.lib_num >= chunk.end)
                .filter(|candidate| {
                    let stats = &self.stats[&candidate.id];
                    (stats.in_flight as u32) < stats.budget.max(1)
                })
                .min_by_key(|candidate| {
                    (self.stats[&candidate.id].in_flight, candidate.rtt_ns)
                });

            let Some(peer) = best else {
                break;
            };

            self.pending.pop_front();
            self.stats
                .get_mut(&peer.id)
                .expect("stats entry created above")
                .in_flight += 1;
            self.in_flight.push(InFlight {
                chunk,
                peer_id: peer.id,
                next_expected: chunk.start,
                last_progress: now,
            });
            assignments.push(Assignment {
                peer_id: peer.id,
                chunk,
            });
        }

        assignments
    }

    // Feed a block received from a peer during sync
    pub fn on_block(&mut self, peer_id: u64, num: BlockNum, now: Instant) -> BlockProgress {
        let Some(index) = self
            .in_flight
            .iter()
            .position(|entry| entry.peer_id == peer_id && entry.chunk.contains(num))
        else {
            return BlockProgress::Unsolicited;
        };

        let entry = &mut self.in_flight[index];
        entry.last_progress = now;
        if num >= entry.next_expected {
            entry.next_expected = num + 1;
        }

        if num == entry.chunk.end {
            let entry = self.in_flight.swap_remove(index);
            if let Some(stats) = self.stats.get_mut(&entry.peer_id) {
                stats.in_flight = stats.in_flight.saturating_sub(1);
                stats.consecutive_fails = 0;
            }
            debug!(
                "chunk [{}..={}] completed by peer {}",
                entry.chunk.start, entry.chunk.end, entry.peer_id
            );
            return BlockProgress::ChunkComplete;
        }
        BlockProgress::InChunk
    }

    // Requeue chunks that made no progress within the timeout
    pub fn on_tick(&mut self, now: Instant) -> usize {
        let timeout = Duration::from_secs(SYNC_CHUNK_TIMEOUT_SECS);
        let mut requeued = 0;
        let mut index = 0;
        while index < self.in_flight.len() {
            if now.duration_since(self.in_flight[index].last_progress) >= timeout {
                let entry = self.in_flight.swap_remove(index);
                warn!(
                    "chunk [{}..={}] timed out on peer {}, requeueing",
                    entry.chunk.start, entry.chunk.end, entry.peer_id
                );
                self.penalize(entry.peer_id, now);
                // refetch the whole chunk: partial progress is not trusted
                self.pending.push_front(entry.chunk);
                requeued += 1;
            } else {
                index += 1;
            }
        }
        requeued
    }

    // A peer disconnected or sent GoAway: requeue everything it carried
    pub fn on_peer_failed(&mut self, peer_id: u64, now: Instant) -> usize {
        let mut requeued = 0;
        let mut index = 0;
        while index < self.in_flight.len() {
            if self.in_flight[index].peer_id == peer_id {
                let entry = self.in_flight.swap_remove(index);
                self.pending.push_front(entry.chunk);
                requeued += 1;
            } else {
                index += 1;
            }
        }
        if requeued > 0 {
            self.penalize(peer_id, now);
        }
        requeued
    }

    pub fn peer_in_flight(&self, peer_id: u64) -> usize {
        self.in_flight
            .iter()
            .filter(|entry| entry.peer_id == peer_id)
            .count()
    }

    // Completion check: the head reached the target and nothing is
    // outstanding. Resets the controller when true.
    pub fn try_complete(&mut self, our_head: BlockNum) -> bool {
        if !self.active {
            return false;
        }
        if our_head >= self.target && self.in_flight.is_empty() && self.pending.is_empty() {
            info!("sync complete at head {}", our_head);
            self.active = false;
            self.pending.clear();
            self.stats.clear();
            self.target = 0;
            return true;
        }
        false
    }

    fn penalize(&mut self, peer_id: u64, now: Instant) {
        let stats = self.stats.entry(peer_id).or_insert_with(|| PeerSyncStats {
            budget: SYNC_PEER_CHUNK_BUDGET,
            ..Default::default()
        });
        stats.in_flight = stats.in_flight.saturating_sub(1);
        stats.budget = (stats.budget / 2).max(1);
        stats.consecutive_fails += 1;
        // two consecutive failed assignments put the peer on cooldown
        if stats.consecutive_fails >= 2 {
            stats.unfit_until = Some(now + Duration::from_secs(SYNC_UNFIT_COOLDOWN_SECS));
            warn!("peer {} marked sync-unfit for cooldown", peer_id);
        }
    }
}

impl Default for SyncController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: u64, lib_num: BlockNum) -> PeerCandidate {
        PeerCandidate {
            id,
            lib_num,
            rtt_ns: 1_000,
        }
    }

    #[test]
    fn test_should_sync_trigger() {
        let stale = BLOCK_INTERVAL_MILLIS * SYNC_ROUND_SIZE / 2 + 1;
        assert!(SyncController::should_sync(10, 1_000, 1_000 + stale, 20));
        // not lagging in blocks
        assert!(!SyncController::should_sync(20, 1_000, 1_000 + stale, 20));
        // head is fresh
        assert!(!SyncController::should_sync(10, 1_000, 1_001, 20));
    }

    #[test]
    fn test_partition_into_chunks() {
        let mut controller = SyncController::new();
        controller.start(0, 250);
        let assignments = controller.schedule(&[candidate(1, 250)], Instant::now());
        // one peer allows SYNC_IN_FLIGHT_PER_PEER chunks in flight
        assert_eq!(assignments.len(), SYNC_IN_FLIGHT_PER_PEER);
        assert_eq!(
            assignments[0].chunk,
            Chunk {
                start: 1,
                end: SYNC_CHUNK_SIZE
            }
        );
        assert_eq!(
            assignments[1].chunk,
            Chunk {
                start: SYNC_CHUNK_SIZE + 1,
                end: SYNC_CHUNK_SIZE * 2
            }
        );
    }

    #[test]
    fn test_balanced_assignment() {
        let mut controller = SyncController::new();
        controller.start(0, 1_000);
        let peers = [candidate(1, 1_000), candidate(2, 1_000)];
        let assignments = controller.schedule(&peers, Instant::now());
        assert_eq!(assignments.len(), 2 * SYNC_IN_FLIGHT_PER_PEER);
        let to_first = assignments.iter().filter(|a| a.peer_id == 1).count();
        let to_second = assignments.iter().filter(|a| a.peer_id == 2).count();
        assert_eq!(to_first, to_second);
    }

    #[test]
    fn test_rtt_tie_break() {
        let mut controller = SyncController::new();
        controller.start(0, SYNC_CHUNK_SIZE);
        let fast = PeerCandidate {
            id: 1,
            lib_num: SYNC_CHUNK_SIZE,
            rtt_ns: 10,
        };
        let slow = PeerCandidate {
            id: 2,
            lib_num: SYNC_CHUNK_SIZE,
            rtt_ns: 10_000,
        };
        // single chunk: the faster peer wins the tie on load
        let assignments = controller.schedule(&[slow, fast], Instant::now());
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].peer_id, 1);
    }

    #[test]
    fn test_peer_without_range_not_assigned() {
        let mut controller = SyncController::new();
        controller.start(0, SYNC_CHUNK_SIZE);
        // peer's lib is below the chunk end: cannot serve it
        let assignments =
            controller.schedule(&[candidate(1, SYNC_CHUNK_SIZE - 1)], Instant::now());
        assert!(assignments.is_empty());
    }

    #[test]
    fn test_chunk_completion() {
        let mut controller = SyncController::new();
        controller.start(0, 10);
        let now = Instant::now();
        let assignments = controller.schedule(&[candidate(1, 10)], now);
        assert_eq!(assignments.len(), 1);

        for num in 1..=9 {
            assert_eq!(controller.on_block(1, num, now), BlockProgress::InChunk);
        }
        assert_eq!(controller.on_block(1, 10, now), BlockProgress::ChunkComplete);
        assert!(controller.try_complete(10));
        assert!(!controller.is_active());
    }

    #[test]
    fn test_head_never_decreases_requirement() {
        let mut controller = SyncController::new();
        controller.start(5, 10);
        // completion requires reaching at least the start target
        assert!(!controller.try_complete(5));
        assert!(!controller.try_complete(9));
    }

    #[test]
    fn test_timeout_requeues_to_other_peer() {
        let mut controller = SyncController::new();
        controller.start(0, SYNC_CHUNK_SIZE);
        let start = Instant::now();
        let assignments = controller.schedule(&[candidate(1, SYNC_CHUNK_SIZE)], start);
        assert_eq!(assignments.len(), 1);

        // partial progress, then silence: blocks 1..=99 of [1..=100]
        for num in 1..SYNC_CHUNK_SIZE {
            controller.on_block(1, num, start);
        }
        let late = start + Duration::from_secs(SYNC_CHUNK_TIMEOUT_SECS + 1);
        assert_eq!(controller.on_tick(late), 1);

        // the chunk moves to another peer
        let assignments = controller.schedule(
            &[candidate(1, SYNC_CHUNK_SIZE), candidate(2, SYNC_CHUNK_SIZE)],
            late,
        );
        assert!(assignments.iter().any(|a| a.peer_id == 2
            && a.chunk
                == Chunk {
                    start: 1,
                    end: SYNC_CHUNK_SIZE
                }));

        // completing on the second peer finishes the sync
        for num in 1..=SYNC_CHUNK_SIZE {
            controller.on_block(2, num, late);
        }
        assert!(controller.try_complete(SYNC_CHUNK_SIZE));
    }

    #[test]
    fn test_two_consecutive_fails_mark_unfit() {
        let mut controller = SyncController::new();
        controller.start(0, SYNC_CHUNK_SIZE * 4);
        let now = Instant::now();

        let first = controller.schedule(&[candidate(1, SYNC_CHUNK_SIZE * 4)], now);
        assert!(!first.is_empty());

        // first failed assignment: requeued, still eligible
        controller.on_peer_failed(1, now);
        let second = controller.schedule(&[candidate(1, SYNC_CHUNK_SIZE * 4)], now);
        assert!(!second.is_empty());

        // second consecutive failure puts the peer on cooldown
        controller.on_peer_failed(1, now);
        let assignments = controller.schedule(&[candidate(1, SYNC_CHUNK_SIZE * 4)], now);
        assert!(assignments.is_empty());

        // after the cooldown it becomes eligible again
        let later = now + Duration::from_secs(SYNC_UNFIT_COOLDOWN_SECS + 1);
        let assignments = controller.schedule(&[candidate(1, SYNC_CHUNK_SIZE * 4)], later);
        assert!(!assignments.is_empty());
    }

    #[test]
    fn test_budget_halved_on_failure() {
        let mut controller = SyncController::new();
        controller.start(0, SYNC_CHUNK_SIZE * 20);
        let now = Instant::now();

        controller.schedule(&[candidate(1, SYNC_CHUNK_SIZE * 20)], now);
        controller.on_peer_failed(1, now);

        let stats = &controller.stats[&1];
        assert_eq!(stats.budget, SYNC_PEER_CHUNK_BUDGET / 2);
    }

    #[test]
    fn test_extend_target_while_active() {
        let mut controller = SyncController::new();
        controller.start(0, SYNC_CHUNK_SIZE);
        controller.start(0, SYNC_CHUNK_SIZE * 2);
        assert_eq!(controller.target(), SYNC_CHUNK_SIZE * 2);
        // a lower target does not shrink an active sync
        controller.start(0, SYNC_CHUNK_SIZE);
        assert_eq!(controller.target(), SYNC_CHUNK_SIZE * 2);
    }
}

// Deadlock detection for transactions.
//
// Rebuilds the waits-for graph from the lock manager's queues on every
// detection cycle (never persisted, never fed incrementally), searches it
// for cycles via DFS starting from ascending transaction ids, and aborts
// the highest-id transaction in each cycle found until the graph is
// acyclic.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{info, warn};

use crate::common::TransactionId;

use super::lock_manager::{LockManager, TransactionTable};
use super::types::TransactionState;

#[derive(Debug, Clone, Copy)]
pub struct DeadlockDetectorConfig {
    pub interval: Duration,
    pub enabled: bool,
}

impl Default for DeadlockDetectorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(50),
            enabled: true,
        }
    }
}

/// Background worker that periodically breaks lock-wait cycles.
pub struct DeadlockDetector {
    enabled: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DeadlockDetector {
    pub fn start(
        lock_manager: Arc<LockManager>,
        txns: TransactionTable,
        config: DeadlockDetectorConfig,
    ) -> Self {
        let enabled = Arc::new(AtomicBool::new(config.enabled));
        let running = Arc::new(AtomicBool::new(true));
        let enabled_thread = enabled.clone();
        let running_thread = running.clone();
        let interval = config.interval;

        let handle = thread::spawn(move || {
            info!("deadlock detector started");
            while running_thread.load(Ordering::Relaxed) {
                thread::sleep(interval);
                if !enabled_thread.load(Ordering::Relaxed) {
                    continue;
                }
                run_cycle_detection(&lock_manager, &txns);
            }
            info!("deadlock detector stopped");
        });

        Self {
            enabled,
            running,
            handle: Some(handle),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    /// Stops the background thread and joins it.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// One detection cycle: rebuild the waits-for graph from the lock
/// manager's current queues, repeatedly abort the highest-id transaction
/// in any cycle found, until the graph is acyclic. Exposed standalone so
/// tests can drive a cycle deterministically without waiting on the
/// background thread's sleep interval.
pub(super) fn run_cycle_detection(lock_manager: &LockManager, txns: &TransactionTable) {
    let edges = lock_manager.waits_for_edges();
    let mut graph = build_graph(&edges);

    while let Some(cycle) = find_cycle(&graph) {
        let victim = *cycle.iter().max().unwrap();
        warn!(victim, cycle = ?cycle, "deadlock detected, aborting victim");
        if let Some(txn) = txns.lock().get_mut(&victim) {
            txn.state = TransactionState::Aborted;
        }
        lock_manager.wake_waiter(victim);
        remove_node(&mut graph, victim);
    }
}

fn build_graph(edges: &[(TransactionId, TransactionId)]) -> HashMap<TransactionId, Vec<TransactionId>> {
    let mut graph: HashMap<TransactionId, Vec<TransactionId>> = HashMap::new();
    for &(holder, waiter) in edges {
        graph.entry(holder).or_default().push(waiter);
        graph.entry(waiter).or_default();
    }
    graph
}

fn remove_node(graph: &mut HashMap<TransactionId, Vec<TransactionId>>, node: TransactionId) {
    graph.remove(&node);
    for neighbors in graph.values_mut() {
        neighbors.retain(|&n| n != node);
    }
}

/// DFS cycle search starting from nodes in ascending id order so victim
/// selection is deterministic across runs.
fn find_cycle(graph: &HashMap<TransactionId, Vec<TransactionId>>) -> Option<Vec<TransactionId>> {
    let mut nodes: Vec<TransactionId> = graph.keys().copied().collect();
    nodes.sort_unstable();

    let mut visited = HashSet::new();
    for start in nodes {
        if visited.contains(&start) {
            continue;
        }
        let mut stack = Vec::new();
        let mut on_stack = HashSet::new();
        if let Some(cycle) = dfs(start, graph, &mut visited, &mut stack, &mut on_stack) {
            return Some(cycle);
        }
    }
    None
}

fn dfs(
    node: TransactionId,
    graph: &HashMap<TransactionId, Vec<TransactionId>>,
    visited: &mut HashSet<TransactionId>,
    stack: &mut Vec<TransactionId>,
    on_stack: &mut HashSet<TransactionId>,
) -> Option<Vec<TransactionId>> {
    visited.insert(node);
    stack.push(node);
    on_stack.insert(node);

    if let Some(neighbors) = graph.get(&node) {
        for &next in neighbors {
            if on_stack.contains(&next) {
                let pos = stack.iter().position(|&n| n == next).unwrap();
                return Some(stack[pos..].to_vec());
            }
            if !visited.contains(&next) {
                if let Some(cycle) = dfs(next, graph, visited, stack, on_stack) {
                    return Some(cycle);
                }
            }
        }
    }

    stack.pop();
    on_stack.remove(&node);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Rid;
    use crate::transaction::types::{IsolationLevel, Transaction};
    use parking_lot::Mutex;

    fn table_with(txns: Vec<Transaction>) -> TransactionTable {
        let mut map = HashMap::new();
        for t in txns {
            map.insert(t.id, t);
        }
        Arc::new(Mutex::new(map))
    }

    #[test]
    fn find_cycle_detects_two_node_cycle() {
        let mut graph = HashMap::new();
        graph.insert(1, vec![2]);
        graph.insert(2, vec![1]);
        let cycle = find_cycle(&graph).unwrap();
        assert!(cycle.contains(&1) && cycle.contains(&2));
    }

    #[test]
    fn find_cycle_returns_none_for_acyclic_graph() {
        let mut graph = HashMap::new();
        graph.insert(1, vec![2]);
        graph.insert(2, vec![]);
        assert!(find_cycle(&graph).is_none());
    }

    #[test]
    fn cycle_detection_aborts_highest_id_victim() {
        crate::init_test_tracing();
        let txns = table_with(vec![
            Transaction::new(1, IsolationLevel::ReadCommitted),
            Transaction::new(2, IsolationLevel::ReadCommitted),
        ]);
        let lock_manager = Arc::new(LockManager::new(txns.clone()));
        let k1 = Rid::new(1, 0);
        let k2 = Rid::new(2, 0);

        lock_manager.lock_exclusive(1, k1).unwrap();
        lock_manager.lock_exclusive(2, k2).unwrap();

        // T1 waits on K2 (held by T2); T2 waits on K1 (held by T1). Neither
        // call returns on this thread since both block, so stage the
        // waiting requests directly via separate threads and give them
        // time to park before running detection.
        let lm1 = lock_manager.clone();
        let lm2 = lock_manager.clone();
        let h1 = std::thread::spawn(move || lm1.lock_shared(1, k2));
        let h2 = std::thread::spawn(move || lm2.lock_shared(2, k1));
        std::thread::sleep(Duration::from_millis(30));

        run_cycle_detection(&lock_manager, &txns);

        let r1 = h1.join().unwrap();
        let r2 = h2.join().unwrap();
        // T2 is the youngest (highest id) in the {1, 2} cycle and is
        // aborted; T1 proceeds once T2's wait is broken.
        assert!(r2.is_err());
        assert!(r1.is_ok());
    }
}

// Proof-of-work miner
//
// N worker threads search nonces over a shared, replaceable work template.
// A version counter tells workers their snapshot is stale; found blocks
// are emitted over a channel so the work mutex is never held while the
// chain processes a result.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::chain::{meets_pow_target, Mempool};
use crate::core::Block;

/// Nonce steps between periodic work refreshes (picks up new mempool
/// transactions)
const WORK_REFRESH_STEPS: u32 = 100_000;

/// Most mempool transactions included per candidate block
const MAX_TEMPLATE_TXS: usize = 100;

/// Nonce range offset per worker so threads search disjoint ranges
const NONCE_STAGGER: u32 = 100_000_000;

/// Pause after a successful find; rate-limits block publication
const PUBLISH_CADENCE: Duration = Duration::from_secs(15);

/// How often the cadence sleep polls the stop flag
const CADENCE_POLL: Duration = Duration::from_millis(200);

/// Nonce steps between stop-flag checks in the hot loop
const STOP_CHECK_STEPS: u32 = 1_000;

struct MinerShared {
    work: Mutex<Block>,
    work_version: AtomicU64,
    running: AtomicBool,
    mempool: Arc<Mempool>,
}

/// Multi-threaded nonce search over a replaceable template
pub struct Miner {
    shared: Arc<MinerShared>,
    found_tx: Sender<Block>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Miner {
    /// Create a miner with an initial work template. The returned receiver
    /// yields every block whose header meets the work target.
    pub fn new(template: Block, mempool: Arc<Mempool>) -> (Self, Receiver<Block>) {
        let (found_tx, found_rx) = mpsc::channel();
        let miner = Self {
            shared: Arc::new(MinerShared {
                work: Mutex::new(template),
                work_version: AtomicU64::new(0),
                running: AtomicBool::new(false),
                mempool,
            }),
            found_tx,
            workers: Mutex::new(Vec::new()),
        };
        (miner, found_rx)
    }

    /// Start `num_threads` workers. Does nothing when already running.
    pub fn start(&self, num_threads: usize) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut workers = self.workers.lock().unwrap();
        for thread_id in 0..num_threads {
            let shared = self.shared.clone();
            let found = self.found_tx.clone();
            workers.push(thread::spawn(move || {
                mine_worker(shared, found, thread_id as u32)
            }));
        }
    }

    /// Replace the work template; workers pick it up on their next refresh
    pub fn update_work(&self, template: Block) {
        let mut work = self.shared.work.lock().unwrap();
        *work = template;
        self.shared.work_version.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Signal all workers to exit and join them
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        let mut workers = self.workers.lock().unwrap();
        for worker in workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for Miner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn mine_worker(shared: Arc<MinerShared>, found: Sender<Block>, thread_id: u32) {
    log::info!("miner thread {} started", thread_id);

    // u64::MAX marks the snapshot stale; the version counter starts at 0
    let mut my_version = u64::MAX;
    let mut work: Option<Block> = None;
    let mut nonce_counter: u32 = 0;

    while shared.running.load(Ordering::SeqCst) {
        let current_version = shared.work_version.load(Ordering::SeqCst);
        if work.is_none() || my_version != current_version || nonce_counter >= WORK_REFRESH_STEPS {
            let version_changed = my_version != current_version;
            let mut block = shared.work.lock().unwrap().clone();
            my_version = current_version;
            nonce_counter = 0;

            // Fill the candidate from the current mempool snapshot
            for tx in shared
                .mempool
                .transactions()
                .into_iter()
                .take(MAX_TEMPLATE_TXS)
            {
                block.vtx.push(tx);
            }
            block.header.merkle_root = Block::compute_merkle_root(&block.vtx);

            // Stagger nonce ranges across threads, but only when the work
            // actually changed - periodic refreshes keep the template start
            if version_changed {
                block.header.nonce = thread_id.wrapping_mul(NONCE_STAGGER);
            }
            work = Some(block);
        }

        let block = work.as_mut().expect("work snapshot initialized above");
        let hash = block.header.hash();
        if meets_pow_target(&hash) {
            log::info!("miner thread {} found block {}", thread_id, hash);
            if found.send(block.clone()).is_err() {
                break;
            }

            // Publication cadence: hold off before starting the next
            // search, polling the stop flag
            let start = Instant::now();
            while shared.running.load(Ordering::SeqCst) && start.elapsed() < PUBLISH_CADENCE {
                thread::sleep(CADENCE_POLL);
            }

            // Force a refresh so the next search anchors on fresh work
            my_version = u64::MAX;
            continue;
        }

        block.header.nonce = block.header.nonce.wrapping_add(1);
        nonce_counter += 1;

        if nonce_counter % STOP_CHECK_STEPS == 0 {
            if !shared.running.load(Ordering::SeqCst) {
                break;
            }
            thread::yield_now();
        }
    }

    log::info!("miner thread {} stopped", thread_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::genesis::{configured_genesis, create_block_template};
    use crate::chain::validate_block;
    use crate::constants::{BLOCK_REWARD, MINT_TAG, RESERVE_ADDRESS};
    use crate::core::{Transaction, TxIn, TxOut};

    /// Drive one worker until it finds a block. Each attempt installs a
    /// fresh template (new timestamp, bumped version) so a worker that
    /// exhausted an unlucky nonce window gets a new search space.
    fn mine_one(template_parent: crate::core::Hash256, mempool: Arc<Mempool>) -> Block {
        let base = create_block_template(template_parent, 1_800_000_000, BLOCK_REWARD, RESERVE_ADDRESS);
        let (miner, found_rx) = Miner::new(base.clone(), mempool);
        miner.start(1);

        for attempt in 1..=20u32 {
            if let Ok(block) = found_rx.recv_timeout(Duration::from_secs(5)) {
                miner.stop();
                return block;
            }
            let mut retry = base.clone();
            retry.header.timestamp = retry.header.timestamp.wrapping_add(attempt);
            miner.update_work(retry);
        }
        miner.stop();
        panic!("miner did not converge");
    }

    #[test]
    fn test_miner_convergence() {
        let genesis = configured_genesis();
        let parent = genesis.header.hash();
        let block = mine_one(parent, Arc::new(Mempool::new()));

        let hash = block.header.hash();
        assert!(meets_pow_target(&hash));
        assert_eq!(block.header.prev_block, parent);
        // Single coinbase: merkle root is its hash
        assert_eq!(block.vtx.len(), 1);
        assert_eq!(block.header.merkle_root, block.vtx[0].hash());
        // And the result extends the chain cleanly
        assert!(validate_block(&block, Some(&parent)).is_ok());
    }

    #[test]
    fn test_miner_includes_mempool_transactions() {
        let mempool = Arc::new(Mempool::new());
        let mint = Transaction::new(
            vec![TxIn::coinbase(MINT_TAG.to_vec())],
            vec![TxOut::new(1_000, b"AURrecipient".to_vec())],
        );
        assert!(mempool.add_transaction(mint.clone()));

        let genesis = configured_genesis();
        let block = mine_one(genesis.header.hash(), mempool);

        assert_eq!(block.vtx.len(), 2);
        assert_eq!(block.vtx[1], mint);
        assert_eq!(
            block.header.merkle_root,
            Block::compute_merkle_root(&block.vtx)
        );
    }

    #[test]
    fn test_start_is_idempotent_and_stop_joins() {
        let template = create_block_template(
            configured_genesis().header.hash(),
            1_800_000_000,
            BLOCK_REWARD,
            RESERVE_ADDRESS,
        );
        let (miner, _found_rx) = Miner::new(template, Arc::new(Mempool::new()));

        miner.start(2);
        assert!(miner.is_running());
        miner.start(2); // no second worker pool
        assert_eq!(miner.workers.lock().unwrap().len(), 2);

        miner.stop();
        assert!(!miner.is_running());
        assert!(miner.workers.lock().unwrap().is_empty());
    }

    #[test]
    fn test_update_work_bumps_version() {
        let template = create_block_template(
            configured_genesis().header.hash(),
            1_800_000_000,
            BLOCK_REWARD,
            RESERVE_ADDRESS,
        );
        let (miner, _found_rx) = Miner::new(template.clone(), Arc::new(Mempool::new()));

        assert_eq!(miner.shared.work_version.load(Ordering::SeqCst), 0);
        miner.update_work(template);
        assert_eq!(miner.shared.work_version.load(Ordering::SeqCst), 1);
    }
}

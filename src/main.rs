// Aurelis node entrypoint

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;

use aurelis_node::chain::genesis::{configured_genesis, create_block_template};
use aurelis_node::constants::{
    BLOCK_DATA_FILE, BLOCK_REWARD, DEFAULT_P2P_PORT, DEFAULT_RPC_PORT, RESERVE_ADDRESS,
};
use aurelis_node::core::address;
use aurelis_node::{BlockChain, Mempool, Miner, P2PServer, RpcServer};

#[derive(Parser)]
#[command(name = "aurelis-node")]
#[command(about = "Aurelis blockchain node", version)]
struct Cli {
    /// JSON-RPC listen port
    #[arg(long, default_value_t = DEFAULT_RPC_PORT)]
    rpc_port: u16,

    /// P2P listen port
    #[arg(long, default_value_t = DEFAULT_P2P_PORT)]
    p2p_port: u16,

    /// Miner worker threads
    #[arg(long, default_value_t = 2)]
    miner_threads: usize,

    /// Directory holding the block log
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,
}

fn print_banner() {
    println!("============================================");
    println!("      Aurelis Blockchain Node v0.1.0        ");
    println!("      (c) 2026 Republic of Aurelis          ");
    println!("============================================");
}

fn unix_time() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as u32)
        .unwrap_or(0)
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    print_banner();
    log::info!("initializing aurelis node");

    let genesis = configured_genesis();
    log::info!(
        "genesis block configured, reward to {} (2500 AUC)",
        RESERVE_ADDRESS
    );

    let chain = Arc::new(BlockChain::new(cli.data_dir.join(BLOCK_DATA_FILE)));
    log::info!("loading blockchain from disk");
    chain.load_chain();
    if chain.height() == -1 {
        chain.add_block(&genesis);
    }
    let mempool = Arc::new(Mempool::new());
    log::info!(
        "blockchain and mempool initialized at height {}",
        chain.height()
    );

    let rpc = RpcServer::new(cli.rpc_port, chain.clone(), mempool.clone());
    if let Err(err) = rpc.start() {
        log::error!("rpc server failed to start on port {}: {}", cli.rpc_port, err);
    }

    let p2p = P2PServer::new(cli.p2p_port);
    if let Err(err) = p2p.start() {
        log::error!("p2p server failed to start on port {}: {}", cli.p2p_port, err);
    }

    log::info!(
        "sample address: {}",
        address::from_pubkey_hash(&[0xab; 20])
    );

    // First mining template, anchored on the current tip
    let template = create_block_template(
        chain.best_hash(),
        unix_time(),
        BLOCK_REWARD,
        RESERVE_ADDRESS,
    );
    let (miner, found_blocks) = Miner::new(template, mempool.clone());
    miner.start(cli.miner_threads);
    log::info!(
        "miner started with {} threads; node initialization complete",
        cli.miner_threads
    );

    // Found blocks drive the chain forward; this loop doubles as the
    // process keepalive
    while let Ok(block) = found_blocks.recv() {
        let hash = block.header.hash();
        log::info!("new block mined: {}", hash);

        if chain.add_block(&block) {
            log::info!("block added to chain, new height: {}", chain.height());

            // Confirmed transactions leave the mempool
            mempool.remove_transactions(&block.vtx);

            // Hand the workers fresh work on top of the new tip
            let next = create_block_template(hash, unix_time(), BLOCK_REWARD, RESERVE_ADDRESS);
            miner.update_work(next);
        }
    }

    miner.stop();
    p2p.stop();
    rpc.stop();
}

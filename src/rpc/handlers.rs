// RPC method dispatch
//
// Every method runs under one dispatch mutex that serializes access to the
// chain and mempool. Lookups that miss return plain result strings, never
// errors.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::chain::{BlockChain, Mempool};
use crate::constants::{COIN, MINT_TAG};
use crate::core::{Hash256, Serializable, Transaction, TxIn, TxOut};

/// Everything a handler needs
pub struct RpcContext {
    pub chain: Arc<BlockChain>,
    pub mempool: Arc<Mempool>,
    dispatch_lock: Mutex<()>,
}

impl RpcContext {
    pub fn new(chain: Arc<BlockChain>, mempool: Arc<Mempool>) -> Self {
        Self {
            chain,
            mempool,
            dispatch_lock: Mutex::new(()),
        }
    }
}

/// Route a parsed (method, params) pair to its handler
pub fn dispatch(ctx: &RpcContext, method: &str, params: &[Value]) -> Value {
    let _guard = ctx.dispatch_lock.lock().unwrap();
    log::debug!("rpc: dispatch '{}' with {} params", method, params.len());

    match method {
        "echo" => json!("Aurelis Node is Alive"),
        "getblockcount" => json!(ctx.chain.height() as i64),
        "getbestblockhash" => get_best_block_hash(ctx),
        "getblockchaininfo" => get_blockchain_info(ctx),
        "getmininginfo" => get_mining_info(ctx),
        "getmempoolinfo" => json!({ "size": ctx.mempool.len() as i64 }),
        "getblock" => get_block(ctx, params),
        "gettransaction" => get_transaction(ctx, params),
        "getaddressbalance" => get_address_balance(ctx, params),
        "getaddresstransactions" => get_address_transactions(ctx, params),
        "mint" => mint(ctx, params),
        "transfer" => transfer(ctx, params),
        "getproposals" => get_proposals(),
        "sendrawtransaction" => send_raw_transaction(ctx, params),
        _ => json!("Method not found"),
    }
}

fn get_best_block_hash(ctx: &RpcContext) -> Value {
    if ctx.chain.height() < 0 {
        return json!("");
    }
    json!(ctx.chain.best_hash().to_hex())
}

fn get_blockchain_info(ctx: &RpcContext) -> Value {
    let height = ctx.chain.height() as i64;
    json!({
        "blocks": height,
        "bestblockhash": ctx.chain.best_hash().to_hex(),
        "moneysupply": (height + 1) * 2500,
    })
}

fn get_mining_info(ctx: &RpcContext) -> Value {
    json!({
        "blocks": ctx.chain.height() as i64,
        "difficulty": 1.0,
        "networkhashps": 0,
        "chain": "main",
    })
}

fn get_block(ctx: &RpcContext, params: &[Value]) -> Value {
    let Some(param) = params.first() else {
        return json!("Missing block hash/height");
    };

    let block = if let Some(text) = param.as_str() {
        if text.len() != 64 {
            return json!("Invalid hash format");
        }
        match Hash256::from_hex(text) {
            Ok(hash) => ctx.chain.get_block(&hash),
            Err(_) => return json!("Invalid hash format"),
        }
    } else if let Some(height) = param.as_i64() {
        ctx.chain.get_block_by_height(height as i32)
    } else {
        return json!("Missing block hash/height");
    };

    let Some(block) = block else {
        return json!("Block not found");
    };

    let hash = block.header.hash();
    let height = ctx
        .chain
        .get_index(&hash)
        .map(|index| index.height as i64)
        .unwrap_or(-1);
    let confirmations = ctx.chain.height() as i64 - height + 1;
    let txids: Vec<String> = block.vtx.iter().map(|tx| tx.hash().to_hex()).collect();

    json!({
        "hash": hash.to_hex(),
        "confirmations": confirmations,
        "size": 100,
        "height": height,
        "version": block.header.version as i64,
        "merkleroot": block.header.merkle_root.to_hex(),
        "tx": txids,
        "time": block.header.timestamp as i64,
        "nonce": block.header.nonce as i64,
        "bits": block.header.bits as i64,
        "difficulty": 1.0,
        "previousblockhash": block.header.prev_block.to_hex(),
    })
}

fn get_transaction(ctx: &RpcContext, params: &[Value]) -> Value {
    let Some(txid_str) = params.first().and_then(Value::as_str) else {
        return json!("Missing txid");
    };
    let Ok(txid) = Hash256::from_hex(txid_str) else {
        return json!("Transaction not found");
    };
    let Some((tx, block_hash)) = ctx.chain.get_transaction(&txid) else {
        return json!("Transaction not found");
    };

    let vin: Vec<Value> = tx
        .vin
        .iter()
        .map(|input| {
            json!({ "coinbase": String::from_utf8_lossy(&input.script_sig) })
        })
        .collect();

    let vout: Vec<Value> = tx
        .vout
        .iter()
        .enumerate()
        .map(|(n, out)| {
            json!({
                "value": out.value as f64 / COIN as f64,
                "n": n as i64,
                "scriptPubKey": {
                    "asm": String::from_utf8_lossy(&out.script_pubkey),
                    "hex": "",
                },
            })
        })
        .collect();

    json!({
        "txid": txid_str,
        "version": 1,
        "blockhash": block_hash.to_hex(),
        "vin": vin,
        "vout": vout,
    })
}

fn get_address_balance(ctx: &RpcContext, params: &[Value]) -> Value {
    // The address may sit anywhere in the parameter list
    let Some(address) = params.iter().find_map(Value::as_str) else {
        return json!(0);
    };
    json!(ctx.chain.get_balance(address))
}

/// Reverse-chronological activity of an address, capped at 50 entries
fn get_address_transactions(ctx: &RpcContext, params: &[Value]) -> Value {
    let target = params
        .first()
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let mut entries = Vec::new();
    let height = ctx.chain.height();

    let mut h = height;
    while h >= 0 && entries.len() < 50 {
        let Some(block) = ctx.chain.get_block_by_height(h) else {
            h -= 1;
            continue;
        };

        for tx in &block.vtx {
            let mut is_relevant = false;
            let mut is_sender = false;
            let mut received_sum: i64 = 0;
            let mut from_addr = String::new();
            let mut to_addr = String::new();

            for input in &tx.vin {
                let in_sig = String::from_utf8_lossy(&input.script_sig).into_owned();
                if in_sig == target {
                    is_sender = true;
                    is_relevant = true;
                }
                if from_addr.is_empty() {
                    from_addr = in_sig;
                }
            }

            for out in &tx.vout {
                let out_addr = String::from_utf8_lossy(&out.script_pubkey).into_owned();
                if out_addr == target {
                    is_relevant = true;
                    received_sum += out.value;
                } else if to_addr.is_empty() {
                    to_addr = out_addr;
                }
            }

            if !is_relevant || entries.len() >= 50 {
                continue;
            }

            let mut entry = serde_json::Map::new();
            entry.insert("hash".into(), json!(tx.hash().to_hex()));
            entry.insert("timestamp".into(), json!(format!("Block #{}", h)));

            if is_sender {
                let mut sent_total: i64 = 0;
                for out in &tx.vout {
                    let out_addr = String::from_utf8_lossy(&out.script_pubkey).into_owned();
                    if out_addr != target {
                        sent_total += out.value;
                        to_addr = out_addr;
                    }
                }
                entry.insert("type".into(), json!("send"));
                entry.insert("amount".into(), json!(sent_total));
                entry.insert(
                    "address".into(),
                    json!(if to_addr.is_empty() { "Self".to_string() } else { to_addr }),
                );
            } else {
                let is_mined = tx.vin.len() == 1
                    && tx.vin[0].script_sig.len() >= 4
                    && tx.vin[0].script_sig[..4] == MINT_TAG[..];
                if is_mined || h == 0 {
                    entry.insert("type".into(), json!("mined"));
                    entry.insert("address".into(), json!("Imperial Treasury"));
                } else {
                    entry.insert("type".into(), json!("receive"));
                    entry.insert(
                        "address".into(),
                        json!(if from_addr.is_empty() {
                            "Unknown".to_string()
                        } else {
                            from_addr
                        }),
                    );
                }
                entry.insert("amount".into(), json!(received_sum));
            }

            entries.push(Value::Object(entry));
        }

        h -= 1;
    }

    Value::Array(entries)
}

fn mint(ctx: &RpcContext, params: &[Value]) -> Value {
    if params.len() < 2 {
        return json!("Error: Usage 'mint <address> <amount_satoshi>'");
    }
    let target = params[0].as_str().unwrap_or("");
    let amount = params[1].as_i64().unwrap_or(0);

    let tx = Transaction::new(
        vec![TxIn::coinbase(MINT_TAG.to_vec())],
        vec![TxOut::new(amount, target.as_bytes().to_vec())],
    );

    if ctx.mempool.add_transaction(tx.clone()) {
        json!(tx.hash().to_hex())
    } else {
        json!("Error: Failed to add mint transaction to mempool")
    }
}

fn transfer(ctx: &RpcContext, params: &[Value]) -> Value {
    if params.len() < 3 {
        return json!("Error: Usage 'transfer <from> <to> <amount_satoshi>'");
    }
    let from = params[0].as_str().unwrap_or("");
    let to = params[1].as_str().unwrap_or("");
    let amount = params[2].as_i64().unwrap_or(0);

    // Greedy coin selection over the sender's unspent outputs
    let mut total: i64 = 0;
    let mut selected = Vec::new();
    for (outpoint, utxo) in ctx.chain.get_utxos(from) {
        total += utxo.out.value;
        selected.push(outpoint);
        if total >= amount {
            break;
        }
    }

    if total < amount {
        return json!("Error: Insufficient balance");
    }

    let mut vin = Vec::with_capacity(selected.len());
    for outpoint in selected {
        // No real signing: the scriptSig carries the sender address bytes
        vin.push(TxIn::new(
            outpoint.hash,
            outpoint.n,
            from.as_bytes().to_vec(),
        ));
    }

    let mut vout = vec![TxOut::new(amount, to.as_bytes().to_vec())];
    if total > amount {
        vout.push(TxOut::new(total - amount, from.as_bytes().to_vec()));
    }

    let tx = Transaction::new(vin, vout);
    if ctx.mempool.add_transaction(tx.clone()) {
        json!(tx.hash().to_hex())
    } else {
        json!("Error: Failed to add transfer to mempool")
    }
}

fn get_proposals() -> Value {
    json!([
        {
            "id": "1",
            "title": "Imperial Library Endowment",
            "status": "Active",
            "votes": "14,205",
            "end": "3 days left",
        },
        {
            "id": "2",
            "title": "Expand P2P Network capacity",
            "status": "Active",
            "votes": "8,421",
            "end": "5 days left",
        },
    ])
}

fn send_raw_transaction(ctx: &RpcContext, params: &[Value]) -> Value {
    let Some(hex_str) = params.first().and_then(Value::as_str) else {
        return json!("No hex provided");
    };

    let data = match hex::decode(hex_str) {
        Ok(data) => data,
        Err(err) => return json!(format!("Error: {}", err)),
    };
    let tx = match Transaction::deserialize(&data) {
        Ok(tx) => tx,
        Err(err) => return json!(format!("Error: {}", err)),
    };

    if ctx.mempool.add_transaction(tx.clone()) {
        json!(tx.hash().to_hex())
    } else {
        json!("Transaction rejected (invalid or exists)")
    }
}

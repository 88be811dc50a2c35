use std::io::Read;

use clap::{Parser, Subcommand};
use ethrex_rlp::decode::RLPDecode;
use shutter_common::{
    types::{
        DecryptedPayload, LatestSigner, Signer, Transaction, TransactionData, TxExtension,
    },
    utils::decode_hex,
};
use tracing::{Level, debug, info};

pub const VERSION_STRING: &str = env!("CARGO_PKG_VERSION");
pub const BINARY_NAME: &str = env!("CARGO_BIN_NAME");

#[derive(Parser)]
#[command(name=BINARY_NAME, author, version=VERSION_STRING, about = "Inspect encrypted mempool transactions", long_about = None)]
pub struct ShtxCLI {
    #[arg(
        long = "log.level",
        default_value_t = Level::INFO,
        value_name = "LOG_LEVEL",
        env = "SHTX_LOG_LEVEL",
        global = true,
        help = "The verbosity level used for logs.",
        long_help = "Possible values: info, debug, trace, warn, error"
    )]
    pub log_level: Level,
    #[command(subcommand)]
    command: ShtxCommand,
}

#[derive(Subcommand)]
enum ShtxCommand {
    #[command(about = "Decode a JSON transaction record and print its canonical encoding.")]
    DecodeJson {
        #[arg(help = "Path to the JSON record, `-` reads stdin.")]
        path: String,
        #[arg(
            long,
            env = "CHAIN_ID",
            required = false,
            help = "Chain id used to recover the sender of signed transactions"
        )]
        chain_id: Option<u64>,
    },
    #[command(about = "Decode a canonically encoded transaction and print its JSON record.")]
    DecodeRaw {
        #[arg(help = "0x prefixed hex of the canonical encoding.")]
        hex: String,
    },
    #[command(about = "Decode a decrypted payload and print it as JSON.")]
    DecodePayload {
        #[arg(help = "0x prefixed hex of the RLP encoded payload.")]
        hex: String,
    },
}

impl ShtxCommand {
    pub fn run(self) -> eyre::Result<()> {
        match self {
            ShtxCommand::DecodeJson { path, chain_id } => {
                let input = read_input(&path)?;
                let data: TransactionData = serde_json::from_str(&input)?;
                let tx = Transaction::try_from(data)?;
                info!(tx_type = %tx.tx_type(), "Decoded transaction record");
                print_summary(&tx);
                if let Some(chain_id) = chain_id {
                    match LatestSigner::new(chain_id).sender(&tx) {
                        Ok(sender) => println!("sender:            {sender:#x}"),
                        Err(err) => println!("sender:            unavailable ({err})"),
                    }
                }
            }
            ShtxCommand::DecodeRaw { hex } => {
                let tx = Transaction::decode_canonical(&decode_hex(&hex)?)?;
                info!(tx_type = %tx.tx_type(), hash = ?tx.hash(), "Decoded canonical transaction");
                println!("{}", serde_json::to_string_pretty(&tx)?);
            }
            ShtxCommand::DecodePayload { hex } => {
                let payload = DecryptedPayload::decode(&decode_hex(&hex)?)?;
                println!("{}", serde_json::to_string_pretty(&payload)?);
            }
        }
        Ok(())
    }
}

fn read_input(path: &str) -> eyre::Result<String> {
    if path == "-" {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        return Ok(input);
    }
    debug!(path, "Reading transaction record");
    Ok(std::fs::read_to_string(path)?)
}

fn print_summary(tx: &Transaction) {
    println!("type:              {}", tx.tx_type());
    println!("hash:              {:#x}", tx.hash());
    println!("encoding:          0x{}", hex::encode(tx.encode_canonical_to_vec()));
    if let Some(chain_id) = tx.chain_id() {
        println!("chain id:          {chain_id}");
    }
    if let Some(payload) = tx.encrypted_payload() {
        println!("encrypted payload: 0x{}", hex::encode(payload));
    }
    if let Some(key) = tx.decryption_key() {
        println!("decryption key:    0x{}", hex::encode(key));
    }
    println!("batch index:       {}", tx.batch_index());
    println!("l1 block number:   {}", tx.l1_block_number());
    if let Some(timestamp) = tx.timestamp() {
        println!("timestamp:         {timestamp}");
    }
    for (index, raw) in tx.sub_transactions().iter().enumerate() {
        println!("transaction {index}:     0x{}", hex::encode(raw));
    }
}

pub fn start(cli: ShtxCLI) -> eyre::Result<()> {
    cli.command.run()
}

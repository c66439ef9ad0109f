use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};

use walletscope::analytics::interactions::InteractionConfig;
use walletscope::analytics::types::WalletAnalytics;
use walletscope::analytics::{AnalyticsConfig, AnalyticsError, WalletAnalyzer};
use walletscope::global::{read_configs, Configs};
use walletscope::logger::{self, LogTag};
use walletscope::metadata::RpcMetadataResolver;
use walletscope::rpc::RpcClient;

/// Solana wallet transaction analytics: counterparty rankings, token and NFT
/// trade classification, and average-cost realized P&L
#[derive(Parser)]
#[command(name = "walletscope", version, about)]
struct Cli {
    /// Wallet address to analyze
    wallet: String,

    /// Path to configs.json (rpc_url + rpc_fallbacks)
    #[arg(long)]
    config: Option<PathBuf>,

    /// RPC endpoint override
    #[arg(long)]
    rpc_url: Option<String>,

    /// Maximum age of transactions included, in days (0 = full history)
    #[arg(long, default_value_t = 365)]
    lookback_days: i64,

    /// Hard cap on signatures fetched
    #[arg(long)]
    max_signatures: Option<usize>,

    /// Counterparties kept in the ranking
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Transaction details fetched concurrently per batch
    #[arg(long, default_value_t = 8)]
    batch_size: usize,

    /// Delay between fetch batches, in milliseconds
    #[arg(long, default_value_t = 100)]
    batch_delay_ms: u64,

    /// Counterparty dust filter, in lamports
    #[arg(long)]
    dust_threshold: Option<u64>,

    /// Write the full result as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,

    // Debug flags are read by the logger through the arguments module;
    // declared here so clap accepts them
    #[arg(long, hide = true)]
    debug_rpc: bool,
    #[arg(long, hide = true)]
    debug_analytics: bool,
    #[arg(long, hide = true)]
    debug_metadata: bool,
    #[arg(long, hide = true)]
    debug_pnl: bool,
    #[arg(long, hide = true)]
    debug_system: bool,
    #[arg(long, hide = true)]
    verbose: bool,
}

#[derive(Tabled)]
struct CounterpartyRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Sent (SOL)")]
    sent: String,
    #[tabled(rename = "Received (SOL)")]
    received: String,
    #[tabled(rename = "Txs")]
    transactions: u32,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
}

#[derive(Tabled)]
struct TokenTradeRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Mint")]
    mint: String,
    #[tabled(rename = "Side")]
    side: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Price (SOL)")]
    price: String,
}

#[derive(Tabled)]
struct NftTradeRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Collection")]
    collection: String,
    #[tabled(rename = "Side")]
    side: String,
    #[tabled(rename = "Price (SOL)")]
    price: String,
}

#[derive(Tabled)]
struct LogRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Signature")]
    signature: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Change (SOL)")]
    change: String,
    #[tabled(rename = "Balance (SOL)")]
    balance: String,
}

fn shorten(address: &str) -> String {
    if address.len() > 12 {
        format!("{}...{}", &address[..6], &address[address.len() - 4..])
    } else {
        address.to_string()
    }
}

fn format_time_ms(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn print_report(result: &WalletAnalytics) {
    println!();
    println!("Wallet analytics for {}", result.wallet);
    println!("  Total volume:         {:.4} SOL", result.total_volume_sol);
    println!("  Unique counterparties: {}", result.unique_counterparties);
    println!("  Realized P&L:         {:+.4} SOL", result.realized_pnl_sol);
    println!("  Total profit (flow):  {:.4} SOL", result.total_profit_sol);
    println!("  Total loss (flow):    {:.4} SOL", result.total_loss_sol);
    println!("  Net balance change:   {:+.4} SOL", result.net_balance_sol);
    println!(
        "  Trades:               {} token, {} NFT",
        result.token_trades.len(),
        result.nft_trades.len()
    );
    if result.skipped_transactions > 0 {
        println!(
            "  Skipped transactions: {} (fetch/classification failures)",
            result.skipped_transactions
        );
    }

    if !result.top_counterparties.is_empty() {
        let rows: Vec<CounterpartyRow> = result
            .top_counterparties
            .iter()
            .map(|c| CounterpartyRow {
                address: shorten(&c.address),
                sent: format!("{:.4}", c.total_sent),
                received: format!("{:.4}", c.total_received),
                transactions: c.transaction_count,
                last_seen: c.last_interaction.format("%Y-%m-%d").to_string(),
            })
            .collect();
        println!("\nTop counterparties by SOL sent:");
        println!("{}", Table::new(rows).with(Style::modern()));
    }

    if !result.token_trades.is_empty() {
        let rows: Vec<TokenTradeRow> = result
            .token_trades
            .iter()
            .take(15)
            .map(|t| TokenTradeRow {
                time: format_time_ms(t.timestamp_ms),
                mint: shorten(&t.mint),
                side: format!("{:?}", t.side),
                amount: format!("{:.4}", t.amount),
                price: format!("{:.4}", t.price_sol),
            })
            .collect();
        println!("\nToken trades (latest {}):", rows.len());
        println!("{}", Table::new(rows).with(Style::modern()));
    }

    if !result.nft_trades.is_empty() {
        let rows: Vec<NftTradeRow> = result
            .nft_trades
            .iter()
            .take(15)
            .map(|t| NftTradeRow {
                time: format_time_ms(t.timestamp_ms),
                collection: t.collection.clone(),
                side: format!("{:?}", t.side),
                price: format!("{:.4}", t.price_sol),
            })
            .collect();
        println!("\nNFT trades (latest {}):", rows.len());
        println!("{}", Table::new(rows).with(Style::modern()));
    }

    if !result.transaction_log.is_empty() {
        let rows: Vec<LogRow> = result
            .transaction_log
            .iter()
            .take(20)
            .map(|entry| LogRow {
                time: entry.timestamp.format("%Y-%m-%d %H:%M").to_string(),
                signature: logger::format_signature_short(&entry.signature),
                kind: entry.kind.to_string(),
                change: format!("{:+.4}", entry.balance_change_sol),
                balance: format!("{:.4}", entry.post_balance_sol),
            })
            .collect();
        println!("\nTransaction log (latest {}):", rows.len());
        println!("{}", Table::new(rows).with(Style::modern()));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut configs = match &cli.config {
        Some(path) => read_configs(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?,
        None => Configs::default(),
    };
    if let Some(url) = &cli.rpc_url {
        configs.rpc_url = url.clone();
    }

    logger::log(
        LogTag::System,
        "START",
        &format!("walletscope using endpoint {}", configs.rpc_url),
    );

    let rpc = Arc::new(RpcClient::from_configs(&configs));
    let resolver = Arc::new(RpcMetadataResolver::new(rpc.clone()));

    let mut config = AnalyticsConfig {
        max_signatures: cli.max_signatures,
        lookback_days: (cli.lookback_days > 0).then_some(cli.lookback_days),
        detail_batch_size: cli.batch_size,
        batch_delay_ms: cli.batch_delay_ms,
        top_counterparties: cli.top,
        ..AnalyticsConfig::default()
    };
    if let Some(threshold) = cli.dust_threshold {
        config.interaction = InteractionConfig {
            dust_threshold_lamports: threshold,
        };
    }

    let analyzer = WalletAnalyzer::new(rpc, resolver, config);

    let abort = analyzer.abort_flag();
    ctrlc::set_handler(move || {
        abort.cancel();
    })
    .context("failed to install interrupt handler")?;

    let mut progress = analyzer.progress_receiver();
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {percent}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let bar_handle = bar.clone();
    let progress_task = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let fraction = *progress.borrow();
            bar_handle.set_position((fraction * 100.0) as u64);
            if fraction >= 1.0 {
                break;
            }
        }
    });

    let result = analyzer.analyze(&cli.wallet).await;
    bar.finish_and_clear();
    progress_task.abort();

    let result = match result {
        Ok(result) => result,
        Err(AnalyticsError::Cancelled) => {
            logger::warning(LogTag::System, "analysis cancelled by user");
            return Ok(());
        }
        Err(e) => return Err(anyhow::anyhow!(e)),
    };

    print_report(&result);

    if let Some(path) = &cli.json {
        let json =
            serde_json::to_string_pretty(&result).context("failed to serialize result")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        logger::log(
            LogTag::System,
            "EXPORT",
            &format!("result written to {}", path.display()),
        );
    }

    Ok(())
}

// ============================================================================
// BBC Wallet - Point d'entrée
// ============================================================================
// Wallet éducatif pour le token BigBlackCoin (BBC) sur un nœud local
//
// Usage :
//   bbcwallet                     tableau de bord (Ctrl-C pour quitter)
//   bbcwallet send <to> <amount>  envoie des BBC et affiche le hash
//
// CONCEPTS RUST CLÉS :
// 1. #[tokio::main] : le runtime async enveloppe tout le programme
// 2. tokio::select! : attend plusieurs sources d'événements à la fois
// 3. Arc<dyn Trait> : les collaborateurs (Chain, stockage) sont injectés
// ============================================================================

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, error, info, warn};

use bbcwallet::api::{format_market_cap, format_percent, MarketClient, TRACKED_COINS};
use bbcwallet::config::{Config, DeploymentInfo};
use bbcwallet::models::{CoinMarket, Currency, GlobalMarketData};
use bbcwallet::utils::{
    format_address, format_currency, format_units, is_valid_address, parse_units, shorten_hash,
    time_ago,
};
use bbcwallet::wallet::{
    spawn_provider_watcher, Chain, FileStorage, JsonRpcChain, KeyValueStore, WalletState,
    WalletStore,
};

/// Nombre de transactions récentes affichées dans le résumé
const RECENT_TRANSACTIONS: usize = 5;

// ============================================================================
// Logging
// ============================================================================

/// Initialise le système de logging
///
/// Les logs vont dans un fichier (./logs/bbcwallet.log) pour ne pas se mêler
/// à la sortie du tableau de bord.
fn init_logging() -> Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_dir = std::path::PathBuf::from("./logs");
    std::fs::create_dir_all(&log_dir).context("Échec de la création du répertoire de logs")?;

    // Rotation quotidienne : bbcwallet.log.2024-01-15
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir.clone(), "bbcwallet.log");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .with(
            // RUST_LOG=bbcwallet=trace pour plus de détails
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bbcwallet=debug,info".into()),
        )
        .init();

    info!(?log_dir, "Logging initialisé");
    Ok(())
}

// ============================================================================
// Point d'entrée du programme
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    info!("BBC Wallet starting");

    let config = Config::load()?;

    // Sans fichier de déploiement le wallet démarre quand même : balances BBC
    // et taux restent simplement inconnus
    let deployment = match DeploymentInfo::load(&config.deployment_path) {
        Ok(deployment) => deployment,
        Err(e) => {
            warn!(error = %e, "No deployment info, contracts unknown");
            println!("⚠ {:#}", e);
            DeploymentInfo::default()
        }
    };

    let chain: Arc<dyn Chain> = Arc::new(JsonRpcChain::from_config(&config)?);
    let storage: Arc<dyn KeyValueStore> =
        Arc::new(FileStorage::open(config.resolved_storage_path())?);
    let store = Arc::new(WalletStore::new(chain.clone(), storage, deployment));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.as_slice() {
        [] => run_dashboard(&config, chain, store).await,
        [command, to, amount] if command == "send" => send(&store, to, amount).await,
        _ => bail!("Usage : bbcwallet [send <to> <amount>]"),
    };

    if let Err(e) = &result {
        error!(error = %e, "Exited with error");
    }
    info!("BBC Wallet stopped");
    result
}

// ============================================================================
// Commande : send
// ============================================================================

/// Valide la saisie puis envoie les BBC
///
/// Le store ne valide rien lui-même : adresse, montant et solde sont
/// vérifiés ici, comme le ferait le formulaire d'envoi.
async fn send(store: &WalletStore, to: &str, amount: &str) -> Result<()> {
    if !is_valid_address(to) {
        bail!("Adresse de destination invalide : {}", to);
    }

    store.connect().await?;
    let state = store.snapshot();

    let value = parse_units(amount, state.token.decimals)?;
    if value.is_zero() {
        bail!("Le montant doit être supérieur à zéro");
    }
    if value > state.token_balance {
        bail!(
            "Solde insuffisant : {} {} disponibles",
            format_units(state.token_balance, state.token.decimals),
            state.token.symbol
        );
    }

    store.estimate_gas(to, amount).await;
    let estimate = store.snapshot();
    if !estimate.estimated_gas.is_zero() {
        println!(
            "Gas estimé : {} ({} gwei)",
            estimate.estimated_gas,
            format_units(estimate.gas_price, 9)
        );
    }

    let hash = store.send_token(to, amount).await?;
    println!("✓ Transaction envoyée : {}", hash);

    print_wallet(&store.snapshot());
    Ok(())
}

// ============================================================================
// Tableau de bord
// ============================================================================

/// Boucle principale : marché, wallet, événements provider, reçus en attente
///
/// CONCEPT RUST : tokio::select!
/// - Chaque branche est une source d'événements
/// - La première prête est exécutée, les autres attendent le tour suivant
async fn run_dashboard(
    config: &Config,
    chain: Arc<dyn Chain>,
    store: Arc<WalletStore>,
) -> Result<()> {
    let market = MarketClient::from_config(&config.market)?;

    if let Err(e) = store.connect().await {
        println!("⚠ Wallet non connecté : {}", e);
    }

    let (watcher, mut events) = spawn_provider_watcher(chain, config.watch_interval());
    let mut market_tick = tokio::time::interval(config.market.refresh_interval());
    let mut pending_tick = tokio::time::interval(config.watch_interval());
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = market_tick.tick() => {
                refresh_market(&market).await;
                store.refresh_exchange_rates().await;
                store.refresh_balances().await;
                print_wallet(&store.snapshot());
            }
            Some(event) = events.recv() => {
                debug!(?event, "Provider event");
                store.handle_provider_event(event).await;
                print_wallet(&store.snapshot());
            }
            _ = pending_tick.tick() => {
                store.poll_pending().await;
            }
            _ = &mut shutdown => {
                info!("Ctrl-C received, shutting down");
                break;
            }
        }
    }

    watcher.abort();
    store.disconnect();
    Ok(())
}

/// Récupère et affiche l'aperçu du marché
///
/// Un échec (rate limit CoinGecko, réseau) est affiché mais ne stoppe pas
/// la boucle : le prochain tick réessaiera.
async fn refresh_market(market: &MarketClient) {
    let (coins, global, chart) = tokio::join!(
        market.fetch_markets(TRACKED_COINS.len() as u32),
        market.fetch_global(),
        market.fetch_market_chart(TRACKED_COINS[0], 7),
    );

    match coins {
        Ok(coins) => print_market(&coins, global.as_ref().ok()),
        Err(e) => {
            warn!(error = %e, "Market refresh failed");
            println!("⚠ Marché indisponible : {}", e);
        }
    }

    if let Ok(points) = chart {
        let low = points.iter().map(|p| p.price).fold(f64::INFINITY, f64::min);
        let high = points.iter().map(|p| p.price).fold(f64::NEG_INFINITY, f64::max);
        if !points.is_empty() {
            println!(
                "{} 7j : min {}  max {}",
                TRACKED_COINS[0],
                format_currency(low, Currency::Usd),
                format_currency(high, Currency::Usd)
            );
        }
    }
}

fn print_market(coins: &[CoinMarket], global: Option<&GlobalMarketData>) {
    println!();
    println!("══ Marché ══════════════════════════════════════════════");
    if let Some(global) = global {
        println!(
            "Capitalisation : {}  Volume 24h : {}  Dominance BTC : {}",
            format_market_cap(global.total_market_cap_usd()),
            format_market_cap(global.total_volume_usd()),
            format_percent(global.bitcoin_dominance(), 1)
        );
    }
    for coin in coins {
        println!("{}", coin.display());
    }
}

fn print_wallet(state: &WalletState) {
    println!();
    println!("══ Wallet ══════════════════════════════════════════════");

    let Some(address) = state.address else {
        println!("Non connecté");
        if let Some(error) = &state.error {
            println!("Erreur : {}", error);
        }
        return;
    };

    println!("Adresse : {}", format_address(&address.to_string()));
    println!(
        "{} : {}  ({})",
        state.token.symbol,
        format_units(state.token_balance, state.token.decimals),
        format_currency(state.token_in_currency(), state.selected_currency)
    );
    println!("ETH : {}", format_units(state.native_balance, 18));
    println!(
        "Total : {}",
        format_currency(state.balance_in_currency(), state.selected_currency)
    );

    if let Some(at) = state.balances_refreshed_at {
        println!("Balances mises à jour {}", time_ago(at.timestamp_millis()));
    }

    let stats = state.transactions.stats();
    if stats.total > 0 {
        println!(
            "Transactions : {} ({} en attente, {} échouées)",
            stats.total, stats.pending, stats.failed
        );
        for tx in state.transactions.recent(RECENT_TRANSACTIONS) {
            println!(
                "  {} {:?} {} {} {}",
                shorten_hash(&tx.hash, 6),
                tx.status,
                tx.amount,
                tx.token_symbol,
                time_ago(tx.timestamp)
            );
        }
    }

    if let Some(error) = &state.error {
        println!("Erreur : {}", error);
    }
}

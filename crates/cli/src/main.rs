//! Cart Sync CLI - drive a cart session from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Add two units to the guest cart
//! cart-cli add sku-123 --name "Dried Pineapple" --price 12.50 --quantity 2
//!
//! # Log in, merging the guest cart into the customer cart
//! cart-cli --token "$CUSTOMER_TOKEN" login
//!
//! # Change a quantity in the customer cart
//! cart-cli --token "$CUSTOMER_TOKEN" set sku-123 5
//!
//! # Show the cart
//! cart-cli show
//! ```
//!
//! # Commands
//!
//! - `show` - Print the cart
//! - `add` - Add a catalog item
//! - `set` - Set the quantity of a line
//! - `remove` - Remove a line
//! - `clear` - Empty the cart
//! - `login` - Authenticate and merge the guest cart
//! - `logout` - Return to the guest cart
//!
//! Configuration is read from the environment (see `CartSyncConfig`). A
//! token given with `--token` or `CART_API_TOKEN` logs the session in before
//! the command runs; without one the command only touches the local cart.

#![cfg_attr(not(test), forbid(unsafe_code))]

mod output;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

use cartsync_client::{
    CartService, CartSyncConfig, Credential, DirectoryStorage, HttpRemoteCart, LocalCartStore,
};
use cartsync_core::{CatalogItem, ProductRef};

const DEFAULT_LOG_FILTER: &str = "cartsync_client=info,cartsync_cli=info";

#[derive(Parser)]
#[command(name = "cart-cli")]
#[command(author, version, about = "Cart Sync CLI")]
struct Cli {
    /// Customer bearer token (overrides `CART_API_TOKEN`)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cart
    Show,
    /// Add a catalog item to the cart
    Add {
        /// Product reference
        product_ref: ProductRef,

        /// Product name shown in the cart
        #[arg(short, long)]
        name: String,

        /// Unit price, e.g. 12.50
        #[arg(short, long)]
        price: Decimal,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Image or display reference
        #[arg(long)]
        display_ref: Option<String>,
    },
    /// Set the quantity of a line
    Set {
        /// Product reference
        product_ref: ProductRef,
        /// New quantity (at least 1; use `remove` to delete a line)
        quantity: u32,
    },
    /// Remove a line
    Remove {
        /// Product reference
        product_ref: ProductRef,
    },
    /// Empty the cart
    Clear,
    /// Authenticate and merge the guest cart into the customer cart
    Login,
    /// Return to the guest cart
    Logout,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = CartSyncConfig::from_env()?;
    let credential = cli.token.map(Credential::new).or(config.credential);

    let storage = DirectoryStorage::new(&config.storage.dir).with_quota(config.storage.quota_bytes);
    let remote = HttpRemoteCart::new(&config.remote)?;
    let mut cart = CartService::from_parts(
        LocalCartStore::new(storage, config.storage.key),
        remote,
        config.remote.timeout,
    );

    match credential {
        Some(credential) => cart.login(credential).await?,
        None if matches!(cli.command, Commands::Login) => {
            return Err("login requires --token or CART_API_TOKEN".into());
        }
        None => cart.load().await?,
    }

    match cli.command {
        Commands::Show | Commands::Login => {}
        Commands::Add {
            product_ref,
            name,
            price,
            quantity,
            display_ref,
        } => {
            let item = CatalogItem {
                product_ref,
                name,
                unit_price: price,
                display_ref,
            };
            cart.add_item(item, quantity).await?;
        }
        Commands::Set {
            product_ref,
            quantity,
        } => cart.set_quantity(&product_ref, quantity).await?,
        Commands::Remove { product_ref } => cart.remove_item(&product_ref).await?,
        Commands::Clear => cart.clear().await?,
        Commands::Logout => cart.logout(),
    }

    output::print_cart(&cart.subscribe().borrow());
    Ok(())
}

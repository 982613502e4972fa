//! Opticart CLI - migrations, a terminal cart, and order administration.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations (orders and sessions)
//! opticart migrate
//!
//! # Build a cart and check out from the terminal
//! opticart cart add --product EG-AV-001 --name Aviator --price 3000 --variant "Prescription Power"
//! opticart cart show
//! opticart checkout --name "Rahim Uddin" --phone 01712345678 \
//!     --email rahim@example.com --address "House 12, Road 5, Dhanmondi"
//!
//! # Administer orders
//! opticart orders list --admin --status pending
//! opticart orders set-status 3f2a... shipped --expected processing
//! opticart orders watch --user-id U1
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` / `DATABASE_URL` - `PostgreSQL` connection string
//! - `OPTICART_DATA_DIR` - Where the terminal cart is kept (default: `.opticart`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Args, Parser, Subcommand};
use opticart_core::{Email, Identity, OrderStatus, PaymentMethod};

mod commands;

use commands::CommandError;

#[derive(Parser)]
#[command(name = "opticart")]
#[command(author, version, about = "Opticart CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage the terminal cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Place an order for the terminal cart
    Checkout(CheckoutArgs),
    /// Inspect and administer orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show cart lines and totals
    Show,
    /// Add one unit of a product
    Add {
        /// Catalog product ID
        #[arg(short, long)]
        product: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Unit price in whole currency units
        #[arg(long)]
        price: i64,

        /// Variant (e.g. lens option)
        #[arg(short, long)]
        variant: Option<String>,
    },
    /// Set a line's quantity (0 removes it)
    Set {
        /// Catalog product ID
        product: String,

        /// New quantity
        quantity: i64,

        /// Variant of the line
        #[arg(short, long)]
        variant: Option<String>,
    },
    /// Remove a line
    Remove {
        /// Catalog product ID
        product: String,

        /// Variant of the line
        #[arg(short, long)]
        variant: Option<String>,
    },
    /// Empty the cart
    Clear,
}

#[derive(Args)]
struct CheckoutArgs {
    /// Full name
    #[arg(long)]
    name: String,

    /// Bangladeshi mobile number
    #[arg(long)]
    phone: String,

    /// Contact email
    #[arg(long)]
    email: String,

    /// Shipping address
    #[arg(long)]
    address: String,

    /// Payment method (cod, bkash, card)
    #[arg(long, default_value = "cod")]
    payment: PaymentMethod,

    /// bKash wallet number
    #[arg(long)]
    wallet_number: Option<String>,

    /// bKash transaction ID
    #[arg(long)]
    transaction_id: Option<String>,

    #[command(flatten)]
    identity: IdentityArgs,
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List visible orders, newest first
    List {
        #[command(flatten)]
        identity: IdentityArgs,

        /// Only orders in this status
        #[arg(short, long)]
        status: Option<OrderStatus>,
    },
    /// Show one order's invoice
    Show {
        /// Order ID
        id: String,

        #[command(flatten)]
        identity: IdentityArgs,
    },
    /// Change an order's status (administrator action)
    SetStatus {
        /// Order ID
        id: String,

        /// New status
        status: OrderStatus,

        /// Only change it if the order is currently in this status
        #[arg(long)]
        expected: Option<OrderStatus>,
    },
    /// Follow the live order feed until interrupted
    Watch {
        #[command(flatten)]
        identity: IdentityArgs,
    },
}

/// Who the command acts as.
#[derive(Args)]
struct IdentityArgs {
    /// Act as this customer
    #[arg(long)]
    user_id: Option<String>,

    /// Email on the customer's account (matches guest orders)
    #[arg(long, requires = "user_id")]
    account_email: Option<String>,

    /// Act as an administrator
    #[arg(long, conflicts_with = "user_id")]
    admin: bool,
}

impl IdentityArgs {
    fn identity(&self) -> Result<Option<Identity>, CommandError> {
        if self.admin {
            return Ok(Some(Identity::admin(commands::CLI_ADMIN_ID)));
        }
        let Some(user_id) = &self.user_id else {
            return Ok(None);
        };
        let email = self
            .account_email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| CommandError::InvalidArgument(e.to_string()))?;
        Ok(Some(Identity::customer(user_id.as_str(), email)))
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(),
            CartAction::Add {
                product,
                name,
                price,
                variant,
            } => commands::cart::add(&product, &name, price, variant),
            CartAction::Set {
                product,
                quantity,
                variant,
            } => commands::cart::set_quantity(&product, variant.as_deref(), quantity),
            CartAction::Remove { product, variant } => {
                commands::cart::remove(&product, variant.as_deref());
            }
            CartAction::Clear => commands::cart::clear(),
        },
        Commands::Checkout(args) => {
            let identity = args.identity.identity()?;
            let details = commands::checkout::CheckoutDetails {
                name: args.name,
                phone: args.phone,
                email: args.email,
                address: args.address,
                payment: args.payment,
                wallet_number: args.wallet_number,
                transaction_id: args.transaction_id,
            };
            commands::checkout::run(details, identity.as_ref()).await?;
        }
        Commands::Orders { action } => match action {
            OrdersAction::List { identity, status } => {
                commands::orders::list(identity.identity()?.as_ref(), status).await?;
            }
            OrdersAction::Show { id, identity } => {
                commands::orders::show(&id, identity.identity()?.as_ref()).await?;
            }
            OrdersAction::SetStatus {
                id,
                status,
                expected,
            } => commands::orders::set_status(&id, status, expected).await?,
            OrdersAction::Watch { identity } => {
                commands::orders::watch(identity.identity()?.as_ref()).await?;
            }
        },
    }
    Ok(())
}

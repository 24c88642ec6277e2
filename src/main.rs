//! Storefront Checkout - command line access to the ERP backend

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_checkout::backend::types::{
    DecisionKind, Document, RateAddress, RatesRequest, ReturnLineIn, ReturnOrderCreate,
};
use storefront_checkout::checkout::cheapest;
use storefront_checkout::domain::value_objects::{PurchaseOrderId, SaleOrderId};
use storefront_checkout::{Backend, Config, HttpBackend};

#[derive(Parser, Debug)]
#[command(name = "storefront-checkout", about = "Storefront checkout client for the ERP backend")]
struct Cli {
    /// Overrides BACKEND_URL.
    #[arg(long, global = true)]
    backend_url: Option<String>,

    #[arg(long, global = true, requires = "password")]
    username: Option<String>,

    #[arg(long, global = true, requires = "username")]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List catalog items.
    Items,
    /// List vendors.
    Vendors,
    /// Show a sale order by its code.
    Order { code: String },
    /// Return every line of a confirmed sale order.
    Return {
        code: String,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Cancel a draft purchase order.
    CancelPo { id: i64 },
    /// Ask a decision service, e.g. `decide packing order=Q-0001`.
    Decide {
        kind: String,
        #[arg(value_parser = parse_pair)]
        params: Vec<(String, String)>,
    },
    /// Download a PDF document.
    Document {
        #[arg(value_enum)]
        kind: DocumentKind,
        id: i64,
        /// Defaults to the backend's file name in the current directory.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Quote shipping from the configured origin to an address.
    Rates {
        #[arg(long)]
        name: String,
        #[arg(long)]
        street: String,
        #[arg(long)]
        city: String,
        #[arg(long)]
        zip: String,
        #[arg(long)]
        country: String,
        #[arg(long, default_value = "")]
        state: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DocumentKind { SaleOrder, Shipment, Label, PurchaseOrder }

impl DocumentKind {
    fn document(self, id: i64) -> Document {
        match self {
            Self::SaleOrder => Document::SaleOrder(SaleOrderId(id)),
            Self::Shipment => Document::SaleShipment(SaleOrderId(id)),
            Self::Label => Document::SaleLabel(SaleOrderId(id)),
            Self::PurchaseOrder => Document::PurchaseOrder(PurchaseOrderId(id)),
        }
    }
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(url) = cli.backend_url {
        config.backend_url = url;
    }

    let mut backend = HttpBackend::from_config(&config)?;
    if let (Some(username), Some(password)) = (cli.username.as_deref(), cli.password.as_deref()) {
        backend.login(username, password).await.context("login failed")?;
    }
    tracing::info!(backend = %backend.base_url(), authenticated = backend.is_authenticated(), "storefront client ready");

    match cli.command {
        Command::Items => {
            for item in backend.list_items().await? {
                let price = item.sales_price.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
                let currency = item.sales_currency_code.as_deref().unwrap_or("");
                println!("{:>6}  {:<40} {:>10} {}{}", item.id, item.name, price, currency, if item.digital { "  (digital)" } else { "" });
            }
        }
        Command::Vendors => {
            for vendor in backend.list_vendors().await? {
                println!("{:>6}  {:<40} {}", vendor.id, vendor.name, vendor.email.as_deref().unwrap_or(""));
            }
        }
        Command::Return { code, reason } => {
            let order = backend.sale_order_by_code(code.trim()).await?;
            if order.lines.is_empty() {
                bail!("order {} has no lines to return", order.code);
            }
            let lines = order.lines.iter().map(|line| ReturnLineIn::whole_line(line, &reason)).collect();
            let created = backend.create_return_order(&ReturnOrderCreate::for_sale_order(&order.code, lines)).await?;
            println!("return order {} created for {}", created.return_order_id, order.code);
        }
        Command::CancelPo { id } => {
            backend.cancel_purchase_order(PurchaseOrderId(id)).await?;
            println!("purchase order {id} cancelled");
        }
        Command::Order { code } => {
            let order = backend.sale_order_by_code(code.trim()).await?;
            println!("{} #{}  {}  {}", order.code, order.id, order.status, order.partner_name.as_deref().unwrap_or(""));
            for line in &order.lines {
                let price = line.price.map(|p| p.to_string()).unwrap_or_default();
                println!("  {:>6} x {:<40} {} {}", line.quantity, line.item_name.as_deref().unwrap_or("?"), price, line.currency_code.as_deref().unwrap_or(""));
            }
        }
        Command::Decide { kind, params } => {
            let kind: DecisionKind = kind.parse().map_err(anyhow::Error::msg)?;
            let decision = backend.decide(kind, &params).await?;
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Command::Document { kind, id, out } => {
            let document = kind.document(id);
            let bytes = backend.download_document(document).await?;
            if !bytes.starts_with(b"%PDF") {
                bail!("backend did not return a PDF for {}", document.path());
            }
            let path = out.unwrap_or_else(|| PathBuf::from(document.file_name()));
            tokio::fs::write(&path, &bytes).await.with_context(|| format!("writing {}", path.display()))?;
            println!("{} ({} bytes)", path.display(), bytes.len());
        }
        Command::Rates { name, street, city, zip, country, state } => {
            let request = RatesRequest {
                from_address: config.ship_from.clone(),
                to_address: RateAddress { name, street1: street, city, state, zip, country, ..Default::default() },
            };
            let rates = backend.shipping_rates(&request).await?;
            let default = cheapest(&rates);
            for (i, rate) in rates.iter().enumerate() {
                let marker = if Some(i) == default { "*" } else { " " };
                println!(
                    "{marker} {i:>2}  {:<12} {:<24} {:>10} {}  {}",
                    rate.provider_id, rate.service_level, rate.amount, rate.currency, rate.duration_terms.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use pyrhouse_client::{
    catalog::{CatalogApi, HttpCatalogClient},
    config::{self, ClientConfig},
    models::{ItemCodeMatch, StockLine, User},
    transfers::{
        ConfirmationSnapshot, RowFailure, RowKind, RowOutcome, SearchCoordinator, SearchOutcome,
        SubmissionCoordinator, TransferDraft,
    },
};
use serde::Serialize;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize()?;

    match cli.command {
        Commands::Lookup(args) => handle_lookup(&context, args, cli.json).await?,
        Commands::Search(args) => handle_search(&context, args, cli.json).await?,
        Commands::Stocks(args) => handle_stocks(&context, args, cli.json).await?,
        Commands::Users => handle_users(&context, cli.json).await?,
        Commands::Transfer(args) => handle_transfer(&context, args, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "pyrhouse",
    about = "PyrHouse CLI for composing and submitting transfers",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that an item code exists and can be transferred
    Lookup(LookupArgs),
    /// Search item codes of a location by prefix
    Search(SearchArgs),
    /// List stock lines of a location
    Stocks(StocksArgs),
    /// List users that can take part in a transfer
    Users,
    /// Compose, confirm and submit a transfer
    Transfer(TransferArgs),
}

#[derive(Args)]
struct LookupArgs {
    #[arg(help = "Item code to validate")]
    code: String,
}

#[derive(Args)]
struct SearchArgs {
    #[arg(long, help = "Location to search in")]
    location: i64,
    #[arg(help = "Item code prefix (at least 2 characters)")]
    query: String,
}

#[derive(Args)]
struct StocksArgs {
    #[arg(long, help = "Location whose stock lines to list")]
    location: i64,
}

#[derive(Args)]
struct TransferArgs {
    #[arg(long, help = "Source location")]
    from: i64,
    #[arg(long, help = "Destination location")]
    to: Option<i64>,
    #[arg(long = "code", help = "Item code to ship; repeatable")]
    codes: Vec<String>,
    #[arg(
        long = "stock",
        value_parser = parse_stock_arg,
        help = "Stock line and quantity as STOCK_ID:QTY; repeatable"
    )]
    stocks: Vec<StockArg>,
    #[arg(long = "user", help = "Participating user id; repeatable")]
    users: Vec<i64>,
    #[arg(
        long,
        short = 'y',
        action = ArgAction::SetTrue,
        help = "Submit without asking for confirmation"
    )]
    yes: bool,
    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Submit even when some --code values did not resolve"
    )]
    allow_partial: bool,
}

#[derive(Clone, Copy, Debug)]
struct StockArg {
    stock_id: i64,
    quantity: i64,
}

fn parse_stock_arg(value: &str) -> Result<StockArg, String> {
    let (id, quantity) = value
        .split_once(':')
        .ok_or_else(|| format!("expected STOCK_ID:QTY, got '{}'", value))?;
    let stock_id = id
        .trim()
        .parse()
        .map_err(|_| format!("invalid stock id '{}'", id))?;
    let quantity = quantity
        .trim()
        .parse()
        .map_err(|_| format!("invalid quantity '{}'", quantity))?;
    Ok(StockArg { stock_id, quantity })
}

struct CliContext {
    config: ClientConfig,
    catalog: HttpCatalogClient,
}

impl CliContext {
    fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load client config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let catalog =
            HttpCatalogClient::from_config(&config).context("failed to build API client")?;
        debug!(api = %config.api_base_url, "CLI context ready");

        Ok(Self { config, catalog })
    }
}

async fn handle_lookup(context: &CliContext, args: LookupArgs, json: bool) -> Result<()> {
    let lookup = context
        .catalog
        .validate_item_code(args.code.trim())
        .await
        .map_err(|e| anyhow!(e.user_message()))
        .with_context(|| format!("item code {} cannot be transferred", args.code))?;

    if json {
        print_json(&lookup)?;
    } else {
        println!("{} • asset {} • {}", args.code, lookup.id, lookup.category);
    }
    Ok(())
}

async fn handle_search(context: &CliContext, args: SearchArgs, json: bool) -> Result<()> {
    let mut search = SearchCoordinator::new();
    let outcome = search
        .search(&context.catalog, &args.query, args.location, &[])
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    match outcome {
        SearchOutcome::Cleared => bail!("query must hold at least 2 characters"),
        SearchOutcome::Rejected => bail!("query may only contain letters, digits and '-'"),
        SearchOutcome::Stale | SearchOutcome::Updated(_) => {}
    }

    if json {
        print_json(&search.suggestions())?;
    } else if search.suggestions().is_empty() {
        println!("No item codes match '{}'", args.query);
    } else {
        search.suggestions().iter().for_each(render_match);
    }
    Ok(())
}

async fn handle_stocks(context: &CliContext, args: StocksArgs, json: bool) -> Result<()> {
    let lines = context
        .catalog
        .fetch_stock_lines(args.location)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    if json {
        print_json(&lines)?;
    } else {
        lines.iter().for_each(render_stock_line);
    }
    Ok(())
}

async fn handle_users(context: &CliContext, json: bool) -> Result<()> {
    let users = context
        .catalog
        .fetch_users()
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    if json {
        print_json(&users)?;
    } else {
        users.iter().for_each(render_user);
    }
    Ok(())
}

async fn handle_transfer(context: &CliContext, args: TransferArgs, json: bool) -> Result<()> {
    let catalog = &context.catalog;
    let mut draft = TransferDraft::new(args.from);
    draft.set_destination(args.to);

    let unresolved = resolve_codes(&mut draft, &args.codes, catalog).await?;
    ensure_all_resolved(&unresolved, args.allow_partial)?;

    let stock_lines: Vec<StockLine> = if args.stocks.is_empty() {
        Vec::new()
    } else {
        catalog
            .fetch_stock_lines(args.from)
            .await
            .map_err(|e| anyhow!(e.user_message()))
            .context("failed to fetch stock lines of the source location")?
    };
    for stock in &args.stocks {
        let line = stock_lines
            .iter()
            .find(|line| line.id == stock.stock_id)
            .ok_or_else(|| {
                anyhow!(
                    "stock line {} is not held at location {}",
                    stock.stock_id,
                    args.from
                )
            })?;
        let rows = draft.rows_mut();
        let row = rows.add_row(RowKind::StockLine);
        rows.select_stock_line(row, line)?;
        let quantity = rows.set_quantity(row, stock.quantity)?;
        if i64::from(quantity) != stock.quantity {
            eprintln!(
                "! {} • quantity {} adjusted to {}",
                line.display_label(),
                stock.quantity,
                quantity
            );
        }
    }

    if !args.users.is_empty() {
        let known = catalog
            .fetch_users()
            .await
            .map_err(|e| anyhow!(e.user_message()))?;
        for user in &args.users {
            if !known.iter().any(|u| u.id == *user) {
                bail!("user {} does not exist", user);
            }
            draft.add_participant(*user);
        }
    }

    let mut submission = SubmissionCoordinator::from_config(&context.config);
    let snapshot = submission.request_confirmation(&draft, &stock_lines)?;
    render_snapshot(snapshot);

    if !args.yes && !prompt_confirmation()? {
        submission.cancel();
        eprintln!("Transfer cancelled");
        return Ok(());
    }

    let navigation = match submission.confirm(catalog).await {
        Ok(navigation) => navigation,
        Err(err) => {
            let message = submission
                .last_error()
                .map(|e| e.user_message())
                .unwrap_or_else(|| err.to_string());
            bail!(message);
        }
    };

    if json {
        print_json(&serde_json::json!({ "route": navigation.route() }))?;
    } else {
        println!("Transfer created: {}", navigation.route());
    }
    Ok(())
}

/// A `--code` value that did not end up as a resolved row.
#[derive(Debug, Clone, PartialEq, Eq)]
struct UnresolvedCode {
    code: String,
    reason: String,
}

async fn resolve_codes<C>(
    draft: &mut TransferDraft,
    codes: &[String],
    catalog: &C,
) -> Result<Vec<UnresolvedCode>>
where
    C: CatalogApi + ?Sized,
{
    let mut unresolved = Vec::new();
    for code in codes {
        let rows = draft.rows_mut();
        let row = rows.add_row(RowKind::ItemCode);
        rows.set_code(row, code.as_str())?;
        let reason = match rows.resolve_item_code(row, catalog).await {
            Ok(RowOutcome::Resolved { category, .. }) => {
                eprintln!("✓ {} • {}", code, category);
                continue;
            }
            Ok(RowOutcome::Failed { reason, .. }) => describe_failure(&reason),
            Ok(RowOutcome::Discarded { .. }) => "lookup result was discarded".to_string(),
            Err(err) => err.to_string(),
        };
        eprintln!("✗ {} • {}", code, reason);
        unresolved.push(UnresolvedCode {
            code: code.clone(),
            reason,
        });
    }
    Ok(unresolved)
}

fn ensure_all_resolved(unresolved: &[UnresolvedCode], allow_partial: bool) -> Result<()> {
    if unresolved.is_empty() || allow_partial {
        return Ok(());
    }
    let codes: Vec<&str> = unresolved.iter().map(|u| u.code.as_str()).collect();
    bail!(
        "{} item code(s) did not resolve: {}; fix them or pass --allow-partial",
        codes.len(),
        codes.join(", ")
    )
}

fn prompt_confirmation() -> Result<bool> {
    eprint!("Submit this transfer? [y/N] ");
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn describe_failure(reason: &RowFailure) -> String {
    match reason {
        RowFailure::NotFound => "unknown or not transferable".to_string(),
        RowFailure::Duplicate => "already in this transfer".to_string(),
        RowFailure::Lookup(category) => format!("lookup failed ({})", category),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_snapshot(snapshot: &ConfirmationSnapshot) {
    eprintln!(
        "Transfer from location {} to location {} ({} line(s), prepared {})",
        snapshot.from_location_id(),
        snapshot.to_location_id(),
        snapshot.lines().len(),
        snapshot.frozen_at().format("%Y-%m-%d %H:%M:%S")
    );
    for line in snapshot.lines() {
        match &line.code {
            Some(code) => eprintln!("  • {} • {}", code, line.label),
            None => eprintln!("  • {} x {}", line.quantity, line.label),
        }
    }
    if !snapshot.payload().users.is_empty() {
        let users: Vec<String> = snapshot
            .payload()
            .users
            .iter()
            .map(|u| u.id.to_string())
            .collect();
        eprintln!("  participants: {}", users.join(", "));
    }
}

fn render_match(found: &ItemCodeMatch) {
    println!(
        "- {} • asset {} • {} • {}",
        found.code,
        found.id,
        found.category,
        found.status.as_deref().unwrap_or("unknown")
    );
}

fn render_stock_line(line: &StockLine) {
    println!(
        "- Stock {} • {} • {} available",
        line.id,
        line.display_label(),
        line.available_quantity
    );
}

fn render_user(user: &User) {
    println!(
        "- User {} • {}{}",
        user.id,
        user.username,
        user.role
            .as_deref()
            .map(|role| format!(" ({})", role))
            .unwrap_or_default()
    );
}

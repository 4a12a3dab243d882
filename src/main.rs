use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tlc_client::{
    config::Settings,
    domain::{total_due, Capability, ContributionKind, FailureKind, PaymentResult, ReceiptHandle},
    error::{AppError, Result},
    gate::{Denial, GateDecision, ProtectedAction},
    overdue::OverdueStatus,
    payments::{CheckoutOptions, CheckoutSuccess, CheckoutUi},
    ClientContext, PaymentOutcome,
};

#[derive(Parser)]
#[command(name = "tlc", about = "TLC Library member client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and remember the session
    Login { email: String, password: String },
    /// Sign out and forget the session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Show overdue standing
    Overdue {
        #[arg(long)]
        details: bool,
    },
    /// Check whether an action is currently allowed
    Check { action: ActionArg },
    /// Make a payment
    Pay {
        #[command(subcommand)]
        payment: PayCommand,
    },
    /// Fetch the receipt for a completed payment
    Receipt { payment_id: String },
}

#[derive(Subcommand)]
enum PayCommand {
    Contribution {
        #[arg(long, value_enum, default_value = "welfare")]
        kind: KindArg,
        amount: Decimal,
    },
    Subscription { plan_id: String, amount: Decimal },
}

#[derive(Clone, Copy, ValueEnum)]
enum ActionArg {
    BookRequest,
    EducationalSupport,
    Welfare,
    Educational,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Welfare,
    Educational,
}

impl From<ActionArg> for ProtectedAction {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::BookRequest => ProtectedAction::SubmitBookRequest,
            ActionArg::EducationalSupport => ProtectedAction::ApplyEducationalSupport,
            ActionArg::Welfare => ProtectedAction::WelfareContribution,
            ActionArg::Educational => ProtectedAction::EducationalContribution,
        }
    }
}

impl From<KindArg> for ContributionKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Welfare => ContributionKind::Welfare,
            KindArg::Educational => ContributionKind::Educational,
        }
    }
}

/// Prints the order and reads back what the hosted checkout returned.
/// An empty line means the user gave up.
struct TerminalCheckout;

#[async_trait]
impl CheckoutUi for TerminalCheckout {
    async fn open(&self, options: CheckoutOptions) -> Result<CheckoutSuccess> {
        let mut stdout = tokio::io::stdout();
        let summary = serde_json::to_string_pretty(&options)
            .map_err(|e| AppError::Checkout(e.to_string()))?;
        let prompt = format!(
            "Complete payment with these checkout options:\n{}\nPayment id (blank to cancel): ",
            summary
        );
        write_prompt(&mut stdout, prompt.as_bytes()).await?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let payment_id = read_line(&mut lines).await?;
        if payment_id.trim().is_empty() {
            return Err(AppError::CheckoutCancelled);
        }

        write_prompt(&mut stdout, b"Signature: ").await?;
        let signature = read_line(&mut lines).await?;
        if signature.trim().is_empty() {
            return Err(AppError::CheckoutCancelled);
        }

        Ok(CheckoutSuccess {
            razorpay_payment_id: payment_id.trim().to_string(),
            razorpay_order_id: options.order_id,
            razorpay_signature: signature.trim().to_string(),
        })
    }
}

async fn write_prompt(stdout: &mut tokio::io::Stdout, text: &[u8]) -> Result<()> {
    stdout.write_all(text).await.map_err(|e| AppError::Checkout(e.to_string()))?;
    stdout.flush().await.map_err(|e| AppError::Checkout(e.to_string()))
}

async fn read_line(lines: &mut tokio::io::Lines<BufReader<tokio::io::Stdin>>) -> Result<String> {
    let line = lines
        .next_line()
        .await
        .map_err(|e| AppError::Checkout(e.to_string()))?;
    Ok(line.unwrap_or_default())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tlc_client=info,tlc=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    let ctx = ClientContext::from_settings(&settings, Arc::new(TerminalCheckout)).await?;

    match cli.command {
        Command::Login { email, password } => {
            ctx.session.restore().await;
            match ctx.login(&email, &password).await {
                Ok(user) => {
                    let home = if user.role.can(Capability::ManageMembers) {
                        "admin dashboard"
                    } else {
                        "member home"
                    };
                    println!("Signed in as {} ({}), continue to {}", user.email, user.role.as_str(), home);
                }
                Err(e) => println!("Login failed: {}", e.user_message()),
            }
        }
        Command::Logout => {
            ctx.session.restore().await;
            ctx.logout().await;
            println!("Signed out");
        }
        Command::Whoami => match ctx.start().await {
            Some(user) => println!("{} <{}> ({})", user.name, user.email, user.role.as_str()),
            None => println!("Not signed in"),
        },
        Command::Overdue { details } => {
            if ctx.start().await.is_none() {
                println!("Not signed in");
                return Ok(());
            }
            print_status(&ctx.overdue.status());
            if details {
                match ctx.overdue.details().await {
                    Ok(records) => {
                        for r in &records {
                            println!(
                                "  {:?} ₹{} due {} ({} days overdue, {})",
                                r.overdue_type, r.due_amount, r.due_date, r.days_overdue, r.status
                            );
                        }
                        let listed = total_due(&records);
                        if let Some(summary) = ctx.overdue.summary() {
                            if listed != summary.total_overdue_amount {
                                tracing::warn!(
                                    "Overdue details total ₹{} differs from summary total ₹{}",
                                    listed,
                                    summary.total_overdue_amount
                                );
                            }
                        }
                        println!("  Total due: ₹{}", listed);
                    }
                    Err(e) => println!("Could not load details: {}", e.user_message()),
                }
            }
        }
        Command::Check { action } => {
            ctx.start().await;
            match ctx.check_access(action.into()).await {
                GateDecision::Allow => println!("Allowed"),
                GateDecision::Deny(denial) => print_denial(&denial),
            }
        }
        Command::Pay { payment } => {
            let Some(user) = ctx.start().await else {
                println!("Not signed in");
                return Ok(());
            };
            let result = match payment {
                PayCommand::Contribution { kind, amount } => {
                    match ctx.pay_contribution(&user.id, kind.into(), amount).await {
                        PaymentOutcome::Denied(denial) => {
                            print_denial(&denial);
                            return Ok(());
                        }
                        PaymentOutcome::Completed(result) => result,
                    }
                }
                PayCommand::Subscription { plan_id, amount } => {
                    ctx.pay_subscription(&plan_id, amount).await
                }
            };
            match result {
                PaymentResult::Success { payment_id, order_id, .. } => {
                    println!("Payment successful: {} (order {})", payment_id, order_id);
                }
                PaymentResult::Failed { error, kind } => {
                    println!("Payment failed: {}", error);
                    if kind == FailureKind::Verification {
                        println!("If money was deducted, please contact support instead of paying again.");
                    }
                }
            }
        }
        Command::Receipt { payment_id } => {
            ctx.start().await;
            match ctx.receipt(&payment_id).await {
                Ok(ReceiptHandle::Url(url)) => println!("Receipt: {}", url),
                Ok(ReceiptHandle::File(path)) => println!("Receipt saved to {}", path.display()),
                Err(e) => println!("Could not get receipt: {}", e.user_message()),
            }
        }
    }

    Ok(())
}

fn print_denial(denial: &Denial) {
    println!("{}", denial.message());
    println!("Options: View Overdues / Cancel");
}

fn print_status(status: &OverdueStatus) {
    match status {
        OverdueStatus::Loaded(summary) if summary.has_overdue => {
            println!(
                "{} overdue payment(s), ₹{} total, oldest {} days{}",
                summary.overdue_count,
                summary.total_overdue_amount,
                summary.oldest_overdue_days,
                if summary.restricted_access { " - access restricted" } else { "" }
            );
        }
        OverdueStatus::Loaded(_) => println!("No overdue payments"),
        OverdueStatus::Exempt => println!("Not applicable for this account"),
        OverdueStatus::Failed => println!("Could not load overdue status"),
        OverdueStatus::NotLoaded => println!("Overdue status not loaded"),
    }
}

use clap::{Parser, Subcommand};
use console::{style, Term};
use dialoguer::Confirm;
use lndhub_wallet::{lnurl::LnurlResolver, wallet::DEFAULT_LOOKBACK_LIMIT};
use lndhubcli::cli::{self, HubOpts, PollOpts};

#[derive(Parser)]
#[command(arg_required_else_help(true))]
struct Opts {
    #[clap(flatten)]
    hub: HubOpts,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone)]
enum Command {
    /// Create a new account on the backend
    CreateAccount,

    /// Show version, backend and node info
    Info,

    /// Show the onchain deposit address
    Address,

    /// Show available balance
    Balance,

    /// Create a lightning invoice
    Invoice {
        amount: u64,
        #[arg(short, long, default_value = "")]
        memo: String,
        /// wait until the invoice is paid
        #[arg(short, long)]
        wait: bool,
        #[clap(flatten)]
        poll: PollOpts,
    },

    /// Look up an invoice by its payment hash (base64)
    Lookup {
        r_hash: String,
        #[arg(long, default_value_t = DEFAULT_LOOKBACK_LIMIT)]
        lookback: u64,
    },

    /// Wait until an invoice is paid
    Wait {
        r_hash: String,
        #[clap(flatten)]
        poll: PollOpts,
    },

    /// List invoices
    Invoices {
        #[arg(short, long, default_value_t = 20)]
        limit: u64,
        /// fetch all pages
        #[arg(short, long)]
        all: bool,
    },

    /// Pay lightning invoice
    Pay {
        invoice: String,
        /// amount in sat for invoices without an amount
        #[arg(long)]
        amount: Option<u64>,
        #[arg(short, long)]
        yes: bool,
    },

    /// Pay a lightning address (user@domain)
    PayAddress {
        address: String,
        amount: u64,
        #[arg(short, long)]
        comment: Option<String>,
        #[arg(short, long)]
        yes: bool,
    },
}

fn confirm(prompt: String, skip: bool) -> anyhow::Result<bool> {
    if skip {
        return Ok(true);
    }
    Ok(Confirm::new().with_prompt(prompt).interact()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    cli::init_tracing();

    let opts = Opts::parse();
    let term = Term::stdout();
    tracing::debug!(settings = %opts.hub.settings(), "using backend");

    let wallet = match opts.command {
        Command::CreateAccount => opts.hub.anonymous_wallet().await,
        _ => opts.hub.wallet().await,
    };
    let wallet = match wallet {
        Ok(wallet) => wallet,
        Err(err) => {
            term.write_line(&format!(
                "Error: login at {} failed: {}",
                opts.hub.url,
                style(&err).red()
            ))?;
            std::process::exit(1);
        }
    };

    let result = match opts.command {
        Command::CreateAccount => {
            let credentials = wallet.create_account().await?;
            term.write_line("Account created. Add these lines to your .env file:\n")?;
            for line in cli::env_lines(&opts.hub.url, &credentials) {
                term.write_line(&line)?;
            }
            Ok(())
        }
        Command::Info => {
            term.write_line(&format!(
                "Version: {}",
                style(env!("CARGO_PKG_VERSION")).cyan()
            ))?;
            term.write_line(&format!("Backend: {}", style(&opts.hub.url).cyan()))?;
            if wallet.is_authenticated() {
                match wallet.node_info().await {
                    Ok(info) => {
                        term.write_line(&format!("Node:\n{}", serde_pretty(&info)))?;
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            } else {
                term.write_line("Account: not configured")?;
                Ok(())
            }
        }
        Command::Address => match wallet.onchain_address().await {
            Ok(address) => {
                term.write_line(&format!("Deposit address:\n\n{address}"))?;
                term.write_line(&cli::qr_code(&format!("bitcoin:{address}"))?)?;
                Ok(())
            }
            Err(err) => Err(err),
        },
        Command::Balance => match wallet.balance().await {
            Ok(balance) => {
                term.write_line(&format!(
                    "Balance: {}",
                    style(cli::format_sats(balance)).cyan()
                ))?;
                Ok(())
            }
            Err(err) => Err(err),
        },
        Command::Invoice {
            amount,
            memo,
            wait,
            poll,
        } => {
            match wallet.create_invoice(amount, &memo).await {
                Ok(invoice) => {
                    term.write_line(&format!(
                        "Lightning invoice over {}:\n\n{}",
                        cli::format_sats(amount),
                        invoice.payment_request
                    ))?;
                    term.write_line(&cli::qr_code(&invoice.payment_request)?)?;
                    term.write_line(&format!("Payment hash: {}", style(&invoice.r_hash).cyan()))?;

                    if wait {
                        let progress_bar = cli::progress_bar()?;
                        progress_bar.set_message("Waiting for payment ...");
                        let result = wallet
                            .wait_for_payment(
                                &invoice.r_hash,
                                poll.poll_interval(),
                                DEFAULT_LOOKBACK_LIMIT,
                            )
                            .await;
                        if result.is_ok() {
                            progress_bar.finish_with_message("Invoice has been paid.\n");
                            cli::show_balance(&term, &wallet).await?;
                        } else {
                            progress_bar.abandon();
                        }
                        result.map(|_| ())
                    } else {
                        Ok(())
                    }
                }
                Err(err) => Err(err),
            }
        }
        Command::Lookup { r_hash, lookback } => match wallet.lookup_invoice(&r_hash, lookback).await {
            Ok(Some(invoice)) => {
                let status = if invoice.ispaid {
                    style("paid").green()
                } else {
                    style("unpaid").yellow()
                };
                term.write_line(&format!(
                    "{} {} {}",
                    invoice.amt.map(cli::format_sats).unwrap_or_default(),
                    status,
                    invoice.payment_request
                ))?;
                Ok(())
            }
            Ok(None) => {
                term.write_line(&format!("No invoice found for {r_hash}"))?;
                Ok(())
            }
            Err(err) => Err(err),
        },
        Command::Wait { r_hash, poll } => {
            let progress_bar = cli::progress_bar()?;
            progress_bar.set_message("Waiting for payment ...");
            let result = wallet
                .wait_for_payment(&r_hash, poll.poll_interval(), DEFAULT_LOOKBACK_LIMIT)
                .await;
            match result {
                Ok(_) => {
                    progress_bar.finish_with_message("Invoice has been paid.\n");
                    Ok(())
                }
                Err(err) => {
                    progress_bar.abandon();
                    Err(err)
                }
            }
        }
        Command::Invoices { limit, all } => {
            let invoices = if all {
                wallet.list_invoices_paginated(limit).await
            } else {
                wallet.list_invoices(limit).await
            };
            match invoices {
                Ok(invoices) if invoices.is_empty() => {
                    term.write_line("No invoices found.")?;
                    Ok(())
                }
                Ok(invoices) => {
                    for invoice in invoices {
                        let status = if invoice.ispaid { "paid" } else { "unpaid" };
                        term.write_line(&format!(
                            " - {} {} {} {}",
                            invoice.r_hash,
                            invoice.amt.map(cli::format_sats).unwrap_or_default(),
                            status,
                            invoice.memo.unwrap_or_default()
                        ))?;
                    }
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }
        Command::Pay {
            invoice,
            amount,
            yes,
        } => {
            if !confirm(format!("Pay lightning invoice {invoice}?"), yes)? {
                return Ok(());
            }
            match wallet.pay_invoice(&invoice, amount).await {
                Ok(_) => {
                    term.write_line("\nInvoice has been paid")?;
                    cli::show_balance(&term, &wallet).await?;
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }
        Command::PayAddress {
            address,
            amount,
            comment,
            yes,
        } => {
            if !confirm(
                format!("Pay {} to {address}?", cli::format_sats(amount)),
                yes,
            )? {
                return Ok(());
            }
            let resolver = LnurlResolver::default();
            match wallet
                .pay_lightning_address(&resolver, &address, amount, comment.as_deref())
                .await
            {
                Ok(_) => {
                    term.write_line(&format!("\nPaid {address}"))?;
                    cli::show_balance(&term, &wallet).await?;
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }
    };

    if let Err(err) = result {
        if !cli::explain_error(&term, &err)? {
            term.write_line(&format!("Error: {}", style(&err).red()))?;
        }
        std::process::exit(1);
    }
    Ok(())
}

fn serde_pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

//! Intake recording commands.

use caffy_core::IntakeCorrection;
use chrono::{DateTime, Utc};
use clap::Subcommand;

use super::{fmt_time, time_or_now, CmdResult, Context};

#[derive(Subcommand)]
pub enum IntakeAction {
    /// Record an intake
    Add {
        /// Amount in mg
        amount: f64,
        /// Drink name
        #[arg(long, default_value = "")]
        label: String,
        /// Intake time (RFC 3339, default: now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// List recent intakes with daily totals
    List {
        /// Days to look back (default: display.view_period_days)
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Correct the amount of a recorded intake
    Update {
        /// Intake ID
        id: i64,
        /// New amount in mg
        #[arg(long, conflicts_with_all = ["ratio", "percent"])]
        amount: Option<f64>,
        /// Keep this fraction of the recorded amount (0 < ratio <= 1)
        #[arg(long, conflicts_with = "percent")]
        ratio: Option<f64>,
        /// Keep this percentage of the recorded amount
        #[arg(long)]
        percent: Option<f64>,
    },
    /// Delete an intake
    Delete {
        /// Intake ID
        id: i64,
    },
}

pub fn run(ctx: &Context, action: IntakeAction) -> CmdResult {
    let session = ctx.open()?;
    let svc = &session.service;
    let user = session.user_id;

    match action {
        IntakeAction::Add { amount, label, at } => {
            let event = svc.record_intake(user, &label, amount, time_or_now(at))?;
            ctx.emit(&event, |e| {
                println!("Intake recorded: #{} {} mg at {}", e.id, e.amount_mg, fmt_time(e.intake_at));
            })?;
        }
        IntakeAction::List { days, at } => {
            let days = days.unwrap_or(session.config.display.view_period_days);
            let history = svc.intake_history(user, days, time_or_now(at))?;
            ctx.emit(&history, |h| {
                if h.events.is_empty() {
                    println!("No intakes in the last {days} day(s).");
                    return;
                }
                for e in &h.events {
                    let label = if e.label.is_empty() { "-" } else { e.label.as_str() };
                    println!("#{:<5} {}  {:>7.1} mg  {}", e.id, fmt_time(e.intake_at), e.amount_mg, label);
                }
                println!();
                for d in &h.daily_totals {
                    println!("{}  {:>7.1} mg  ({} intake(s))", d.date, d.total_mg, d.intake_count);
                }
                println!("Total: {:.1} mg", h.total_mg);
            })?;
        }
        IntakeAction::Update {
            id,
            amount,
            ratio,
            percent,
        } => {
            let correction = match (amount, ratio, percent) {
                (Some(mg), None, None) => IntakeCorrection::Amount(mg),
                (None, Some(r), None) => IntakeCorrection::Ratio(r),
                (None, None, Some(p)) => IntakeCorrection::Ratio(p / 100.0),
                _ => return Err("one of --amount, --ratio or --percent is required".into()),
            };
            let event = svc.correct_intake(user, id, correction)?;
            ctx.emit(&event, |e| println!("Intake #{} updated: {:.1} mg", e.id, e.amount_mg))?;
        }
        IntakeAction::Delete { id } => {
            svc.delete_intake(user, id)?;
            println!("Intake #{id} deleted");
        }
    }
    Ok(())
}

//! Read-only views: status, graph, forecast and intake budget.

use chrono::{DateTime, Duration, Utc};
use clap::Args;

use super::{fmt_time, time_or_now, CmdResult, Context};

#[derive(Args)]
pub struct StatusArgs {
    /// Evaluate at this time (RFC 3339, default: now)
    #[arg(long)]
    at: Option<DateTime<Utc>>,
}

#[derive(Args)]
pub struct GraphArgs {
    /// Days of history (default: display.view_period_days)
    #[arg(long)]
    days: Option<u32>,
    /// Minutes between samples (default: display.graph_interval_minutes)
    #[arg(long)]
    interval: Option<u32>,
    #[arg(long)]
    at: Option<DateTime<Utc>>,
}

#[derive(Args)]
pub struct PredictArgs {
    /// Hours to project (default: display.forecast_hours)
    #[arg(long)]
    hours: Option<u32>,
    #[arg(long)]
    at: Option<DateTime<Utc>>,
}

#[derive(Args)]
pub struct BudgetArgs {
    /// Target time (RFC 3339)
    #[arg(long, conflicts_with = "hours", required_unless_present = "hours")]
    until: Option<DateTime<Utc>>,
    /// Target as hours from now
    #[arg(long)]
    hours: Option<f64>,
    /// Amount allowed at the target time (default: model.sleep_threshold_mg)
    #[arg(long)]
    target_mg: Option<f64>,
    #[arg(long)]
    at: Option<DateTime<Utc>>,
}

pub fn status(ctx: &Context, args: StatusArgs) -> CmdResult {
    let session = ctx.open()?;
    let status = session
        .service
        .compute_status(session.user_id, time_or_now(args.at))?;

    ctx.emit(&status, |s| {
        let peaking = if s.is_peaking { " (still rising)" } else { "" };
        println!("Remaining:   {:.1} mg{peaking}", s.remaining_mg);
        println!("Level:       {}", s.message);
        if s.sleep_ready_at <= s.at {
            println!("Sleep:       ready now");
        } else {
            println!("Sleep:       ready at {}", fmt_time(s.sleep_ready_at));
        }
        let source = if s.is_personalized { "personal" } else { "profile" };
        println!(
            "Half-life:   {:.2} h ({source}, confidence {:.0}%)",
            s.half_life_hours,
            s.confidence * 100.0
        );
    })
}

pub fn graph(ctx: &Context, args: GraphArgs) -> CmdResult {
    let session = ctx.open()?;
    let display = &session.config.display;
    let points = session.service.compute_graph(
        session.user_id,
        args.days.unwrap_or(display.view_period_days),
        args.interval.unwrap_or(display.graph_interval_minutes),
        time_or_now(args.at),
    )?;

    ctx.emit(&points, |points| {
        let peak = points.iter().map(|p| p.remaining_mg).fold(0.0_f64, f64::max);
        for p in points {
            let width = if peak > 0.0 {
                (p.remaining_mg / peak * 40.0).round() as usize
            } else {
                0
            };
            println!(
                "{:>+7.1}h  {}  {:>7.1} mg  {}",
                p.hour_offset,
                fmt_time(p.timestamp),
                p.remaining_mg,
                "#".repeat(width)
            );
        }
    })
}

pub fn predict(ctx: &Context, args: PredictArgs) -> CmdResult {
    let session = ctx.open()?;
    let hours = args.hours.unwrap_or(session.config.display.forecast_hours);
    let prediction = session
        .service
        .predict(session.user_id, time_or_now(args.at), hours)?;

    ctx.emit(&prediction, |p| {
        println!("Half-life: {:.2} h", p.half_life_hours);
        for point in &p.points {
            println!(
                "+{:>2}h  {:>7.1} mg  {}",
                point.hours_ahead,
                point.remaining_mg,
                point.band.label()
            );
        }
        println!("Sleep ready at {}", fmt_time(p.sleep_ready_at));
    })
}

pub fn budget(ctx: &Context, args: BudgetArgs) -> CmdResult {
    let session = ctx.open()?;
    let at = time_or_now(args.at);
    let target_at = match (args.until, args.hours) {
        (Some(t), _) => t,
        (None, Some(h)) => at + Duration::milliseconds((h * 3_600_000.0).round() as i64),
        (None, None) => return Err("one of --until or --hours is required".into()),
    };
    let target_mg = args
        .target_mg
        .unwrap_or(session.config.model.sleep_threshold_mg);
    let budget = session
        .service
        .max_safe_intake(session.user_id, at, target_at, target_mg)?;

    ctx.emit(&budget, |b| {
        println!(
            "You can take up to {:.0} mg now to be at or under {:.0} mg by {}.",
            b.max_additional_mg,
            b.target_mg,
            fmt_time(b.target_at)
        );
    })
}

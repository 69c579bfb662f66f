//! Perception feedback and personal half-life learning.

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};

use super::{fmt_time, time_or_now, CmdResult, Context};

#[derive(Args)]
pub struct FeedbackArgs {
    /// Perceived alertness, 1 (sleepy) to 5 (very alert)
    level: i64,
    /// Free-form note
    #[arg(long, default_value = "")]
    note: String,
    #[arg(long)]
    at: Option<DateTime<Utc>>,
}

#[derive(Subcommand)]
pub enum LearnAction {
    /// Recalibrate the half-life from all unused feedback
    Train {
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Show the personalization state and recent changes
    Stats,
}

pub fn feedback(ctx: &Context, args: FeedbackArgs) -> CmdResult {
    let session = ctx.open()?;
    let outcome = session.service.submit_feedback(
        session.user_id,
        args.level,
        &args.note,
        time_or_now(args.at),
    )?;

    ctx.emit(&outcome, |o| {
        println!("Feedback #{} recorded", o.feedback.id);
        match &o.learning {
            Some(entry) => println!(
                "Half-life adjusted: {:.2} h -> {:.2} h",
                entry.previous_half_life.unwrap_or(entry.new_half_life),
                entry.new_half_life
            ),
            None => println!("No intake before this feedback; kept for later training."),
        }
    })
}

pub fn run(ctx: &Context, action: LearnAction) -> CmdResult {
    let session = ctx.open()?;
    let svc = &session.service;

    match action {
        LearnAction::Train { at } => {
            let entry = svc.run_batch_learning(session.user_id, time_or_now(at))?;
            ctx.emit(&entry, |entry| match entry {
                Some(e) => println!(
                    "Half-life set to {:.1} h from {} feedback event(s) (error improved {:.1}%)",
                    e.new_half_life, e.data_points_used, e.error_improvement_percent
                ),
                None => println!(
                    "Not enough unused feedback yet (need {}).",
                    session.config.learning.min_data_points
                ),
            })?;
        }
        LearnAction::Stats => {
            let stats = svc.get_learning_stats(session.user_id)?;
            ctx.emit(&stats, |s| {
                println!("Base half-life:     {:.2} h", s.base_half_life_hours);
                match s.personal_half_life_hours {
                    Some(hl) => println!("Personal half-life: {hl:.2} h"),
                    None => println!("Personal half-life: not learned yet"),
                }
                println!("In use:             {:.2} h", s.current_half_life_hours);
                println!("Confidence:         {:.0}%", s.confidence * 100.0);
                println!("Feedback:           {} learned / {} stored", s.total_feedback_count, s.feedback_count);
                println!("Phase:              {:?}", s.phase);
                if !s.recent_history.is_empty() {
                    println!();
                    for h in &s.recent_history {
                        println!(
                            "{}  {:>17}  -> {:.2} h",
                            fmt_time(h.recorded_at),
                            h.reason.as_str(),
                            h.new_half_life
                        );
                    }
                }
            })?;
        }
    }
    Ok(())
}

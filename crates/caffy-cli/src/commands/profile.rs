//! Metabolism profile commands.

use caffy_core::{Metabolism, MetabolismProfile};
use clap::Subcommand;

use super::{CmdResult, Context};

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Show the stored profile
    Show,
    /// Create or update the profile; unspecified fields keep their value
    Set {
        /// normal, fast or slow
        #[arg(long)]
        metabolism: Option<Metabolism>,
        /// Body mass in kg
        #[arg(long, conflicts_with = "clear_body_mass")]
        body_mass: Option<f64>,
        /// Forget the stored body mass
        #[arg(long)]
        clear_body_mass: bool,
        #[arg(long)]
        smoker: Option<bool>,
        #[arg(long)]
        pregnant: Option<bool>,
        /// Exercise sessions per week
        #[arg(long)]
        exercise: Option<u32>,
    },
}

pub fn run(ctx: &Context, action: ProfileAction) -> CmdResult {
    let session = ctx.open()?;
    let svc = &session.service;
    let user = session.user_id;

    match action {
        ProfileAction::Show => {
            let profile = svc.get_profile(user)?;
            ctx.emit(&profile, print_profile)?;
        }
        ProfileAction::Set {
            metabolism,
            body_mass,
            clear_body_mass,
            smoker,
            pregnant,
            exercise,
        } => {
            let mut profile = match svc.get_profile(user) {
                Ok(p) => p,
                Err(e) if e.is_not_found() => MetabolismProfile::default(),
                Err(e) => return Err(e.into()),
            };
            if let Some(m) = metabolism {
                profile.metabolism = m;
            }
            if clear_body_mass {
                profile.body_mass_kg = None;
            } else if body_mass.is_some() {
                profile.body_mass_kg = body_mass;
            }
            if let Some(s) = smoker {
                profile.is_smoker = s;
            }
            if let Some(p) = pregnant {
                profile.is_pregnant = p;
            }
            if exercise.is_some() {
                profile.exercises_per_week = exercise;
            }

            svc.save_profile(user, &profile)?;
            ctx.emit(&profile, print_profile)?;
        }
    }
    Ok(())
}

fn print_profile(p: &MetabolismProfile) {
    println!("Metabolism:  {}", p.metabolism);
    match p.body_mass_kg {
        Some(kg) => println!("Body mass:   {kg} kg"),
        None => println!("Body mass:   -"),
    }
    println!("Smoker:      {}", if p.is_smoker { "yes" } else { "no" });
    println!("Pregnant:    {}", if p.is_pregnant { "yes" } else { "no" });
    match p.exercises_per_week {
        Some(n) => println!("Exercise:    {n} / week"),
        None => println!("Exercise:    -"),
    }
}

use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

mod db;
mod effort;
mod engine;
mod models;
mod repo;
mod report;
mod roster;
mod state;

use models::ModuleRef;
use repo::EffortStateRepository;

#[derive(Parser)]
#[command(name = "effort-tracker")]
#[command(about = "Student effort scoring and at-risk tracking for FuturoPal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import homework records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
        /// Recompute effort for every student/course pair the import touched
        #[arg(long, default_value_t = false)]
        rescore: bool,
    },
    /// Recompute a student's effort score for one course
    #[command(group(
        ArgGroup::new("student")
            .args(["user", "email"])
            .required(true)
            .multiple(false)
    ))]
    Score {
        #[arg(long)]
        user: Option<Uuid>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        course: Uuid,
    },
    /// Read stored effort state, computing it first if absent
    #[command(group(
        ArgGroup::new("student")
            .args(["user", "email"])
            .required(true)
            .multiple(false)
    ))]
    Get {
        #[arg(long)]
        user: Option<Uuid>,
        #[arg(long)]
        email: Option<String>,
        /// State key of the form course:<course-id>
        #[arg(long)]
        module: String,
    },
    /// List concerned and at-risk students, worst first
    Roster {
        #[arg(long)]
        tutor_email: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a markdown effort report
    Report {
        #[arg(long)]
        tutor_email: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

async fn resolve_user(
    pool: &PgPool,
    user: Option<Uuid>,
    email: Option<&str>,
) -> anyhow::Result<Uuid> {
    match (user, email) {
        (Some(id), _) => Ok(id),
        (None, Some(email)) => db::find_user_by_email(pool, email).await,
        (None, None) => bail!("provide --user or --email"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = db::PgStore::new(pool.clone());

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv, rescore } => {
            let outcome = db::import_csv(&pool, &csv).await?;
            println!(
                "Imported {} homework records from {}.",
                outcome.records,
                csv.display()
            );
            if rescore {
                let now = Utc::now();
                for (user_id, course_id) in &outcome.touched {
                    engine::recompute(&store, &store, *user_id, *course_id, now).await?;
                }
                println!(
                    "Recomputed effort for {} student/course pairs.",
                    outcome.touched.len()
                );
            }
        }
        Commands::Score { user, email, course } => {
            let user_id = resolve_user(&pool, user, email.as_deref()).await?;
            let (score, state) =
                engine::recompute(&store, &store, user_id, course, Utc::now()).await?;

            println!(
                "Effort for {user_id} in course {course}: {} {} ({})",
                score.score,
                score.status.emoji(),
                score.status
            );
            println!("  completion rate:    {:.1}", score.completion_rate);
            println!("  average quiz score: {:.1}", score.average_quiz_score);
            println!("  streak score:       {:.1}", score.streak_score);
            println!("  needs reminder:     {}", state.needs_reminder);
        }
        Commands::Get { user, email, module } => {
            let user_id = resolve_user(&pool, user, email.as_deref()).await?;
            let module = ModuleRef::parse(&module);
            if module.as_course().is_none() {
                bail!("module must be of the form course:<course-id>");
            }
            let state = engine::get_or_compute(&store, &store, user_id, &module, Utc::now()).await?;

            println!("Effort state for {user_id} ({module}):");
            println!("  effort:          {}", state.effort);
            println!("  emoji:           {}", state.emoji);
            println!("  status:          {}", state.status);
            println!("  needs reminder:  {}", state.needs_reminder);
            println!("  last calculated: {}", state.last_calculated);
        }
        Commands::Roster { tutor_email, limit } => {
            let tutor_id = match tutor_email.as_deref() {
                Some(email) => Some(db::find_user_by_email(&pool, email).await?),
                None => None,
            };
            let entries = engine::at_risk_roster(&store, &store, tutor_id).await?;

            if entries.is_empty() {
                println!("No students below the concern threshold.");
                return Ok(());
            }

            println!("Students needing attention (worst first):");
            for entry in entries.iter().take(limit) {
                println!(
                    "- {} {} ({}) effort {} ({})",
                    entry.status.emoji(),
                    entry.user_name,
                    entry.course_name,
                    entry.effort_score,
                    entry.status
                );
            }
        }
        Commands::Report { tutor_email, out } => {
            let tutor_id = match tutor_email.as_deref() {
                Some(email) => Some(db::find_user_by_email(&pool, email).await?),
                None => None,
            };
            let entries = engine::at_risk_roster(&store, &store, tutor_id).await?;
            let rows = store.course_states().await?;
            let summaries = roster::summarize_by_status(&rows);
            let hotspots = roster::summarize_by_course(&entries);
            let report = report::build_report(
                tutor_email.as_deref(),
                Utc::now(),
                &summaries,
                &entries,
                &hotspots,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

use chrono::Utc;
use clap::Subcommand;
use focusloop_core::{Database, PersistenceGateway};
use serde_json::json;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's completions and the live streak
    Today,
    /// All-time totals
    All,
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let gateway = PersistenceGateway::new(Box::new(Database::open()?));
    let stats = gateway.load_stats();

    match action {
        StatsAction::Today => {
            let today = Utc::now().date_naive();
            let summary = json!({
                "date": today,
                "completed": stats.count_on(today),
                "streakDays": stats.streak_on(today),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        StatsAction::All => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}

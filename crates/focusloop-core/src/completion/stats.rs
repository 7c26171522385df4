use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::event::CompletionEvent;

/// Experience awarded per focused minute.
pub const XP_PER_MINUTE: u64 = 1;

/// Local aggregate of genuine Work completions.
///
/// Days are UTC calendar days of the completion timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStats {
    pub today: Option<NaiveDate>,
    pub today_count: u32,
    pub total_count: u64,
    pub total_focus_minutes: u64,
    pub streak_days: u32,
    pub last_completed_on: Option<NaiveDate>,
    pub experience: u64,
}

impl LocalStats {
    pub fn record(&mut self, event: &CompletionEvent) {
        let day = event.occurred_at().date_naive();
        let minutes = u64::from(event.duration_minutes);

        self.total_count += 1;
        self.total_focus_minutes += minutes;
        self.experience += minutes * XP_PER_MINUTE;

        // Late report for an earlier day: totals only.
        if self.last_completed_on.is_some_and(|last| day < last) {
            return;
        }

        if self.today != Some(day) {
            self.today = Some(day);
            self.today_count = 0;
        }
        self.today_count += 1;

        self.streak_days = match self.last_completed_on {
            Some(last) if last == day => self.streak_days.max(1),
            Some(last) if last.succ_opt() == Some(day) => self.streak_days + 1,
            _ => 1,
        };
        self.last_completed_on = Some(day);
    }

    /// Completions on `day`; zero once the stored day has rolled over.
    pub fn count_on(&self, day: NaiveDate) -> u32 {
        if self.today == Some(day) {
            self.today_count
        } else {
            0
        }
    }

    /// The streak as seen on `day`: still alive if the last completion was
    /// today or yesterday.
    pub fn streak_on(&self, day: NaiveDate) -> u32 {
        match self.last_completed_on {
            Some(last) if last == day || last.succ_opt() == Some(day) => self.streak_days,
            _ => 0,
        }
    }
}

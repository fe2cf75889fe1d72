//! Card Expiration Periods
//!
//! Year and month choices for the card expiration selects.

use chrono::{Datelike, Local, NaiveDate};

/// How many years past the current one a card may expire
pub const EXPIRATION_YEARS_AHEAD: i32 = 10;

/// `current_year..=current_year + 10`, ascending
pub fn expiration_years(current_year: i32) -> Vec<i32> {
    (current_year..=current_year + EXPIRATION_YEARS_AHEAD).collect()
}

/// `start_month..=12`, ascending
///
/// A start of 0 is treated as January; anything past December yields no months.
pub fn expiration_months(start_month: u32) -> Vec<u32> {
    (start_month.max(1)..=12).collect()
}

/// First month to offer for `selected_year`
///
/// In the current year months before today's are skipped; other years start in January.
pub fn start_month_for(selected_year: i32, today: NaiveDate) -> u32 {
    if selected_year == today.year() {
        today.month()
    } else {
        1
    }
}

/// Years starting from the local calendar year
pub fn expiration_years_now() -> Vec<i32> {
    expiration_years(Local::now().year())
}

/// Months to offer for `selected_year`, relative to the local date
pub fn expiration_months_for(selected_year: i32) -> Vec<u32> {
    expiration_months(start_month_for(selected_year, Local::now().date_naive()))
}

/// Months to offer for the current year
pub fn expiration_months_now() -> Vec<u32> {
    expiration_months(Local::now().month())
}

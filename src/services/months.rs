use chrono::{Datelike, NaiveDate, Utc};

use crate::error::AppError;

/// Inclusive first-to-last-day range for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub label: String,
}

impl MonthRange {
    /// Resolves an optional `YYYY-MM` token; `None` means the current UTC
    /// month. Malformed tokens are rejected rather than clamped.
    pub fn resolve(month: Option<&str>) -> Result<Self, AppError> {
        match month.map(str::trim).filter(|token| !token.is_empty()) {
            Some(token) => Self::from_token(token),
            None => {
                let today = Utc::now().date_naive();
                Self::from_year_month(today.year(), today.month())
            }
        }
    }

    fn from_token(token: &str) -> Result<Self, AppError> {
        let invalid = || AppError::BadRequest(format!("Invalid month '{token}', expected YYYY-MM."));

        let (year_text, month_text) = token.split_once('-').ok_or_else(invalid)?;
        if year_text.len() != 4 || month_text.len() != 2 {
            return Err(invalid());
        }
        let year = year_text.parse::<i32>().map_err(|_| invalid())?;
        let month = month_text.parse::<u32>().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        Self::from_year_month(year, month)
    }

    fn from_year_month(year: i32, month: u32) -> Result<Self, AppError> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| AppError::BadRequest("Invalid month.".to_string()))?;
        let first_of_next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| AppError::BadRequest("Invalid month.".to_string()))?;

        Ok(Self {
            start,
            end: first_of_next.pred_opt().unwrap_or(start),
            label: format!("{year:04}-{month:02}"),
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Month boundaries for the last `count` calendar months ending at `end`,
/// oldest first.
pub fn trailing_months(end: NaiveDate, count: u32) -> Result<Vec<MonthRange>, AppError> {
    // Zero-based month index since year 0; euclidean division keeps the
    // remainder in 0..12 for negative indexes.
    let newest = end.year() * 12 + end.month() as i32 - 1;
    let mut months = Vec::with_capacity(count as usize);
    for i in 0..count {
        let index = newest - (count - 1 - i) as i32;
        let year = index.div_euclid(12);
        let month = index.rem_euclid(12) as u32 + 1;
        months.push(MonthRange::from_year_month(year, month)?);
    }
    Ok(months)
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate};

    use super::{trailing_months, MonthRange};

    fn date(text: &str) -> NaiveDate {
        NaiveDate::parse_from_str(text, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn resolves_month_lengths_and_leap_years() {
        let feb = MonthRange::resolve(Some("2025-02")).expect("valid month");
        assert_eq!(feb.start, date("2025-02-01"));
        assert_eq!(feb.end, date("2025-02-28"));

        let leap_feb = MonthRange::resolve(Some("2024-02")).expect("valid month");
        assert_eq!(leap_feb.end, date("2024-02-29"));

        let december = MonthRange::resolve(Some("2025-12")).expect("valid month");
        assert_eq!(december.end, date("2025-12-31"));
        assert_eq!(december.label, "2025-12");
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(MonthRange::resolve(Some("2025-13")).is_err());
        assert!(MonthRange::resolve(Some("2025-00")).is_err());
        assert!(MonthRange::resolve(Some("2025-1")).is_err());
        assert!(MonthRange::resolve(Some("202502")).is_err());
        assert!(MonthRange::resolve(Some("not-a-month")).is_err());
    }

    #[test]
    fn blank_token_falls_back_to_current_month() {
        let range = MonthRange::resolve(Some("  ")).expect("current month");
        assert_eq!(range.start.day(), 1);
        assert!(range.contains(range.start));
        assert!(range.contains(range.end));
    }

    #[test]
    fn inclusive_containment() {
        let range = MonthRange::resolve(Some("2025-06")).expect("valid month");
        assert!(range.contains(date("2025-06-01")));
        assert!(range.contains(date("2025-06-30")));
        assert!(!range.contains(date("2025-05-31")));
        assert!(!range.contains(date("2025-07-01")));
    }

    #[test]
    fn trailing_months_cross_year_boundaries() {
        let months = trailing_months(date("2025-02-15"), 6).expect("valid window");
        let labels = months.iter().map(|m| m.label.as_str()).collect::<Vec<_>>();
        assert_eq!(
            labels,
            vec!["2024-09", "2024-10", "2024-11", "2024-12", "2025-01", "2025-02"]
        );
        assert_eq!(months[0].start, date("2024-09-01"));
        assert_eq!(months[5].end, date("2025-02-28"));
    }

    #[test]
    fn trailing_months_keeps_every_month_in_long_windows() {
        let months = trailing_months(date("2025-01-15"), 13).expect("valid window");
        assert_eq!(months.len(), 13);
        assert_eq!(months[0].label, "2024-01");
        assert_eq!(months[12].label, "2025-01");

        // A two-year window ending mid-year crosses two Januaries.
        let months = trailing_months(date("2025-06-30"), 24).expect("valid window");
        assert_eq!(months.len(), 24);
        assert_eq!(months[0].label, "2023-07");
        assert_eq!(months[6].label, "2024-01");
        assert_eq!(months[18].label, "2025-01");
        assert_eq!(months[23].label, "2025-06");
    }
}

//! Date formatting for passports and labels

use chrono::{Datelike, NaiveDate};

/// Zero-padded date components as printed on labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateParts {
    pub day: String,
    pub month: String,
    pub year: String,
}

impl DateParts {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            day: format!("{:02}", date.day()),
            month: format!("{:02}", date.month()),
            year: format!("{:04}", date.year()),
        }
    }
}

/// Format a production date as `«dd» mm yyyy`
pub fn format_production_date(date: NaiveDate) -> String {
    let parts = DateParts::from_date(date);
    format!("«{}» {} {}", parts.day, parts.month, parts.year)
}

/// Format a manufacture date as `dd.mm.yyyy`
pub fn format_manufacture_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Last two digits of a year, zero-padded
pub fn two_digit_year(year: i32) -> String {
    format!("{:02}", year.rem_euclid(100))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_format_production_date() {
        assert_eq!(format_production_date(date(2025, 3, 5)), "«05» 03 2025");
        assert_eq!(format_production_date(date(2024, 12, 31)), "«31» 12 2024");
    }

    #[test]
    fn test_format_manufacture_date() {
        assert_eq!(format_manufacture_date(date(2025, 1, 9)), "09.01.2025");
    }

    #[test]
    fn test_two_digit_year() {
        assert_eq!(two_digit_year(2025), "25");
        assert_eq!(two_digit_year(2100), "00");
        assert_eq!(two_digit_year(2009), "09");
    }

    #[test]
    fn test_date_parts() {
        let parts = DateParts::from_date(date(2025, 7, 1));
        assert_eq!(parts.day, "01");
        assert_eq!(parts.month, "07");
        assert_eq!(parts.year, "2025");
    }
}

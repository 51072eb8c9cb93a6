//! Day and month summaries over an owner's records
//!
//! Windows are computed in the time zone of `as_of` (local time in the CLI and
//! server), while record timestamps stay in UTC. Totals net income against
//! expense and report the magnitude.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::models::{CategoryTotals, Direction, ExpenseRecord, Summary};

/// Summarize `records` as of `as_of`
///
/// - today: records at or after local midnight of `as_of`'s day
/// - period: records at or after the first instant of `as_of`'s month
/// - breakdown: every record, keyed by category, no zero filling
///
/// Records after `as_of` are not excluded. Sums saturate at the `Decimal`
/// bounds rather than overflow.
pub fn summarize<Tz: TimeZone>(records: &[ExpenseRecord], as_of: &DateTime<Tz>) -> Summary {
    let start_of_day = start_of_day(as_of);
    let start_of_period = start_of_month(as_of);

    let mut summary = Summary::default();
    let mut today_net = Decimal::ZERO;
    let mut period_net = Decimal::ZERO;

    for record in records {
        let signed = record.signed_amount();

        if record.timestamp >= start_of_day {
            today_net = today_net.saturating_add(signed);
            summary.today_count += 1;
        }
        if record.timestamp >= start_of_period {
            period_net = period_net.saturating_add(signed);
            summary.period_count += 1;
        }

        let totals: &mut CategoryTotals = summary
            .category_breakdown
            .entry(record.category)
            .or_default();
        match record.direction {
            Direction::Expense => totals.expense = totals.expense.saturating_add(record.amount),
            Direction::Income => totals.income = totals.income.saturating_add(record.amount),
        }
    }

    summary.today_total = today_net.abs();
    summary.period_total = period_net.abs();
    summary
}

/// Midnight starting `as_of`'s local day, as a UTC instant
pub fn start_of_day<Tz: TimeZone>(as_of: &DateTime<Tz>) -> DateTime<Utc> {
    local_midnight(as_of, as_of.date_naive())
}

/// First instant of `as_of`'s local month, as a UTC instant
pub fn start_of_month<Tz: TimeZone>(as_of: &DateTime<Tz>) -> DateTime<Utc> {
    let date = as_of.date_naive();
    let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date);
    local_midnight(as_of, first)
}

/// Midnight of `date` in `as_of`'s zone
///
/// When a DST transition skips midnight, the first valid instant of the day
/// is used; when midnight is ambiguous, the earlier one.
fn local_midnight<Tz: TimeZone>(as_of: &DateTime<Tz>, date: NaiveDate) -> DateTime<Utc> {
    let tz = as_of.timezone();
    let mut naive = date.and_time(chrono::NaiveTime::MIN);

    // At most a couple of hours are ever skipped
    for _ in 0..4 {
        if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
            return dt.with_timezone(&Utc);
        }
        naive += chrono::Duration::minutes(30);
    }

    // Unreachable for real zones; fall back to treating the naive time as UTC
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use chrono::{FixedOffset, LocalResult, NaiveDateTime};
    use rust_decimal_macros::dec;

    fn record(
        direction: Direction,
        amount: Decimal,
        category: Category,
        timestamp: DateTime<Utc>,
    ) -> ExpenseRecord {
        ExpenseRecord {
            id: 0,
            owner_id: "u1".into(),
            direction,
            amount,
            items: vec![],
            category,
            raw_text: "test".into(),
            timestamp,
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_windowing_example() {
        let as_of = utc(2024, 3, 15, 10, 0);
        let records = vec![
            record(Direction::Expense, dec!(100), Category::Food, utc(2024, 3, 15, 9, 0)),
            record(Direction::Income, dec!(40), Category::Income, utc(2024, 3, 15, 8, 0)),
            record(Direction::Expense, dec!(60), Category::Bills, utc(2024, 2, 28, 12, 0)),
        ];

        let summary = summarize(&records, &as_of);
        assert_eq!(summary.today_total, dec!(60));
        assert_eq!(summary.period_total, dec!(60));
        assert_eq!(summary.today_count, 2);
        assert_eq!(summary.period_count, 2);

        assert_eq!(summary.category_breakdown.len(), 3);
        assert_eq!(summary.category_breakdown[&Category::Food].expense, dec!(100));
        assert_eq!(summary.category_breakdown[&Category::Income].income, dec!(40));
        assert_eq!(summary.category_breakdown[&Category::Bills].expense, dec!(60));
    }

    #[test]
    fn test_empty_input() {
        let summary = summarize(&[], &utc(2024, 3, 15, 10, 0));
        assert_eq!(summary, Summary::default());
        assert!(summary.category_breakdown.is_empty());
    }

    #[test]
    fn test_netting_can_reach_zero() {
        let as_of = utc(2024, 3, 15, 10, 0);
        let records = vec![
            record(Direction::Expense, dec!(250), Category::Food, utc(2024, 3, 15, 1, 0)),
            record(Direction::Income, dec!(250), Category::Income, utc(2024, 3, 15, 2, 0)),
        ];
        let summary = summarize(&records, &as_of);
        assert_eq!(summary.today_total, Decimal::ZERO);
        assert_eq!(summary.today_count, 2);
    }

    #[test]
    fn test_income_only_reports_magnitude() {
        let as_of = utc(2024, 3, 15, 10, 0);
        let records = vec![record(
            Direction::Income,
            dec!(500),
            Category::Income,
            utc(2024, 3, 2, 0, 0),
        )];
        let summary = summarize(&records, &as_of);
        assert_eq!(summary.today_total, Decimal::ZERO);
        assert_eq!(summary.period_total, dec!(500));
    }

    #[test]
    fn test_decimal_sums_have_no_drift() {
        let as_of = utc(2024, 3, 15, 10, 0);
        let records: Vec<_> = (0..3)
            .map(|_| record(Direction::Expense, dec!(0.1), Category::Other, as_of))
            .chain(std::iter::once(record(
                Direction::Expense,
                dec!(0.2),
                Category::Other,
                as_of,
            )))
            .collect();
        let summary = summarize(&records, &as_of);
        assert_eq!(summary.today_total, dec!(0.5));
    }

    #[test]
    fn test_zero_amount_records_count() {
        let as_of = utc(2024, 3, 15, 10, 0);
        let records = vec![record(Direction::Expense, Decimal::ZERO, Category::Other, as_of)];
        let summary = summarize(&records, &as_of);
        assert_eq!(summary.today_count, 1);
        assert_eq!(summary.category_breakdown[&Category::Other].expense, Decimal::ZERO);
    }

    #[test]
    fn test_windows_follow_as_of_zone() {
        // 20:00 UTC on the 14th is already the 15th in UTC+05:30
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let as_of = ist.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap();

        assert_eq!(start_of_day(&as_of), utc(2024, 3, 14, 18, 30));
        assert_eq!(start_of_month(&as_of), utc(2024, 2, 29, 18, 30));

        let records = vec![
            record(Direction::Expense, dec!(30), Category::Travel, utc(2024, 3, 14, 20, 0)),
            record(Direction::Expense, dec!(70), Category::Travel, utc(2024, 3, 14, 17, 0)),
        ];
        let summary = summarize(&records, &as_of);
        assert_eq!(summary.today_total, dec!(30));
        assert_eq!(summary.period_total, dec!(100));
    }

    #[test]
    fn test_future_records_are_included() {
        let as_of = utc(2024, 3, 15, 10, 0);
        let records = vec![record(
            Direction::Expense,
            dec!(5),
            Category::Food,
            utc(2024, 3, 15, 23, 0),
        )];
        assert_eq!(summarize(&records, &as_of).today_total, dec!(5));
    }

    #[test]
    fn test_huge_amounts_saturate_instead_of_overflowing() {
        let as_of = utc(2024, 3, 15, 10, 0);
        let records = vec![
            record(Direction::Expense, Decimal::MAX, Category::Other, as_of),
            record(Direction::Expense, Decimal::MAX, Category::Other, as_of),
            record(Direction::Income, dec!(5), Category::Income, as_of),
        ];

        let summary = summarize(&records, &as_of);
        assert_eq!(summary.today_count, 3);
        assert!(summary.today_total > dec!(1000000000));
        assert_eq!(summary.category_breakdown[&Category::Other].expense, Decimal::MAX);
        assert_eq!(summary.category_breakdown[&Category::Income].income, dec!(5));
    }

    /// UTC-4 until 2024-09-08 04:00 UTC, then UTC-3: local clocks jump from
    /// 00:00 straight to 01:00 on the 8th.
    #[derive(Debug, Clone, Copy)]
    struct MidnightGapZone;

    impl MidnightGapZone {
        fn before() -> FixedOffset {
            FixedOffset::west_opt(4 * 3600).unwrap()
        }

        fn after() -> FixedOffset {
            FixedOffset::west_opt(3 * 3600).unwrap()
        }

        fn local_gap() -> (NaiveDateTime, NaiveDateTime) {
            let day = NaiveDate::from_ymd_opt(2024, 9, 8).unwrap();
            (
                day.and_hms_opt(0, 0, 0).unwrap(),
                day.and_hms_opt(1, 0, 0).unwrap(),
            )
        }
    }

    impl TimeZone for MidnightGapZone {
        type Offset = FixedOffset;

        fn from_offset(_offset: &FixedOffset) -> Self {
            MidnightGapZone
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_time(chrono::NaiveTime::MIN))
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            let (gap_start, gap_end) = Self::local_gap();
            if *local < gap_start {
                LocalResult::Single(Self::before())
            } else if *local >= gap_end {
                LocalResult::Single(Self::after())
            } else {
                LocalResult::None
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_time(chrono::NaiveTime::MIN))
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            let switch = NaiveDate::from_ymd_opt(2024, 9, 8)
                .unwrap()
                .and_hms_opt(4, 0, 0)
                .unwrap();
            if *utc < switch {
                Self::before()
            } else {
                Self::after()
            }
        }
    }

    #[test]
    fn test_day_window_when_midnight_is_skipped() {
        // 10:00 local (UTC-3) on the transition day
        let as_of = utc(2024, 9, 8, 13, 0).with_timezone(&MidnightGapZone);
        assert_eq!(as_of.date_naive(), NaiveDate::from_ymd_opt(2024, 9, 8).unwrap());

        // The day starts at 01:00 local, the first instant that exists
        assert_eq!(start_of_day(&as_of), utc(2024, 9, 8, 4, 0));
        // The month started long before the transition
        assert_eq!(start_of_month(&as_of), utc(2024, 9, 1, 4, 0));

        let records = vec![
            record(Direction::Expense, dec!(20), Category::Food, utc(2024, 9, 8, 4, 30)),
            record(Direction::Expense, dec!(15), Category::Food, utc(2024, 9, 8, 3, 30)),
        ];
        let summary = summarize(&records, &as_of);
        assert_eq!(summary.today_total, dec!(20));
        assert_eq!(summary.today_count, 1);
        assert_eq!(summary.period_total, dec!(35));
    }
}

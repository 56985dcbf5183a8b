//! Quarterly contract codes and contract-roll segments.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::delivery::{third_friday, QUARTERLY_MONTHS};
use crate::domain::Bar;

/// `"{prefix}{yy}{mm}"`, e.g. `IF2406`.
pub fn contract_code(prefix: &str, year: i32, month: u32) -> String {
    format!("{prefix}{:02}{:02}", year.rem_euclid(100), month)
}

/// Quarterly contract trading on `date`.
///
/// The first quarterly month at or after `date`'s month whose delivery day has
/// not passed; past December's delivery, next year's March contract.
pub fn infer_quarterly_contract(date: NaiveDate, prefix: &str) -> String {
    let year = date.year();
    for &month in QUARTERLY_MONTHS.iter().filter(|&&m| m >= date.month()) {
        if let Some(delivery) = third_friday(year, month) {
            if date <= delivery {
                return contract_code(prefix, year, month);
            }
        }
    }
    contract_code(prefix, year + 1, 3)
}

/// A maximal run of bars quoted on the same contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSegment {
    pub contract: String,
    pub start_index: usize,
    pub end_index: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Split bars into contract segments.
///
/// An empty contract id continues the current segment. Leading bars with no
/// contract id belong to no segment.
pub fn contract_segments(bars: &[Bar]) -> Vec<ContractSegment> {
    let mut segments = Vec::new();
    let mut current: Option<(usize, &str)> = None;

    for (i, bar) in bars.iter().enumerate() {
        let id = bar.contract_id.as_str();
        if id.is_empty() {
            continue;
        }
        match current {
            Some((_, active)) if active == id => {}
            Some((start, active)) => {
                segments.push(segment(bars, start, i - 1, active));
                current = Some((i, id));
            }
            None => current = Some((i, id)),
        }
    }
    if let Some((start, active)) = current {
        segments.push(segment(bars, start, bars.len() - 1, active));
    }
    segments
}

fn segment(bars: &[Bar], start: usize, end: usize, contract: &str) -> ContractSegment {
    ContractSegment {
        contract: contract.to_string(),
        start_index: start,
        end_index: end,
        start: bars[start].date,
        end: bars[end].date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn bar(day: u32, contract: &str) -> Bar {
        let mut b = Bar::new(d(2024, 6, day), 10.0, 11.0, 9.0, 10.0);
        b.contract_id = contract.into();
        b
    }

    #[test]
    fn code_formatting() {
        assert_eq!(contract_code("IF", 2024, 6), "IF2406");
        assert_eq!(contract_code("IF", 2009, 12), "IF0912");
    }

    #[test]
    fn infers_current_quarter_before_delivery() {
        assert_eq!(infer_quarterly_contract(d(2024, 1, 10), "IF"), "IF2403");
        assert_eq!(infer_quarterly_contract(d(2024, 3, 15), "IF"), "IF2403");
    }

    #[test]
    fn rolls_after_delivery_day() {
        assert_eq!(infer_quarterly_contract(d(2024, 3, 18), "IF"), "IF2406");
        assert_eq!(infer_quarterly_contract(d(2024, 6, 21), "IF"), "IF2406");
        assert_eq!(infer_quarterly_contract(d(2024, 6, 24), "IF"), "IF2409");
    }

    #[test]
    fn rolls_into_next_year_after_december_delivery() {
        assert_eq!(infer_quarterly_contract(d(2024, 12, 20), "IF"), "IF2412");
        assert_eq!(infer_quarterly_contract(d(2024, 12, 23), "IF"), "IF2503");
    }

    #[test]
    fn segments_follow_contract_changes() {
        let bars = vec![
            bar(17, "IF2406"),
            bar(18, "IF2406"),
            bar(19, ""),
            bar(20, "IF2409"),
            bar(21, "IF2409"),
        ];
        let segs = contract_segments(&bars);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].contract, "IF2406");
        assert_eq!((segs[0].start_index, segs[0].end_index), (0, 2));
        assert_eq!(segs[1].contract, "IF2409");
        assert_eq!((segs[1].start, segs[1].end), (d(2024, 6, 20), d(2024, 6, 21)));
    }

    #[test]
    fn leading_blank_contracts_are_skipped() {
        let bars = vec![bar(17, ""), bar(18, "IF2406"), bar(19, "IF2406")];
        let segs = contract_segments(&bars);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].start_index, 1);
    }

    #[test]
    fn no_contracts_no_segments() {
        assert!(contract_segments(&[bar(17, ""), bar(18, "")]).is_empty());
        assert!(contract_segments(&[]).is_empty());
    }
}

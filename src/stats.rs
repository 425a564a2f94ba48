use serde::{Deserialize, Serialize};

use crate::rules::ScanRules;
use crate::scanner::{Section, Sections};
use crate::source::InputError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_sections: usize,
    pub passed_sections: usize,
    pub failed_sections: usize,
    /// Failed sections in encounter order.
    pub failures: Vec<Section>,
    pub primary_test_case_name: String,
}

impl DashboardStats {
    pub fn pass_rate(&self) -> f64 {
        if self.total_sections == 0 { return 0.0; }
        self.passed_sections as f64 * 100.0 / self.total_sections as f64
    }
}

#[derive(Debug, Default)]
pub struct StatsAggregator {
    total: usize,
    passed: usize,
    failures: Vec<Section>,
}

impl StatsAggregator {
    pub fn push(&mut self, section: Section) {
        self.total += 1;
        if section.has_error() { self.failures.push(section); } else { self.passed += 1; }
    }

    pub fn finish(self, primary_test_case_name: String) -> DashboardStats {
        DashboardStats {
            total_sections: self.total,
            passed_sections: self.passed,
            failed_sections: self.failures.len(),
            failures: self.failures,
            primary_test_case_name,
        }
    }
}

#[derive(Debug)]
pub struct ScanReport {
    pub stats: DashboardStats,
    pub lines_read: usize,
    /// Set when the line supply failed; `stats` then covers what was read before it.
    pub interrupted: Option<InputError>,
}

pub fn scan_lines<I>(lines: I, rules: &ScanRules) -> ScanReport
where
    I: IntoIterator<Item = Result<String, InputError>>,
{
    let mut sections = Sections::new(lines.into_iter(), rules);
    let mut agg = StatsAggregator::default();
    for s in sections.by_ref() { agg.push(s); }
    let lines_read = sections.lines_read();
    let (primary, interrupted) = sections.into_parts();
    let stats = agg.finish(primary);
    log::info!("Scanned {} lines: {} sections, {} passed, {} failed", lines_read, stats.total_sections, stats.passed_sections, stats.failed_sections);
    ScanReport { stats, lines_read, interrupted }
}

/// Report for a log that could not be opened at all.
pub fn unavailable(err: InputError) -> ScanReport {
    log::error!("{}", err);
    ScanReport { stats: StatsAggregator::default().finish(crate::rules::UNKNOWN_TEST_CASE.to_string()), lines_read: 0, interrupted: Some(err) }
}

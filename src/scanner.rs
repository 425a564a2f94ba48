//! Single-pass segmentation of a log into keyword sections.
//!
//! [`LogScanner`] is fed one line at a time and hands back a [`Section`] each
//! time a boundary line closes the previous one. [`Sections`] wraps it as a
//! lazy iterator over a fallible line supply and performs the end-of-input
//! flush.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::classify::SectionClassifier;
use crate::rules::{BoundaryStyle, ScanRules, UNKNOWN_TEST_CASE};
use crate::source::InputError;

/// One input line with its 0-based ordinal.
#[derive(Clone, Copy, Debug)]
pub struct LogLine<'a> {
    pub index: usize,
    pub text: &'a str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionStatus {
    Passed,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub keyword_name: String,
    pub test_case_name: String,
    /// Ordinal of the boundary line that opened the section.
    pub start_line: usize,
    pub lines: Vec<String>,
    pub status: SectionStatus,
    /// Present iff the section failed.
    pub error_message: Option<String>,
}

impl Section {
    pub fn has_error(&self) -> bool { self.status == SectionStatus::Failed }

    pub fn log_text(&self) -> String { self.lines.join("\n") }
}

#[derive(Debug)]
struct OpenSection {
    keyword_name: String,
    test_case_name: String,
    start_line: usize,
    lines: Vec<String>,
    error_message: Option<String>,
}

impl OpenSection {
    fn close(self) -> Section {
        let status = if self.error_message.is_some() { SectionStatus::Failed } else { SectionStatus::Passed };
        Section {
            keyword_name: self.keyword_name,
            test_case_name: self.test_case_name,
            start_line: self.start_line,
            lines: self.lines,
            status,
            error_message: self.error_message,
        }
    }
}

#[derive(Debug)]
enum State {
    Idle,
    InSection(OpenSection),
}

/// Trim, drop every trailing `*`, trim again.
pub fn strip_label(s: &str) -> String {
    s.trim().trim_end_matches('*').trim().to_string()
}

fn frame_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\*+.*\*+$").expect("frame pattern is valid"))
}

/// Keyword name if `line` opens a section under `style`.
pub fn boundary_name(style: &BoundaryStyle, line: &str) -> Option<String> {
    match style {
        BoundaryStyle::MarkerPrefixed { marker } => {
            let at = line.find(marker.as_str())?;
            Some(strip_label(&line[at + marker.len()..]))
        }
        BoundaryStyle::AsteriskFramed => {
            if !frame_re().is_match(line) { return None; }
            let name = strip_label(&line.replace('*', ""));
            if name.is_empty() { None } else { Some(name) }
        }
    }
}

pub struct LogScanner {
    test_case_marker: Option<String>,
    boundary: BoundaryStyle,
    classifier: SectionClassifier,
    current_test_case: String,
    state: State,
}

impl LogScanner {
    pub fn new(rules: &ScanRules) -> Self {
        Self {
            test_case_marker: rules.test_case_marker.clone(),
            boundary: rules.boundary.clone(),
            classifier: SectionClassifier::new(&rules.error_rules),
            current_test_case: UNKNOWN_TEST_CASE.to_string(),
            state: State::Idle,
        }
    }

    /// Processes one line; returns the section it closed, if any.
    pub fn feed(&mut self, line: LogLine<'_>) -> Option<Section> {
        if let Some(marker) = self.test_case_marker.as_deref()
            && let Some(at) = line.text.find(marker)
        {
            self.current_test_case = strip_label(&line.text[at + marker.len()..]);
            log::trace!("line {}: test case '{}'", line.index, self.current_test_case);
        }

        let mut closed = None;
        if let Some(keyword_name) = boundary_name(&self.boundary, line.text) {
            let next = State::InSection(OpenSection {
                keyword_name,
                test_case_name: self.current_test_case.clone(),
                start_line: line.index,
                lines: Vec::new(),
                error_message: None,
            });
            if let State::InSection(prev) = std::mem::replace(&mut self.state, next) {
                closed = Some(prev.close());
            }
            log::trace!("line {}: section opened", line.index);
        }

        if let State::InSection(open) = &mut self.state {
            open.lines.push(line.text.to_string());
            if open.error_message.is_none()
                && let Some(msg) = self.classifier.detect(line.text)
            {
                log::debug!("line {}: '{}' failed: {}", line.index, open.keyword_name, msg);
                open.error_message = Some(msg);
            }
        }

        if let Some(s) = closed.as_ref() {
            log::debug!("section '{}' closed ({:?})", s.keyword_name, s.status);
        }
        closed
    }

    /// End of input: closes the open section, if any.
    pub fn flush(&mut self) -> Option<Section> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::InSection(open) => {
                let s = open.close();
                log::debug!("section '{}' closed at end of input ({:?})", s.keyword_name, s.status);
                Some(s)
            }
            State::Idle => None,
        }
    }

    /// Aborted input: the open section is dropped, never reported.
    pub fn abandon(&mut self) {
        if let State::InSection(open) = std::mem::replace(&mut self.state, State::Idle) {
            log::warn!("discarding unfinished section '{}' opened at line {}", open.keyword_name, open.start_line);
        }
    }
}

/// Lazy, non-restartable sequence of closed sections.
pub struct Sections<I> {
    lines: I,
    scanner: LogScanner,
    next_index: usize,
    done: bool,
    interrupted: Option<InputError>,
}

impl<I> Sections<I>
where
    I: Iterator<Item = Result<String, InputError>>,
{
    pub fn new(lines: I, rules: &ScanRules) -> Self {
        Self { lines, scanner: LogScanner::new(rules), next_index: 0, done: false, interrupted: None }
    }

    pub fn lines_read(&self) -> usize { self.next_index }

    /// Final test-case label and the read failure that ended the scan, if any.
    pub fn into_parts(self) -> (String, Option<InputError>) {
        (self.scanner.current_test_case, self.interrupted)
    }
}

impl<I> Iterator for Sections<I>
where
    I: Iterator<Item = Result<String, InputError>>,
{
    type Item = Section;

    fn next(&mut self) -> Option<Section> {
        if self.done { return None; }
        for item in self.lines.by_ref() {
            match item {
                Ok(text) => {
                    let line = LogLine { index: self.next_index, text: &text };
                    self.next_index += 1;
                    if let Some(s) = self.scanner.feed(line) { return Some(s); }
                }
                Err(e) => {
                    log::error!("{}", e);
                    self.scanner.abandon();
                    self.interrupted = Some(e);
                    self.done = true;
                    return None;
                }
            }
        }
        self.done = true;
        self.scanner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Dialect;

    fn ok_lines(lines: &[&str]) -> impl Iterator<Item = Result<String, InputError>> {
        lines.iter().map(|s| Ok::<_, InputError>(s.to_string())).collect::<Vec<_>>().into_iter()
    }

    fn scan(lines: &[&str], dialect: Dialect) -> Vec<Section> {
        Sections::new(ok_lines(lines), &ScanRules::for_dialect(dialect)).collect()
    }

    #[test]
    fn trailing_asterisks_are_stripped() {
        assert_eq!(strip_label("  Login*** "), "Login");
        assert_eq!(strip_label("Login * *"), "Login *");
        let got = scan(&["*** Invoking Business Component : Login***"], Dialect::Component);
        assert_eq!(got[0].keyword_name, "Login");
    }

    #[test]
    fn lines_before_first_boundary_are_dropped() {
        let got = scan(&["Exception in setup", "*** Invoking Business Component : Open ***", "ok"], Dialect::Component);
        assert_eq!(got.len(), 1);
        assert!(!got[0].has_error());
        assert_eq!(got[0].lines, vec!["*** Invoking Business Component : Open ***", "ok"]);
        assert_eq!(got[0].start_line, 1);
    }

    #[test]
    fn boundary_at_end_still_closes() {
        let got = scan(&["*** Invoking Business Component : A ***", "x", "*** Invoking Business Component : B ***"], Dialect::Component);
        assert_eq!(got.len(), 2);
        assert_eq!(got[1].keyword_name, "B");
        assert_eq!(got[1].lines.len(), 1);
    }

    #[test]
    fn first_error_is_kept() {
        let got = scan(&[
            "*** Invoking Business Component : Pay ***",
            "  verification failed: amount  ",
            "java.lang.RuntimeException: later",
        ], Dialect::Component);
        assert_eq!(got[0].error_message.as_deref(), Some("verification failed: amount"));
    }

    #[test]
    fn section_takes_test_case_seen_when_opened() {
        let got = scan(&[
            "Current Test Case : TC_01 ***",
            "*** Invoking Business Component : A ***",
            "Current Test Case : TC_02",
            "*** Invoking Business Component : B ***",
        ], Dialect::Component);
        assert_eq!(got[0].test_case_name, "TC_01");
        assert_eq!(got[1].test_case_name, "TC_02");
    }

    #[test]
    fn framed_boundaries() {
        let got = scan(&["***** Login *****", "**********", "Error: not an error here", "*** Submit ***", "NullPointerException"], Dialect::Framed);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].keyword_name, "Login");
        assert_eq!(got[0].lines.len(), 3);
        assert!(!got[0].has_error());
        assert_eq!(got[1].error_message.as_deref(), Some("NullPointerException"));
        assert_eq!(got[1].test_case_name, UNKNOWN_TEST_CASE);
    }

    #[test]
    fn malformed_frame_is_content() {
        let style = BoundaryStyle::AsteriskFramed;
        assert!(boundary_name(&style, "*** Login").is_none());
        assert!(boundary_name(&style, "*").is_none());
        assert!(boundary_name(&style, "*** ***").is_none());
        assert!(boundary_name(&style, "  *** Indented ***").is_none());
        assert!(boundary_name(&style, "*** Trailing *** ").is_none());
        assert_eq!(boundary_name(&style, "**Log*in**").as_deref(), Some("Login"));
    }

    #[test]
    fn indented_frame_is_section_content() {
        let got = scan(&["*** Open ***", "  *** Indented ***", "Exception: inside"], Dialect::Framed);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].keyword_name, "Open");
        assert_eq!(got[0].lines.len(), 3);
        assert!(got[0].has_error());
    }

    #[test]
    fn boundary_line_can_fail_its_own_section() {
        let got = scan(&[
            "*** Invoking Business Component : HandleException ***",
            "step ok",
            "*** Invoking Business Component : Next ***",
        ], Dialect::Component);
        assert_eq!(got.len(), 2);
        assert!(got[0].has_error());
        assert_eq!(got[0].error_message.as_deref(), Some("*** Invoking Business Component : HandleException ***"));
        assert!(!got[1].has_error());
    }

    #[test]
    fn bare_error_type_line_keeps_empty_message() {
        let got = scan(&["*** Invoking Business Component : A ***", "Error Type:   "], Dialect::Component);
        assert_eq!(got[0].status, SectionStatus::Failed);
        assert_eq!(got[0].error_message.as_deref(), Some(""));
    }

    #[test]
    fn read_error_drops_open_section() {
        let lines = vec![
            Ok("*** Invoking Business Component : A ***".to_string()),
            Ok("*** Invoking Business Component : B ***".to_string()),
            Err(InputError::Read { line: 2, source: std::io::Error::other("disk gone") }),
            Ok("*** Invoking Business Component : C ***".to_string()),
        ];
        let mut it = Sections::new(lines.into_iter(), &ScanRules::default());
        let got: Vec<Section> = it.by_ref().collect();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].keyword_name, "A");
        assert!(it.next().is_none());
        let (_, err) = it.into_parts();
        assert!(matches!(err, Some(InputError::Read { line: 2, .. })));
    }
}

use crate::stats::DashboardStats;

pub fn render_markdown(stats: &DashboardStats, title: &str, source: &str) -> String {
    let mut s = String::new();
    s.push_str(&format!("# {}\n\n", title));
    s.push_str(&format!("Test Case: {}\n\n", stats.primary_test_case_name));
    s.push_str(&format!("Source: {}\n\n", source));

    s.push_str("## Summary\n");
    s.push_str(&format!("- Total Keywords: {}\n", stats.total_sections));
    s.push_str(&format!("- Passed: {}\n", stats.passed_sections));
    s.push_str(&format!("- Failed: {}\n", stats.failed_sections));
    s.push_str(&format!("- Pass Rate: {:.1}%\n\n", stats.pass_rate()));

    s.push_str("## Failure Analysis\n");
    if stats.failures.is_empty() { s.push_str("None\n"); return s; }
    s.push_str("| Sn | Test Case | Keyword | Error |\n|---|---|---|---|\n");
    for (i, f) in stats.failures.iter().enumerate() {
        let err = f.error_message.as_deref().unwrap_or(crate::rules::UNKNOWN_ERROR);
        s.push_str(&format!("| {} | {} | {} | {} |\n", i + 1, cell(&f.test_case_name), cell(&f.keyword_name), cell(err)));
    }
    s.push('\n');
    s.push_str("## Failure Logs\n");
    for (i, f) in stats.failures.iter().enumerate() {
        let text = f.log_text();
        let fence = fence_for(&text);
        s.push_str(&format!("\n### {}. {} (line {})\n\n{}text\n{}\n{}\n", i + 1, f.keyword_name, f.start_line + 1, fence, text, fence));
    }
    s
}

fn cell(v: &str) -> String { v.replace('|', "\\|").replace('\n', " ") }

// Longer than any backtick run inside the log.
fn fence_for(text: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in text.chars() {
        if c == '`' { run += 1; longest = longest.max(run); } else { run = 0; }
    }
    "`".repeat((longest + 1).max(3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{Section, SectionStatus};

    #[test]
    fn failure_table_and_logs() {
        let stats = DashboardStats {
            total_sections: 3,
            passed_sections: 2,
            failed_sections: 1,
            failures: vec![Section {
                keyword_name: "Pay|Now".to_string(),
                test_case_name: "TC_7".to_string(),
                start_line: 41,
                lines: vec!["*** Invoking Business Component : Pay|Now ***".to_string(), "```Exception```".to_string()],
                status: SectionStatus::Failed,
                error_message: Some("```Exception```".to_string()),
            }],
            primary_test_case_name: "TC_7".to_string(),
        };
        let md = render_markdown(&stats, "Report", "log.txt");
        assert!(md.contains("- Pass Rate: 66.7%"));
        assert!(md.contains("| 1 | TC_7 | Pay\\|Now | ```Exception``` |"));
        assert!(md.contains("### 1. Pay|Now (line 42)"));
        assert!(md.contains("````text\n"));
    }

    #[test]
    fn no_failures() {
        let stats = DashboardStats { total_sections: 1, passed_sections: 1, failed_sections: 0, failures: vec![], primary_test_case_name: "X".to_string() };
        let md = render_markdown(&stats, "Report", "-");
        assert!(md.ends_with("## Failure Analysis\nNone\n"));
    }
}

use chrono::{DateTime, Local};

use crate::stats::DashboardStats;

pub struct ReportMeta {
    pub title: String,
    pub source: String,
    pub generated_at: DateTime<Local>,
}

const BASE_CSS: &str = "body{margin:0;background:var(--bg);color:var(--fg);font-family:Segoe UI,system-ui,-apple-system,Arial,sans-serif} .container{max-width:1200px;margin:0 auto;padding:24px} .header{display:flex;align-items:center;justify-content:space-between;gap:12px;margin-bottom:16px} .title{font-size:22px;font-weight:700;letter-spacing:.2px} .sub{color:var(--muted);font-size:13px} .grid{display:grid;grid-template-columns:repeat(4,minmax(0,1fr));gap:12px} .card{background:var(--card);border:1px solid var(--border);border-radius:10px;padding:14px} .metric{display:flex;align-items:center;justify-content:space-between} .metric .label{color:var(--muted);font-size:12px} .metric .value{font-size:22px;font-weight:700} .value.err{color:var(--err)} .value.ok{color:var(--ok)} .value.accent{color:var(--accent)} .section{margin-top:18px} .section h3{margin:0 0 10px 0;font-size:16px;font-weight:600} .donut-wrap{display:flex;align-items:center;justify-content:center;gap:24px} .donut{width:150px;height:150px;border-radius:50%;display:flex;align-items:center;justify-content:center} .donut .hole{width:105px;height:105px;border-radius:50%;background:var(--card);display:flex;align-items:center;justify-content:center;font-weight:700} .legend span{display:inline-block;width:10px;height:10px;border-radius:2px;margin-right:6px} .table{width:100%;border-collapse:separate;border-spacing:0;background:var(--card);border:1px solid var(--border);border-radius:10px;overflow:hidden} .table th{text-align:left;font-weight:600;padding:10px;border-bottom:1px solid var(--border);background:var(--head)} .table td{padding:10px;border-bottom:1px solid var(--border);vertical-align:top} .kw{color:var(--accent);font-weight:600} .errmsg{color:var(--err)} .btn{background:var(--accent);color:#fff;border:0;border-radius:6px;padding:5px 12px;cursor:pointer} .toggle{background:var(--chip);color:var(--fg);border:1px solid var(--border);border-radius:6px;padding:5px 12px;cursor:pointer} .modal{position:fixed;inset:0;background:rgba(0,0,0,.45);display:none;align-items:center;justify-content:center;padding:16px} .modal.open{display:flex} .modal .box{background:var(--card);border:1px solid var(--border);border-radius:10px;width:100%;max-width:900px;max-height:90vh;display:flex;flex-direction:column} .modal .head{display:flex;justify-content:space-between;align-items:center;padding:12px 16px;border-bottom:1px solid var(--border)} .modal pre{margin:0;padding:16px;overflow:auto;white-space:pre-wrap;font-family:Consolas,Monaco,monospace;font-size:13px} .empty{color:var(--ok);padding:10px} .footer{margin-top:22px;color:var(--muted);font-size:12px} @media (max-width:900px){.grid{grid-template-columns:repeat(2,minmax(0,1fr))}} @media (max-width:600px){.grid{grid-template-columns:1fr}.header{flex-direction:column;align-items:flex-start}}";

const DARK_VARS: &str = ":root{--bg:#0a0e13;--fg:#ffffff;--muted:#c0c4cc;--card:#0d131a;--border:#243041;--accent:#3b82f6;--ok:#22c55e;--err:#ef4444;--chip:#0f172a;--head:#0c1118}";
const LIGHT_VARS: &str = ":root{--bg:#f7fafc;--fg:#111827;--muted:#6b7280;--card:#ffffff;--border:#e5e7eb;--accent:#2563eb;--ok:#16a34a;--err:#dc2626;--chip:#eef2f7;--head:#f3f4f6}";

const SCRIPT: &str = "(function(){const light={bg:'#f7fafc',fg:'#111827',muted:'#6b7280',card:'#ffffff',border:'#e5e7eb',accent:'#2563eb',ok:'#16a34a',err:'#dc2626',chip:'#eef2f7',head:'#f3f4f6'};const dark={bg:'#0a0e13',fg:'#ffffff',muted:'#c0c4cc',card:'#0d131a',border:'#243041',accent:'#3b82f6',ok:'#22c55e',err:'#ef4444',chip:'#0f172a',head:'#0c1118'};function apply(name){const vars=name==='light'?light:dark;const r=document.documentElement.style;Object.entries(vars).forEach(([k,v])=>r.setProperty('--'+k,v));const btn=document.getElementById('themeToggle');if(btn){btn.textContent=name==='light'?'Dark Mode':'Light Mode';}window.__kwTheme=name;}window.toggleTheme=function(){const next=window.__kwTheme==='light'?'dark':'light';try{localStorage.setItem('kwdash-theme',next);}catch(e){}apply(next);};window.initTheme=function(init){let saved=null;try{saved=localStorage.getItem('kwdash-theme');}catch(e){}apply(saved||init);};window.showModal=function(keyword,log){document.getElementById('modalKeyword').textContent=keyword;document.getElementById('modalLog').textContent=log;document.getElementById('logModal').classList.add('open');};window.closeModal=function(){document.getElementById('logModal').classList.remove('open');};document.addEventListener('click',function(ev){if(ev.target&&ev.target.id==='logModal'){window.closeModal();}});document.addEventListener('keydown',function(ev){if(ev.key==='Escape'){window.closeModal();}});})();";

pub fn render_html(stats: &DashboardStats, meta: &ReportMeta, theme: crate::Theme, use_emoji: bool) -> String {
    let mut s = String::new();
    s.push_str("<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\"><meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">");
    s.push_str(&format!("<title>{}</title><style>", html_escape(&meta.title)));
    s.push_str(match theme { crate::Theme::Dark => DARK_VARS, crate::Theme::Light => LIGHT_VARS });
    s.push(' ');
    s.push_str(BASE_CSS);
    s.push_str("</style><script>");
    s.push_str(SCRIPT);
    s.push_str("</script></head><body><div class=\"container\">");

    s.push_str(&format!("<div class=\"header\"><div><div class=\"title\">{}</div><div class=\"sub\">Test Case: {}</div></div>", html_escape(&meta.title), html_escape(&stats.primary_test_case_name)));
    s.push_str("<button id=\"themeToggle\" class=\"toggle\" onclick=\"toggleTheme()\" aria-label=\"Toggle theme\">Light Mode</button></div>");

    let icon = |e: &'static str| if use_emoji { e } else { "" };
    s.push_str("<div class=\"grid\">");
    s.push_str(&metric_card(&format!("{} Total", icon("🧮")), &stats.total_sections.to_string(), "accent", "totalTests"));
    s.push_str(&metric_card(&format!("{} Passed", icon("✔️")), &stats.passed_sections.to_string(), "ok", "passedTests"));
    s.push_str(&metric_card(&format!("{} Failed", icon("❌")), &stats.failed_sections.to_string(), "err", "failedTests"));
    s.push_str(&metric_card(&format!("{} Pass Rate", icon("📈")), &format!("{:.1}%", stats.pass_rate()), "ok", "passRate"));
    s.push_str("</div>");

    let passed_deg = if stats.total_sections == 0 { 0.0 } else { stats.passed_sections as f64 * 360.0 / stats.total_sections as f64 };
    let ring = if stats.total_sections == 0 {
        "conic-gradient(var(--border) 0deg 360deg)".to_string()
    } else {
        format!("conic-gradient(var(--ok) 0deg {:.2}deg, var(--err) {:.2}deg 360deg)", passed_deg, passed_deg)
    };
    s.push_str("<div class=\"section\"><div class=\"card donut-wrap\">");
    s.push_str(&format!("<div class=\"donut\" id=\"failureChart\" style=\"background:{}\"><div class=\"hole\">{:.0}%</div></div>", ring, stats.pass_rate()));
    s.push_str(&format!("<div class=\"legend sub\"><div><span style=\"background:var(--ok)\"></span>Passed ({})</div><div><span style=\"background:var(--err)\"></span>Failed ({})</div></div>", stats.passed_sections, stats.failed_sections));
    s.push_str("</div></div>");

    s.push_str("<div class=\"section\"><h3>Failure Analysis</h3>");
    if stats.failures.is_empty() {
        s.push_str(&format!("<div class=\"card empty\">{}No failed keywords.</div>", if use_emoji { "✅ " } else { "" }));
    } else {
        s.push_str("<table class=\"table\"><thead><tr><th>Sn</th><th>Test Case</th><th>Keyword Name</th><th>Error Summary</th><th>Details</th></tr></thead><tbody>");
        for (i, f) in stats.failures.iter().enumerate() {
            let err = f.error_message.as_deref().unwrap_or(crate::rules::UNKNOWN_ERROR);
            s.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td class=\"kw\">{}</td><td class=\"errmsg\">{}</td><td><button class=\"btn\" onclick=\"showModal('{}', '{}')\">View</button></td></tr>",
                i + 1,
                html_escape(&f.test_case_name),
                html_escape(&f.keyword_name),
                html_escape(err),
                attr_js(&f.keyword_name),
                attr_js(&f.log_text()),
            ));
        }
        s.push_str("</tbody></table>");
    }
    s.push_str("</div>");

    s.push_str("<div id=\"logModal\" class=\"modal\"><div class=\"box\"><div class=\"head\"><div class=\"kw\" id=\"modalKeyword\">Keyword Name</div><button class=\"toggle\" onclick=\"closeModal()\" aria-label=\"Close\">&times;</button></div><pre id=\"modalLog\"></pre></div></div>");
    s.push_str(&format!("<div class=\"footer\">Generated by KwDash · {} · {}</div></div>", html_escape(&meta.source), meta.generated_at.format("%Y-%m-%d %H:%M:%S")));
    s.push_str("<script>initTheme(");
    s.push_str(match theme { crate::Theme::Light => "'light'", crate::Theme::Dark => "'dark'" });
    s.push_str(");</script></body></html>");
    s
}

fn metric_card(label: &str, value: &str, class: &str, id: &str) -> String {
    format!("<div class=\"card metric\"><div class=\"label\">{}</div><div class=\"value {}\" id=\"{}\">{}</div></div>", html_escape(label.trim()), class, id, value)
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;").replace('\'', "&#39;")
}

/// Escapes text for a single-quoted JavaScript string literal.
pub fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('"', "\\\"")
        .replace('`', "\\`")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace("</", "<\\/")
}

// JS literal inside a double-quoted HTML attribute.
fn attr_js(s: &str) -> String { html_escape(&js_escape(s)) }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{Section, SectionStatus};
    use chrono::TimeZone;

    fn meta() -> ReportMeta {
        ReportMeta { title: "Test Automation Report".to_string(), source: "log.txt".to_string(), generated_at: Local.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap() }
    }

    fn stats_with(failure: Section) -> DashboardStats {
        DashboardStats { total_sections: 2, passed_sections: 1, failed_sections: 1, failures: vec![failure], primary_test_case_name: "TC <1>".to_string() }
    }

    #[test]
    fn escapes_table_cells_and_callbacks() {
        let f = Section {
            keyword_name: "O'Brien".to_string(),
            test_case_name: "TC".to_string(),
            start_line: 0,
            lines: vec!["a\\b".to_string(), "<script>\"x\"</script>".to_string()],
            status: SectionStatus::Failed,
            error_message: Some("<b>&</b>".to_string()),
        };
        let html = render_html(&stats_with(f), &meta(), crate::Theme::Dark, true);
        assert!(html.contains("&lt;b&gt;&amp;&lt;/b&gt;"));
        assert!(html.contains("TC &lt;1&gt;"));
        assert!(html.contains("showModal('O\\&#39;Brien', 'a\\\\b\\n&lt;script&gt;\\&quot;x\\&quot;&lt;\\/script&gt;')"));
        assert!(!html.contains("<script>\"x\""));
        assert!(html.contains("id=\"failedTests\">1<"));
        assert!(html.contains("2025-01-02 03:04:05"));
    }

    #[test]
    fn no_failures_renders_empty_state() {
        let stats = DashboardStats { total_sections: 0, passed_sections: 0, failed_sections: 0, failures: vec![], primary_test_case_name: "Unknown Test Case".to_string() };
        let html = render_html(&stats, &meta(), crate::Theme::Light, false);
        assert!(html.contains("No failed keywords."));
        assert!(!html.contains("<tbody>"));
        assert!(html.contains("initTheme('light')"));
    }

    #[test]
    fn js_escape_handles_control_characters() {
        assert_eq!(js_escape("a'b\r\n`c`"), "a\\'b\\r\\n\\`c\\`");
    }
}

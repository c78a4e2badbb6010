use redlink::{ResolveReport, RuleStatus};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub fn print_run(report: &ResolveReport, color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Resolving: \"{}\"", report.link), ansi::CYAN)));

    println!("\n{}", palette.paint("━━━ Rules ━━━", ansi::GRAY));
    if report.details.evaluated.is_empty() {
        println!("{}", palette.dim("  No rules configured"));
    }
    for outcome in &report.details.evaluated {
        println!(
            "  {} {}  {}",
            palette.paint(format!("[{}]", outcome.rule_index), ansi::GRAY),
            palette.paint(&outcome.pattern, ansi::BLUE),
            fmt_status(&outcome.status, &palette),
        );
    }

    if !report.details.candidates.is_empty() {
        println!("\n{}", palette.paint("━━━ Candidates ━━━", ansi::GRAY));
        for (rank, candidate) in report.details.candidates.iter().enumerate() {
            println!(
                "  {} {} {} {}",
                palette.paint(format!("[{rank}]"), ansi::GRAY),
                palette.bold(palette.paint(&candidate.url, ansi::GREEN)),
                palette.dim("│"),
                palette.paint(
                    format!(
                        "key='{}' groups={} len={} rule=#{}",
                        candidate.key, candidate.group_count, candidate.match_len, candidate.rule_index
                    ),
                    ansi::YELLOW
                ),
            );
        }
    }

    println!("\n{}", palette.paint("━━━ Result ━━━", ansi::GRAY));
    match &report.url {
        Some(url) => println!("  {} {}", palette.paint("→", ansi::GREEN), palette.bold(palette.paint(url, ansi::GREEN))),
        None => {
            println!("{}", palette.dim("  No matching rule"));
            println!("\n{}", palette.paint("Possible reasons:", ansi::YELLOW));
            println!("  • Patterns didn't match, or matched more than once");
            println!("  • A matching pattern has no capturing groups");
            println!("  • The rule store is empty or malformed");
            println!("\n{}", palette.dim("  Tip: set RUST_LOG=redlink=debug to see per-rule traces"));
        }
    }

    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!("  Total: {}", palette.paint(format!("{:?}", report.elapsed), ansi::GREEN));
    println!();
}

fn fmt_status(status: &RuleStatus, palette: &ansi::Palette) -> String {
    match status {
        RuleStatus::Accepted => palette.paint("✓ candidate", ansi::GREEN),
        RuleStatus::NoMatch => palette.dim("✗ no match"),
        RuleStatus::Ambiguous(count) => palette.paint(format!("✗ {count} matches (need exactly 1)"), ansi::YELLOW),
        RuleStatus::NoCaptureGroups => palette.paint("✗ no capture groups", ansi::YELLOW),
        RuleStatus::InvalidPattern(err) => palette.paint(format!("✗ invalid pattern: {err}"), ansi::YELLOW),
    }
}

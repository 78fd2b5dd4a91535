use chrono::{Days, NaiveDate};
use tradegraph_memory::MemoryMatch;
use tradegraph_models::{CompleteReports, InvestmentSide, ReportKind, RiskSpeaker};

/// Per-report cap inside debate prompts.
pub const REPORT_CAP: usize = 2000;
/// Cap on the trader plan and the risk-debate history tail.
pub const PLAN_CAP: usize = 5000;

/// The first `max` characters followed by `...`, or the text unchanged.
pub fn cap_with_ellipsis(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// The last `max` characters of `text`.
pub fn tail(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    match text.char_indices().nth(count - max) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}

fn analyst_role(kind: ReportKind) -> &'static str {
    match kind {
        ReportKind::Market => {
            "You are a trading assistant specialized in analyzing financial markets. Your role \
             is to select the most relevant technical indicators to analyze a stock's price \
             action, momentum, and volatility. You must use your tools to get historical data \
             and then generate a report with your findings, including a summary table."
        }
        ReportKind::Sentiment => {
            "You are a social media analyst. Your job is to analyze social media posts and \
             public sentiment for a specific company over the past week. Use your tools to find \
             relevant discussions and write a comprehensive report detailing your analysis, \
             insights, and implications for traders, including a summary table."
        }
        ReportKind::News => {
            "You are a news researcher analyzing recent news and trends over the past week. \
             Write a comprehensive report on the current state of the world relevant for \
             trading and macroeconomics. Use your tools to be comprehensive and provide \
             detailed analysis, including a summary table."
        }
        ReportKind::Fundamentals => {
            "You are a researcher analyzing fundamental information about a company. Write a \
             comprehensive report on the company's financials, insider sentiment, and \
             transactions to gain a full view of its fundamental health, including a summary \
             table."
        }
    }
}

pub fn analyst_system_prompt(
    kind: ReportKind,
    subject: &str,
    as_of: NaiveDate,
    lookback_days: u32,
) -> String {
    let start = as_of
        .checked_sub_days(Days::new(u64::from(lookback_days)))
        .unwrap_or(as_of);
    format!(
        "{}\n\nThe company we are analyzing is {subject}. The current date is {as_of}. \
         When a tool takes a date range, request data from {start} to {as_of}. \
         When you have gathered enough information, reply with your final report only.",
        analyst_role(kind)
    )
}

/// Compact description of the current situation used both in debate
/// prompts and as the memory lookup key.
pub fn situation_summary(reports: &CompleteReports<'_>) -> String {
    format!(
        "Market Report: {}\nSentiment Report: {}\nNews Report: {}\nFundamentals Report: {}",
        cap_with_ellipsis(reports.market, REPORT_CAP),
        cap_with_ellipsis(reports.sentiment, REPORT_CAP),
        cap_with_ellipsis(reports.news, REPORT_CAP),
        cap_with_ellipsis(reports.fundamentals, REPORT_CAP),
    )
}

pub fn reflections(matches: &[MemoryMatch]) -> String {
    if matches.is_empty() {
        return "No past memories found.".to_string();
    }
    matches
        .iter()
        .map(|m| m.recommendation.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn investment_role(side: InvestmentSide) -> &'static str {
    match side {
        InvestmentSide::Bull => {
            "You are a Bull Analyst. Your goal is to argue for investing in the stock. Focus on \
             growth potential, competitive advantages, and positive indicators from the reports. \
             Counter the bear's arguments effectively."
        }
        InvestmentSide::Bear => {
            "You are a Bear Analyst. Your goal is to argue against investing in the stock. Focus \
             on risks, challenges, and negative indicators. Counter the bull's arguments \
             effectively."
        }
    }
}

pub fn investment_debator_prompt(
    side: InvestmentSide,
    situation: &str,
    history: &str,
    opponent_last: &str,
    reflections: &str,
) -> String {
    format!(
        "{}\nHere is the current state of the analysis:\n{situation}\n\
         Conversation history: {history}\n\
         Your opponent's last argument: {opponent_last}\n\
         Reflections from similar past situations: {reflections}\n\
         Based on all this information, present your argument conversationally.",
        investment_role(side)
    )
}

pub fn research_manager_prompt(history: &str, reflections: &str) -> String {
    format!(
        "As the Research Manager, your role is to critically evaluate the debate between the \
         Bull and Bear analysts and make a definitive decision.\n\
         Summarize the key points, then provide a clear recommendation: Buy, Sell, or Hold. \
         Develop a detailed investment plan for the trader, including your rationale and \
         strategic actions.\n\
         Take into account these reflections from similar past situations: {reflections}\n\n\
         Debate History:\n{history}"
    )
}

pub fn trader_prompt(subject: &str, investment_plan: &str, reflections: &str) -> String {
    format!(
        "You are a trading agent analyzing {subject}. Based on the provided investment plan, \
         create a concise trading proposal.\n\
         Your response must end with 'FINAL TRANSACTION PROPOSAL: **BUY/HOLD/SELL**'.\n\
         Lessons from similar past situations: {reflections}\n\n\
         Proposed Investment Plan: {investment_plan}"
    )
}

fn risk_role(speaker: RiskSpeaker) -> &'static str {
    match speaker {
        RiskSpeaker::Risky => {
            "You are the Risky Risk Analyst. You advocate for high-reward opportunities and bold \
             strategies."
        }
        RiskSpeaker::Safe => {
            "You are the Safe/Conservative Risk Analyst. You prioritize capital preservation and \
             minimizing volatility."
        }
        RiskSpeaker::Neutral => {
            "You are the Neutral Risk Analyst. You provide a balanced perspective, weighing both \
             benefits and risks."
        }
    }
}

pub fn risk_debator_prompt(
    speaker: RiskSpeaker,
    trader_plan: &str,
    history: &str,
    opponents: &[String],
) -> String {
    format!(
        "{}\nHere is the trader's plan: {}\n\
         Debate history: ...{}\n\
         Your opponents' last arguments:\n{}\n\
         Critique or support the plan from your perspective.",
        risk_role(speaker),
        cap_with_ellipsis(trader_plan, PLAN_CAP),
        tail(history, PLAN_CAP),
        opponents.join("\n"),
    )
}

pub fn risk_judge_prompt(trader_plan: &str, history: &str, reflections: &str) -> String {
    format!(
        "As the Portfolio Manager, your decision is final. Review the trader's plan and the \
         risk debate.\n\
         Provide a final, binding decision: Buy, Sell, or Hold, and a brief justification.\n\
         Lessons from similar past situations: {reflections}\n\n\
         Trader's Plan: {}\n\
         Risk Debate: ...{}",
        cap_with_ellipsis(trader_plan, PLAN_CAP),
        tail(history, PLAN_CAP),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ellipsis_only_when_over_cap() {
        assert_eq!(cap_with_ellipsis("abcdef", 6), "abcdef");
        assert_eq!(cap_with_ellipsis("abcdefg", 6), "abcdef...");
    }

    #[test]
    fn tail_keeps_last_characters() {
        assert_eq!(tail("abcdef", 10), "abcdef");
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("ééé", 2), "éé");
    }

    #[test]
    fn situation_caps_each_report() {
        let long = "m".repeat(REPORT_CAP + 50);
        let reports = CompleteReports {
            market: &long,
            sentiment: "S",
            news: "N",
            fundamentals: "F",
        };
        let summary = situation_summary(&reports);
        assert!(summary.contains(&format!("Market Report: {}...\n", "m".repeat(REPORT_CAP))));
        assert!(summary.ends_with("Fundamentals Report: F"));
    }

    #[test]
    fn empty_reflections_have_placeholder() {
        assert_eq!(reflections(&[]), "No past memories found.");
        let found = vec![
            MemoryMatch {
                recommendation: "Trim on strength".to_string(),
                similarity: 0.9,
            },
        ];
        assert_eq!(reflections(&found), "Trim on strength");
    }

    #[test]
    fn analyst_prompt_names_subject_and_window() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        let prompt = analyst_system_prompt(ReportKind::Market, "NVDA", date, 30);
        assert!(prompt.contains("analyzing NVDA"));
        assert!(prompt.contains("from 2024-05-01 to 2024-05-31"));
    }

    #[test]
    fn risk_prompt_lists_opponents() {
        let prompt = risk_debator_prompt(
            RiskSpeaker::Safe,
            "BUY 100",
            "",
            &["Risky: go big".to_string(), "Neutral: maybe".to_string()],
        );
        assert!(prompt.starts_with("You are the Safe/Conservative Risk Analyst."));
        assert!(prompt.contains("Risky: go big\nNeutral: maybe"));
    }
}

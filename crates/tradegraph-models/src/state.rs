use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::Message;
use crate::trade_request::TradeRequest;

/// Violations of the write-once / monotonic rules of `WorkflowState`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("field `{0}` is write-once and already set")]
    AlreadySet(&'static str),

    #[error("field `{0}` must be populated before this phase")]
    Missing(&'static str),

    #[error("{debate} round count went backwards ({from} -> {to})")]
    RoundCountRegressed {
        debate: &'static str,
        from: u32,
        to: u32,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Market,
    Sentiment,
    News,
    Fundamentals,
}

impl ReportKind {
    pub const ALL: [ReportKind; 4] = [
        ReportKind::Market,
        ReportKind::Sentiment,
        ReportKind::News,
        ReportKind::Fundamentals,
    ];

    pub fn field_name(self) -> &'static str {
        match self {
            ReportKind::Market => "market_report",
            ReportKind::Sentiment => "sentiment_report",
            ReportKind::News => "news_report",
            ReportKind::Fundamentals => "fundamentals_report",
        }
    }
}

/// Analyst reports. Each field is written exactly once per run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Reports {
    #[serde(rename = "market_report", skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    #[serde(rename = "sentiment_report", skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(rename = "news_report", skip_serializing_if = "Option::is_none")]
    pub news: Option<String>,
    #[serde(rename = "fundamentals_report", skip_serializing_if = "Option::is_none")]
    pub fundamentals: Option<String>,
}

impl Reports {
    pub fn get(&self, kind: ReportKind) -> Option<&str> {
        self.slot(kind).as_deref()
    }

    fn slot(&self, kind: ReportKind) -> &Option<String> {
        match kind {
            ReportKind::Market => &self.market,
            ReportKind::Sentiment => &self.sentiment,
            ReportKind::News => &self.news,
            ReportKind::Fundamentals => &self.fundamentals,
        }
    }

    fn slot_mut(&mut self, kind: ReportKind) -> &mut Option<String> {
        match kind {
            ReportKind::Market => &mut self.market,
            ReportKind::Sentiment => &mut self.sentiment,
            ReportKind::News => &mut self.news,
            ReportKind::Fundamentals => &mut self.fundamentals,
        }
    }

    /// A partial `Reports` carrying a single entry.
    pub fn only(kind: ReportKind, content: impl Into<String>) -> Self {
        let mut reports = Reports::default();
        *reports.slot_mut(kind) = Some(content.into());
        reports
    }

    pub fn is_empty(&self) -> bool {
        ReportKind::ALL.iter().all(|k| self.slot(*k).is_none())
    }

    fn merge(&mut self, update: Reports) -> Result<(), StateError> {
        for kind in ReportKind::ALL {
            let mut incoming = update.slot(kind).clone();
            if incoming.is_none() {
                continue;
            }
            let slot = self.slot_mut(kind);
            if slot.is_some() {
                return Err(StateError::AlreadySet(kind.field_name()));
            }
            *slot = incoming.take();
        }
        Ok(())
    }
}

/// Borrowed view over a fully populated set of reports.
#[derive(Debug, Clone, Copy)]
pub struct CompleteReports<'a> {
    pub market: &'a str,
    pub sentiment: &'a str,
    pub news: &'a str,
    pub fundamentals: &'a str,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentSide {
    Bull,
    Bear,
}

impl InvestmentSide {
    pub fn label(self) -> &'static str {
        match self {
            InvestmentSide::Bull => "Bull Analyst",
            InvestmentSide::Bear => "Bear Analyst",
        }
    }
}

/// Accumulated Bull/Bear debate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InvestmentDebateState {
    pub bull_history: String,
    pub bear_history: String,
    pub history: String,
    pub current_response: String,
    pub round_count: u32,
}

impl InvestmentDebateState {
    /// Appends one argument and counts the turn. Returns the role-prefixed argument.
    pub fn record(&mut self, side: InvestmentSide, content: &str) -> String {
        let argument = format!("{}: {content}", side.label());
        self.history.push('\n');
        self.history.push_str(&argument);
        let own = match side {
            InvestmentSide::Bull => &mut self.bull_history,
            InvestmentSide::Bear => &mut self.bear_history,
        };
        own.push('\n');
        own.push_str(&argument);
        self.current_response = argument.clone();
        self.round_count += 1;
        argument
    }

    /// Who produced `current_response`, if anyone has spoken yet.
    pub fn last_speaker(&self) -> Option<InvestmentSide> {
        if self.current_response.is_empty() {
            None
        } else if self.current_response.starts_with("Bull") {
            Some(InvestmentSide::Bull)
        } else {
            Some(InvestmentSide::Bear)
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RiskSpeaker {
    Risky,
    Safe,
    Neutral,
}

impl RiskSpeaker {
    pub fn label(self) -> &'static str {
        match self {
            RiskSpeaker::Risky => "Risky Analyst",
            RiskSpeaker::Safe => "Safe Analyst",
            RiskSpeaker::Neutral => "Neutral Analyst",
        }
    }

    /// Fixed rotation Risky -> Safe -> Neutral -> Risky.
    pub fn next(self) -> RiskSpeaker {
        match self {
            RiskSpeaker::Risky => RiskSpeaker::Safe,
            RiskSpeaker::Safe => RiskSpeaker::Neutral,
            RiskSpeaker::Neutral => RiskSpeaker::Risky,
        }
    }
}

/// Accumulated three-way risk debate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RiskDebateState {
    pub risky_history: String,
    pub safe_history: String,
    pub neutral_history: String,
    pub history: String,
    /// `None` until the first risk debator has spoken.
    pub latest_speaker: Option<RiskSpeaker>,
    pub current_risky_response: String,
    pub current_safe_response: String,
    pub current_neutral_response: String,
    pub round_count: u32,
}

impl RiskDebateState {
    pub fn record(&mut self, speaker: RiskSpeaker, content: &str) {
        let entry = format!("{}: {content}", speaker.label());
        self.history.push('\n');
        self.history.push_str(&entry);
        let (own_history, current) = match speaker {
            RiskSpeaker::Risky => (&mut self.risky_history, &mut self.current_risky_response),
            RiskSpeaker::Safe => (&mut self.safe_history, &mut self.current_safe_response),
            RiskSpeaker::Neutral => (
                &mut self.neutral_history,
                &mut self.current_neutral_response,
            ),
        };
        own_history.push('\n');
        own_history.push_str(&entry);
        *current = content.to_string();
        self.latest_speaker = Some(speaker);
        self.round_count += 1;
    }

    pub fn current_response(&self, speaker: RiskSpeaker) -> &str {
        match speaker {
            RiskSpeaker::Risky => &self.current_risky_response,
            RiskSpeaker::Safe => &self.current_safe_response,
            RiskSpeaker::Neutral => &self.current_neutral_response,
        }
    }
}

/// How a node changes the message sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", content = "messages", rename_all = "snake_case")]
pub enum MessagesUpdate {
    Append(Vec<Message>),
    /// Discards all prior messages.
    Replace(Vec<Message>),
}

/// Partial state produced by one node. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StateUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<MessagesUpdate>,
    #[serde(default, flatten)]
    pub reports: Reports,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment_debate: Option<InvestmentDebateState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_debate: Option<RiskDebateState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trader_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_decision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sender: Option<String>,
}

impl StateUpdate {
    pub fn append_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Some(MessagesUpdate::Append(messages)),
            ..Default::default()
        }
    }

    pub fn replace_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Some(MessagesUpdate::Replace(messages)),
            ..Default::default()
        }
    }
}

/// The single record threaded through the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowState {
    pub subject: String,
    pub as_of_date: NaiveDate,
    pub last_sender: Option<String>,
    pub messages: Vec<Message>,
    pub reports: Reports,
    pub investment_debate: InvestmentDebateState,
    pub risk_debate: RiskDebateState,
    pub investment_plan: Option<String>,
    pub trader_plan: Option<String>,
    pub final_decision: Option<String>,
}

impl WorkflowState {
    /// Initial state for a trade request: empty reports, zeroed debates and
    /// a single instruction message.
    pub fn new(request: &TradeRequest) -> Self {
        Self {
            subject: request.subject.clone(),
            as_of_date: request.as_of_date,
            last_sender: Some("User".to_string()),
            messages: vec![Message::human(format!(
                "Analyze {} as of {}",
                request.subject, request.as_of_date
            ))],
            reports: Reports::default(),
            investment_debate: InvestmentDebateState::default(),
            risk_debate: RiskDebateState::default(),
            investment_plan: None,
            trader_plan: None,
            final_decision: None,
        }
    }

    /// Merges a node's partial update, enforcing write-once fields and
    /// non-decreasing round counts. On error the state is left unchanged.
    pub fn apply(&mut self, update: StateUpdate) -> Result<(), StateError> {
        check_write_once(&self.investment_plan, &update.investment_plan, "investment_plan")?;
        check_write_once(&self.trader_plan, &update.trader_plan, "trader_plan")?;
        check_write_once(&self.final_decision, &update.final_decision, "final_decision")?;
        if let Some(debate) = &update.investment_debate {
            check_rounds(
                "investment_debate",
                self.investment_debate.round_count,
                debate.round_count,
            )?;
        }
        if let Some(debate) = &update.risk_debate {
            check_rounds("risk_debate", self.risk_debate.round_count, debate.round_count)?;
        }
        for kind in ReportKind::ALL {
            if update.reports.get(kind).is_some() && self.reports.get(kind).is_some() {
                return Err(StateError::AlreadySet(kind.field_name()));
            }
        }

        self.reports.merge(update.reports)?;
        match update.messages {
            Some(MessagesUpdate::Append(mut messages)) => self.messages.append(&mut messages),
            Some(MessagesUpdate::Replace(messages)) => self.messages = messages,
            None => {}
        }
        if let Some(debate) = update.investment_debate {
            self.investment_debate = debate;
        }
        if let Some(debate) = update.risk_debate {
            self.risk_debate = debate;
        }
        if update.investment_plan.is_some() {
            self.investment_plan = update.investment_plan;
        }
        if update.trader_plan.is_some() {
            self.trader_plan = update.trader_plan;
        }
        if update.final_decision.is_some() {
            self.final_decision = update.final_decision;
        }
        if update.last_sender.is_some() {
            self.last_sender = update.last_sender;
        }
        Ok(())
    }

    /// The most recent message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// All four analyst reports, or the first missing one.
    pub fn complete_reports(&self) -> Result<CompleteReports<'_>, StateError> {
        let get = |kind: ReportKind| {
            self.reports
                .get(kind)
                .ok_or(StateError::Missing(kind.field_name()))
        };
        Ok(CompleteReports {
            market: get(ReportKind::Market)?,
            sentiment: get(ReportKind::Sentiment)?,
            news: get(ReportKind::News)?,
            fundamentals: get(ReportKind::Fundamentals)?,
        })
    }

    pub fn require_investment_plan(&self) -> Result<&str, StateError> {
        self.investment_plan
            .as_deref()
            .ok_or(StateError::Missing("investment_plan"))
    }

    pub fn require_trader_plan(&self) -> Result<&str, StateError> {
        self.trader_plan
            .as_deref()
            .ok_or(StateError::Missing("trader_plan"))
    }
}

fn check_write_once(
    current: &Option<String>,
    incoming: &Option<String>,
    field: &'static str,
) -> Result<(), StateError> {
    if current.is_some() && incoming.is_some() {
        return Err(StateError::AlreadySet(field));
    }
    Ok(())
}

fn check_rounds(debate: &'static str, from: u32, to: u32) -> Result<(), StateError> {
    if to < from {
        return Err(StateError::RoundCountRegressed { debate, from, to });
    }
    Ok(())
}

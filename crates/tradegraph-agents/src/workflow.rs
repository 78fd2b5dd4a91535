//! The standard trading topology and the streaming runner.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tradegraph_memory::MemoryRegistry;
use tradegraph_models::{
    InvestmentSide, ReportKind, RiskSpeaker, StreamEvent, TradeRequest, WorkflowConfig,
    WorkflowState,
};
use tradegraph_tools::{assignments, Toolkit};

use crate::error::AgentError;
use crate::graph::{Graph, StepOutcome, END};
use crate::model::ChatModel;
use crate::nodes::{
    AnalystNode, ContextResetNode, InvestmentDebatorNode, ResearchManagerNode, RiskDebatorNode,
    RiskJudgeNode, ToolExecutorNode, TraderNode,
};
use crate::rate_limited::RateLimitedModel;
use crate::rate_limiter::{RateLimitNotice, RateLimitObserver};
use crate::router::{analyst_route, AnalystRoute, DebateRouter, InvestmentRoute, RiskRoute};

/// Node names of the standard topology.
pub mod node_names {
    pub const MARKET_ANALYST: &str = "Market Analyst";
    pub const SOCIAL_ANALYST: &str = "Social Analyst";
    pub const NEWS_ANALYST: &str = "News Analyst";
    pub const FUNDAMENTALS_ANALYST: &str = "Fundamentals Analyst";
    pub const MARKET_TOOLS: &str = "market_tools";
    pub const SOCIAL_TOOLS: &str = "social_tools";
    pub const NEWS_TOOLS: &str = "news_tools";
    pub const FUNDAMENTALS_TOOLS: &str = "fundamentals_tools";
    pub const MSG_CLEAR: &str = "Msg Clear";
    pub const BULL_RESEARCHER: &str = "Bull Researcher";
    pub const BEAR_RESEARCHER: &str = "Bear Researcher";
    pub const RESEARCH_MANAGER: &str = "Research Manager";
    pub const TRADER: &str = "Trader";
    pub const RISKY_ANALYST: &str = "Risky Analyst";
    pub const SAFE_ANALYST: &str = "Safe Analyst";
    pub const NEUTRAL_ANALYST: &str = "Neutral Analyst";
    pub const RISK_JUDGE: &str = "Risk Judge";
}

use node_names::*;

/// Everything a run needs. Built once per process; the limiter inside the
/// models is shared by all runs.
pub struct WorkflowServices {
    /// Analysts, debators and the trader.
    pub quick_model: Arc<RateLimitedModel>,
    /// Research Manager and Risk Judge.
    pub deep_model: Arc<RateLimitedModel>,
    pub toolkit: Toolkit,
    pub memories: MemoryRegistry,
    pub workflow: WorkflowConfig,
    /// History window analysts are told to request.
    pub lookback_days: u32,
}

pub type GraphFactory = Arc<
    dyn Fn(&WorkflowServices, Option<RateLimitObserver>) -> Result<Graph, AgentError>
        + Send
        + Sync,
>;

fn investment_target(route: InvestmentRoute) -> &'static str {
    match route {
        InvestmentRoute::Debator(InvestmentSide::Bull) => BULL_RESEARCHER,
        InvestmentRoute::Debator(InvestmentSide::Bear) => BEAR_RESEARCHER,
        InvestmentRoute::ResearchManager => RESEARCH_MANAGER,
    }
}

fn risk_target(route: RiskRoute) -> &'static str {
    match route {
        RiskRoute::Debator(RiskSpeaker::Risky) => RISKY_ANALYST,
        RiskRoute::Debator(RiskSpeaker::Safe) => SAFE_ANALYST,
        RiskRoute::Debator(RiskSpeaker::Neutral) => NEUTRAL_ANALYST,
        RiskRoute::RiskJudge => RISK_JUDGE,
    }
}

/// Market -> Social -> News -> Fundamentals (each looping through its tool
/// node), context reset, Bull/Bear debate, Research Manager, Trader,
/// Risky/Safe/Neutral debate, Risk Judge.
pub fn build_trading_graph(
    services: &WorkflowServices,
    observer: Option<RateLimitObserver>,
) -> Result<Graph, AgentError> {
    let quick = Arc::new(services.quick_model.with_observer(observer.clone()));
    let deep: Arc<dyn ChatModel> = Arc::new(services.deep_model.with_observer(observer));
    let router = DebateRouter::from_config(&services.workflow);
    let memories = &services.memories;

    let analysts = [
        (ReportKind::Market, MARKET_ANALYST, MARKET_TOOLS, assignments::MARKET, SOCIAL_ANALYST),
        (ReportKind::Sentiment, SOCIAL_ANALYST, SOCIAL_TOOLS, assignments::SOCIAL, NEWS_ANALYST),
        (ReportKind::News, NEWS_ANALYST, NEWS_TOOLS, assignments::NEWS, FUNDAMENTALS_ANALYST),
        (
            ReportKind::Fundamentals,
            FUNDAMENTALS_ANALYST,
            FUNDAMENTALS_TOOLS,
            assignments::FUNDAMENTALS,
            MSG_CLEAR,
        ),
    ];

    let mut builder = Graph::builder()
        .entry(MARKET_ANALYST)
        .max_steps(services.workflow.max_steps);

    for (kind, analyst, tool_node, tool_names, next) in analysts {
        let tools = services.toolkit.subset(tool_names)?;
        let model: Arc<dyn ChatModel> = Arc::new(quick.bind_tools(tools.specs()));
        builder = builder
            .node(analyst, Arc::new(AnalystNode::new(kind, model, services.lookback_days)))
            .node(tool_node, Arc::new(ToolExecutorNode::new(tools)))
            .conditional_edge(analyst, &[tool_node, next], move |state: &WorkflowState| {
                match analyst_route(state) {
                    AnalystRoute::Tools => tool_node.to_string(),
                    AnalystRoute::Continue => next.to_string(),
                }
            })
            .edge(tool_node, analyst);
    }

    let quick: Arc<dyn ChatModel> = quick;
    let investment_targets = [BULL_RESEARCHER, BEAR_RESEARCHER, RESEARCH_MANAGER];
    let investment = move |state: &WorkflowState| investment_target(router.investment(state)).to_string();
    let risk_targets = [RISKY_ANALYST, SAFE_ANALYST, NEUTRAL_ANALYST, RISK_JUDGE];
    let risk = move |state: &WorkflowState| risk_target(router.risk(state)).to_string();

    builder = builder
        .node(MSG_CLEAR, Arc::new(ContextResetNode))
        .node(
            BULL_RESEARCHER,
            Arc::new(InvestmentDebatorNode::new(
                InvestmentSide::Bull,
                quick.clone(),
                memories.bull.clone(),
            )),
        )
        .node(
            BEAR_RESEARCHER,
            Arc::new(InvestmentDebatorNode::new(
                InvestmentSide::Bear,
                quick.clone(),
                memories.bear.clone(),
            )),
        )
        .node(
            RESEARCH_MANAGER,
            Arc::new(ResearchManagerNode::new(deep.clone(), memories.invest_judge.clone())),
        )
        .node(TRADER, Arc::new(TraderNode::new(quick.clone(), memories.trader.clone())))
        .node(RISKY_ANALYST, Arc::new(RiskDebatorNode::new(RiskSpeaker::Risky, quick.clone())))
        .node(SAFE_ANALYST, Arc::new(RiskDebatorNode::new(RiskSpeaker::Safe, quick.clone())))
        .node(NEUTRAL_ANALYST, Arc::new(RiskDebatorNode::new(RiskSpeaker::Neutral, quick)))
        .node(RISK_JUDGE, Arc::new(RiskJudgeNode::new(deep, memories.risk_judge.clone())))
        .conditional_edge(MSG_CLEAR, &investment_targets, investment)
        .conditional_edge(BULL_RESEARCHER, &investment_targets, investment)
        .conditional_edge(BEAR_RESEARCHER, &investment_targets, investment)
        .edge(RESEARCH_MANAGER, TRADER)
        .conditional_edge(TRADER, &risk_targets, risk)
        .conditional_edge(RISKY_ANALYST, &risk_targets, risk)
        .conditional_edge(SAFE_ANALYST, &risk_targets, risk)
        .conditional_edge(NEUTRAL_ANALYST, &risk_targets, risk)
        .edge(RISK_JUDGE, END);

    builder.build()
}

/// Starts workflow runs and streams their progress.
#[derive(Clone)]
pub struct WorkflowRunner {
    services: Arc<WorkflowServices>,
    factory: GraphFactory,
}

impl WorkflowRunner {
    pub fn new(services: WorkflowServices) -> Self {
        Self {
            services: Arc::new(services),
            factory: Arc::new(build_trading_graph),
        }
    }

    /// Swap the topology used for every subsequent run.
    pub fn with_graph_factory(mut self, factory: GraphFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn services(&self) -> &WorkflowServices {
        &self.services
    }

    /// Run to completion without streaming and return the final state.
    pub async fn invoke(&self, request: &TradeRequest) -> Result<WorkflowState, AgentError> {
        let graph = (self.factory)(&*self.services, None)?;
        graph.invoke(WorkflowState::new(request)).await
    }

    /// Spawn a run. At most one completed event is buffered ahead of the
    /// consumer; the run blocks on the next send until that one is taken.
    pub fn start(&self, request: TradeRequest, cancel: CancellationToken) -> WorkflowRun {
        let (tx, rx) = mpsc::channel(1);
        let services = Arc::clone(&self.services);
        let factory = Arc::clone(&self.factory);
        let handle = tokio::spawn(drive(services, factory, request, cancel, tx));
        WorkflowRun { events: rx, handle }
    }
}

/// Handle to a spawned run.
pub struct WorkflowRun {
    events: mpsc::Receiver<StreamEvent>,
    handle: JoinHandle<()>,
}

impl WorkflowRun {
    /// The next event, or `None` once the run has stopped.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Drain every remaining event.
    pub async fn collect(mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let _ = self.handle.await;
        events
    }
}

fn rate_limit_event(notice: RateLimitNotice) -> StreamEvent {
    StreamEvent::RateLimit {
        sleep_seconds: notice.sleep.as_secs_f64(),
        request_number: notice.request_number,
    }
}

async fn drive(
    services: Arc<WorkflowServices>,
    factory: GraphFactory,
    request: TradeRequest,
    cancel: CancellationToken,
    tx: mpsc::Sender<StreamEvent>,
) {
    let (notice_tx, mut notices) = mpsc::unbounded_channel::<RateLimitNotice>();
    let observer: RateLimitObserver = Arc::new(move |notice| {
        let _ = notice_tx.send(notice);
    });

    let graph = match factory(&*services, Some(observer)) {
        Ok(graph) => graph,
        Err(e) => {
            error!(error = %e, "Failed to build workflow graph");
            let _ = tx.send(StreamEvent::Error { error: e.to_string() }).await;
            return;
        }
    };

    info!(subject = %request.subject, as_of = %request.as_of_date, "Workflow started");
    let mut execution = graph.start(WorkflowState::new(&request));

    let mut consumer_gone = false;
    loop {
        if cancel.is_cancelled() || tx.is_closed() {
            warn!(steps = execution.steps(), "Workflow stopped before completion");
            return;
        }

        // The node always runs to completion; a lost consumer is only
        // acted on at the next boundary.
        let result = {
            let step = execution.step();
            tokio::pin!(step);
            loop {
                tokio::select! {
                    biased;
                    result = &mut step => break result,
                    Some(notice) = notices.recv(), if !consumer_gone => {
                        if tx.send(rate_limit_event(notice)).await.is_err() {
                            consumer_gone = true;
                        }
                    }
                }
            }
        };
        while let Ok(notice) = notices.try_recv() {
            if consumer_gone {
                continue;
            }
            if tx.send(rate_limit_event(notice)).await.is_err() {
                consumer_gone = true;
            }
        }
        if consumer_gone {
            warn!(steps = execution.steps(), "Event consumer went away");
            return;
        }

        match result {
            Ok(Some(StepOutcome { node, update })) => {
                if tx.send(StreamEvent::Update { node, data: update }).await.is_err() {
                    warn!("Event consumer went away");
                    return;
                }
            }
            Ok(None) => {
                info!(steps = execution.steps(), "Workflow complete");
                let _ = tx.send(StreamEvent::Complete).await;
                return;
            }
            Err(e) => {
                error!(error = %e, steps = execution.steps(), "Workflow failed");
                let _ = tx.send(StreamEvent::Error { error: e.to_string() }).await;
                return;
            }
        }
    }
}

//! End-to-end runs of the standard trading topology with scripted models
//! and static tools.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tradegraph_agents::test_support::{sample_request, sample_state, ScenarioModel, ScriptedModel, StaticTool};
use tradegraph_agents::workflow::node_names::*;
use tradegraph_agents::{
    build_trading_graph, ChatModel, RateLimitedModel, RateLimiter, WorkflowRunner,
    WorkflowServices,
};
use tradegraph_memory::{MemoryRegistry, MemoryTable, ZeroEmbedder};
use tradegraph_models::{Message, MessagesUpdate, StreamEvent, WorkflowConfig};
use tradegraph_tools::Toolkit;

const TOOL_NAMES: [&str; 6] = [
    "get_price_history",
    "get_technical_indicators",
    "get_social_media_sentiment",
    "get_company_news",
    "get_macroeconomic_news",
    "get_fundamental_analysis",
];

fn toolkit() -> Toolkit {
    TOOL_NAMES.iter().fold(Toolkit::new(), |toolkit, name| {
        toolkit.with_tool(Arc::new(StaticTool::new(name, "canned data")))
    })
}

fn services(
    model: Arc<dyn ChatModel>,
    interval: Duration,
    workflow: WorkflowConfig,
) -> WorkflowServices {
    let limiter = Arc::new(RateLimiter::new(interval));
    WorkflowServices {
        quick_model: Arc::new(RateLimitedModel::new(model.clone(), limiter.clone())),
        deep_model: Arc::new(RateLimitedModel::new(model, limiter)),
        toolkit: toolkit(),
        memories: MemoryRegistry::new(
            MemoryTable::open_in_memory().unwrap(),
            Arc::new(ZeroEmbedder::new(8)),
        ),
        workflow,
        lookback_days: 30,
    }
}

fn update_nodes(events: &[StreamEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Update { node, .. } => Some(node.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn debate_with_one_round_has_two_turns_then_manager() {
    let services = services(
        Arc::new(ScenarioModel::new()),
        Duration::ZERO,
        WorkflowConfig {
            max_debate_rounds: 1,
            ..WorkflowConfig::default()
        },
    );
    let graph = build_trading_graph(&services, None).unwrap();
    let mut execution = graph.start_at(MSG_CLEAR, sample_state()).unwrap();

    let mut nodes = Vec::new();
    while let Some(outcome) = execution.step().await.unwrap() {
        nodes.push(outcome.node.clone());
        if outcome.node == RESEARCH_MANAGER {
            break;
        }
    }

    assert_eq!(
        nodes,
        vec![MSG_CLEAR, BULL_RESEARCHER, BEAR_RESEARCHER, RESEARCH_MANAGER]
    );
    let debate = &execution.state().investment_debate;
    assert_eq!(debate.round_count, 2);
    assert!(debate.history.starts_with("\nBull Analyst: Bull case\nBear Analyst: Bear case"));
    assert_eq!(
        execution.state().investment_plan.as_deref(),
        Some("Investment plan: BUY")
    );
}

#[tokio::test]
async fn full_run_streams_every_node_in_order() {
    let model = Arc::new(ScenarioModel::new());
    let runner = WorkflowRunner::new(services(
        model.clone(),
        Duration::ZERO,
        WorkflowConfig::default(),
    ));

    let events = runner
        .start(sample_request(), CancellationToken::new())
        .collect()
        .await;

    assert_eq!(events.last(), Some(&StreamEvent::Complete));
    assert_eq!(
        update_nodes(&events),
        vec![
            MARKET_ANALYST,
            MARKET_TOOLS,
            MARKET_ANALYST,
            SOCIAL_ANALYST,
            SOCIAL_TOOLS,
            SOCIAL_ANALYST,
            NEWS_ANALYST,
            NEWS_TOOLS,
            NEWS_ANALYST,
            FUNDAMENTALS_ANALYST,
            FUNDAMENTALS_TOOLS,
            FUNDAMENTALS_ANALYST,
            MSG_CLEAR,
            BULL_RESEARCHER,
            BEAR_RESEARCHER,
            BULL_RESEARCHER,
            BEAR_RESEARCHER,
            RESEARCH_MANAGER,
            TRADER,
            RISKY_ANALYST,
            SAFE_ANALYST,
            NEUTRAL_ANALYST,
            RISK_JUDGE,
        ]
    );
    assert_eq!(model.request_count(), 18);
}

#[tokio::test]
async fn final_state_has_every_artifact() {
    let runner = WorkflowRunner::new(services(
        Arc::new(ScenarioModel::new()),
        Duration::ZERO,
        WorkflowConfig::default(),
    ));

    let state = runner.invoke(&sample_request()).await.unwrap();

    assert!(state.complete_reports().is_ok());
    assert!(state
        .reports
        .market
        .as_deref()
        .unwrap()
        .starts_with("Report: You are a trading assistant"));
    assert_eq!(state.messages, vec![Message::human("Continue")]);
    assert_eq!(state.investment_debate.round_count, 4);
    assert_eq!(state.risk_debate.round_count, 3);
    assert!(state
        .trader_plan
        .as_deref()
        .unwrap()
        .ends_with("FINAL TRANSACTION PROPOSAL: **BUY**"));
    assert_eq!(state.final_decision.as_deref(), Some("Final decision: BUY"));
    assert_eq!(state.last_sender.as_deref(), Some("Trader"));
}

#[tokio::test(start_paused = true)]
async fn rate_limit_events_precede_the_waiting_node() {
    let runner = WorkflowRunner::new(services(
        Arc::new(ScenarioModel::new()),
        Duration::from_secs(1),
        WorkflowConfig::default(),
    ));

    let events = runner
        .start(sample_request(), CancellationToken::new())
        .collect()
        .await;

    let waits: Vec<&StreamEvent> = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::RateLimit { .. }))
        .collect();
    assert_eq!(waits.len(), 17);

    assert!(matches!(&events[0], StreamEvent::Update { node, .. } if node == MARKET_ANALYST));
    assert!(matches!(&events[1], StreamEvent::Update { node, .. } if node == MARKET_TOOLS));
    assert_eq!(
        events[2],
        StreamEvent::RateLimit {
            sleep_seconds: 1.0,
            request_number: 2,
        }
    );
    assert!(matches!(&events[3], StreamEvent::Update { node, .. } if node == MARKET_ANALYST));
    assert_eq!(events.last(), Some(&StreamEvent::Complete));
}

#[tokio::test]
async fn tool_failures_become_data() {
    let mut services = services(
        Arc::new(ScenarioModel::new()),
        Duration::ZERO,
        WorkflowConfig::default(),
    );
    services.toolkit = toolkit().with_tool(Arc::new(StaticTool::failing(
        "get_price_history",
        "yahoo returned 503",
    )));
    let runner = WorkflowRunner::new(services);

    let events = runner
        .start(sample_request(), CancellationToken::new())
        .collect()
        .await;

    assert_eq!(events.last(), Some(&StreamEvent::Complete));
    let tool_output = events
        .iter()
        .find_map(|e| match e {
            StreamEvent::Update { node, data } if node == MARKET_TOOLS => data.messages.clone(),
            _ => None,
        })
        .unwrap();
    match tool_output {
        MessagesUpdate::Append(messages) => {
            assert!(messages[0]
                .content()
                .starts_with("Error executing get_price_history:"));
        }
        other => panic!("unexpected messages update: {other:?}"),
    }
}

#[tokio::test]
async fn model_failure_ends_with_error_event() {
    let runner = WorkflowRunner::new(services(
        Arc::new(ScriptedModel::new(Vec::<&str>::new())),
        Duration::ZERO,
        WorkflowConfig::default(),
    ));

    let events = runner
        .start(sample_request(), CancellationToken::new())
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        StreamEvent::Error { error } => assert!(error.contains("no replies left")),
        other => panic!("expected error event, got {other:?}"),
    }
}

#[tokio::test]
async fn step_cap_is_reported_as_error() {
    let runner = WorkflowRunner::new(services(
        Arc::new(ScenarioModel::new()),
        Duration::ZERO,
        WorkflowConfig {
            max_steps: 5,
            ..WorkflowConfig::default()
        },
    ));

    let events = runner
        .start(sample_request(), CancellationToken::new())
        .collect()
        .await;

    assert_eq!(update_nodes(&events).len(), 5);
    match events.last() {
        Some(StreamEvent::Error { error }) => assert!(error.contains("aborted after 5 steps")),
        other => panic!("expected error event, got {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_run_stops_at_node_boundary() {
    let runner = WorkflowRunner::new(services(
        Arc::new(ScenarioModel::new()),
        Duration::ZERO,
        WorkflowConfig::default(),
    ));
    let cancel = CancellationToken::new();
    let mut run = runner.start(sample_request(), cancel.clone());

    let first = run.next_event().await.unwrap();
    assert!(matches!(first, StreamEvent::Update { ref node, .. } if node == MARKET_ANALYST));
    cancel.cancel();

    let rest = run.collect().await;
    assert!(rest.len() <= 2);
    assert!(rest.iter().all(|e| !e.is_terminal()));
}

#[tokio::test]
async fn dropped_consumer_stops_model_calls() {
    let model = Arc::new(ScenarioModel::new());
    let runner = WorkflowRunner::new(services(
        model.clone(),
        Duration::ZERO,
        WorkflowConfig::default(),
    ));
    let mut run = runner.start(sample_request(), CancellationToken::new());
    run.next_event().await.unwrap();
    drop(run);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(model.request_count() <= 3);
}

#[tokio::test(start_paused = true)]
async fn consumer_lost_during_rate_limit_wait_lets_the_node_finish() {
    let model = Arc::new(ScenarioModel::new());
    let runner = WorkflowRunner::new(services(
        model.clone(),
        Duration::from_secs(10),
        WorkflowConfig::default(),
    ));
    let mut run = runner.start(sample_request(), CancellationToken::new());
    run.next_event().await.unwrap();

    // The tool update now fills the buffer and the second analyst call is
    // waiting on the limiter with its notice blocked behind it.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(model.request_count(), 1);
    drop(run);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(model.request_count(), 2);
}

#[tokio::test]
async fn degenerate_memories_are_recalled_in_insertion_order() {
    let model = Arc::new(ScriptedModel::repeating("argument"));
    let services = services(model.clone(), Duration::ZERO, WorkflowConfig::default());
    services
        .memories
        .bull
        .add_situations(&[
            ("old rally".to_string(), "Let winners run.".to_string()),
            ("old selloff".to_string(), "Cut losers early.".to_string()),
        ])
        .await
        .unwrap();

    let graph = build_trading_graph(&services, None).unwrap();
    let mut execution = graph.start_at(BULL_RESEARCHER, sample_state()).unwrap();
    execution.step().await.unwrap();
    execution.step().await.unwrap();

    let prompts: Vec<String> = model
        .requests()
        .iter()
        .map(|r| r.messages[0].content().to_string())
        .collect();
    assert!(prompts[0].contains("Reflections from similar past situations: Let winners run."));
    // Bear namespace is empty
    assert!(prompts[1].contains("Reflections from similar past situations: No past memories found."));
}

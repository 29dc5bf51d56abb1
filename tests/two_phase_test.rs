use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

use fest_scout::app::discover_use_case::DiscoverUseCase;
use fest_scout::app::enrich_use_case::{EnrichUseCase, EnrichmentReport};
use fest_scout::app::ports::LlmClient;
use fest_scout::common::constants::CONTACT_DATA_DISCLAIMER;
use fest_scout::common::error::{Result as ScoutResult, ScoutError};
use fest_scout::config::{AppConfig, Secrets};
use fest_scout::crew::CrewDefinition;
use fest_scout::domain::Confidence;
use fest_scout::pipeline::chat::{ChatMessage, ChatReply, ChatRequest, ToolCall};
use fest_scout::pipeline::stage::RowOutcome;
use fest_scout::pipeline::AgentRuntime;
use fest_scout::tools::ToolRegistry;

/// Chat backend that replays a script; an `Err` entry simulates an outage.
struct ScriptedLlm {
    script: Mutex<VecDeque<std::result::Result<ChatReply, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlm {
    fn new(script: Vec<std::result::Result<ChatReply, String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat(&self, request: ChatRequest) -> ScoutResult<ChatReply> {
        self.requests.lock().unwrap().push(request);
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(ScoutError::Api { message }),
            None => Err(ScoutError::agent("script exhausted")),
        }
    }
}

fn answer(text: &str) -> std::result::Result<ChatReply, String> {
    Ok(ChatReply::Answer(text.to_string()))
}

/// Real runtime and real tools with no API keys, so every tool degrades to
/// its "not configured" text.
fn runtime(llm: Arc<ScriptedLlm>) -> Arc<AgentRuntime> {
    let config = AppConfig::default();
    let tools = ToolRegistry::standard(&config, &Secrets::default()).unwrap();
    Arc::new(AgentRuntime::new(llm, tools, &config.llm))
}

#[tokio::test]
async fn fenced_discovery_output_lands_in_the_gated_table() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("festivals_phase1.csv");
    let llm = ScriptedLlm::new(vec![
        Ok(ChatReply::ToolCalls {
            content: None,
            calls: vec![ToolCall {
                id: "call_1".into(),
                name: "firecrawl_search".into(),
                arguments: r#"{"query": "indie festival Japan 2026"}"#.into(),
            }],
        }),
        answer("Candidates: A (Japan)"),
        answer("Scored:\n```json\n{\"festivals\":[{\"name\":\"A\",\"genre_fit_score\":\"High\"}]}\n```"),
        // Conversion pass returns junk; the fenced block still wins.
        answer("sorry"),
    ]);

    let use_case = DiscoverUseCase::new(runtime(llm.clone()), CrewDefinition::research()?);
    let summary = use_case.run(&AppConfig::default().discovery, &output).await?;

    assert_eq!(summary.total, 1);
    assert_eq!(summary.high, 1);
    let content = fs::read_to_string(&output)?;
    let mut lines = content.lines();
    assert!(lines.next().unwrap().ends_with(",submission_info,Approved"));
    assert_eq!(lines.next(), Some("A,,,,,,,High,,,,"));

    let requests = llm.requests.lock().unwrap();
    let tool_reply = requests[1].messages.iter().find_map(|m| match m {
        ChatMessage::Tool { content, .. } => Some(content.clone()),
        _ => None,
    });
    assert_eq!(
        tool_reply.as_deref(),
        Some("FIRECRAWL_API_KEY not configured, skipping web search")
    );
    Ok(())
}

#[tokio::test]
async fn failed_discovery_exits_without_a_table() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("festivals_phase1.csv");
    let llm = ScriptedLlm::new(vec![Err("HTTP 401 Unauthorized".into())]);

    let use_case = DiscoverUseCase::new(runtime(llm), CrewDefinition::research()?);
    assert!(use_case.run(&AppConfig::default().discovery, &output).await.is_err());
    assert!(!output.exists());
    Ok(())
}

#[tokio::test]
async fn approved_rows_are_enriched_and_merged_despite_failures() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("festivals_phase1.csv");
    let output = dir.path().join("festivals_phase2_enriched.csv");
    fs::write(
        &input,
        "name,country,location,dates,genres,website,description,genre_fit_score,why_it_fits,known_acts,submission_info,Approved\n\
         A,Japan,Tokyo,,,https://a.jp,,High,,,,Yes\n\
         B,Korea,Seoul,,,https://b.kr,,Medium,,,, yes\n\
         C,Thailand,Bangkok,,,,,Low,,,,YES\n\
         D,Taiwan,Taipei,,,https://d.tw,,Low,,,,\n",
    )?;

    let llm = ScriptedLlm::new(vec![
        // A: contact finder, then email enricher with JSON output
        answer("Booking contact on /contact: Aiko (Booker) aiko@a.jp"),
        answer(r#"{"festival_name": "A", "confidence": "High", "source": "https://a.jp/contact",
                  "notes": "", "contacts": [
                    {"name": "Aiko", "role": "Booker", "email": "aiko@a.jp"},
                    {"name": "Ren", "role": "Press", "email": "press@a.jp"}]}"#),
        // B: the model endpoint goes down
        Err("HTTP 503 Service Unavailable".into()),
        // C has no website and makes no calls
    ]);

    let use_case = EnrichUseCase::new(runtime(llm.clone()), CrewDefinition::enrichment()?);
    let report = use_case.run(&input, &output, &mut |_, _, _, _| {}).await?;
    let EnrichmentReport::Completed(summary) = report else {
        panic!("expected approved rows");
    };

    assert_eq!(summary.processed(), 3);
    assert!(matches!(summary.outcomes[0], RowOutcome::Enriched(_)));
    assert!(matches!(summary.outcomes[1], RowOutcome::Failed(_)));
    assert!(matches!(summary.outcomes[2], RowOutcome::Skipped(_)));
    assert_eq!(summary.with_confidence(Confidence::High), 1);
    assert_eq!(summary.merge.rows_written, 2 + 1 + 1);
    assert_eq!(llm.requests.lock().unwrap().len(), 3);

    let content = fs::read_to_string(&output)?;
    assert!(content.trim_end().ends_with(CONTACT_DATA_DISCLAIMER));
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .from_reader(content.as_bytes());
    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().collect::<std::result::Result<_, _>>()?;

    assert_eq!(rows.len(), 4);
    assert_eq!(&rows[1][column("Contact Email")], "press@a.jp");
    assert_eq!(&rows[1][column("country")], "Japan");
    assert!(rows[2][column("Notes")].starts_with("Enrichment failed: "));
    assert!(rows[2][column("Notes")].contains("503"));
    assert_eq!(&rows[3][column("Notes")], "No website available for contact lookup");
    assert_eq!(&rows[3][column("Contact Email")], "");
    assert!(rows.iter().all(|r| &r[column("name")] != "D"));
    Ok(())
}

#[tokio::test]
async fn table_without_gate_column_processes_nothing() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("festivals_phase1.csv");
    fs::write(&input, "name,website\nA,https://a.jp\n")?;
    let llm = ScriptedLlm::new(vec![]);

    let use_case = EnrichUseCase::new(runtime(llm.clone()), CrewDefinition::enrichment()?);
    let report = use_case
        .run(&input, &dir.path().join("out.csv"), &mut |_, _, _, _| {})
        .await?;

    assert!(matches!(report, EnrichmentReport::NothingApproved { diagnostic: Some(_) }));
    assert!(llm.requests.lock().unwrap().is_empty());
    Ok(())
}

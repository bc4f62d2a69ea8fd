//! An interactive travel planner for the terminal.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::select;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use travel_planner::core::{
    ClarificationRequest, ClarificationSource, Stage, TravelAnalysis,
};
use travel_planner::{ClarificationPolicy, Config};

enum PlannerEvent {
    Analyzed(TravelAnalysis),
    Clarifying(usize, Vec<String>),
    Question(ClarificationRequest, oneshot::Sender<Option<String>>),
}

/// Forwards clarification requests to the main loop, which asks the user.
struct PromptUser {
    event_tx: mpsc::UnboundedSender<PlannerEvent>,
}

#[async_trait]
impl ClarificationSource for PromptUser {
    async fn clarify(&self, request: &ClarificationRequest) -> Option<String> {
        let (answer_tx, answer_rx) = oneshot::channel();
        self.event_tx
            .send(PlannerEvent::Question(request.clone(), answer_tx))
            .ok()?;
        answer_rx.await.ok().flatten()
    }
}

const BAR_CHAR: &str = "▎";

const EXAMPLE_REQUESTS: &[&str] = &[
    "Plan a trip to Japan for cherry blossoms.",
    "I want to visit Paris for 5 days.",
    "What should I know about traveling to Bali?",
    "Give me travel tips for New York City.",
];

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // A missing `.env` file is fine, the variables may be set already.
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} {err}", "Configuration error:".bright_red());
            eprintln!("Put OPENAI_API_KEY=<your key> in a `.env` file.");
            return ExitCode::FAILURE;
        }
    };
    debug!("loaded config: {config:?}");

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let mut builder = config.orchestrator_builder().on_stage({
        let event_tx = event_tx.clone();
        move |stage| {
            let event = match stage {
                Stage::Analyzed(record) => {
                    PlannerEvent::Analyzed(record.clone())
                }
                Stage::Clarifying {
                    round_trip,
                    request,
                } => PlannerEvent::Clarifying(
                    round_trip,
                    request.missing_items.clone(),
                ),
                Stage::Start(_) | Stage::Done(_) => return,
            };
            event_tx.send(event).ok();
        }
    });
    if config.clarification() == ClarificationPolicy::Ask {
        builder = builder.with_clarification_source(PromptUser {
            event_tx: event_tx.clone(),
        });
    }
    let orchestrator = Arc::new(builder.build());

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .map(|style| style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"))
        .unwrap_or_else(|_| ProgressStyle::default_spinner());

    println!("{}", "🌍 Travel Planner".bright_white().bold());
    println!("\n📋 Example travel requests you can try:");
    for (i, request) in EXAMPLE_REQUESTS.iter().enumerate() {
        println!("{}. {request}", i + 1);
    }
    println!("\nType `quit` to leave.\n");

    let mut input = io::BufReader::new(io::stdin()).lines();
    loop {
        print!("{}", "Your travel request: ".bright_green());
        std::io::stdout().flush().ok();

        let Some(line) = read_line(&mut input).await else {
            break;
        };
        let request = line.trim().to_owned();
        match request.as_str() {
            "" => {
                println!("Describe a trip, or pick one of the examples.\n");
                continue;
            }
            "quit" | "exit" | "q" => break,
            _ => {}
        }

        let mut task = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.run(&request).await }
        });

        let mut progress_bar = None;

        let result = 'run: loop {
            // Create a new progress bar if it has been finished.
            progress_bar
                .get_or_insert_with(|| {
                    let progress_bar = ProgressBar::new_spinner();
                    progress_bar.set_style(progress_style.clone());
                    progress_bar.set_message("🧭 Planning...");
                    progress_bar
                })
                .inc(1);

            let sleep = sleep(Duration::from_millis(100));
            let event = select! {
                result = &mut task => break 'run result,
                Some(event) = event_rx.recv() => event,
                _ = sleep => continue 'run,
            };

            // Finish the progress bar before printing anything else.
            if let Some(progress_bar) = progress_bar.take() {
                progress_bar.finish_and_clear();
            }
            print_event(event, &mut input).await;
        };

        if let Some(progress_bar) = progress_bar {
            progress_bar.finish_and_clear();
        }
        while let Ok(event) = event_rx.try_recv() {
            print_event(event, &mut input).await;
        }

        match result {
            Ok(Ok(itinerary)) => {
                println!("\n{}", "✈️  Your itinerary".bright_cyan().bold());
                for line in itinerary.as_str().lines() {
                    println!("{}{line}", BAR_CHAR.bright_cyan());
                }
                println!();
            }
            Ok(Err(err)) => {
                println!("{}❌ {err}\n", BAR_CHAR.bright_red());
            }
            Err(err) => {
                error!("planner task failed: {err}");
                println!("{}❌ Planning was interrupted\n", BAR_CHAR.red());
            }
        }
    }

    ExitCode::SUCCESS
}

async fn print_event<R: AsyncBufRead + Unpin>(
    event: PlannerEvent,
    input: &mut Lines<R>,
) {
    match event {
        PlannerEvent::Analyzed(record) => {
            let bar = BAR_CHAR.bright_blue();
            let duration = record.duration.as_deref().unwrap_or("?");
            println!(
                "{bar}📍 {} · {duration} · {}",
                record.destination.bright_white(),
                record.purpose
            );
        }
        PlannerEvent::Clarifying(round_trip, missing) => {
            let bar = BAR_CHAR.bright_yellow();
            println!(
                "{bar}❓ Round trip {round_trip}, missing: {}",
                missing.join(", ").bright_white().bold()
            );
        }
        PlannerEvent::Question(request, answer_tx) => {
            let bar = BAR_CHAR.bright_yellow();
            println!("{bar}{}", request.reason);
            print!(
                "Tell me the {} (leave empty for defaults): ",
                request.missing_items.join(", ")
            );
            std::io::stdout().flush().ok();

            let answer = read_line(input)
                .await
                .map(|line| line.trim().to_owned())
                .filter(|line| !line.is_empty());
            answer_tx.send(answer).ok();
            println!();
        }
    }
}

/// Reads the next line, or `None` at the end of the input.
///
/// The same reader must be used for the whole session, so lines pasted
/// ahead of a prompt stay buffered for it.
async fn read_line<R: AsyncBufRead + Unpin>(
    input: &mut Lines<R>,
) -> Option<String> {
    match input.next_line().await {
        Ok(line) => line,
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_line_keeps_buffered_lines() {
        let mut input = io::BufReader::new(&b"Paris\n5 days\n"[..]).lines();
        assert_eq!(read_line(&mut input).await.as_deref(), Some("Paris"));
        assert_eq!(read_line(&mut input).await.as_deref(), Some("5 days"));
        assert_eq!(read_line(&mut input).await, None);
    }

    #[tokio::test]
    async fn test_answer_after_pasted_request() {
        let mut input =
            io::BufReader::new(&b"Japan in spring\ntwo weeks\n"[..]).lines();
        let request = read_line(&mut input).await;
        assert_eq!(request.as_deref(), Some("Japan in spring"));

        let (answer_tx, answer_rx) = oneshot::channel();
        let request = ClarificationRequest {
            missing_items: vec!["duration".to_owned()],
            reason: "How long is the trip?".to_owned(),
        };
        print_event(PlannerEvent::Question(request, answer_tx), &mut input)
            .await;
        assert_eq!(answer_rx.await.unwrap().as_deref(), Some("two weeks"));
    }
}

//! SMS flow console
//!
//! Runs a sample conversation against stdin: each line is treated as an
//! inbound SMS from `SMS_FLOW_FROM` and outbound messages are printed.

use async_trait::async_trait;
use sms_flow::action::{Answer, DeliveryId, QuestionType};
use sms_flow::runtime::{MemoryStateStore, Transport};
use sms_flow::{
    resolver, Action, ActionContext, ConfigError, ConversationRuntime, Flow, FlowConfig,
    FlowController, FlowSchema, Question, QuestionOptions,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Prints outbound messages to stdout
#[derive(Default)]
struct ConsoleTransport {
    sent: AtomicUsize,
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn deliver(&self, recipient: &str, body: &str) -> Result<DeliveryId, String> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        println!("[to {recipient}] {body}");
        Ok(DeliveryId::Single(format!("console-{n}")))
    }
}

fn answer_text<'a>(context: &'a sms_flow::FlowContext, name: &str) -> Option<&'a str> {
    match context.get(name)? {
        ActionContext::Question {
            answer: Some(Answer::Text(text)),
            ..
        } => Some(text.as_str()),
        _ => None,
    }
}

fn root_flow() -> Result<Flow, ConfigError> {
    Flow::new()
        .with_action(
            "greeting",
            resolver(|_, _| Action::reply("Hi! This is the demo line. Text STOP at any time to leave.").ok()),
        )?
        .with_action(
            "ask_name",
            resolver(|_, _| {
                Question::new(
                    "What's your first name?",
                    QuestionOptions::new()
                        .with_max_retries(2)
                        .with_invalid_answer_text("Please send your name as text."),
                )
                .ok()
                .map(Action::from)
            }),
        )?
        .with_action(
            "menu",
            resolver(|context, _| {
                let name = answer_text(context, "ask_name").unwrap_or("there");
                let options = QuestionOptions::new()
                    .with_type(QuestionType::MultipleChoice)
                    .with_choice(|answer: &str| answer.trim() == "1")
                    .with_choice(|answer: &str| answer.trim() == "2")
                    .with_invalid_answer_text("Reply 1 or 2.")
                    .with_failure_text("No problem, goodbye!");
                Question::new(format!("Thanks {name}. Reply 1 to update your card or 2 for our hours."), options)
                    .ok()
                    .map(Action::from)
            }),
        )?
        .with_action(
            "route",
            resolver(|context, _| match context.get("menu")? {
                ActionContext::Question {
                    answer: Some(Answer::Choice(0)),
                    ..
                } => Action::trigger("billing.update_card").ok(),
                _ => Action::reply("We're open 9am to 5pm, Monday to Friday.").ok(),
            }),
        )
}

fn billing_schema() -> Result<FlowSchema, ConfigError> {
    let update_card = Flow::new()
        .with_action(
            "card_digits",
            resolver(|_, _| {
                Question::new(
                    "Send the last 4 digits of your new card.",
                    QuestionOptions::new()
                        .with_validator(|answer: &str| {
                            let answer = answer.trim();
                            answer.len() == 4 && answer.chars().all(|c| c.is_ascii_digit())
                        })
                        .with_max_retries(3)
                        .with_invalid_answer_text("That didn't look like 4 digits.")
                        .with_failure_text("Let's try again another time."),
                )
                .ok()
                .map(Action::from)
            }),
        )?
        .with_action(
            "confirm",
            resolver(|context, _| {
                let digits = answer_text(context, "card_digits")?;
                Action::reply(format!("Card ending in {} saved.", digits.trim())).ok()
            }),
        )?;

    FlowSchema::from_entries([("billing", FlowSchema::new().with("update_card", update_card)?)])
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sms_flow=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = FlowConfig::from_env();
    let runtime = ConversationRuntime::from_config(
        FlowController::new(root_flow()?, Some(&billing_schema()?))?,
        MemoryStateStore::new(),
        ConsoleTransport::default(),
        &config,
    );
    tracing::info!(
        flows = ?runtime.controller().flows().paths(),
        from = %config.console_from,
        "Flow console ready"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match runtime.handle_message(&config.console_from, line).await {
            Ok(outcome) if outcome.is_complete() => println!("-- conversation ended --"),
            Ok(_) => {}
            Err(e) => eprintln!("error: {e}"),
        }
    }

    Ok(())
}

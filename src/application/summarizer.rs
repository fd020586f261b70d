//! End-of-goal summaries and recall quizzes generated by the completion service.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::json_reply::{parse_json, trace_id};
use crate::domain::conversation::{
    ConversationGoal, ConversationSummary, KeyPersonalDetails, Message, OutcomeStatus, QuizQuestion,
};
use crate::domain::foundation::Timestamp;
use crate::ports::{
    AIProvider, CompletionRequest, ConversationSummarizer, MessageRole, RequestMetadata,
    RequestPurpose, SummarizerError,
};

/// `ConversationSummarizer` backed by an `AIProvider`.
///
/// Completion failures are returned as errors; replies that cannot be parsed
/// degrade to [`ConversationSummary::failed`] and [`QuizQuestion::fallback`].
pub struct AiConversationSummarizer {
    ai: Arc<dyn AIProvider>,
}

impl AiConversationSummarizer {
    pub fn new(ai: Arc<dyn AIProvider>) -> Self {
        Self { ai }
    }

    async fn ask(
        &self,
        goal: &ConversationGoal,
        purpose: RequestPurpose,
        prompt: String,
    ) -> Result<String, SummarizerError> {
        let metadata = RequestMetadata::new(goal.owner.clone(), purpose, trace_id())
            .with_goal(goal.id)
            .with_conversation(goal.conversation_id);
        let request = CompletionRequest::new(metadata)
            .with_message(MessageRole::User, prompt)
            .with_max_tokens(1000)
            .with_temperature(0.3);
        Ok(self.ai.complete(request).await?.content)
    }
}

#[async_trait]
impl ConversationSummarizer for AiConversationSummarizer {
    async fn summarize(
        &self,
        goal: &ConversationGoal,
        messages: &[Message],
    ) -> Result<ConversationSummary, SummarizerError> {
        if messages.is_empty() {
            return Err(SummarizerError::EmptyConversation);
        }
        let reply = self
            .ask(goal, RequestPurpose::Summary, summary_prompt(goal, messages))
            .await?;

        Ok(match parse_json::<SummaryReply>(&reply) {
            Ok(parsed) => parsed.into_summary(),
            Err(e) => {
                tracing::warn!(goal_id = %goal.id, response = %reply, error = %e, "unparseable summary");
                ConversationSummary::failed(e)
            }
        })
    }

    async fn generate_quiz(
        &self,
        goal: &ConversationGoal,
        summary: &ConversationSummary,
        count: usize,
    ) -> Result<Vec<QuizQuestion>, SummarizerError> {
        let reply = self
            .ask(goal, RequestPurpose::Quiz, quiz_prompt(summary, count))
            .await?;

        let questions: Vec<QuizQuestion> = match parse_json::<Vec<QuizQuestion>>(&reply) {
            Ok(questions) => questions
                .into_iter()
                .filter(|q| !q.question.trim().is_empty())
                .take(count.max(1))
                .collect(),
            Err(e) => {
                tracing::warn!(goal_id = %goal.id, response = %reply, error = %e, "unparseable quiz");
                Vec::new()
            }
        };
        if questions.is_empty() {
            return Ok(vec![QuizQuestion::fallback()]);
        }
        Ok(questions)
    }
}

fn summary_prompt(goal: &ConversationGoal, messages: &[Message]) -> String {
    let transcript: String = messages
        .iter()
        .map(|m| {
            let speaker = if m.is_from_user() { "You" } else { "Target" };
            format!(
                "[{}] {}: {}\n",
                m.timestamp.as_datetime().format("%Y-%m-%d %H:%M:%S"),
                speaker,
                m.text
            )
        })
        .collect();

    format!(
        "Analyze the following conversation and provide a comprehensive summary.\n\n\
         Conversation Goal: {outcome}\n\
         Meeting Context: {context}\n\n\
         Conversation:\n{transcript}\n\
         Provide a JSON response with this structure:\n\
         {{\"summary\": \"conversation flow, key topics and overall tone\", \
         \"key_personal_details\": {{\"name\": \"...\", \"occupation\": \"...\", \
         \"interests\": [\"...\"], \"location\": \"...\", \"important_facts\": [\"...\"], \
         \"preferences\": [\"...\"]}}, \
         \"next_steps\": \"agreed plans or commitments\", \
         \"outcome_status\": \"pending/achieved/failed\", \
         \"tone\": \"friendly/professional/romantic/etc\"}}\n\n\
         Return JSON only, no additional text:",
        outcome = goal.desired_outcome,
        context = goal.meeting_context,
        transcript = transcript,
    )
}

fn quiz_prompt(summary: &ConversationSummary, count: usize) -> String {
    let details = serde_json::to_string(&summary.key_details).unwrap_or_default();
    format!(
        "Based on the following conversation summary and key personal details, generate {count} \
         quiz questions to test if someone remembers important information about the person \
         they chatted with.\n\n\
         Conversation Summary:\n{summary}\n\n\
         Key Personal Details:\n{details}\n\n\
         Agreed Next Steps:\n{next_steps}\n\n\
         Generate questions that test personal details (name, occupation, interests), \
         important information mentioned, agreed-upon next steps, and preferences or opinions shared.\n\n\
         Return your response as a JSON array with this format:\n\
         [{{\"question\": \"What is [person]'s occupation?\", \"correct_answer\": \"Venture Capitalist\", \"type\": \"text\"}}]\n\n\
         Return JSON only, no additional text:",
        count = count,
        summary = summary.summary,
        details = details,
        next_steps = summary.next_steps,
    )
}

#[derive(Debug, Deserialize)]
struct SummaryReply {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    key_personal_details: Option<KeyPersonalDetails>,
    #[serde(default)]
    next_steps: Option<String>,
    #[serde(default)]
    outcome_status: Option<String>,
    #[serde(default)]
    tone: Option<String>,
}

impl SummaryReply {
    fn into_summary(self) -> ConversationSummary {
        ConversationSummary {
            summary: self
                .summary
                .unwrap_or_else(|| "No summary available".to_string()),
            key_details: self.key_personal_details.unwrap_or_default(),
            next_steps: self.next_steps.unwrap_or_else(|| "None".to_string()),
            outcome_status: self
                .outcome_status
                .as_deref()
                .map(OutcomeStatus::parse)
                .unwrap_or_default(),
            tone: self.tone.unwrap_or_else(|| "neutral".to_string()),
            quiz: Vec::new(),
            generated_at: Timestamp::now(),
        }
    }
}

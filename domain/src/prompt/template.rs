//! Prompt templates for the council flow

use crate::core::query::UserQuery;
use crate::job::value_objects::{Stage1Result, Stage2Result};
use crate::ranking::labels::LabelMap;

/// Title used when the title worker fails or returns nothing
pub const NEW_CONVERSATION_TITLE: &str = "New Conversation";

const MAX_TITLE_CHARS: usize = 50;

/// Templates for generating prompts at each stage
pub struct PromptTemplate;

impl PromptTemplate {
    /// Stage 1 sends the raw question with no framing
    pub fn stage1_prompt(query: &UserQuery) -> String {
        query.content().to_string()
    }

    /// Stage 2 prompt: every stage-1 answer under its anonymous label,
    /// followed by strict formatting instructions for the ranked list.
    pub fn ranking_prompt(query: &UserQuery, labels: &LabelMap, stage1: &[Stage1Result]) -> String {
        let responses = labels
            .labelled(stage1)
            .into_iter()
            .map(|(label, text)| format!("{}:\n{}", label, text))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            r#"You are evaluating different responses to the following question:

Question: {question}

Here are the responses from different models (anonymized):

{responses}

Your task:
1. First, evaluate each response individually. For each response, explain what it does well and what it does poorly.
2. Then, at the very end of your response, provide a final ranking.

IMPORTANT: Your final ranking MUST be formatted EXACTLY as follows:
- Start with the line "FINAL RANKING:" (all caps, with colon)
- Then list the responses from best to worst as a numbered list
- Each line should be: number, period, space, then ONLY the response label (e.g., "1. Response A")
- Do not add any other text or explanations in the ranking section

Example of the correct format for your ENTIRE response:

Response A provides good detail on X but misses Y...
Response B is accurate but lacks depth on Z...
Response C offers the most comprehensive answer...

FINAL RANKING:
1. Response C
2. Response A
3. Response B

Now provide your evaluation and ranking:"#,
            question = query.content(),
            responses = responses,
        )
    }

    /// Stage 3 prompt for the chairman.
    ///
    /// With a single stage-1 answer there are no peer rankings, so the
    /// ranking section is omitted and the chairman is asked to refine it.
    pub fn chairman_prompt(
        query: &UserQuery,
        stage1: &[Stage1Result],
        stage2: &[Stage2Result],
    ) -> String {
        let stage1_text = stage1
            .iter()
            .map(|r| format!("Model: {}\nResponse: {}", r.model, r.response))
            .collect::<Vec<_>>()
            .join("\n\n");

        if stage1.len() == 1 {
            return format!(
                r#"You are the Chairman of an LLM Council. A single model has provided a response to the user's question.

Original Question: {question}

COUNCIL MEMBER RESPONSE:
{stage1_text}

Your task as Chairman is to review this response and provide a refined, comprehensive answer. Consider:
- The strengths and weaknesses of the provided response
- Any gaps or areas that could be improved
- Providing additional context or clarification where helpful

Provide a clear, well-reasoned final answer:"#,
                question = query.content(),
                stage1_text = stage1_text,
            );
        }

        let stage2_text = stage2
            .iter()
            .map(|r| format!("Model: {}\nRanking: {}", r.model, r.ranking))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            r#"You are the Chairman of an LLM Council. Multiple AI models have provided responses to a user's question, and then ranked each other's responses.

Original Question: {question}

STAGE 1 - Individual Responses:
{stage1_text}

STAGE 2 - Peer Rankings:
{stage2_text}

Your task as Chairman is to synthesize all of this information into a single, comprehensive, accurate answer to the user's original question. Consider:
- The individual responses and their insights
- The peer rankings and what they reveal about response quality
- Any patterns of agreement or disagreement

Provide a clear, well-reasoned final answer that represents the council's collective wisdom:"#,
            question = query.content(),
            stage1_text = stage1_text,
            stage2_text = stage2_text,
        )
    }

    /// Prompt asking for a 3-5 word conversation title
    pub fn title_prompt(query: &UserQuery) -> String {
        format!(
            r#"Generate a very short title (3-5 words maximum) that summarizes the following question.
The title should be concise and descriptive. Do not use quotes or punctuation in the title.

Question: {}

Title:"#,
            query.content()
        )
    }
}

/// Normalize a raw title: trim, strip surrounding quotes, cap at 50 chars
/// (47 + "...").
pub fn clean_title(raw: &str) -> String {
    let title = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if title.is_empty() {
        return NEW_CONVERSATION_TITLE.to_string();
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        let head: String = title.chars().take(MAX_TITLE_CHARS - 3).collect();
        return format!("{}...", head);
    }
    title.to_string()
}

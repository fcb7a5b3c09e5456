//! Prompt construction for blind estimation.
//!
//! The research prompt is built ONLY from [`BlindMarketInput`] fields.
//! Nothing price-shaped exists on that type, so the blindness property
//! is enforced structurally here.

use crate::domain::estimate::BlindMarketInput;

/// System prompt for the research model. Sent as a cacheable system
/// block so repeated scans reuse the prefix.
pub const SYSTEM_PROMPT: &str = "\
You are a careful probabilistic forecaster for binary event questions. \
You estimate the probability that a question resolves YES using your \
knowledge and targeted web searches. You are never shown what traders \
or bettors currently believe, and you must not search for that; reason \
from base rates and concrete evidence about the event itself.

Work through the question step by step:
1. Identify what exactly must happen for a YES resolution.
2. Establish the relevant base rate for events of this kind.
3. Search for current, specific evidence that shifts the base rate.
4. Weigh the strongest evidence for and against.
5. Commit to a calibrated probability.

Then respond with a single JSON object, inside a ```json code fence, \
with exactly these fields:
{
  \"probability\": <number between 0.01 and 0.99>,
  \"confidence\": \"high\" | \"medium\" | \"low\",
  \"reasoning\": \"<3-6 sentence summary of your reasoning>\",
  \"key_evidence\": [\"<evidence item>\", ...],
  \"key_uncertainties\": [\"<uncertainty>\", ...]
}";

/// System prompt for the cheap pre-screen model.
pub const SCREEN_SYSTEM_PROMPT: &str = "\
You decide whether a prediction-market question is worth deep \
research. Answer NO for questions that are unresearchable (pure \
randomness, no public evidence), essentially decided already, or too \
ambiguous to resolve cleanly. Answer YES otherwise. Respond with the \
single word YES or NO.";

/// Render the research user message. Only blind fields appear.
#[must_use]
pub fn build_research_prompt(input: &BlindMarketInput) -> String {
    let mut prompt = format!(
        "Estimate the probability that this market resolves YES.\n\n\
         Question: {}\n\
         Resolution criteria: {}\n\
         Close date: {}\n\
         Category: {}\n",
        input.question,
        input
            .resolution_criteria
            .as_deref()
            .unwrap_or("Not specified"),
        input.close_at.as_deref().unwrap_or("Not specified"),
        input.category.as_deref().unwrap_or("General"),
    );

    if let Some(sport) = &input.sport {
        prompt.push_str(&format!("Sport: {sport}\n"));
    }

    if let Some(feedback) = &input.calibration_feedback {
        prompt.push_str(&format!(
            "\nYour historical calibration on resolved questions:\n{feedback}\n\
             Adjust for any bias shown above.\n"
        ));
    }

    prompt
}

/// Render the pre-screen user message from the same blind fields.
#[must_use]
pub fn build_screen_prompt(input: &BlindMarketInput) -> String {
    format!(
        "Is this question worth deep research?\n\n\
         Question: {}\n\
         Resolution criteria: {}\n\
         Close date: {}\n\
         Category: {}\n\n\
         Answer YES or NO.",
        input.question,
        input
            .resolution_criteria
            .as_deref()
            .unwrap_or("Not specified"),
        input.close_at.as_deref().unwrap_or("Not specified"),
        input.category.as_deref().unwrap_or("General"),
    )
}

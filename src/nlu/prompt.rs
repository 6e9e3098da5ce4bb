//! Classification prompt

use super::ResolverContext;
use std::fmt::Write;

const PREAMBLE: &str =
    "You are analyzing a user message in a conversational chatbot for an e-commerce system.";

const TASK: &str = r##"TASK: Analyze the message and return a JSON object with:

1. intent: Identify the primary intent:
   - "search_products": User wants to see available products
   - "place_order": User wants to make a purchase
   - "check_status": User wants to check order status
   - "confirm": User is confirming (yes, correct, proceed, ok, etc.)
   - "cancel": User wants to cancel or start over
   - "provide_info": User is providing requested information
   - "unknown": Cannot determine intent

2. Extract entities (set to null if not mentioned):
   - product_name: Name of product (e.g., "laptop", "iPhone 14")
   - quantity: Number of items (convert words to numbers: "three" -> 3)
   - order_id: Order identifier (e.g., "#12345", "ORD-789")

3. confidence: "high", "medium", or "low"

IMPORTANT:
- If awaiting confirmation and user says yes/ok/correct, set intent to "confirm"
- If user provides information that was missing, extract it even if intent seems different
- Be flexible with product names and handle typos
- Convert text numbers to numeric values

Return ONLY a valid JSON object (no markdown, no explanations):
{
  "intent": "string",
  "product_name": "string or null",
  "quantity": number or null,
  "order_id": "string or null",
  "confidence": "high|medium|low"
}"##;

const NOT_PROVIDED: &str = "not provided";

/// Build the prompt for one user message.
///
/// The context block is only included once the conversation has a task.
pub fn build_prompt(message: &str, context: &ResolverContext) -> String {
    let mut prompt = format!("{PREAMBLE}\n\nUser message: \"{message}\"\n\n");

    if let Some(intent) = context.intent {
        let quantity = context
            .quantity
            .map_or_else(|| NOT_PROVIDED.to_string(), |q| q.to_string());
        let _ = write!(
            prompt,
            "CONVERSATION CONTEXT:\n\
             - Current intent: {}\n\
             - Product name: {}\n\
             - Quantity: {}\n\
             - Order ID: {}\n\
             - Awaiting confirmation: {}\n\n",
            intent.as_str(),
            context.product_name.as_deref().unwrap_or(NOT_PROVIDED),
            quantity,
            context.order_id.as_deref().unwrap_or(NOT_PROVIDED),
            context.awaiting_confirmation,
        );
    }

    prompt.push_str(TASK);
    prompt
}

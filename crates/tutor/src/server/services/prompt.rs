//! Prompt assembly for the generation step

use crate::server::models::conversation::Message;

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a Rate My Professor agent that helps students find professors that match their questions. For every question, present the top 3 professors who best match what the student is asking for.

Instructions:

Understand the query: work out what the student wants in a professor, such as a subject, a teaching style, a minimum rating or other preferences.

Use the retrieved reviews: every user message is followed by reviews retrieved automatically from the review database. Base your answer on those reviews only, and say so when they do not contain a good match.

Rank professors: pick the 3 professors who best fit the question, weighing subject relevance, rating and what other students wrote.

Present results: for each professor give the name, subject, rating and a one-sentence summary of the reviews.

Example:

User query: "I'm looking for a highly-rated professor for Chemistry who is known for engaging lectures."
Response:
1. Dr. Emily Johnson - Chemistry 101, Rating: 4.5, "Known for engaging lectures and clear explanations."
2. Dr. Robert Davis - Chemistry 201, Rating: 4.2, "Interactive teaching style; challenging but rewarding classes."
3. Dr. Laura Garcia - Organic Chemistry, Rating: 4.0, "Makes complex topics understandable."
"#;

/// Append the retrieved context block to the live user query
pub fn augment_query(query: &str, context_block: &str) -> String {
  format!("{query}{context_block}")
}

/// Model-facing conversation: system instructions, prior turns, then the augmented query
pub fn build_conversation(system_prompt: &str, history: &[Message], augmented_query: String) -> Vec<Message> {
  let mut conversation = Vec::with_capacity(history.len() + 2);
  conversation.push(Message::system(system_prompt));
  conversation.extend(history.iter().cloned());
  conversation.push(Message::user(augmented_query));
  conversation
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::server::models::conversation::Role;

  #[test]
  fn test_conversation_order() {
    let history = vec![Message::assistant("Hi!"), Message::user("earlier"), Message::assistant("answer")];

    let conversation = build_conversation("be helpful", &history, "now + context".to_string());

    let roles: Vec<Role> = conversation.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::Assistant, Role::User, Role::Assistant, Role::User]);
    assert_eq!(conversation[0].content, "be helpful");
    assert_eq!(conversation.last().unwrap().content, "now + context");
  }

  #[test]
  fn test_augment_keeps_query_first() {
    let augmented = augment_query("Who teaches art?", "\n\n[context]");
    assert!(augmented.starts_with("Who teaches art?"));
    assert!(augmented.ends_with("[context]"));
  }
}

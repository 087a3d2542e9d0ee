//! Plain-text rendering of server responses.

use fingraph_core::{TopicName, graph::FieldHistoryEntry};
use fingraph_session::{ReplyMode, SessionStateView, TurnReply};

fn join(topics: &[TopicName]) -> String {
  let names: Vec<&str> = topics.iter().map(TopicName::as_str).collect();
  names.join(", ")
}

pub fn reply(reply: &TurnReply) -> String {
  let mut lines: Vec<String> = reply
    .conflicts
    .iter()
    .map(|c| {
      format!(
        "  ! {}.{} changed {} -> {} ({})",
        c.topic, c.field, c.old_value, c.new_value, c.category
      )
    })
    .collect();
  lines.push(match (reply.mode, &reply.question, &reply.topic) {
    (ReplyMode::Analysis, ..) => {
      "Interview complete. Thanks, that's everything I need.".into()
    }
    (ReplyMode::Interview, Some(question), Some(topic)) => {
      format!("[{topic}] {question}")
    }
    (ReplyMode::Interview, Some(question), None) => question.clone(),
    (ReplyMode::Interview, None, _) => "(no question)".into(),
  });
  lines.join("\n")
}

pub fn state(view: &SessionStateView) -> String {
  let Some(session_id) = view.session_id else {
    return format!("no session for {}", view.user_id);
  };

  let mut lines = vec![
    format!("user     {} ({session_id})", view.user_id),
    format!("phase    {}", view.phase),
    format!("state    {}", view.state.label()),
  ];
  if let Some(topic) = &view.current_topic {
    lines.push(format!("topic    {topic}"));
  }
  lines.push(format!("turns    {}", view.turn_count));
  lines.push(format!("pending  {}", join(&view.pending)));
  lines.push(format!("visited  {}", join(&view.visited)));
  if !view.dismissed.is_empty() {
    lines.push(format!("skipped  {}", join(&view.dismissed)));
  }

  lines.push(String::new());
  for (topic, status) in &view.topics {
    let mark = if status.complete { "x" } else { " " };
    let flag = if status.has_conflicts { " !" } else { "" };
    let mut line = format!("[{mark}] {topic}{flag}");
    if !status.missing_fields.is_empty() {
      line.push_str("  missing: ");
      line.push_str(&status.missing_fields.join(", "));
    }
    lines.push(line);
  }
  lines.join("\n") + "\n"
}

pub fn history(entries: &[FieldHistoryEntry]) -> String {
  if entries.is_empty() {
    return "no history".into();
  }
  let lines: Vec<String> = entries
    .iter()
    .map(|entry| {
      let projection = if entry.is_projection { " (projected)" } else { "" };
      format!(
        "#{:<4} {} {:<10} {}{projection}",
        entry.seq,
        entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
        entry.source,
        entry.value
      )
    })
    .collect();
  lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
  use fingraph_session::{Phase, TopicStatus};

  use super::*;

  #[test]
  fn empty_state_says_so() {
    let view = SessionStateView::empty("ghost");
    assert_eq!(state(&view), "no session for ghost");
  }

  #[test]
  fn state_marks_complete_topics() {
    let mut view = SessionStateView::empty("alice");
    view.session_id = Some(uuid::Uuid::nil());
    view.pending = vec!["Income".into()];
    view.topics.insert("Goals".into(), TopicStatus {
      complete:       true,
      missing_fields: Vec::new(),
      has_conflicts:  false,
      snapshot:       Default::default(),
    });
    view.topics.insert("Income".into(), TopicStatus {
      complete:       false,
      missing_fields: vec!["annual_income".into()],
      has_conflicts:  true,
      snapshot:       Default::default(),
    });

    let text = state(&view);
    assert!(text.contains("pending  Income"));
    assert!(text.contains("[x] Goals"));
    assert!(text.contains("[ ] Income !  missing: annual_income"));
  }

  #[test]
  fn reply_shows_topic_and_question() {
    let reply_value = TurnReply {
      mode:      ReplyMode::Interview,
      question:  Some("How old are you?".into()),
      topic:     Some("Personal".into()),
      phase:     Phase::Discovery,
      complete:  false,
      conflicts: Vec::new(),
      upcoming:  Vec::new(),
    };
    assert_eq!(reply(&reply_value), "[Personal] How old are you?");
  }

  #[test]
  fn reply_lists_conflicts_before_closing_line() {
    let conflict = serde_json::from_value(serde_json::json!({
      "topic": "Income",
      "field": "annual_income",
      "old_value": 80000,
      "new_value": 0,
      "category": "severity_conflict",
      "suggested_topics": ["Emergency"],
      "detected_at": "2026-01-01T00:00:00Z",
    }))
    .unwrap();
    let reply_value = TurnReply {
      mode:      ReplyMode::Analysis,
      question:  None,
      topic:     None,
      phase:     Phase::DeepAnalysis,
      complete:  true,
      conflicts: vec![conflict],
      upcoming:  Vec::new(),
    };
    assert_eq!(
      reply(&reply_value),
      "  ! Income.annual_income changed 80000 -> 0 (severity_conflict)\n\
       Interview complete. Thanks, that's everything I need."
    );
  }

  #[test]
  fn empty_history_says_so() {
    assert_eq!(history(&[]), "no history");
  }
}

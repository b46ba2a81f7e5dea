//! Interview question list derivation and the narration cursor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Technical,
    Behavioral,
    General,
}

/// Question as supplied by the interview service, before indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSpec {
    pub text: String,
    pub category: QuestionCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub index: usize,
    pub text: String,
    pub category: QuestionCategory,
}

/// Padding used when the simulation supplies fewer questions than the
/// configured minimum.
pub const FALLBACK_QUESTIONS: [&str; 6] = [
    "Tell me about yourself and your background.",
    "Describe a challenging project you worked on recently.",
    "What interests you about this role?",
    "How do you approach a problem you have never seen before?",
    "Describe a time you disagreed with a teammate and how it was resolved.",
    "What would you like to learn in your next position?",
];

/// Derive the fixed question list for a session: explicit structured
/// questions win; otherwise the free-text prompt is split into lines
/// and padded with fallbacks up to `min_count`.
pub fn derive_questions(
    explicit: Option<Vec<QuestionSpec>>,
    prompt_text: &str,
    min_count: usize,
) -> Vec<Question> {
    let specs: Vec<QuestionSpec> = match explicit {
        Some(specs) if !specs.is_empty() => specs,
        _ => {
            let mut derived: Vec<QuestionSpec> = prompt_text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| QuestionSpec {
                    text: line.to_string(),
                    category: QuestionCategory::General,
                })
                .collect();

            for fallback in FALLBACK_QUESTIONS {
                if derived.len() >= min_count {
                    break;
                }
                derived.push(QuestionSpec {
                    text: fallback.to_string(),
                    category: QuestionCategory::General,
                });
            }
            derived
        }
    };

    specs
        .into_iter()
        .enumerate()
        .map(|(index, spec)| Question {
            index,
            text: spec.text,
            category: spec.category,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    /// Moved to the question at this index.
    Advanced(Question),
    /// Already at the last question; announce the closing prompt and
    /// leave the cursor unchanged.
    AtEnd,
}

/// Cursor over the immutable question list. The cursor only moves
/// forward and stays in `[0, len - 1]`.
pub struct QuestionSequencer {
    questions: Vec<Question>,
    cursor: Arc<AtomicUsize>,
}

impl QuestionSequencer {
    pub fn new(questions: Vec<Question>) -> Self {
        debug_assert!(!questions.is_empty());
        Self {
            questions,
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    /// Shared read handle for loops that tag events with the active
    /// question index.
    pub fn cursor_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.cursor)
    }

    pub fn current(&self) -> &Question {
        &self.questions[self.cursor()]
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn advance(&mut self) -> AdvanceOutcome {
        let cursor = self.cursor();
        if cursor + 1 >= self.questions.len() {
            return AdvanceOutcome::AtEnd;
        }
        self.cursor.store(cursor + 1, Ordering::Relaxed);
        AdvanceOutcome::Advanced(self.questions[cursor + 1].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_questions_win_over_prompt() {
        let specs = vec![
            QuestionSpec {
                text: "What is ownership in Rust?".into(),
                category: QuestionCategory::Technical,
            },
            QuestionSpec {
                text: "Tell me about a conflict you resolved.".into(),
                category: QuestionCategory::Behavioral,
            },
        ];
        let questions = derive_questions(Some(specs), "ignored prompt", 5);
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].index, 0);
        assert_eq!(questions[1].category, QuestionCategory::Behavioral);
    }

    #[test]
    fn prompt_lines_are_padded_with_fallbacks() {
        let prompt = "Explain your last project.\n\n  Why did you choose its stack?  \n";
        let questions = derive_questions(None, prompt, 5);
        assert_eq!(questions.len(), 5);
        assert_eq!(questions[0].text, "Explain your last project.");
        assert_eq!(questions[1].text, "Why did you choose its stack?");
        assert_eq!(questions[2].text, FALLBACK_QUESTIONS[0]);
        assert!(questions.iter().enumerate().all(|(i, q)| q.index == i));
    }

    #[test]
    fn empty_prompt_yields_all_fallbacks() {
        let questions = derive_questions(None, "", 5);
        assert_eq!(questions.len(), 5);
        assert_eq!(questions[0].text, FALLBACK_QUESTIONS[0]);
    }

    #[test]
    fn advance_stops_at_last_question() {
        let questions = derive_questions(None, "", 3);
        let mut sequencer = QuestionSequencer::new(questions);

        assert_eq!(sequencer.cursor(), 0);
        assert!(matches!(sequencer.advance(), AdvanceOutcome::Advanced(_)));
        assert!(matches!(sequencer.advance(), AdvanceOutcome::Advanced(_)));
        assert_eq!(sequencer.cursor(), 2);

        // Idempotent at the boundary.
        assert_eq!(sequencer.advance(), AdvanceOutcome::AtEnd);
        assert_eq!(sequencer.advance(), AdvanceOutcome::AtEnd);
        assert_eq!(sequencer.cursor(), 2);
    }
}

//! Quiz session - question presentation and attempt scoring

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::{Module, Question};
use crate::config::QuizConfig;
use crate::fuzzy::check_match;
use crate::progress::QuizOutcome;

/// A user's response to one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Answer {
    /// Index into the options as presented
    Choice(usize),
    Text(String),
}

/// A question ready to show, options possibly shuffled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentedQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: Option<usize>,
    pub answer: String,
    pub explanation: Option<String>,
}

/// Feedback shown right after answering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerFeedback {
    pub is_correct: bool,
    pub message: String,
    pub explanation: Option<String>,
}

/// Catalog order layout; the expected answer is appended to the options
/// when the catalog entry forgot it, so every multiple-choice question stays
/// answerable.
pub fn layout(question: &Question) -> PresentedQuestion {
    let mut options = question.options.clone();
    if question.is_multiple_choice() && !options.iter().any(|o| o.trim() == question.answer.trim()) {
        options.push(question.answer.clone());
    }
    let correct_index = options.iter().position(|o| o.trim() == question.answer.trim());

    PresentedQuestion {
        prompt: question.prompt.clone(),
        options,
        correct_index,
        answer: question.answer.clone(),
        explanation: question.explanation.clone(),
    }
}

/// Lay out a question for display, shuffling its options when asked to
pub fn present<R: Rng + ?Sized>(question: &Question, rng: &mut R, shuffle: bool) -> PresentedQuestion {
    let mut presented = layout(question);
    if shuffle && presented.options.len() > 1 {
        presented.options.shuffle(rng);
        presented.correct_index = presented
            .options
            .iter()
            .position(|o| o.trim() == question.answer.trim());
    }
    presented
}

fn judge(question: &PresentedQuestion, answer: &Answer, match_threshold: f64) -> AnswerFeedback {
    let (is_correct, message) = match answer {
        Answer::Choice(i) if !question.options.is_empty() => {
            let correct = question.correct_index == Some(*i);
            let message = if correct {
                "Correct!".to_string()
            } else {
                format!("Not quite. The answer is '{}'", question.answer)
            };
            (correct, message)
        }
        Answer::Text(text) if question.options.is_empty() => {
            let result = check_match(text, &question.answer, match_threshold);
            (result.is_correct, result.feedback)
        }
        // Choice given to a free-text question or the other way round
        _ => (false, format!("Not quite. The answer is '{}'", question.answer)),
    };

    AnswerFeedback {
        is_correct,
        message,
        explanation: question.explanation.clone(),
    }
}

/// Rounded percentage, 0 when there is nothing to score
pub fn score_percent(correct: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((correct as f64 / total as f64) * 100.0).round() as u8
}

/// Score answers given against the module's questions in catalog order.
///
/// Missing answers count as wrong. Pure and deterministic.
pub fn score_attempt(module: &Module, answers: &[Answer], config: &QuizConfig) -> QuizOutcome {
    let correct = module
        .questions
        .iter()
        .zip(answers)
        .filter(|(question, answer)| judge(&layout(question), answer, config.answer_match_threshold).is_correct)
        .count();

    QuizOutcome::grade(module, score_percent(correct, module.questions.len()), config.pass_threshold)
}

/// One attempt at one module
pub struct QuizSession<'a> {
    module: &'a Module,
    questions: Vec<PresentedQuestion>,
    results: Vec<Option<bool>>,
    config: QuizConfig,
}

impl<'a> QuizSession<'a> {
    pub fn new<R: Rng + ?Sized>(module: &'a Module, config: &QuizConfig, rng: &mut R) -> Self {
        let questions: Vec<_> = module
            .questions
            .iter()
            .map(|q| present(q, rng, config.shuffle_options))
            .collect();
        let results = vec![None; questions.len()];

        QuizSession {
            module,
            questions,
            results,
            config: config.clone(),
        }
    }

    pub fn module(&self) -> &Module {
        self.module
    }

    pub fn questions(&self) -> &[PresentedQuestion] {
        &self.questions
    }

    /// Record an answer; answering again replaces the earlier one.
    /// Returns `None` for an index past the last question.
    pub fn answer(&mut self, index: usize, answer: &Answer) -> Option<AnswerFeedback> {
        let question = self.questions.get(index)?;
        let feedback = judge(question, answer, self.config.answer_match_threshold);
        self.results[index] = Some(feedback.is_correct);
        Some(feedback)
    }

    pub fn answered(&self) -> usize {
        self.results.iter().filter(|r| r.is_some()).count()
    }

    pub fn is_finished(&self) -> bool {
        self.answered() == self.questions.len()
    }

    /// Score so far, unanswered questions counting as wrong
    pub fn outcome(&self) -> QuizOutcome {
        let correct = self.results.iter().filter(|r| **r == Some(true)).count();
        QuizOutcome::grade(
            self.module,
            score_percent(correct, self.questions.len()),
            self.config.pass_threshold,
        )
    }

    /// End the attempt, handing the outcome to `on_complete` exactly once
    pub fn finish<F: FnOnce(&QuizOutcome)>(self, on_complete: F) -> QuizOutcome {
        let outcome = self.outcome();
        on_complete(&outcome);
        outcome
    }
}

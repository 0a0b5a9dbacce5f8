use std::collections::HashSet;

use thiserror::Error;

use crate::model::QuestionId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NavigationError {
    #[error("question index {index} is out of range (0..{total})")]
    OutOfRange { index: usize, total: usize },

    #[error("question {0} is not part of this attempt")]
    UnknownQuestion(QuestionId),

    #[error("navigator needs at least one question")]
    Empty,
}

/// Visual state of one slot in the question navigator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Current,
    Answered,
    Unanswered,
}

/// Presentation-side bookkeeping: which question is shown and which ones have
/// an answer. Answer values are not kept here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizNavigator {
    question_ids: Vec<QuestionId>,
    current: usize,
    answered: HashSet<QuestionId>,
}

impl QuizNavigator {
    /// # Errors
    ///
    /// Returns `NavigationError::Empty` if `question_ids` is empty.
    pub fn new(question_ids: Vec<QuestionId>) -> Result<Self, NavigationError> {
        if question_ids.is_empty() {
            return Err(NavigationError::Empty);
        }
        Ok(Self {
            question_ids,
            current: 0,
            answered: HashSet::new(),
        })
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.question_ids.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question_id(&self) -> QuestionId {
        self.question_ids[self.current]
    }

    #[must_use]
    pub fn question_ids(&self) -> &[QuestionId] {
        &self.question_ids
    }

    /// Jump to `index`. The current index is left alone on error.
    ///
    /// # Errors
    ///
    /// Returns `NavigationError::OutOfRange` if `index >= total_questions()`.
    pub fn navigate(&mut self, index: usize) -> Result<(), NavigationError> {
        let total = self.total_questions();
        if index >= total {
            return Err(NavigationError::OutOfRange { index, total });
        }
        self.current = index;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `NavigationError::OutOfRange` when already on the last question.
    pub fn next(&mut self) -> Result<(), NavigationError> {
        self.navigate(self.current + 1)
    }

    /// # Errors
    ///
    /// Returns `NavigationError::OutOfRange` when already on the first question.
    pub fn previous(&mut self) -> Result<(), NavigationError> {
        match self.current.checked_sub(1) {
            Some(index) => self.navigate(index),
            None => Err(NavigationError::OutOfRange {
                index: 0,
                total: self.total_questions(),
            }),
        }
    }

    /// Mark `question_id` as answered. Repeating the call is a no-op.
    ///
    /// Returns `true` if the question was not answered before.
    ///
    /// # Errors
    ///
    /// Returns `NavigationError::UnknownQuestion` if the id is not in this attempt.
    pub fn record_answer(&mut self, question_id: QuestionId) -> Result<bool, NavigationError> {
        if !self.question_ids.contains(&question_id) {
            return Err(NavigationError::UnknownQuestion(question_id));
        }
        Ok(self.answered.insert(question_id))
    }

    #[must_use]
    pub fn is_answered(&self, question_id: QuestionId) -> bool {
        self.answered.contains(&question_id)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answered.len()
    }

    /// Answered ids in question order.
    #[must_use]
    pub fn answered_ids(&self) -> Vec<QuestionId> {
        self.question_ids
            .iter()
            .copied()
            .filter(|id| self.answered.contains(id))
            .collect()
    }

    #[must_use]
    pub fn slot(&self, index: usize) -> Option<SlotState> {
        let id = self.question_ids.get(index)?;
        Some(if index == self.current {
            SlotState::Current
        } else if self.answered.contains(id) {
            SlotState::Answered
        } else {
            SlotState::Unanswered
        })
    }

    #[must_use]
    pub fn slots(&self) -> Vec<SlotState> {
        (0..self.total_questions())
            .filter_map(|index| self.slot(index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn navigator(n: u64) -> QuizNavigator {
        QuizNavigator::new((1..=n).map(QuestionId::new).collect()).unwrap()
    }

    #[test]
    fn empty_navigator_is_rejected() {
        assert_eq!(QuizNavigator::new(vec![]), Err(NavigationError::Empty));
    }

    #[test]
    fn index_tracks_last_valid_navigation() {
        let mut nav = navigator(4);
        for (target, expect_ok) in [(2, true), (9, false), (0, true), (4, false), (3, true)] {
            let before = nav.current_index();
            let result = nav.navigate(target);
            if expect_ok {
                assert!(result.is_ok());
                assert_eq!(nav.current_index(), target);
            } else {
                assert_eq!(
                    result,
                    Err(NavigationError::OutOfRange {
                        index: target,
                        total: 4
                    })
                );
                assert_eq!(nav.current_index(), before);
            }
        }
    }

    #[test]
    fn next_and_previous_stop_at_edges() {
        let mut nav = navigator(2);
        assert!(nav.previous().is_err());
        nav.next().unwrap();
        assert_eq!(nav.current_question_id(), QuestionId::new(2));
        assert!(nav.next().is_err());
        nav.previous().unwrap();
        assert_eq!(nav.current_index(), 0);
    }

    #[test]
    fn record_answer_is_idempotent() {
        let mut once = navigator(3);
        once.record_answer(QuestionId::new(2)).unwrap();

        let mut twice = navigator(3);
        assert!(twice.record_answer(QuestionId::new(2)).unwrap());
        assert!(!twice.record_answer(QuestionId::new(2)).unwrap());

        assert_eq!(once, twice);
        assert_eq!(twice.answered_count(), 1);
        assert!(twice.is_answered(QuestionId::new(2)));
    }

    #[test]
    fn unknown_question_is_rejected() {
        let mut nav = navigator(2);
        assert_eq!(
            nav.record_answer(QuestionId::new(99)),
            Err(NavigationError::UnknownQuestion(QuestionId::new(99)))
        );
    }

    #[test]
    fn current_slot_wins_over_answered() {
        let mut nav = navigator(3);
        nav.record_answer(QuestionId::new(1)).unwrap();
        nav.record_answer(QuestionId::new(3)).unwrap();
        assert_eq!(
            nav.slots(),
            vec![SlotState::Current, SlotState::Unanswered, SlotState::Answered]
        );
        assert_eq!(nav.answered_ids(), vec![QuestionId::new(1), QuestionId::new(3)]);
        assert_eq!(nav.slot(3), None);
    }
}

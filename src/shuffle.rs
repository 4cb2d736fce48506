//! Per-round answer shuffling.

use crate::types::Question;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;

/// How many incorrect options a round shows at most.
const MAX_INCORRECT: usize = 3;

/// Build the presentation copy of a question for one round: the correct
/// answer plus at most three incorrect options, shuffled, with the correct
/// index remapped to wherever the shuffle put it. The input is untouched;
/// every call is an independent draw.
pub fn shuffle_question(question: &Question) -> Question {
    shuffle_question_with(question, &mut rand::rng())
}

fn shuffle_question_with(question: &Question, rng: &mut impl Rng) -> Question {
    let correct_text = question.answers[question.correct].clone();
    let mut incorrect: Vec<String> = question
        .answers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != question.correct)
        .map(|(_, answer)| answer.clone())
        .collect();
    if incorrect.len() > MAX_INCORRECT {
        incorrect = incorrect
            .choose_multiple(rng, MAX_INCORRECT)
            .cloned()
            .collect();
    }

    let mut answers = Vec::with_capacity(incorrect.len() + 1);
    answers.push(correct_text.clone());
    answers.extend(incorrect);
    answers.shuffle(rng);
    let correct = answers
        .iter()
        .position(|answer| answer == &correct_text)
        .unwrap_or(0);

    Question {
        question: question.question.clone(),
        answers,
        correct,
        iq: question.iq,
    }
}

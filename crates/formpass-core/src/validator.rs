// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Structural validation of a submitted passage against its form schema.
//!
//! [`validate`] is pure: it performs no I/O and knows nothing about
//! quotas, identity or anonymity. The first offending answer (in
//! submission order) decides the error; the required-question check runs
//! after every answer has been looked at.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::schema::{AnswerOption, Form, FormPassage, Question, QuestionKind};

/// Why a passage does not conform to its form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// An answer references a question the form does not declare.
    #[error("question {question_id} is not part of the form")]
    QuestionUnknown {
        /// Referenced question.
        question_id: i64,
    },

    /// A choice answer does not match any declared option label.
    #[error("'{text}' is not an option of question {question_id}")]
    OptionUnknown {
        /// Question answered.
        question_id: i64,
        /// Submitted text.
        text: String,
    },

    /// A single choice question was answered more than once.
    #[error("single choice question {question_id} answered more than once")]
    DuplicateAnswerForSingleChoice {
        /// Question answered.
        question_id: i64,
    },

    /// A multiple choice option was selected more than once.
    #[error("option {option_id} of question {question_id} selected more than once")]
    DuplicateOption {
        /// Question answered.
        question_id: i64,
        /// Option selected twice.
        option_id: i64,
    },

    /// A required question has no answer.
    #[error("required question {question_id} is unanswered")]
    RequiredQuestionUnanswered {
        /// Question left unanswered.
        question_id: i64,
    },
}

impl ValidationError {
    /// Stable tag for logs.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::QuestionUnknown { .. } => "QuestionUnknown",
            Self::OptionUnknown { .. } => "OptionUnknown",
            Self::DuplicateAnswerForSingleChoice { .. } => "DuplicateAnswerForSingleChoice",
            Self::DuplicateOption { .. } => "DuplicateOption",
            Self::RequiredQuestionUnanswered { .. } => "RequiredQuestionUnanswered",
        }
    }
}

/// Check `passage` against the declared schema of `form`.
pub fn validate(passage: &FormPassage, form: &Form) -> Result<(), ValidationError> {
    let questions: HashMap<i64, &Question> = form.questions.iter().map(|q| (q.id, q)).collect();

    let mut seen_questions: HashSet<i64> = HashSet::new();
    let mut chosen_options: HashSet<(i64, i64)> = HashSet::new();

    for answer in &passage.answers {
        let question_id = answer.question_id;
        let question = questions
            .get(&question_id)
            .ok_or(ValidationError::QuestionUnknown { question_id })?;

        let first_answer = seen_questions.insert(question_id);

        match &question.kind {
            QuestionKind::SingleChoice { options } => {
                if !first_answer {
                    return Err(ValidationError::DuplicateAnswerForSingleChoice { question_id });
                }
                match_option(options, question_id, &answer.text)?;
            }
            QuestionKind::MultipleChoice { options } => {
                let option = match_option(options, question_id, &answer.text)?;
                if !chosen_options.insert((question_id, option.id)) {
                    return Err(ValidationError::DuplicateOption {
                        question_id,
                        option_id: option.id,
                    });
                }
            }
            QuestionKind::Text => {}
        }
    }

    if let Some(question) = form
        .questions
        .iter()
        .find(|q| q.required && !seen_questions.contains(&q.id))
    {
        return Err(ValidationError::RequiredQuestionUnanswered {
            question_id: question.id,
        });
    }

    Ok(())
}

/// First declared option whose label equals `text`.
fn match_option<'a>(
    options: &'a [AnswerOption],
    question_id: i64,
    text: &str,
) -> Result<&'a AnswerOption, ValidationError> {
    options
        .iter()
        .find(|o| o.text == text)
        .ok_or_else(|| ValidationError::OptionUnknown {
            question_id,
            text: text.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PassageAnswer, PassageLimit};

    fn question(id: i64, required: bool, kind: QuestionKind) -> Question {
        Question {
            id,
            required,
            shuffle: false,
            kind,
        }
    }

    fn form(id: i64, questions: Vec<Question>) -> Form {
        Form {
            id,
            title: format!("form {id}"),
            anonymous: false,
            passage_limit: PassageLimit::Unlimited,
            questions,
        }
    }

    fn passage(form_id: i64, answers: &[(i64, &str)]) -> FormPassage {
        FormPassage {
            form_id,
            answers: answers
                .iter()
                .map(|(q, t)| PassageAnswer::new(*q, *t))
                .collect(),
        }
    }

    fn yes_no_form() -> Form {
        form(
            7,
            vec![question(
                10,
                true,
                QuestionKind::SingleChoice {
                    options: vec![AnswerOption::new(100, "Yes"), AnswerOption::new(101, "No")],
                },
            )],
        )
    }

    fn ab_form() -> Form {
        form(
            9,
            vec![question(
                30,
                false,
                QuestionKind::MultipleChoice {
                    options: vec![AnswerOption::new(40, "A"), AnswerOption::new(41, "B")],
                },
            )],
        )
    }

    /// Forms and passages covering every question kind and error path.
    fn corpus() -> Vec<(FormPassage, Form)> {
        let mixed = form(
            12,
            vec![
                question(
                    1,
                    true,
                    QuestionKind::SingleChoice {
                        options: vec![AnswerOption::new(1, "x"), AnswerOption::new(2, "y")],
                    },
                ),
                question(
                    2,
                    false,
                    QuestionKind::MultipleChoice {
                        options: vec![AnswerOption::new(3, "p"), AnswerOption::new(4, "q")],
                    },
                ),
                question(3, true, QuestionKind::Text),
            ],
        );
        vec![
            (passage(7, &[(10, "Yes")]), yes_no_form()),
            (passage(7, &[]), yes_no_form()),
            (passage(7, &[(10, "Maybe")]), yes_no_form()),
            (passage(7, &[(10, "Yes"), (10, "No")]), yes_no_form()),
            (passage(9, &[(30, "A"), (30, "A")]), ab_form()),
            (passage(9, &[(30, "A"), (30, "B")]), ab_form()),
            (passage(9, &[(999, "A")]), ab_form()),
            (passage(12, &[(3, ""), (3, ""), (1, "y"), (2, "q")]), mixed.clone()),
            (passage(12, &[(2, "p"), (2, "p"), (5, "z")]), mixed.clone()),
            (passage(12, &[(1, "x")]), mixed.clone()),
            (passage(12, &[(3, "only text")]), mixed.clone()),
            (passage(12, &[(2, "p"), (3, "t")]), mixed),
            (passage(0, &[(1, "")]), form(0, vec![])),
        ]
    }

    #[test]
    fn test_single_choice_accepted() {
        assert_eq!(validate(&passage(7, &[(10, "Yes")]), &yes_no_form()), Ok(()));
    }

    #[test]
    fn test_required_question_unanswered() {
        assert_eq!(
            validate(&passage(7, &[]), &yes_no_form()),
            Err(ValidationError::RequiredQuestionUnanswered { question_id: 10 })
        );
    }

    #[test]
    fn test_required_check_reports_first_declared_question() {
        let f = form(
            1,
            vec![
                question(5, true, QuestionKind::Text),
                question(2, true, QuestionKind::Text),
            ],
        );
        assert_eq!(
            validate(&passage(1, &[]), &f),
            Err(ValidationError::RequiredQuestionUnanswered { question_id: 5 })
        );
    }

    #[test]
    fn test_question_unknown() {
        let f = form(
            11,
            vec![question(
                50,
                false,
                QuestionKind::SingleChoice {
                    options: vec![AnswerOption::new(60, "L")],
                },
            )],
        );
        assert_eq!(
            validate(&passage(11, &[(999, "L")]), &f),
            Err(ValidationError::QuestionUnknown { question_id: 999 })
        );
    }

    #[test]
    fn test_option_unknown_is_case_sensitive() {
        assert_eq!(
            validate(&passage(7, &[(10, "yes")]), &yes_no_form()),
            Err(ValidationError::OptionUnknown {
                question_id: 10,
                text: "yes".to_string()
            })
        );
    }

    #[test]
    fn test_single_choice_answered_twice() {
        assert_eq!(
            validate(&passage(7, &[(10, "Yes"), (10, "No")]), &yes_no_form()),
            Err(ValidationError::DuplicateAnswerForSingleChoice { question_id: 10 })
        );
    }

    #[test]
    fn test_multiple_choice_duplicate_option() {
        assert_eq!(
            validate(&passage(9, &[(30, "A"), (30, "A")]), &ab_form()),
            Err(ValidationError::DuplicateOption {
                question_id: 30,
                option_id: 40
            })
        );
        assert_eq!(validate(&passage(9, &[(30, "A"), (30, "B")]), &ab_form()), Ok(()));
    }

    #[test]
    fn test_multiple_choice_none_selected() {
        assert_eq!(validate(&passage(9, &[]), &ab_form()), Ok(()));
    }

    #[test]
    fn test_duplicate_labels_resolve_to_first_declared_option() {
        let f = form(
            3,
            vec![question(
                1,
                false,
                QuestionKind::MultipleChoice {
                    options: vec![AnswerOption::new(8, "same"), AnswerOption::new(9, "same")],
                },
            )],
        );
        assert_eq!(
            validate(&passage(3, &[(1, "same"), (1, "same")]), &f),
            Err(ValidationError::DuplicateOption {
                question_id: 1,
                option_id: 8
            })
        );
    }

    #[test]
    fn test_same_option_id_in_different_questions() {
        let options = vec![AnswerOption::new(1, "a")];
        let f = form(
            4,
            vec![
                question(
                    1,
                    false,
                    QuestionKind::MultipleChoice {
                        options: options.clone(),
                    },
                ),
                question(2, false, QuestionKind::MultipleChoice { options }),
            ],
        );
        assert_eq!(validate(&passage(4, &[(1, "a"), (2, "a")]), &f), Ok(()));
    }

    #[test]
    fn test_text_answers_repeat_freely() {
        let f = form(5, vec![question(20, true, QuestionKind::Text)]);
        assert_eq!(
            validate(&passage(5, &[(20, "anything"), (20, "anything"), (20, "")]), &f),
            Ok(())
        );
    }

    #[test]
    fn test_first_offending_answer_wins() {
        assert_eq!(
            validate(&passage(9, &[(30, "C"), (999, "A")]), &ab_form()),
            Err(ValidationError::OptionUnknown {
                question_id: 30,
                text: "C".to_string()
            })
        );
        assert_eq!(
            validate(&passage(9, &[(999, "A"), (30, "C")]), &ab_form()),
            Err(ValidationError::QuestionUnknown { question_id: 999 })
        );
    }

    #[test]
    fn test_answer_error_takes_precedence_over_required() {
        assert_eq!(
            validate(&passage(7, &[(999, "Yes")]), &yes_no_form()),
            Err(ValidationError::QuestionUnknown { question_id: 999 })
        );
    }

    #[test]
    fn test_shuffle_flag_is_ignored() {
        let mut f = yes_no_form();
        f.questions[0].shuffle = true;
        assert_eq!(validate(&passage(7, &[(10, "No")]), &f), Ok(()));
    }

    #[test]
    fn test_every_required_question_reported_when_unanswered() {
        for (p, f) in corpus() {
            let referenced: HashSet<i64> = p.answers.iter().map(|a| a.question_id).collect();
            let first_missing = f
                .questions
                .iter()
                .find(|q| q.required && !referenced.contains(&q.id))
                .map(|q| q.id);
            let Some(question_id) = first_missing else {
                continue;
            };
            let mut optional = f.clone();
            for q in &mut optional.questions {
                q.required = false;
            }
            if validate(&p, &optional).is_ok() {
                assert_eq!(
                    validate(&p, &f),
                    Err(ValidationError::RequiredQuestionUnanswered { question_id }),
                    "passage {:?} against form {}",
                    p.answers,
                    f.id
                );
            } else {
                assert_eq!(validate(&p, &f), validate(&p, &optional));
            }
        }
    }

    #[test]
    fn test_valid_answers_missing_required_choice() {
        let (p, f) = corpus()
            .into_iter()
            .find(|(p, f)| f.id == 12 && p.answers.len() == 2)
            .unwrap();
        assert_eq!(
            validate(&p, &f),
            Err(ValidationError::RequiredQuestionUnanswered { question_id: 1 })
        );
    }

    #[test]
    fn test_validation_is_repeatable() {
        for (p, f) in corpus() {
            assert_eq!(validate(&p, &f), validate(&p, &f));
        }
    }

    #[test]
    fn test_validation_error_tags() {
        assert_eq!(
            ValidationError::DuplicateOption {
                question_id: 1,
                option_id: 2
            }
            .tag(),
            "DuplicateOption"
        );
        assert_eq!(
            ValidationError::RequiredQuestionUnanswered { question_id: 1 }.to_string(),
            "required question 1 is unanswered"
        );
    }
}

//! Built-in lesson catalogs.

use crate::arith::BusProblem;
use crate::catalog::{Catalog, Checkpoint, Module, Reward, Subproblem};
use crate::error::{DtmError, DtmResult};
use crate::rule::AnswerRule;

pub const GOLDEN_RATIO: &str = "golden-ratio";
pub const LOGIC_PUZZLES: &str = "logic-puzzles";

pub const PART_A: &str = "Part A — Dragon Tail Fraction";
pub const PART_C: &str = "Part C — Mini Puzzles";
pub const PART_D: &str = "Part D — The Bus Problem";

/// Looks up a built-in catalog by name.
pub fn builtin(name: &str) -> DtmResult<Catalog> {
    match name {
        GOLDEN_RATIO => Ok(golden_ratio()),
        LOGIC_PUZZLES => Ok(logic_puzzles()),
        other => Err(DtmError::NotFound(format!("built-in catalog {other:?}"))),
    }
}

pub fn builtin_names() -> [&'static str; 2] {
    [GOLDEN_RATIO, LOGIC_PUZZLES]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn choice(key: &str, prompt: &str, choices: &[&str], answer: &str, hint: &str) -> Subproblem {
    Subproblem {
        key: key.into(),
        prompt: prompt.into(),
        rule: AnswerRule::ExactChoice {
            choices: strings(choices),
            answer: answer.into(),
        },
        hint: hint.into(),
        success: None,
        requires: Vec::new(),
    }
}

fn forms(key: &str, prompt: &str, accepted: &[&str], hint: &str) -> Subproblem {
    Subproblem {
        key: key.into(),
        prompt: prompt.into(),
        rule: AnswerRule::AcceptedForms {
            accepted: strings(accepted),
        },
        hint: hint.into(),
        success: None,
        requires: Vec::new(),
    }
}

fn free_text(key: &str, prompt: &str, keywords: &[&str], hint: &str) -> Subproblem {
    Subproblem {
        key: key.into(),
        prompt: prompt.into(),
        rule: AnswerRule::KeywordThreshold {
            keywords: strings(keywords),
        },
        hint: hint.into(),
        success: None,
        requires: Vec::new(),
    }
}

fn with_success(mut sub: Subproblem, success: &str) -> Subproblem {
    sub.success = Some(success.into());
    sub
}

fn requiring(mut sub: Subproblem, checkpoints: &[&str]) -> Subproblem {
    sub.requires = strings(checkpoints);
    sub
}

fn checkpoint(name: &str, section: &str, key: &str) -> Checkpoint {
    Checkpoint {
        name: name.into(),
        section: section.into(),
        key: key.into(),
    }
}

// ---------------------------------------------------------------------------
// Dragon tail → golden ratio → Fibonacci
// ---------------------------------------------------------------------------

const Q1: &str = "Q1: 'From x = 1 + 1/x, what is x − 1?'";
const Q2: &str = "Q2: 'If x − 1 = 1/x, what is x(x − 1)?'";
const Q3: &str = "Q3: 'Which answer makes sense?'";
const PUZZLE_1A: &str = "Puzzle 1a: First result";
const PUZZLE_1B: &str = "Puzzle 1b: Second result";
const PUZZLE_2: &str = "Puzzle 2: Next fraction";
const BUS: &str = "Bus Problem";

const POSITIVE_ROOT: &str = "(1 + √5)/2 (positive, ≈ 1.618)";

pub fn golden_ratio() -> Catalog {
    let bus = BusProblem::default();

    Catalog {
        name: GOLDEN_RATIO.into(),
        title: "Dragon Tail → Golden Ratio → Fibonacci".into(),
        modules: vec![
            Module {
                section: PART_A.into(),
                intro: "x = 1 + 1/(1 + 1/(1 + ...)) repeats forever. The tail after the \
                        first '1 +' looks exactly like the whole, so x = 1 + 1/x. Subtract 1, \
                        multiply by x, add 1/4 to both sides and complete the square: \
                        (x − 1/2)² = 5/4."
                    .into(),
                subproblems: vec![
                    with_success(
                        choice(
                            Q1,
                            "From x = 1 + 1/x, what is x − 1?",
                            &["1/x", "x²", "x + 1", "1 - x"],
                            "1/x",
                            "Try again: subtract 1 from both sides.",
                        ),
                        "Correct!",
                    ),
                    with_success(
                        choice(
                            Q2,
                            "If x − 1 = 1/x, what is x(x − 1)?",
                            &["0", "1", "x", "x²"],
                            "1",
                            "Hint: multiply both sides by x.",
                        ),
                        "Correct! x times (1/x) equals 1.",
                    ),
                    with_success(
                        choice(
                            Q3,
                            "The dragon-tail is clearly bigger than 1. Which answer makes sense?",
                            &["(1 − √5)/2 (negative)", POSITIVE_ROOT],
                            POSITIVE_ROOT,
                            "The negative value doesn't match our pattern, which builds with \
                             positive pieces.",
                        ),
                        "Exactly! The positive one fits the picture.",
                    ),
                ],
                reward: Some(Reward {
                    title: "Takeaway".into(),
                    text: "Self-copy ⇒ x = 1 + 1/x ⇒ balance-square trick ⇒ x = (1 + √5)/2 ≈ \
                           1.618. You've discovered the Golden Ratio!"
                        .into(),
                    requires: strings(&["part-a"]),
                }),
            },
            Module {
                section: PART_C.into(),
                intro: "Start from 2/1 and apply the rule 1 + 1/□. Example: 1 + 1/2 = 3/2."
                    .into(),
                subproblems: vec![
                    forms(
                        PUZZLE_1A,
                        "Apply the rule ONCE to 2/1. What do you get?",
                        &["3/2", "1.5", "1+1/2"],
                        "Try 1 + 1/2.",
                    ),
                    forms(
                        PUZZLE_1B,
                        "Now apply the rule to your answer above. What do you get?",
                        &["5/3", "1.666666", "1+2/3"],
                        "Next is 1 + 1/(3/2).",
                    ),
                    requiring(
                        forms(
                            PUZZLE_2,
                            "Given the fractions 8/5 and 13/8, what's the next fraction in the \
                             pattern?",
                            &["21/13"],
                            "Hint: add top-to-top and bottom-to-bottom.",
                        ),
                        &["puzzle-1"],
                    ),
                ],
                reward: Some(Reward {
                    title: "The Golden Rectangle".into(),
                    text: "Cut a square from a golden rectangle and what's left is another \
                           golden rectangle. Sunflowers, seashells and pine cones spiral in \
                           Fibonacci numbers. Now list as many Fibonacci numbers as you can!"
                        .into(),
                    requires: strings(&["puzzle-1", "puzzle-2"]),
                }),
            },
            Module {
                section: PART_D.into(),
                intro: format!(
                    "On a long bus ride, {} math teachers built a sequence. The 1st said {}, \
                     the 2nd said {}, and everyone after said the sum of the two previous \
                     numbers. Afterwards the {}th teacher realized their number should have \
                     been one more than what they said.",
                    bus.length,
                    bus.seeds.0,
                    bus.seeds.1,
                    bus.error_index + 1
                ),
                subproblems: vec![with_success(
                    Subproblem {
                        key: BUS.into(),
                        prompt: format!(
                            "How much larger should the {}th teacher's number have been?",
                            bus.length
                        ),
                        rule: AnswerRule::Integer {
                            expected: bus.final_difference(),
                        },
                        hint: "Not quite. Build both sequences step by step and track how \
                               the error spreads."
                            .into(),
                        success: None,
                        requires: Vec::new(),
                    },
                    "Correct! The error grows like the Fibonacci numbers.",
                )],
                reward: None,
            },
        ],
        checkpoints: vec![
            checkpoint("part-a", PART_A, Q3),
            checkpoint("puzzle-1", PART_C, PUZZLE_1A),
            checkpoint("puzzle-2", PART_C, PUZZLE_2),
        ],
    }
}

// ---------------------------------------------------------------------------
// Logic and proof puzzles
// ---------------------------------------------------------------------------

const STATEMENTS: &str = "Module 1 — Statements";
const CONVERSES: &str = "Module 2 — Converses";
const CONTRAPOSITIVES: &str = "Module 3 — Contrapositives";
const COIN_FLIPS: &str = "Module 4 — The Coin-Flip Trick";
const CHESS: &str = "Module 5 — The Chessboard Puzzle";

pub fn logic_puzzles() -> Catalog {
    Catalog {
        name: LOGIC_PUZZLES.into(),
        title: "Logic, Proofs and Puzzles".into(),
        modules: vec![
            Module {
                section: STATEMENTS.into(),
                intro: "A statement is a sentence that is either true or false. Many \
                        statements have the shape 'If P, then Q'."
                    .into(),
                subproblems: vec![
                    choice(
                        "1.1 statement",
                        "Which of these is a statement?",
                        &["Close the door.", "7 is an odd number.", "Is it raining?"],
                        "7 is an odd number.",
                        "A statement has to be either true or false.",
                    ),
                    free_text(
                        "1.2 hypothesis",
                        "In 'If it rains, then the ground is wet', which part is the \
                         hypothesis and which is the conclusion?",
                        &["hypothesis", "conclusion", "rain", "wet"],
                        "The hypothesis follows 'if', the conclusion follows 'then'.",
                    ),
                ],
                reward: None,
            },
            Module {
                section: CONVERSES.into(),
                intro: "The converse swaps the two parts of an if-then statement.".into(),
                subproblems: vec![
                    choice(
                        "2.1 converse",
                        "The converse of 'If P, then Q' is:",
                        &["If Q, then P", "If not P, then not Q", "If not Q, then not P"],
                        "If Q, then P",
                        "Swap the hypothesis and the conclusion.",
                    ),
                    free_text(
                        "2.2 converse truth",
                        "'If a shape is a square, then it has four sides' is true. Write its \
                         converse. Is the converse true?",
                        &["four sides", "rectangle", "false", "not true", "not always"],
                        "Think of a four-sided shape that is not a square.",
                    ),
                ],
                reward: None,
            },
            Module {
                section: CONTRAPOSITIVES.into(),
                intro: "The contrapositive swaps the two parts and negates both.".into(),
                subproblems: vec![
                    choice(
                        "3.1 contrapositive",
                        "The contrapositive of 'If P, then Q' is:",
                        &["If Q, then P", "If not P, then not Q", "If not Q, then not P"],
                        "If not Q, then not P",
                        "Swap the parts, then put 'not' in front of both.",
                    ),
                    free_text(
                        "3.2 equivalence",
                        "Why is a statement always true exactly when its contrapositive is?",
                        &["same", "equivalent", "both", "always", "impossible"],
                        "If Q fails, could P still hold when 'If P then Q' is true?",
                    ),
                ],
                reward: None,
            },
            Module {
                section: COIN_FLIPS.into(),
                intro: "Coins lie on the table. Your partner flips any two coins at a time, \
                        as often as they like, while you look away."
                    .into(),
                subproblems: vec![
                    choice(
                        "4.1 flip outcome",
                        "There are 7 heads showing. After some double flips, can exactly 4 \
                         heads be showing?",
                        &["Yes", "No"],
                        "No",
                        "Count how the number of heads changes when two coins flip.",
                    ),
                    free_text(
                        "4.2 parity",
                        "Explain how you can always tell whether the number of heads is odd \
                         or even after the flips.",
                        &["odd", "even", "parity", "two", "by 2"],
                        "Each double flip changes the number of heads by -2, 0 or +2.",
                    ),
                ],
                reward: None,
            },
            Module {
                section: CHESS.into(),
                intro: "Cut two opposite corners off an 8×8 chessboard. Both corners have \
                        the same color. Can 31 dominoes, each covering two neighbouring \
                        squares, cover the remaining 62 squares?"
                    .into(),
                subproblems: vec![
                    choice(
                        "5.1 colors left",
                        "If both removed corners are light, how many squares of each color \
                         remain?",
                        &[
                            "31 dark and 31 light",
                            "32 dark and 30 light",
                            "30 dark and 32 light",
                        ],
                        "32 dark and 30 light",
                        "The full board has 32 of each color.",
                    ),
                    free_text(
                        "5.2 no tiling",
                        "Why can't the 31 dominoes cover the board?",
                        &["color", "colour", "dark", "light", "each domino"],
                        "What does one domino always cover, color-wise?",
                    ),
                ],
                reward: None,
            },
        ],
        checkpoints: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_validate() {
        for name in builtin_names() {
            let catalog = builtin(name).unwrap();
            catalog.validate().unwrap();
            assert_eq!(catalog.name, name);
        }
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(matches!(builtin("nope"), Err(DtmError::NotFound(_))));
    }

    #[test]
    fn test_golden_ratio_shape() {
        let catalog = golden_ratio();
        assert_eq!(catalog.module_count(), 3);
        assert_eq!(catalog.subproblem_count(0), 3);
        assert_eq!(catalog.checkpoints.len(), 3);
        assert_eq!(
            catalog.subproblem(2, 0).unwrap().rule,
            AnswerRule::Integer { expected: 89 }
        );
        assert_eq!(catalog.subproblem(1, 2).unwrap().requires, vec!["puzzle-1"]);
    }

    #[test]
    fn test_logic_puzzle_answers() {
        let catalog = logic_puzzles();
        let parity = catalog.subproblem(3, 1).unwrap();
        assert!(parity
            .rule
            .check("Each flip keeps the count odd")
            .unwrap());
        assert!(!parity.rule.check("odd").unwrap());
    }
}

//! Built-in question bank. Keeps the game playable without config or OpenAI.

use crate::domain::{QuestionRecord, Topic};

fn q(question: &str, options: &[&str], correct: &str, explanation: &str) -> QuestionRecord {
  QuestionRecord {
    question: question.into(),
    options: options.iter().map(|o| o.to_string()).collect(),
    correct_answer: correct.into(),
    explanation: explanation.into(),
  }
}

/// Seed questions tagged by topic.
pub fn seed_questions() -> Vec<(Topic, QuestionRecord)> {
  vec![
    (Topic::JavaScript, q(
      "What is the correct way to define a function in JavaScript?",
      &["function myFunc()", "function = myFunc()", "myFunc() = function"],
      "function myFunc()",
      "In JavaScript, the correct way to define a function is using the 'function' keyword followed by the function name.",
    )),
    (Topic::JavaScript, q(
      "Which of these is a JavaScript framework?",
      &["React", "Vue", "Angular", "All of the above"],
      "All of the above",
      "React, Vue, and Angular are all popular JavaScript frameworks.",
    )),
    (Topic::JavaScript, q(
      "What does `typeof null` evaluate to?",
      &["\"null\"", "\"object\"", "\"undefined\"", "\"number\""],
      "\"object\"",
      "A long-standing quirk: typeof null is \"object\".",
    )),
    (Topic::Css, q(
      "What does CSS stand for?",
      &["Creative Style Sheets", "Cascading Style Sheets", "Colorful Style Sheets"],
      "Cascading Style Sheets",
      "CSS stands for Cascading Style Sheets, which is used for styling HTML elements.",
    )),
    (Topic::Css, q(
      "What is the default flex-direction in CSS Flexbox?",
      &["row", "column", "row-reverse", "column-reverse"],
      "row",
      "By default, Flexbox arranges elements in a row.",
    )),
    (Topic::Html, q(
      "Which HTML element holds the largest heading?",
      &["<h6>", "<heading>", "<h1>", "<head>"],
      "<h1>",
      "Headings run from <h1> (largest) to <h6> (smallest).",
    )),
    (Topic::Html, q(
      "Which attribute provides alternative text for an image?",
      &["title", "alt", "src", "longdesc"],
      "alt",
      "The alt attribute describes the image for screen readers and when it fails to load.",
    )),
    (Topic::React, q(
      "Which hook adds local state to a function component?",
      &["useEffect", "useState", "useMemo", "useRef"],
      "useState",
      "useState returns the current value and a setter for it.",
    )),
    (Topic::React, q(
      "What prop helps React identify items in a rendered list?",
      &["id", "key", "ref", "index"],
      "key",
      "Stable keys let React match list items between renders.",
    )),
  ]
}

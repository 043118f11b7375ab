//! CodeQuest · frontend trivia game backend.
//!
//! A player picks topics (HTML, CSS, JavaScript, React), answers multiple-choice
//! questions and climbs levels while spending lives and tokens. Questions come from
//! a built-in bank or are generated through an OpenAI-compatible chat endpoint.

pub mod config;
pub mod domain;
pub mod error;
pub mod game;
pub mod openai;
pub mod protocol;
pub mod routes;
pub mod seeds;
pub mod source;
pub mod state;
pub mod telemetry;
pub mod util;

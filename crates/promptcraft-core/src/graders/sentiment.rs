use std::fmt;
use std::str::FromStr;

use promptcraft_types::{round_to, GradeResult};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::grader::Grader;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    /// Positive above 0.1, negative below -0.1, neutral otherwise.
    pub fn classify(polarity: f64) -> Self {
        if polarity > 0.1 {
            Self::Positive
        } else if polarity < -0.1 {
            Self::Negative
        } else {
            Self::Neutral
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive => write!(f, "positive"),
            Self::Negative => write!(f, "negative"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "negative" => Ok(Self::Negative),
            "neutral" => Ok(Self::Neutral),
            other => Err(format!("unknown sentiment: {other}")),
        }
    }
}

const LEXICON: &[(&str, f64)] = &[
    ("amazing", 0.6),
    ("appreciate", 0.5),
    ("awesome", 1.0),
    ("beautiful", 0.85),
    ("best", 1.0),
    ("better", 0.5),
    ("brilliant", 0.9),
    ("clear", 0.1),
    ("delighted", 0.7),
    ("easy", 0.43),
    ("effective", 0.6),
    ("enjoy", 0.4),
    ("excellent", 1.0),
    ("excited", 0.4),
    ("fantastic", 0.4),
    ("fine", 0.42),
    ("fortunate", 0.4),
    ("glad", 0.5),
    ("good", 0.7),
    ("great", 0.8),
    ("happy", 0.8),
    ("helpful", 0.5),
    ("impressive", 1.0),
    ("love", 0.5),
    ("lovely", 0.5),
    ("nice", 0.6),
    ("perfect", 1.0),
    ("pleasant", 0.73),
    ("pleased", 0.5),
    ("positive", 0.23),
    ("recommend", 0.3),
    ("reliable", 0.5),
    ("satisfied", 0.5),
    ("success", 0.3),
    ("successful", 0.75),
    ("superb", 1.0),
    ("thank", 0.3),
    ("thanks", 0.3),
    ("useful", 0.3),
    ("valuable", 0.5),
    ("welcome", 0.8),
    ("wonderful", 1.0),
    ("angry", -0.5),
    ("annoyed", -0.4),
    ("annoying", -0.6),
    ("awful", -1.0),
    ("bad", -0.7),
    ("boring", -1.0),
    ("broken", -0.4),
    ("confusing", -0.4),
    ("difficult", -0.5),
    ("disappointed", -0.75),
    ("disappointing", -0.6),
    ("disgusting", -1.0),
    ("dreadful", -1.0),
    ("fail", -0.5),
    ("failed", -0.5),
    ("failure", -0.32),
    ("frustrated", -0.7),
    ("frustrating", -0.4),
    ("hate", -0.8),
    ("horrible", -1.0),
    ("poor", -0.4),
    ("problem", -0.3),
    ("sad", -0.5),
    ("slow", -0.3),
    ("sorry", -0.5),
    ("stupid", -0.8),
    ("terrible", -1.0),
    ("ugly", -0.7),
    ("unacceptable", -0.8),
    ("unfortunately", -0.5),
    ("unhappy", -0.6),
    ("upset", -0.5),
    ("useless", -0.5),
    ("worse", -0.4),
    ("worst", -1.0),
    ("wrong", -0.5),
];

const INTENSIFIERS: &[(&str, f64)] = &[
    ("very", 1.3),
    ("really", 1.2),
    ("extremely", 1.5),
    ("incredibly", 1.4),
    ("so", 1.2),
    ("quite", 1.1),
    ("slightly", 0.5),
    ("somewhat", 0.7),
];

const NEGATIONS: &[&str] = &["not", "no", "never", "nothing", "neither", "nor", "without"];

// modifiers stop applying after this many plain words
const MODIFIER_WINDOW: usize = 2;

fn lookup(table: &[(&str, f64)], word: &str) -> Option<f64> {
    table.iter().find(|(w, _)| *w == word).map(|(_, v)| *v)
}

fn is_negation(word: &str) -> bool {
    NEGATIONS.contains(&word) || word.ends_with("n't")
}

/// Lexicon polarity in [-1, 1]: the mean of the scored words, each adjusted by a
/// preceding intensifier and flipped (and halved) by a preceding negation.
pub fn polarity(text: &str) -> f64 {
    let lowered = text.to_lowercase();
    let tokens = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty());

    let mut scored = Vec::new();
    let mut negated = false;
    let mut intensity = 1.0;
    let mut since_modifier = 0usize;

    for token in tokens {
        if is_negation(token) {
            negated = true;
            since_modifier = 0;
            continue;
        }
        if let Some(factor) = lookup(INTENSIFIERS, token) {
            intensity *= factor;
            since_modifier = 0;
            continue;
        }
        match lookup(LEXICON, token) {
            Some(p) => {
                let mut value = (p * intensity).clamp(-1.0, 1.0);
                if negated {
                    value *= -0.5;
                }
                scored.push(value);
                negated = false;
                intensity = 1.0;
            }
            None => {
                since_modifier += 1;
                if since_modifier > MODIFIER_WINDOW {
                    negated = false;
                    intensity = 1.0;
                }
            }
        }
    }

    if scored.is_empty() {
        return 0.0;
    }
    (scored.iter().sum::<f64>() / scored.len() as f64).clamp(-1.0, 1.0)
}

pub struct SentimentAnalyzer {
    expected: Sentiment,
}

impl SentimentAnalyzer {
    pub fn new(expected: Sentiment) -> Self {
        Self { expected }
    }
}

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::new(Sentiment::Neutral)
    }
}

impl Grader for SentimentAnalyzer {
    fn name(&self) -> &'static str {
        "sentiment_analyzer"
    }

    fn grade(&self, response: &str) -> GradeResult {
        let polarity = polarity(response);
        let detected = Sentiment::classify(polarity);
        let matches = detected == self.expected;
        let score = if matches {
            10
        } else {
            (10.0 - polarity.abs() * 10.0).clamp(0.0, 10.0).floor() as u32
        };

        GradeResult::new(
            score,
            matches,
            format!(
                "Detected {} sentiment (polarity: {:.2}), expected {}",
                detected, polarity, self.expected
            ),
        )
        .with_details(json!({
            "polarity": round_to(polarity, 3),
            "detected": detected,
            "expected": self.expected,
        }))
    }
}

pub fn sentiment_analyzer(response: &str, expected: Sentiment) -> GradeResult {
    SentimentAnalyzer::new(expected).grade(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_clear_polarity() {
        assert!(polarity("This is a great and wonderful product") > 0.1);
        assert!(polarity("Terrible service, awful experience") < -0.1);
        assert_eq!(polarity("The meeting is at 3pm on Tuesday"), 0.0);
    }

    #[test]
    fn negation_flips_and_dampens() {
        let p = polarity("this is not good");
        assert!(p < 0.0);
        assert!((p - (-0.35)).abs() < 1e-9);
        assert!(polarity("I don't hate it") > 0.0);
    }

    #[test]
    fn intensifier_scales_and_clamps() {
        assert!((polarity("very good") - 0.91).abs() < 1e-9);
        assert_eq!(polarity("extremely excellent"), 1.0);
    }

    #[test]
    fn matching_expectation_scores_ten() {
        let grade = sentiment_analyzer("Thanks, this was excellent!", Sentiment::Positive);
        assert!(grade.passed);
        assert_eq!(grade.score, 10);
    }

    #[test]
    fn mismatch_scales_with_polarity() {
        // polarity 1.0 → 10 - 10 = 0
        let grade = sentiment_analyzer("perfect", Sentiment::Negative);
        assert!(!grade.passed);
        assert_eq!(grade.score, 0);

        // polarity 0.7 → floor(10 - 7), give or take float error
        let grade = sentiment_analyzer("good", Sentiment::Neutral);
        assert!(!grade.passed);
        assert!(grade.score <= 3);
    }

    #[test]
    fn empty_response_is_neutral() {
        let grade = SentimentAnalyzer::default().grade("");
        assert!(grade.passed);
        assert_eq!(grade.details.unwrap()["detected"], "neutral");
    }

    #[test]
    fn parses_expected_sentiment() {
        assert_eq!("Positive".parse::<Sentiment>().unwrap(), Sentiment::Positive);
        assert!("happy".parse::<Sentiment>().is_err());
    }
}

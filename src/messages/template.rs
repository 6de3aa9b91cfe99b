use crate::models::MessageVariables;
use crate::scoring::aq::round_half_up;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref VARIABLE_TOKEN: Regex =
        Regex::new(r"(?i)\[\[(dq|aq|pointtotal|lastdq|lastscore)\]\]").unwrap();
    static ref POLL_REF_TOKEN: Regex =
        Regex::new(r"\[\[([A-Za-z]+)-S(\d+)-L(\d+)-P(\d+)\]\]").unwrap();
}

/// Substitutes metric tokens in a feedback template.
///
/// Recognised tokens are matched case-insensitively: `[[DQ]]`, `[[AQ]]`,
/// `[[PointTotal]]`, `[[LastDQ]]` and `[[LastScore]]`. Anything else,
/// including malformed brackets and poll references, is left as written.
/// The output is not HTML-escaped.
pub fn replace_message_variables(template: &str, vars: &MessageVariables) -> String {
    VARIABLE_TOKEN
        .replace_all(template, |caps: &Captures| {
            match caps[1].to_ascii_lowercase().as_str() {
                "dq" => format_ratio(vars.dq),
                "aq" => format!("{}", round_half_up(vars.aq) as i64),
                "pointtotal" => vars.point_total.to_string(),
                "lastdq" => format_ratio(vars.last_dq),
                "lastscore" => vars.last_score.to_string(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

// Two decimals, halves rounded up: 0.125 renders as 0.13
fn format_ratio(value: f64) -> String {
    format!("{:.2}", round_half_up(value * 100.0) / 100.0)
}

/// An editor cross-reference such as `[[Poll-S1-L2-P3]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollRef {
    pub kind: String,
    pub stage: u32,
    pub level: u32,
    pub poll: u32,
}

impl PollRef {
    pub fn token(&self) -> String {
        format!("[[{}-S{}-L{}-P{}]]", self.kind, self.stage, self.level, self.poll)
    }
}

fn parse_poll_ref(caps: &Captures) -> Option<PollRef> {
    Some(PollRef {
        kind: caps[1].to_string(),
        stage: caps[2].parse().ok()?,
        level: caps[3].parse().ok()?,
        poll: caps[4].parse().ok()?,
    })
}

/// Lists the poll references in a template, in order of appearance.
pub fn poll_refs(template: &str) -> Vec<PollRef> {
    POLL_REF_TOKEN
        .captures_iter(template)
        .filter_map(|caps| parse_poll_ref(&caps))
        .collect()
}

/// Rewrites the numeric parts of every poll reference. The kind is kept from
/// the original token whatever `renumber` returns for it. References whose
/// numbers do not fit are left untouched.
pub fn rewrite_poll_refs<F>(template: &str, mut renumber: F) -> String
where
    F: FnMut(&PollRef) -> PollRef,
{
    POLL_REF_TOKEN
        .replace_all(template, |caps: &Captures| match parse_poll_ref(caps) {
            Some(original) => {
                let renumbered = renumber(&original);
                PollRef {
                    kind: original.kind,
                    ..renumbered
                }
                .token()
            }
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> MessageVariables {
        MessageVariables {
            dq: 0.5,
            aq: 77.0,
            point_total: 0,
            last_dq: 0.0,
            last_score: 0,
        }
    }

    #[test]
    fn replaces_dq_and_aq() {
        assert_eq!(
            replace_message_variables("[[DQ]] and [[AQ]]", &vars()),
            "0.50 and 77"
        );
    }

    #[test]
    fn tokens_are_case_insensitive() {
        let vars = MessageVariables {
            dq: 0.126,
            aq: 64.0,
            point_total: 1520,
            last_dq: 1.0 / 3.0,
            last_score: 1400,
        };
        assert_eq!(
            replace_message_variables(
                "[[pointtotal]] / [[LASTSCORE]] / [[LastDq]] / [[dq]] / [[Aq]]",
                &vars
            ),
            "1520 / 1400 / 0.33 / 0.13 / 64"
        );
    }

    #[test]
    fn ratio_and_aq_halves_round_up() {
        let vars = MessageVariables {
            dq: 1.0 / 8.0,
            aq: -2.5,
            point_total: 0,
            last_dq: 5.0 / 8.0,
            last_score: 0,
        };
        assert_eq!(
            replace_message_variables("[[DQ]] [[LastDQ]] [[AQ]]", &vars),
            "0.13 0.63 -2"
        );

        let vars = MessageVariables {
            aq: 68.5,
            ..vars
        };
        assert_eq!(replace_message_variables("[[AQ]]", &vars), "69");
    }

    #[test]
    fn unknown_and_malformed_tokens_pass_through() {
        let template = "[[Name]] [[DQ] [DQ]] [[ DQ ]] [[Poll-S1-L2-P3]]";
        assert_eq!(replace_message_variables(template, &vars()), template);
    }

    #[test]
    fn template_without_tokens_is_unchanged() {
        assert_eq!(replace_message_variables("<b>hi</b>", &vars()), "<b>hi</b>");
    }

    #[test]
    fn lists_poll_refs() {
        let refs = poll_refs("see [[Poll-S1-L2-P3]] and [[Image-S0-L10-P7]], not [[Poll-S1-L2]]");
        assert_eq!(
            refs,
            vec![
                PollRef {
                    kind: "Poll".to_string(),
                    stage: 1,
                    level: 2,
                    poll: 3,
                },
                PollRef {
                    kind: "Image".to_string(),
                    stage: 0,
                    level: 10,
                    poll: 7,
                },
            ]
        );
    }

    #[test]
    fn rewrite_keeps_kind_and_swaps_numbers() {
        let out = rewrite_poll_refs("[[Poll-S1-L2-P3]] then [[Quad-S1-L3-P1]]", |r| PollRef {
            kind: "Ignored".to_string(),
            stage: r.stage + 1,
            level: r.level,
            poll: r.poll * 10,
        });
        assert_eq!(out, "[[Poll-S2-L2-P30]] then [[Quad-S2-L3-P10]]");
    }
}

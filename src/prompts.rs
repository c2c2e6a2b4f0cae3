//! Centralized prompt definitions for the stress-test workflow
//!
//! Every prompt is a fixed instruction block followed by the material it
//! operates on. The section headings requested from the model are advisory;
//! nothing downstream parses them.

use std::collections::BTreeMap;

use crate::personas::Persona;

/// Assistant name registered with the gateway.
pub const ASSISTANT_NAME: &str = "Idea Stress Tester";

/// Assistant description registered with the gateway.
pub const ASSISTANT_DESCRIPTION: &str = "Forced adversarial reasoning system: neutralizes optimism bias, extracts assumptions, runs 5 persona critics, synthesizes a decisive verdict.";

/// Rewrites the raw idea without hype.
pub const BIAS_REMOVER_PROMPT: &str = r#"Rewrite the idea below in neutral, factual language.
Rules:
- Remove adjectives, hype, and assumptions of success.
- Convert vague claims into testable statements.
- Keep it to 3–6 sentences.
Return ONLY the rewritten idea."#;

/// Extracts the assumptions the idea depends on.
pub const ASSUMPTIONS_PROMPT: &str = r#"Extract the hidden assumptions that must be true for this idea to succeed.
Rules:
- Only necessary assumptions (not nice-to-have).
- Phrase each as falsifiable.
- 8–12 max.

Return as a numbered list."#;

/// Skeptical VC critique.
pub const VC_PROMPT: &str = r#"Persona: Skeptical VC
Attack: market size, moat, monetization

Deliver exactly:
- MARKET RISKS: (2 bullets)
- MOAT & DEFENSE: (2 bullets)
- KILL SIGNAL: (1 metric that proves this is dead)
- ONE RECOMMENDATION: (1 specific action)

Be blunt and specific."#;

/// Senior engineer critique.
pub const ENGINEER_PROMPT: &str = r#"Persona: Senior Engineer
Attack: scalability, edge cases, reliability

Deliver exactly:
- SYSTEM RISKS: (2 bullets)
- EDGE CASES: (2 bullets)
- SCALING BOTTLENECK: (1 specific bottleneck)
- MINIMUM BUILD: (1 critical feature to build first)

Be concrete. No generic advice."#;

/// Ethicist / safety reviewer critique.
pub const ETHICIST_PROMPT: &str = r#"Persona: Ethicist / Safety Reviewer
Attack: harm, bias, misuse, privacy

Deliver exactly:
- HARMS & BIAS: (2 bullets)
- MISUSE SCENARIOS: (2 bullets)
- DATA PRIVACY: (1 specific risk)
- REQUIRED SAFEGUARD: (1 mandatory control)

Don't moralize. Be practical."#;

/// Real user critique.
pub const USER_PROMPT: &str = r#"Persona: Real User (impatient, skeptical)
Attack: adoption friction, trust, workflow fit

Deliver exactly:
- ADOPTION FRICTION: (2 bullets)
- TRUST ISSUES: (2 bullets)
- DEALBREAKER: (1 reason I won't sign up)
- WHAT WOULD CONVINCE ME: (1 feature/change)"#;

/// Competitor strategy critique.
pub const COMPETITOR_PROMPT: &str = r#"Persona: Competitor Strategy Lead
Attack: why we'll crush you

Deliver exactly:
- COMPETITIVE ADVANTAGE: (2 bullets on why we win)
- COPYCAT STRATEGY: (2 bullets on how we copy you)
- YOUR WEAKNESS: (1 critical flaw)
- DEFENSIVE MOVE: (1 thing you must do)

Be ruthless."#;

/// Final judge synthesis; the six-section verdict format.
pub const FINAL_JUDGE_PROMPT: &str = r#"You are an independent hackathon judge.
Synthesize the critics below into a decisive verdict.

Return in this exact format:

PRIMARY FAILURE MODE:
- (one sentence)

TOP 3 ASSUMPTIONS TO TEST:
1) ...
2) ...
3) ...

KILL QUESTION:
- (one question)

WINNING DEMO ANGLE:
- (one sentence: how to demo this in 30 seconds)

48-HOUR VALIDATION EXPERIMENT:
- (one experiment + success metric)

ONE PIVOT TO MAKE THIS A WINNER:
- (one sentence)"#;

/// A workflow stage together with the inputs its prompt embeds.
#[derive(Debug, Clone, Copy)]
pub enum PromptStage<'a> {
    BiasRemover {
        idea: &'a str,
    },
    Assumptions {
        neutral_idea: &'a str,
    },
    Critic {
        persona: Persona,
        neutral_idea: &'a str,
    },
    FinalJudge {
        neutral_idea: &'a str,
        assumptions: &'a str,
        critiques: &'a BTreeMap<Persona, String>,
    },
}

impl PromptStage<'_> {
    /// Stage name used in logs and the invocation ledger.
    pub fn name(&self) -> &'static str {
        match self {
            PromptStage::BiasRemover { .. } => "bias_remover",
            PromptStage::Assumptions { .. } => "assumptions",
            PromptStage::Critic { persona, .. } => persona.as_str(),
            PromptStage::FinalJudge { .. } => "final_judge",
        }
    }

    /// Render the prompt text.
    pub fn render(&self) -> String {
        match *self {
            PromptStage::BiasRemover { idea } => with_idea(BIAS_REMOVER_PROMPT, idea),
            PromptStage::Assumptions { neutral_idea } => {
                with_idea(ASSUMPTIONS_PROMPT, neutral_idea)
            }
            PromptStage::Critic {
                persona,
                neutral_idea,
            } => with_idea(critic_template(persona), neutral_idea),
            PromptStage::FinalJudge {
                neutral_idea,
                assumptions,
                critiques,
            } => final_judge(neutral_idea, assumptions, critiques),
        }
    }
}

/// Instruction block for a persona.
pub fn critic_template(persona: Persona) -> &'static str {
    match persona {
        Persona::Vc => VC_PROMPT,
        Persona::Engineer => ENGINEER_PROMPT,
        Persona::Ethicist => ETHICIST_PROMPT,
        Persona::User => USER_PROMPT,
        Persona::Competitor => COMPETITOR_PROMPT,
    }
}

fn with_idea(template: &str, idea: &str) -> String {
    format!("{}\n\nIdea:\n{}", template, idea)
}

fn final_judge(
    neutral_idea: &str,
    assumptions: &str,
    critiques: &BTreeMap<Persona, String>,
) -> String {
    let critic_blocks: Vec<String> = critiques
        .iter()
        .map(|(persona, text)| format!("{}:\n{}", persona.display_name(), text))
        .collect();

    format!(
        "{}\n\nINPUTS\nNeutral Idea:\n{}\n\nAssumptions:\n{}\n\n{}",
        FINAL_JUDGE_PROMPT,
        neutral_idea,
        assumptions,
        critic_blocks.join("\n\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bias_remover_embeds_raw_idea() {
        let prompt = PromptStage::BiasRemover {
            idea: "The most revolutionary app ever",
        }
        .render();
        assert!(prompt.starts_with("Rewrite the idea below in neutral, factual language."));
        assert!(prompt.ends_with("Idea:\nThe most revolutionary app ever"));
    }

    #[test]
    fn test_each_persona_has_distinct_template() {
        let rendered: Vec<String> = Persona::ALL
            .iter()
            .map(|p| {
                PromptStage::Critic {
                    persona: *p,
                    neutral_idea: "A meal planner.",
                }
                .render()
            })
            .collect();

        for (i, a) in rendered.iter().enumerate() {
            assert!(a.ends_with("Idea:\nA meal planner."));
            for b in rendered.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert!(rendered[0].contains("MARKET RISKS"));
        assert!(rendered[2].contains("DATA PRIVACY"));
    }

    #[test]
    fn test_final_judge_includes_only_run_critiques_in_order() {
        let mut critiques = BTreeMap::new();
        critiques.insert(Persona::User, "too slow".to_string());
        critiques.insert(Persona::Vc, "tiny market".to_string());

        let prompt = PromptStage::FinalJudge {
            neutral_idea: "neutral",
            assumptions: "1) people cook",
            critiques: &critiques,
        }
        .render();

        assert!(prompt.contains("PRIMARY FAILURE MODE:"));
        assert!(prompt.contains("ONE PIVOT TO MAKE THIS A WINNER:"));
        assert!(prompt.contains("Neutral Idea:\nneutral\n\nAssumptions:\n1) people cook"));
        let vc = prompt.find("VC:\ntiny market").unwrap();
        let user = prompt.find("User:\ntoo slow").unwrap();
        assert!(vc < user);
        assert!(!prompt.contains("Engineer:\n"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let stage = PromptStage::Assumptions {
            neutral_idea: "An app.",
        };
        assert_eq!(stage.render(), stage.render());
        assert_eq!(stage.name(), "assumptions");
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PromptStage::BiasRemover { idea: "" }.name(), "bias_remover");
        assert_eq!(
            PromptStage::Critic {
                persona: Persona::Competitor,
                neutral_idea: ""
            }
            .name(),
            "competitor"
        );
    }
}

// Generation policies
//
// Every task has a normal policy and a strong one used only after the
// similarity gate asks for a second pass. Arabic grammar correction has its
// own pair (minimum length and sentinel bank).

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::language::Language;
use crate::prompts::Task;

/// Decoding constraints for one generation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationPolicy {
    pub max_new_tokens: usize,
    /// EOS is forbidden until this many tokens were generated
    pub min_new_tokens: usize,
    pub beam_width: usize,
    pub do_sample: bool,
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,
    /// 0 disables
    pub no_repeat_ngram_size: usize,
    /// 0 disables
    pub encoder_no_repeat_ngram_size: usize,
    pub num_beam_groups: usize,
    pub diversity_penalty: f32,
    pub length_penalty: f32,
    pub early_stopping: bool,
    /// Token-id sequences that must never appear in the output
    pub forbidden_token_groups: Vec<Vec<u32>>,
    /// Number of `<extra_id_N>` sentinels to forbid (resolved per tokenizer)
    pub sentinel_bank: usize,
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self {
            max_new_tokens: 64,
            min_new_tokens: 0,
            beam_width: 1,
            do_sample: false,
            temperature: 1.0,
            top_p: 1.0,
            repetition_penalty: 1.0,
            no_repeat_ngram_size: 0,
            encoder_no_repeat_ngram_size: 0,
            num_beam_groups: 1,
            diversity_penalty: 0.0,
            length_penalty: 1.0,
            early_stopping: true,
            forbidden_token_groups: Vec::new(),
            sentinel_bank: 0,
        }
    }
}

impl GenerationPolicy {
    /// Beams per diverse group
    pub fn group_size(&self) -> usize {
        self.beam_width / self.num_beam_groups.max(1)
    }

    pub fn is_diverse(&self) -> bool {
        self.num_beam_groups > 1
    }

    /// Reject combinations the search cannot run
    pub fn validate(&self) -> Result<()> {
        if self.max_new_tokens == 0 {
            bail!("max_new_tokens must be at least 1");
        }
        if self.beam_width == 0 || self.num_beam_groups == 0 {
            bail!("beam_width and num_beam_groups must be at least 1");
        }
        if self.beam_width % self.num_beam_groups != 0 {
            bail!(
                "beam_width ({}) must be divisible by num_beam_groups ({})",
                self.beam_width,
                self.num_beam_groups
            );
        }
        if self.do_sample && self.is_diverse() {
            bail!("sampling cannot be combined with diverse beam groups");
        }
        if self.do_sample && self.temperature <= 0.0 {
            bail!("temperature must be positive, got {}", self.temperature);
        }
        if self.do_sample && !(self.top_p > 0.0 && self.top_p <= 1.0) {
            bail!("top_p must be in (0, 1], got {}", self.top_p);
        }
        if self.repetition_penalty <= 0.0 {
            bail!("repetition_penalty must be positive, got {}", self.repetition_penalty);
        }
        if self.forbidden_token_groups.iter().any(|group| group.is_empty()) {
            bail!("forbidden token groups must not be empty");
        }
        Ok(())
    }
}

/// Which policy variant a pass runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyStrength {
    Normal,
    Strong,
}

impl PolicyStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyStrength::Normal => "normal",
            PolicyStrength::Strong => "strong",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyPair {
    pub normal: GenerationPolicy,
    pub strong: GenerationPolicy,
}

impl PolicyPair {
    pub fn get(&self, strength: PolicyStrength) -> &GenerationPolicy {
        match strength {
            PolicyStrength::Normal => &self.normal,
            PolicyStrength::Strong => &self.strong,
        }
    }
}

/// Policies for every (task, language) pairing
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyTable {
    grammar: PolicyPair,
    arabic_grammar: PolicyPair,
    paraphrase: PolicyPair,
    evasion: PolicyPair,
}

fn grammar_policy() -> GenerationPolicy {
    GenerationPolicy {
        max_new_tokens: 96,
        beam_width: 6,
        no_repeat_ngram_size: 3,
        ..GenerationPolicy::default()
    }
}

fn arabic_grammar_policy() -> GenerationPolicy {
    GenerationPolicy {
        min_new_tokens: 12,
        sentinel_bank: 100,
        ..grammar_policy()
    }
}

fn diverse(base: &GenerationPolicy) -> GenerationPolicy {
    GenerationPolicy {
        beam_width: 8,
        num_beam_groups: 4,
        diversity_penalty: 0.35,
        do_sample: false,
        repetition_penalty: 1.25,
        ..base.clone()
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        let paraphrase = GenerationPolicy {
            max_new_tokens: 64,
            beam_width: 4,
            do_sample: true,
            temperature: 0.9,
            top_p: 0.92,
            repetition_penalty: 1.25,
            no_repeat_ngram_size: 3,
            encoder_no_repeat_ngram_size: 3,
            ..GenerationPolicy::default()
        };
        let evasion = GenerationPolicy {
            max_new_tokens: 96,
            beam_width: 6,
            repetition_penalty: 1.15,
            ..paraphrase.clone()
        };

        Self {
            grammar: PolicyPair {
                normal: grammar_policy(),
                strong: grammar_policy(),
            },
            arabic_grammar: PolicyPair {
                normal: arabic_grammar_policy(),
                strong: arabic_grammar_policy(),
            },
            paraphrase: PolicyPair {
                strong: diverse(&paraphrase),
                normal: paraphrase,
            },
            evasion: PolicyPair {
                strong: diverse(&evasion),
                normal: evasion,
            },
        }
    }
}

impl PolicyTable {
    /// Default table with configured overrides applied, every policy validated
    pub fn with_overrides(overrides: &PolicyOverrides) -> Result<Self> {
        let mut table = Self::default();
        overrides.grammar.apply(&mut table.grammar);
        overrides.arabic_grammar.apply(&mut table.arabic_grammar);
        overrides.paraphrase.apply(&mut table.paraphrase);
        overrides.evasion.apply(&mut table.evasion);
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, pair) in [
            ("grammar", &self.grammar),
            ("arabic_grammar", &self.arabic_grammar),
            ("paraphrase", &self.paraphrase),
            ("evasion", &self.evasion),
        ] {
            for strength in [PolicyStrength::Normal, PolicyStrength::Strong] {
                pair.get(strength).validate().map_err(|e| {
                    anyhow::anyhow!("invalid {} policy for {}: {}", strength.as_str(), name, e)
                })?;
            }
        }
        Ok(())
    }

    pub fn policy(&self, task: Task, language: Language, strength: PolicyStrength) -> &GenerationPolicy {
        let pair = match (task, language) {
            (Task::GrammarCorrection, Language::Arabic) => &self.arabic_grammar,
            (Task::GrammarCorrection, Language::English) => &self.grammar,
            (Task::Paraphrase, _) => &self.paraphrase,
            (Task::DetectorEvasion, _) => &self.evasion,
        };
        pair.get(strength)
    }
}

/// Field-level override of one policy; unset fields keep the built-in value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyOverride {
    pub max_new_tokens: Option<usize>,
    pub min_new_tokens: Option<usize>,
    pub beam_width: Option<usize>,
    pub do_sample: Option<bool>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub repetition_penalty: Option<f32>,
    pub no_repeat_ngram_size: Option<usize>,
    pub encoder_no_repeat_ngram_size: Option<usize>,
    pub num_beam_groups: Option<usize>,
    pub diversity_penalty: Option<f32>,
    pub length_penalty: Option<f32>,
    pub early_stopping: Option<bool>,
    pub forbidden_token_groups: Option<Vec<Vec<u32>>>,
    pub sentinel_bank: Option<usize>,
}

impl PolicyOverride {
    pub fn apply(&self, policy: &mut GenerationPolicy) {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(value) = &self.$field {
                    policy.$field = value.clone();
                })*
            };
        }
        set!(
            max_new_tokens,
            min_new_tokens,
            beam_width,
            do_sample,
            temperature,
            top_p,
            repetition_penalty,
            no_repeat_ngram_size,
            encoder_no_repeat_ngram_size,
            num_beam_groups,
            diversity_penalty,
            length_penalty,
            early_stopping,
            forbidden_token_groups,
            sentinel_bank
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairOverride {
    pub normal: PolicyOverride,
    pub strong: PolicyOverride,
}

impl PairOverride {
    fn apply(&self, pair: &mut PolicyPair) {
        self.normal.apply(&mut pair.normal);
        self.strong.apply(&mut pair.strong);
    }
}

/// `[generation.policies.*]` section of the config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyOverrides {
    pub grammar: PairOverride,
    pub arabic_grammar: PairOverride,
    pub paraphrase: PairOverride,
    pub evasion: PairOverride,
}

//! Генерация топонимов
//!
//! Имена берутся из грамматики (`Markov`: n-граммы по корпусу, `Syllables`: слоги по
//! шаблону), приводятся к заглавному виду и регистрируются без учёта регистра. При
//! коллизии имя пересэмплируется до `name_retry_limit` раз, после чего получает
//! римский суффикс (`II`, `III`, …).

pub mod corpus;
pub mod markov;

use std::collections::{BTreeMap, HashSet};

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::rivers::River;

pub use markov::MarkovModel;

/// Сколько раз грамматика пытается выдать допустимое слово
const SAMPLE_ATTEMPTS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", deny_unknown_fields)]
pub enum NameGrammar {
    Markov {
        #[serde(default = "default_order")]
        order: usize,
        /// Свой корпус; без него используется встроенный
        #[serde(default)]
        corpus: Option<Vec<String>>,
        #[serde(default = "default_min_length")]
        min_length: usize,
        #[serde(default = "default_max_length")]
        max_length: usize,
    },
    Syllables {
        onsets: Vec<String>,
        nuclei: Vec<String>,
        codas: Vec<String>,
        #[serde(default = "default_min_syllables")]
        min_syllables: usize,
        #[serde(default = "default_max_syllables")]
        max_syllables: usize,
    },
}

fn default_order() -> usize {
    3
}
fn default_min_length() -> usize {
    4
}
fn default_max_length() -> usize {
    10
}
fn default_min_syllables() -> usize {
    2
}
fn default_max_syllables() -> usize {
    3
}

impl Default for NameGrammar {
    fn default() -> Self {
        NameGrammar::Markov {
            order: default_order(),
            corpus: None,
            min_length: default_min_length(),
            max_length: default_max_length(),
        }
    }
}

impl NameGrammar {
    pub fn validate(&self) -> Result<(), GenerationError> {
        match self {
            NameGrammar::Markov {
                order,
                corpus,
                min_length,
                max_length,
            } => {
                if !(1..=6).contains(order) {
                    return Err(GenerationError::invalid(
                        "name_grammar.order must be in 1..=6",
                    ));
                }
                if *min_length < 2 || min_length > max_length {
                    return Err(GenerationError::invalid(
                        "name_grammar needs 2 <= min_length <= max_length",
                    ));
                }
                if let Some(words) = corpus
                    && words.iter().all(|w| w.trim().is_empty())
                {
                    return Err(GenerationError::invalid("name_grammar.corpus is empty"));
                }
            }
            NameGrammar::Syllables {
                nuclei,
                min_syllables,
                max_syllables,
                ..
            } => {
                if nuclei.iter().all(String::is_empty) {
                    return Err(GenerationError::invalid(
                        "name_grammar.nuclei needs at least one non-empty entry",
                    ));
                }
                if *min_syllables == 0 || min_syllables > max_syllables {
                    return Err(GenerationError::invalid(
                        "name_grammar needs 1 <= min_syllables <= max_syllables",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Готовая к работе грамматика
#[derive(Debug, Clone)]
pub enum NameGenerator {
    Markov(MarkovModel),
    Syllables {
        onsets: Vec<String>,
        nuclei: Vec<String>,
        codas: Vec<String>,
        min_syllables: usize,
        max_syllables: usize,
    },
}

fn pick<'a>(items: &'a [String], rng: &mut ChaCha8Rng) -> &'a str {
    if items.is_empty() {
        ""
    } else {
        &items[rng.gen_range(0..items.len())]
    }
}

impl NameGenerator {
    #[must_use]
    pub fn new(grammar: &NameGrammar) -> Self {
        match grammar {
            NameGrammar::Markov {
                order,
                corpus,
                min_length,
                max_length,
            } => {
                let model = match corpus {
                    Some(words) => MarkovModel::train(words.as_slice(), *order, *min_length, *max_length),
                    None => MarkovModel::train(
                        corpus::BUILTIN_CORPUS,
                        *order,
                        *min_length,
                        *max_length,
                    ),
                };
                NameGenerator::Markov(model)
            }
            NameGrammar::Syllables {
                onsets,
                nuclei,
                codas,
                min_syllables,
                max_syllables,
            } => NameGenerator::Syllables {
                onsets: onsets.clone(),
                nuclei: nuclei.iter().filter(|n| !n.is_empty()).cloned().collect(),
                codas: codas.clone(),
                min_syllables: *min_syllables,
                max_syllables: *max_syllables,
            },
        }
    }

    /// Новое имя в заглавном виде.
    ///
    /// # Ошибки
    /// `GenerationFailure`, если грамматика не выдала ни одного допустимого слова.
    pub fn generate(&self, rng: &mut ChaCha8Rng) -> Result<String, GenerationError> {
        match self {
            NameGenerator::Markov(model) => (0..SAMPLE_ATTEMPTS)
                .find_map(|_| model.sample(rng))
                .map(|w| title_case(&w))
                .ok_or_else(|| {
                    GenerationError::failure(
                        "toponyms",
                        format!("name model produced no new word in {SAMPLE_ATTEMPTS} attempts"),
                    )
                }),
            NameGenerator::Syllables {
                onsets,
                nuclei,
                codas,
                min_syllables,
                max_syllables,
            } => {
                let count = rng.gen_range(*min_syllables..=*max_syllables);
                let mut word = String::new();
                for _ in 0..count {
                    word.push_str(pick(onsets, rng));
                    word.push_str(pick(nuclei, rng));
                    word.push_str(pick(codas, rng));
                }
                Ok(title_case(&word))
            }
        }
    }
}

/// Первая буква каждого слова заглавная, остальные строчные.
#[must_use]
pub fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Римская запись числа (1..=3999).
#[must_use]
pub fn roman(mut n: usize) -> String {
    const TABLE: [(usize, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for &(value, digits) in &TABLE {
        while n >= value {
            out.push_str(digits);
            n -= value;
        }
    }
    out
}

/// Выданные имена (без учёта регистра)
#[derive(Debug, Default)]
pub struct NameRegistry {
    issued: HashSet<String>,
    retry_limit: u32,
}

impl NameRegistry {
    #[must_use]
    pub fn new(retry_limit: u32) -> Self {
        Self {
            issued: HashSet::new(),
            retry_limit,
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.issued.contains(&name.to_lowercase())
    }

    /// Выдаёт уникальное имя вида `decorate(основа)`.
    pub fn issue(
        &mut self,
        generator: &NameGenerator,
        rng: &mut ChaCha8Rng,
        decorate: impl Fn(&str) -> String,
    ) -> Result<String, GenerationError> {
        let mut base = generator.generate(rng)?;
        for _ in 0..self.retry_limit {
            if !self.contains(&decorate(&base)) {
                break;
            }
            base = generator.generate(rng)?;
        }

        let mut name = decorate(&base);
        let mut suffix = 2;
        while self.contains(&name) {
            name = decorate(&format!("{base} {}", roman(suffix)));
            suffix += 1;
        }
        self.issued.insert(name.to_lowercase());
        Ok(name)
    }
}

/// Имена всех мест карты
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Toponyms {
    pub regions: Vec<String>,
    /// Индекс поселения в списке объектов -> имя
    pub settlements: BTreeMap<usize, String>,
    /// Id реки -> имя
    pub rivers: BTreeMap<usize, String>,
}

/// Раздаёт имена регионам, поселениям и рекам с достаточно длинным собственным руслом,
/// в этом порядке.
pub fn name_places(
    grammar: &NameGrammar,
    retry_limit: u32,
    region_count: usize,
    settlements: &[usize],
    rivers: &[River],
    min_named_river_length: usize,
    rng: &mut ChaCha8Rng,
) -> Result<Toponyms, GenerationError> {
    let generator = NameGenerator::new(grammar);
    let mut registry = NameRegistry::new(retry_limit);
    let mut toponyms = Toponyms::default();
    let plain = |s: &str| s.to_string();

    for _ in 0..region_count {
        toponyms
            .regions
            .push(registry.issue(&generator, rng, plain)?);
    }
    for &feature in settlements {
        let name = registry.issue(&generator, rng, plain)?;
        toponyms.settlements.insert(feature, name);
    }
    for river in rivers
        .iter()
        .filter(|r| r.own_length >= min_named_river_length)
    {
        let name = registry.issue(&generator, rng, |s| format!("{s} River"))?;
        toponyms.rivers.insert(river.id, name);
    }

    log::debug!(
        "имена: {} регионов, {} поселений, {} рек",
        toponyms.regions.len(),
        toponyms.settlements.len(),
        toponyms.rivers.len()
    );
    Ok(toponyms)
}

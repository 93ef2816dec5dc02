//! Символьная n-граммная модель с маркерами начала и конца слова

use std::collections::{BTreeMap, HashSet};

use rand::Rng;
use rand_chacha::ChaCha8Rng;

const START: char = '\u{2}';
const END: char = '\u{3}';

#[derive(Debug, Clone)]
pub struct MarkovModel {
    order: usize,
    min_length: usize,
    max_length: usize,
    /// Контекст из `order` символов -> счётчики следующего символа
    transitions: BTreeMap<String, BTreeMap<char, u32>>,
    corpus: HashSet<String>,
}

impl MarkovModel {
    #[must_use]
    pub fn train<S: AsRef<str>>(
        words: &[S],
        order: usize,
        min_length: usize,
        max_length: usize,
    ) -> Self {
        let mut transitions: BTreeMap<String, BTreeMap<char, u32>> = BTreeMap::new();
        let mut corpus = HashSet::new();

        for word in words {
            let word = word.as_ref().trim().to_lowercase();
            if word.is_empty() {
                continue;
            }
            let mut context: Vec<char> = vec![START; order];
            for ch in word.chars().chain(std::iter::once(END)) {
                let key: String = context.iter().collect();
                *transitions.entry(key).or_default().entry(ch).or_default() += 1;
                context.remove(0);
                context.push(ch);
            }
            corpus.insert(word);
        }

        Self {
            order,
            min_length,
            max_length,
            transitions,
            corpus,
        }
    }

    fn next_char(&self, context: &[char], rng: &mut ChaCha8Rng) -> Option<char> {
        let key: String = context.iter().collect();
        let counts = self.transitions.get(&key)?;
        let total: u32 = counts.values().sum();
        let mut pick = rng.gen_range(0..total);
        for (&ch, &count) in counts {
            if pick < count {
                return Some(ch);
            }
            pick -= count;
        }
        None
    }

    /// Один проход модели. `None`, если слово вышло за пределы длины или уже есть в
    /// корпусе.
    pub fn sample(&self, rng: &mut ChaCha8Rng) -> Option<String> {
        let mut context: Vec<char> = vec![START; self.order];
        let mut word = String::new();
        let mut length = 0;
        loop {
            let ch = self.next_char(&context, rng)?;
            if ch == END {
                break;
            }
            length += 1;
            if length > self.max_length {
                return None;
            }
            word.push(ch);
            context.remove(0);
            context.push(ch);
        }
        if length < self.min_length || self.corpus.contains(&word) {
            return None;
        }
        Some(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn never_repeats_a_corpus_word() {
        let words = ["amber", "ambergate", "ashford", "arden", "ardmore", "ashgate"];
        let model = MarkovModel::train(&words, 2, 3, 12);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..500 {
            if let Some(name) = model.sample(&mut rng) {
                assert!(!words.contains(&name.as_str()));
                assert!((3..=12).contains(&name.chars().count()));
            }
        }
    }

    #[test]
    fn single_word_corpus_yields_nothing_new() {
        let model = MarkovModel::train(&["abc"], 3, 1, 10);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!((0..50).all(|_| model.sample(&mut rng).is_none()));
    }
}

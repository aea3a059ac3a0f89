//! Noun lemmatizer.
//!
//! Reduces inflected nouns to their dictionary form using an irregular
//! exception table plus suffix detachment rules. Rule candidates are checked
//! against a lexicon of base forms and the shortest known candidate wins; a
//! word that is itself a base form stays as it is. The built-in lexicon
//! covers common vocabulary, and words it does not know fall back to a
//! guarded rule order. A lexicon loaded from file replaces the built-in one
//! and disables the fallback.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use tracing::info;

use crate::error::{FilmceptionError, Result};

/// Suffix detachment rules for nouns, as (suffix, replacement)
const NOUN_RULES: &[(&str, &str)] = &[
    ("s", ""),
    ("ses", "s"),
    ("ves", "f"),
    ("xes", "x"),
    ("zes", "z"),
    ("ches", "ch"),
    ("shes", "sh"),
    ("men", "man"),
    ("ies", "y"),
];

/// Irregular plurals. Entries mapping a word to itself mark invariant forms.
const IRREGULAR: &[(&str, &str)] = &[
    ("men", "man"),
    ("women", "woman"),
    ("children", "child"),
    ("mice", "mouse"),
    ("lice", "louse"),
    ("geese", "goose"),
    ("teeth", "tooth"),
    ("feet", "foot"),
    ("oxen", "ox"),
    ("wolves", "wolf"),
    ("knives", "knife"),
    ("wives", "wife"),
    ("lives", "life"),
    ("leaves", "leaf"),
    ("thieves", "thief"),
    ("halves", "half"),
    ("shelves", "shelf"),
    ("selves", "self"),
    ("loaves", "loaf"),
    ("elves", "elf"),
    ("calves", "calf"),
    ("heroes", "hero"),
    ("potatoes", "potato"),
    ("tomatoes", "tomato"),
    ("echoes", "echo"),
    ("vetoes", "veto"),
    ("torpedoes", "torpedo"),
    ("criteria", "criterion"),
    ("phenomena", "phenomenon"),
    ("cacti", "cactus"),
    ("fungi", "fungus"),
    ("alumni", "alumnus"),
    ("analyses", "analysis"),
    ("crises", "crisis"),
    ("theses", "thesis"),
    ("indices", "index"),
    ("matrices", "matrix"),
    ("series", "series"),
    ("species", "species"),
    ("news", "news"),
    ("physics", "physics"),
    ("politics", "politics"),
    ("mathematics", "mathematics"),
    ("lens", "lens"),
];

static BUILTIN_LEXICON: Lazy<Lexicon> = Lazy::new(|| Lexicon::parse(include_str!("nouns.txt")));

/// Base forms plus `form<TAB>lemma` exception lines
#[derive(Debug, Clone, Default)]
struct Lexicon {
    words: HashSet<String>,
    exceptions: Vec<(String, String)>,
}

impl Lexicon {
    fn parse(text: &str) -> Self {
        let mut lexicon = Self::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once('\t') {
                Some((form, lemma)) => {
                    let lemma = lemma.trim().to_lowercase();
                    lexicon.words.insert(lemma.clone());
                    lexicon.exceptions.push((form.trim().to_lowercase(), lemma));
                }
                None => {
                    lexicon.words.insert(line.to_lowercase());
                }
            }
        }
        lexicon
    }
}

#[derive(Debug, Clone)]
pub struct Lemmatizer {
    exceptions: HashMap<String, String>,
    lexicon: HashSet<String>,
    /// Only lexicon-backed reductions; unknown words stay unchanged
    strict: bool,
}

impl Default for Lemmatizer {
    fn default() -> Self {
        Self::with_lexicon((*BUILTIN_LEXICON).clone(), false)
    }
}

impl Lemmatizer {
    fn with_lexicon(lexicon: Lexicon, strict: bool) -> Self {
        let mut exceptions: HashMap<String, String> = IRREGULAR
            .iter()
            .map(|(form, lemma)| (form.to_string(), lemma.to_string()))
            .collect();
        exceptions.extend(lexicon.exceptions);

        let mut words = lexicon.words;
        words.extend(exceptions.values().cloned());

        Self {
            exceptions,
            lexicon: words,
            strict,
        }
    }

    /// Load a lexicon file in place of the built-in one. Each line holds
    /// either a base form, or a tab-separated `form<TAB>lemma` pair extending
    /// the exception table. Blank lines and `#` comments are skipped.
    pub fn from_lexicon_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            FilmceptionError::Load(format!("Cannot read lemma lexicon '{}': {}", path.display(), e))
        })?;

        let lemmatizer = Self::with_lexicon(Lexicon::parse(&text), true);
        info!(
            "Loaded lemma lexicon with {} entries from {}",
            lemmatizer.lexicon.len(),
            path.display()
        );
        Ok(lemmatizer)
    }

    /// Whether a lexicon file replaced the built-in word list
    pub fn has_lexicon(&self) -> bool {
        self.strict
    }

    pub fn lemmatize(&self, word: &str) -> String {
        self.lemmatize_with(word, |_| false)
    }

    /// Reduce `word` until no further reduction applies. A step whose result
    /// is rejected by `keep_out` is not taken, so the returned form is stable
    /// under a second call with the same predicate.
    pub fn lemmatize_with<F>(&self, word: &str, keep_out: F) -> String
    where
        F: Fn(&str) -> bool,
    {
        let mut current = word.to_string();
        let mut seen = HashSet::new();
        seen.insert(current.clone());

        while let Some(next) = self.reduce_once(&current) {
            if keep_out(&next) || !seen.insert(next.clone()) {
                break;
            }
            current = next;
        }
        current
    }

    fn reduce_once(&self, word: &str) -> Option<String> {
        if let Some(lemma) = self.exceptions.get(word) {
            return (lemma != word).then(|| lemma.clone());
        }
        match best_known_form(word, &self.lexicon) {
            Some(best) => (best != word).then_some(best),
            None if self.strict => None,
            None => reduce_heuristic(word),
        }
    }
}

/// Shortest of `word` and its rule candidates that the lexicon knows
fn best_known_form(word: &str, lexicon: &HashSet<String>) -> Option<String> {
    let mut candidates: Vec<String> = Vec::new();
    if lexicon.contains(word) {
        candidates.push(word.to_string());
    }
    for (suffix, replacement) in NOUN_RULES {
        if let Some(stem) = word.strip_suffix(suffix) {
            if stem.is_empty() {
                continue;
            }
            let candidate = format!("{}{}", stem, replacement);
            if lexicon.contains(&candidate) && !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
    }

    // min_by_key keeps the first of equally short candidates
    candidates.into_iter().min_by_key(|c| c.len())
}

fn reduce_heuristic(word: &str) -> Option<String> {
    if word.len() < 4 || !word.is_ascii() {
        return None;
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return None;
    }
    if let Some(stem) = word.strip_suffix("ies") {
        return (stem.len() > 1).then(|| format!("{}y", stem));
    }
    for suffix in ["sses", "ches", "shes", "xes", "zes"] {
        if word.ends_with(suffix) {
            return Some(word[..word.len() - 2].to_string());
        }
    }
    word.strip_suffix('s').map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_regular_plurals() {
        let lemmatizer = Lemmatizer::default();
        assert_eq!(lemmatizer.lemmatize("wizards"), "wizard");
        assert_eq!(lemmatizer.lemmatize("powers"), "power");
        assert_eq!(lemmatizer.lemmatize("stories"), "story");
        assert_eq!(lemmatizer.lemmatize("matches"), "match");
        assert_eq!(lemmatizer.lemmatize("boxes"), "box");
        assert_eq!(lemmatizer.lemmatize("classes"), "class");
        assert_eq!(lemmatizer.lemmatize("houses"), "house");
    }

    #[test]
    fn test_guarded_words_are_left_alone() {
        let lemmatizer = Lemmatizer::default();
        for word in ["glass", "bus", "analysis", "famous", "boy", "run", "2024", "xies"] {
            assert_eq!(lemmatizer.lemmatize(word), word);
        }
    }

    #[test]
    fn test_irregular_forms() {
        let lemmatizer = Lemmatizer::default();
        assert_eq!(lemmatizer.lemmatize("children"), "child");
        assert_eq!(lemmatizer.lemmatize("wolves"), "wolf");
        assert_eq!(lemmatizer.lemmatize("women"), "woman");
        assert_eq!(lemmatizer.lemmatize("species"), "species");
    }

    #[test]
    fn test_known_base_forms_are_kept() {
        let lemmatizer = Lemmatizer::default();
        for word in ["movie", "mars", "christmas", "always", "news", "zombie", "clothes"] {
            assert_eq!(lemmatizer.lemmatize(word), word);
        }
    }

    #[test]
    fn test_plural_resolves_to_listed_base_form() {
        let lemmatizer = Lemmatizer::default();
        assert_eq!(lemmatizer.lemmatize("movies"), "movie");
        assert_eq!(lemmatizer.lemmatize("zombies"), "zombie");
        assert_eq!(lemmatizer.lemmatize("cookies"), "cookie");
        assert_eq!(lemmatizer.lemmatize("dies"), "die");
        assert_eq!(lemmatizer.lemmatize("enemies"), "enemy");
        assert_eq!(lemmatizer.lemmatize("glasses"), "glass");
        assert_eq!(lemmatizer.lemmatize("buses"), "bus");
    }

    #[test]
    fn test_unlisted_words_fall_back_to_rules() {
        let lemmatizer = Lemmatizer::default();
        assert_eq!(lemmatizer.lemmatize("spaceships"), "spaceship");
        assert_eq!(lemmatizer.lemmatize("boxes"), "box");
    }

    #[test]
    fn test_keep_out_blocks_reduction() {
        let lemmatizer = Lemmatizer::default();
        assert_eq!(lemmatizer.lemmatize("ands"), "and");
        assert_eq!(lemmatizer.lemmatize_with("ands", |w| w == "and"), "ands");
    }

    #[test]
    fn test_lemmatize_is_stable() {
        let lemmatizer = Lemmatizer::default();
        for word in ["wizards", "stories", "classes", "heroes", "buses", "knives", "thesis", "movies", "mars"] {
            let once = lemmatizer.lemmatize(word);
            assert_eq!(lemmatizer.lemmatize(&once), once);
        }
    }

    #[test]
    fn test_lexicon_filters_candidates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# base forms").unwrap();
        writeln!(file, "wizard").unwrap();
        writeln!(file, "discovers").unwrap();
        writeln!(file, "goose").unwrap();
        writeln!(file, "dwarves\tdwarf").unwrap();

        let lemmatizer = Lemmatizer::from_lexicon_file(file.path()).unwrap();
        assert!(lemmatizer.has_lexicon());
        assert!(!Lemmatizer::default().has_lexicon());
        assert_eq!(lemmatizer.lemmatize("wizards"), "wizard");
        // unknown candidates are not invented
        assert_eq!(lemmatizer.lemmatize("powers"), "powers");
        assert_eq!(lemmatizer.lemmatize("discovers"), "discovers");
        assert_eq!(lemmatizer.lemmatize("dwarves"), "dwarf");
        assert_eq!(lemmatizer.lemmatize("geese"), "goose");
    }

    #[test]
    fn test_missing_lexicon_is_a_load_error() {
        let err = Lemmatizer::from_lexicon_file("/nonexistent/lexicon.txt").unwrap_err();
        assert!(matches!(err, FilmceptionError::Load(_)));
    }
}

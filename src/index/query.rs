//! Query parsing and candidate selection.
//!
//! Syntax: whitespace-separated words are ANDed; `OR` or `|` starts an
//! alternative clause; `-word` or `NOT word` excludes; `word*` matches by
//! prefix; `"two words"` is a phrase. Words go through the index tokenizer,
//! so stop words and short words disappear from the query as well.

use roaring::RoaringBitmap;
use rustc_hash::FxHashSet;

use super::store::{DocumentStore, StoredDocument};
use super::tokenizer::{Token, Tokenizer};

/// Smallest unit of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    Term(String),
    Prefix(String),
    /// Terms with their word offsets inside the phrase
    Phrase(Vec<Token>),
}

impl Atom {
    fn from_tokens(mut tokens: Vec<Token>) -> Option<Self> {
        match tokens.len() {
            0 => None,
            1 => tokens.pop().map(|t| Atom::Term(t.term)),
            _ => Some(Atom::Phrase(tokens)),
        }
    }

    /// Candidate documents, a superset for phrases
    fn docs(&self, store: &DocumentStore) -> RoaringBitmap {
        let postings = store.postings();
        match self {
            Atom::Term(term) => postings.docs(term).cloned().unwrap_or_default(),
            Atom::Prefix(prefix) => postings.docs_with_prefix(prefix),
            Atom::Phrase(tokens) => {
                let mut iter = tokens.iter();
                let Some(first) = iter.next() else {
                    return RoaringBitmap::new();
                };
                let mut result = postings.docs(&first.term).cloned().unwrap_or_default();
                for token in iter {
                    match postings.docs(&token.term) {
                        Some(docs) => result &= docs,
                        None => return RoaringBitmap::new(),
                    }
                }
                result
            }
        }
    }

    fn matches(&self, doc: &StoredDocument) -> bool {
        match self {
            Atom::Term(term) => doc.term_freqs.contains_key(term),
            Atom::Prefix(prefix) => doc.term_freqs.keys().any(|t| t.starts_with(prefix.as_str())),
            Atom::Phrase(tokens) => {
                if !tokens.iter().all(|t| doc.term_freqs.contains_key(&t.term)) {
                    return false;
                }
                // Without positions a phrase degrades to AND
                match &doc.positions {
                    Some(positions) => phrase_matches(tokens, positions),
                    None => true,
                }
            }
        }
    }
}

fn phrase_matches(
    tokens: &[Token],
    positions: &rustc_hash::FxHashMap<String, Vec<u32>>,
) -> bool {
    let Some(first) = tokens.first() else {
        return false;
    };
    let Some(starts) = positions.get(&first.term) else {
        return false;
    };
    starts.iter().any(|&start| {
        tokens.iter().skip(1).all(|token| {
            let expected = start + (token.position - first.position);
            positions
                .get(&token.term)
                .is_some_and(|p| p.binary_search(&expected).is_ok())
        })
    })
}

/// OR of AND-clauses, minus exclusions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub clauses: Vec<Vec<Atom>>,
    pub excluded: Vec<Atom>,
}

enum Lexeme {
    Word(String),
    Quoted(String),
}

fn lex(input: &str) -> Vec<Lexeme> {
    let mut lexemes = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in input.chars() {
        if c == '"' {
            if in_quotes {
                lexemes.push(Lexeme::Quoted(std::mem::take(&mut current)));
            } else if !current.is_empty() {
                lexemes.push(Lexeme::Word(std::mem::take(&mut current)));
            }
            in_quotes = !in_quotes;
        } else if c.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                lexemes.push(Lexeme::Word(std::mem::take(&mut current)));
            }
        } else {
            current.push(c);
        }
    }

    // An unterminated quote still counts as a phrase
    if !current.is_empty() {
        lexemes.push(if in_quotes {
            Lexeme::Quoted(current)
        } else {
            Lexeme::Word(current)
        });
    }
    lexemes
}

impl Query {
    pub fn parse(input: &str, tokenizer: &Tokenizer, space_means_or: bool) -> Self {
        let mut query = Query::default();
        let mut clause: Vec<Atom> = Vec::new();
        let mut negate_next = false;

        for lexeme in lex(input) {
            let (atom, negated) = match lexeme {
                Lexeme::Word(word) => match word.as_str() {
                    "OR" | "|" => {
                        if !clause.is_empty() {
                            query.clauses.push(std::mem::take(&mut clause));
                        }
                        continue;
                    }
                    "AND" | "&" => continue,
                    "NOT" | "!" => {
                        negate_next = true;
                        continue;
                    }
                    _ => {
                        let (body, negated) = match word.strip_prefix('-') {
                            Some(rest) if !rest.is_empty() => (rest, true),
                            _ => (word.as_str(), false),
                        };
                        (parse_word(body, tokenizer), negated)
                    }
                },
                Lexeme::Quoted(text) => (Atom::from_tokens(tokenizer.tokenize(&text)), false),
            };

            let negated = std::mem::take(&mut negate_next) | negated;
            let Some(atom) = atom else {
                continue;
            };

            if negated {
                query.excluded.push(atom);
            } else if space_means_or {
                query.clauses.push(vec![atom]);
            } else {
                clause.push(atom);
            }
        }

        if !clause.is_empty() {
            query.clauses.push(clause);
        }
        query
    }

    /// A query with no positive clause matches nothing
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Every document that could match; verified per document by [`Query::matches`]
    pub fn candidates(&self, store: &DocumentStore) -> RoaringBitmap {
        let mut result = RoaringBitmap::new();
        for clause in &self.clauses {
            let mut atoms = clause.iter();
            let Some(first) = atoms.next() else {
                continue;
            };
            let mut docs = first.docs(store);
            for atom in atoms {
                if docs.is_empty() {
                    break;
                }
                docs &= atom.docs(store);
            }
            result |= docs;
        }

        for atom in &self.excluded {
            if !matches!(atom, Atom::Phrase(_)) {
                result -= atom.docs(store);
            }
        }
        result
    }

    pub fn matches(&self, doc: &StoredDocument) -> bool {
        self.clauses
            .iter()
            .any(|clause| clause.iter().all(|atom| atom.matches(doc)))
            && !self.excluded.iter().any(|atom| atom.matches(doc))
    }

    /// Terms of `doc` that contribute to its score
    pub fn matched_terms<'a>(&'a self, doc: &'a StoredDocument) -> FxHashSet<&'a str> {
        let mut terms = FxHashSet::default();
        for atom in self.clauses.iter().flatten() {
            match atom {
                Atom::Term(term) => {
                    if doc.term_freqs.contains_key(term) {
                        terms.insert(term.as_str());
                    }
                }
                Atom::Prefix(prefix) => {
                    terms.extend(
                        doc.term_freqs
                            .keys()
                            .filter(|t| t.starts_with(prefix.as_str()))
                            .map(String::as_str),
                    );
                }
                Atom::Phrase(tokens) => {
                    for token in tokens {
                        if doc.term_freqs.contains_key(&token.term) {
                            terms.insert(token.term.as_str());
                        }
                    }
                }
            }
        }
        terms
    }

    /// Positive terms with their query frequency, prefixes expanded against the index
    pub fn term_vector(&self, store: &DocumentStore) -> Vec<(String, u32)> {
        let mut counts: rustc_hash::FxHashMap<String, u32> = Default::default();
        for atom in self.clauses.iter().flatten() {
            match atom {
                Atom::Term(term) => *counts.entry(term.clone()).or_insert(0) += 1,
                Atom::Prefix(prefix) => {
                    for term in store.postings().terms_with_prefix(prefix) {
                        *counts.entry(term.to_string()).or_insert(0) += 1;
                    }
                }
                Atom::Phrase(tokens) => {
                    for token in tokens {
                        *counts.entry(token.term.clone()).or_insert(0) += 1;
                    }
                }
            }
        }
        let mut vector: Vec<(String, u32)> = counts.into_iter().collect();
        vector.sort();
        vector
    }
}

fn parse_word(word: &str, tokenizer: &Tokenizer) -> Option<Atom> {
    if let Some(body) = word.strip_suffix('*') {
        let prefix: String = body
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        return (!prefix.is_empty()).then_some(Atom::Prefix(prefix));
    }
    Atom::from_tokens(tokenizer.tokenize(word))
}

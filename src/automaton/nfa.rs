//! Pattern compilation: wildcard and regex patterns to a Thompson NFA,
//! then subset construction into a raw DFA.

use std::collections::{HashMap, VecDeque};

use regex_syntax::hir::{Class, Hir, HirKind};
use regex_syntax::utf8::Utf8Sequences;
use regex_syntax::ParserBuilder;

use super::dfa::{class_representatives, Automaton, ByteClasses, RawDfa, StateId, DEAD};
use super::is_lucene_regex;
use crate::core::{AuthzError, AuthzResult};

const START: usize = 0;
const FINAL: usize = 1;

#[derive(Default)]
struct NfaState {
    epsilon: Vec<usize>,
    ranges: Vec<(u8, u8, usize)>,
}

/// Thompson NFA accumulating any number of patterns between a shared start
/// and a shared accepting state
pub(crate) struct Nfa {
    states: Vec<NfaState>,
    limit: usize,
}

impl Nfa {
    pub fn new(limit: usize) -> Self {
        let mut nfa = Self {
            states: Vec::new(),
            limit,
        };
        nfa.add();
        nfa.add();
        nfa
    }

    fn add(&mut self) -> usize {
        self.states.push(NfaState::default());
        self.states.len() - 1
    }

    fn epsilon(&mut self, from: usize, to: usize) {
        self.states[from].epsilon.push(to);
    }

    fn range(&mut self, from: usize, lo: u8, hi: u8, to: usize) {
        self.states[from].ranges.push((lo, hi, to));
    }

    fn check_size(&self) -> AuthzResult<()> {
        if self.states.len() > self.limit {
            return Err(AuthzError::TooComplex { states: self.limit });
        }
        Ok(())
    }

    /// Add one pattern in its surface syntax
    pub fn add_pattern(&mut self, pattern: &str) -> AuthzResult<()> {
        let (start, end) = if pattern.starts_with('/') {
            if !is_lucene_regex(pattern) {
                return Err(AuthzError::invalid_pattern(
                    pattern,
                    "regular expressions must start and end with '/'",
                ));
            }
            let inner = &pattern[1..pattern.len() - 1];
            let hir = ParserBuilder::new()
                .dot_matches_new_line(true)
                .build()
                .parse(inner)
                .map_err(|e| AuthzError::invalid_pattern(pattern, e.to_string()))?;
            self.hir(&hir, pattern)?
        } else if pattern.contains(['*', '?']) {
            self.wildcard(pattern)
        } else {
            self.literal(pattern.as_bytes())
        };
        self.epsilon(START, start);
        self.epsilon(end, FINAL);
        self.check_size()
    }

    fn literal(&mut self, bytes: &[u8]) -> (usize, usize) {
        let start = self.add();
        let mut cur = start;
        for &byte in bytes {
            let next = self.add();
            self.range(cur, byte, byte, next);
            cur = next;
        }
        (start, cur)
    }

    fn any_char(&mut self, from: usize, to: usize) {
        for seq in Utf8Sequences::new('\0', char::MAX) {
            self.utf8_sequence(from, seq.as_slice(), to);
        }
    }

    fn utf8_sequence(&mut self, from: usize, ranges: &[regex_syntax::utf8::Utf8Range], to: usize) {
        let mut cur = from;
        for (i, r) in ranges.iter().enumerate() {
            let next = if i + 1 == ranges.len() { to } else { self.add() };
            self.range(cur, r.start, r.end, next);
            cur = next;
        }
    }

    fn wildcard(&mut self, pattern: &str) -> (usize, usize) {
        let start = self.add();
        let mut cur = start;
        let mut buf = [0u8; 4];
        for ch in pattern.chars() {
            match ch {
                '*' => {
                    let looping = self.add();
                    self.epsilon(cur, looping);
                    self.any_char(looping, looping);
                    cur = looping;
                }
                '?' => {
                    let next = self.add();
                    self.any_char(cur, next);
                    cur = next;
                }
                _ => {
                    for &byte in ch.encode_utf8(&mut buf).as_bytes() {
                        let next = self.add();
                        self.range(cur, byte, byte, next);
                        cur = next;
                    }
                }
            }
        }
        (start, cur)
    }

    fn hir(&mut self, hir: &Hir, pattern: &str) -> AuthzResult<(usize, usize)> {
        self.check_size()?;
        let fragment = match hir.kind() {
            HirKind::Empty => {
                let state = self.add();
                (state, state)
            }
            HirKind::Literal(lit) => self.literal(&lit.0),
            HirKind::Class(Class::Bytes(class)) => {
                let (start, end) = (self.add(), self.add());
                for r in class.iter() {
                    self.range(start, r.start(), r.end(), end);
                }
                (start, end)
            }
            HirKind::Class(Class::Unicode(class)) => {
                let (start, end) = (self.add(), self.add());
                for r in class.iter() {
                    for seq in Utf8Sequences::new(r.start(), r.end()) {
                        self.utf8_sequence(start, seq.as_slice(), end);
                    }
                }
                (start, end)
            }
            HirKind::Look(_) => {
                return Err(AuthzError::invalid_pattern(
                    pattern,
                    "anchors and word boundaries are not supported",
                ));
            }
            HirKind::Repetition(rep) => {
                let start = self.add();
                let mut cur = start;
                for _ in 0..rep.min {
                    let (s, e) = self.hir(&rep.sub, pattern)?;
                    self.epsilon(cur, s);
                    cur = e;
                }
                match rep.max {
                    None => {
                        let looping = self.add();
                        let (s, e) = self.hir(&rep.sub, pattern)?;
                        self.epsilon(cur, looping);
                        self.epsilon(looping, s);
                        self.epsilon(e, looping);
                        cur = looping;
                    }
                    Some(max) => {
                        for _ in rep.min..max {
                            let next = self.add();
                            let (s, e) = self.hir(&rep.sub, pattern)?;
                            self.epsilon(cur, s);
                            self.epsilon(e, next);
                            self.epsilon(cur, next);
                            cur = next;
                        }
                    }
                }
                (start, cur)
            }
            HirKind::Capture(capture) => self.hir(&capture.sub, pattern)?,
            HirKind::Concat(parts) => {
                let start = self.add();
                let mut cur = start;
                for part in parts {
                    let (s, e) = self.hir(part, pattern)?;
                    self.epsilon(cur, s);
                    cur = e;
                }
                (start, cur)
            }
            HirKind::Alternation(alternatives) => {
                let (start, end) = (self.add(), self.add());
                for alternative in alternatives {
                    let (s, e) = self.hir(alternative, pattern)?;
                    self.epsilon(start, s);
                    self.epsilon(e, end);
                }
                (start, end)
            }
        };
        Ok(fragment)
    }

    fn byte_classes(&self) -> ByteClasses {
        let mut boundary = [false; 257];
        for state in &self.states {
            for &(lo, hi, _) in &state.ranges {
                boundary[lo as usize] = true;
                boundary[hi as usize + 1] = true;
            }
        }
        let mut classes = [0u8; 256];
        let mut class = 0u8;
        for byte in 0..256usize {
            if byte > 0 && boundary[byte] {
                class += 1;
            }
            classes[byte] = class;
        }
        classes
    }

    fn closure(&self, seeds: impl IntoIterator<Item = usize>, marks: &mut [bool]) -> Vec<usize> {
        let mut stack: Vec<usize> = Vec::new();
        let mut set = Vec::new();
        for seed in seeds {
            if !marks[seed] {
                marks[seed] = true;
                stack.push(seed);
            }
        }
        while let Some(state) = stack.pop() {
            set.push(state);
            for &next in &self.states[state].epsilon {
                if !marks[next] {
                    marks[next] = true;
                    stack.push(next);
                }
            }
        }
        for &state in &set {
            marks[state] = false;
        }
        set.sort_unstable();
        set
    }

    /// Subset construction followed by minimization
    pub fn determinize(&self) -> AuthzResult<Automaton> {
        let classes = self.byte_classes();
        let reps = class_representatives(&classes);
        let mut raw = RawDfa::new(classes, reps.len());
        let mut marks = vec![false; self.states.len()];
        let mut ids: HashMap<Vec<usize>, StateId> = HashMap::new();
        let mut queue: VecDeque<(Vec<usize>, StateId)> = VecDeque::new();

        let start_set = self.closure([START], &mut marks);
        let start = raw.push_state(start_set.binary_search(&FINAL).is_ok());
        raw.start = start;
        ids.insert(start_set.clone(), start);
        queue.push_back((start_set, start));

        while let Some((set, id)) = queue.pop_front() {
            for (class, &byte) in reps.iter().enumerate() {
                let moved = set.iter().flat_map(|&s| {
                    self.states[s]
                        .ranges
                        .iter()
                        .filter(move |&&(lo, hi, _)| lo <= byte && byte <= hi)
                        .map(|&(_, _, to)| to)
                });
                let next = self.closure(moved, &mut marks);
                if next.is_empty() {
                    raw.set(id, class, DEAD);
                    continue;
                }
                let target = match ids.get(&next) {
                    Some(&existing) => existing,
                    None => {
                        if raw.len() >= self.limit {
                            return Err(AuthzError::TooComplex { states: self.limit });
                        }
                        let created = raw.push_state(next.binary_search(&FINAL).is_ok());
                        ids.insert(next.clone(), created);
                        queue.push_back((next, created));
                        created
                    }
                };
                raw.set(id, class, target);
            }
        }

        Ok(Automaton::from_raw(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(patterns: &[&str]) -> AuthzResult<Automaton> {
        let mut nfa = Nfa::new(10_000);
        for p in patterns {
            nfa.add_pattern(p)?;
        }
        nfa.determinize()
    }

    #[test]
    fn wildcard_star_and_question_mark() {
        let a = compile(&["logs-*"]).unwrap();
        assert!(a.run("logs-"));
        assert!(a.run("logs-2024.01"));
        assert!(!a.run("log-2024"));

        let q = compile(&["metrics-?"]).unwrap();
        assert!(q.run("metrics-a"));
        assert!(q.run("metrics-é"));
        assert!(!q.run("metrics-ab"));
        assert!(!q.run("metrics-"));
    }

    #[test]
    fn regex_is_full_match() {
        let a = compile(&["/logs-[0-9]+/"]).unwrap();
        assert!(a.run("logs-2024"));
        assert!(!a.run("logs-2024a"));
        assert!(!a.run("xlogs-1"));
    }

    #[test]
    fn bounded_repetition() {
        let a = compile(&["/a{2,3}/"]).unwrap();
        assert!(!a.run("a"));
        assert!(a.run("aa"));
        assert!(a.run("aaa"));
        assert!(!a.run("aaaa"));
    }

    #[test]
    fn multiple_patterns_union() {
        let a = compile(&["alpha", "/b.*/"]).unwrap();
        assert!(a.run("alpha"));
        assert!(a.run("beta"));
        assert!(!a.run("gamma"));
    }

    #[test]
    fn no_patterns_is_empty() {
        assert!(compile(&[]).unwrap().is_empty());
    }

    #[test]
    fn unterminated_regex_is_invalid() {
        let err = compile(&["/logs-*"]).unwrap_err();
        assert!(matches!(err, AuthzError::InvalidPattern { .. }));
    }

    #[test]
    fn anchors_are_invalid() {
        let err = compile(&["/^logs$/"]).unwrap_err();
        assert!(matches!(err, AuthzError::InvalidPattern { .. }));
    }

    #[test]
    fn exponential_regex_is_too_complex() {
        let err = compile(&["/(a|b)*a(a|b){14}/"]).unwrap_err();
        assert!(matches!(err, AuthzError::TooComplex { .. }));
    }
}

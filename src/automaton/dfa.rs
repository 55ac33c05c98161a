//! Minimal deterministic automata over bytes
//!
//! Every [`Automaton`] handed out by this module is complete, minimal and
//! canonically numbered: state 0 is the dead state, the remaining states are
//! numbered in breadth-first order from the start state, and byte classes are
//! numbered by the first byte they contain. Two automata accepting the same
//! language are therefore structurally equal.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use once_cell::sync::Lazy;

use crate::core::{AuthzError, AuthzResult};

pub(crate) type StateId = u32;

/// The state every automaton reserves at index 0
pub(crate) const DEAD: StateId = 0;

/// Map from byte to its equivalence class
pub(crate) type ByteClasses = [u8; 256];

/// A complete, minimal DFA over UTF-8 encoded names
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Automaton {
    classes: Box<ByteClasses>,
    stride: usize,
    trans: Vec<StateId>,
    accept: Vec<bool>,
    start: StateId,
}

/// An unminimized DFA as produced by determinization or products.
/// State 0 must be a dead state.
pub(crate) struct RawDfa {
    pub classes: ByteClasses,
    pub stride: usize,
    pub trans: Vec<StateId>,
    pub accept: Vec<bool>,
    pub start: StateId,
}

impl RawDfa {
    /// Start a raw DFA holding only the dead state
    pub fn new(classes: ByteClasses, stride: usize) -> Self {
        Self {
            classes,
            stride,
            trans: vec![DEAD; stride],
            accept: vec![false],
            start: DEAD,
        }
    }

    /// Append a state with all transitions to the dead state
    pub fn push_state(&mut self, accepting: bool) -> StateId {
        let id = self.accept.len() as StateId;
        self.trans.extend(std::iter::repeat(DEAD).take(self.stride));
        self.accept.push(accepting);
        id
    }

    pub fn set(&mut self, from: StateId, class: usize, to: StateId) {
        self.trans[from as usize * self.stride + class] = to;
    }

    pub fn len(&self) -> usize {
        self.accept.len()
    }
}

/// Representative byte for each class of a class map, plus the class count
pub(crate) fn class_representatives(classes: &ByteClasses) -> Vec<u8> {
    let mut reps: Vec<Option<u8>> = Vec::new();
    for byte in 0..=255u8 {
        let class = classes[byte as usize] as usize;
        if reps.len() <= class {
            reps.resize(class + 1, None);
        }
        if reps[class].is_none() {
            reps[class] = Some(byte);
        }
    }
    reps.into_iter().flatten().collect()
}

impl Automaton {
    /// The automaton accepting nothing
    pub fn empty() -> Self {
        Self {
            classes: Box::new([0; 256]),
            stride: 1,
            trans: vec![DEAD],
            accept: vec![false],
            start: DEAD,
        }
    }

    /// The automaton accepting every name (every valid UTF-8 string)
    pub fn total() -> Self {
        UNIVERSE.clone()
    }

    /// Number of states, including the dead state
    pub fn state_count(&self) -> usize {
        self.accept.len()
    }

    /// Whether the language is empty
    pub fn is_empty(&self) -> bool {
        self.start == DEAD
    }

    /// Whether the language contains every name
    pub fn is_total(&self) -> bool {
        self.start != DEAD && *self == *UNIVERSE
    }

    /// Run the automaton over `name`
    pub fn run(&self, name: &str) -> bool {
        self.run_bytes(name.as_bytes())
    }

    pub fn run_bytes(&self, input: &[u8]) -> bool {
        let mut state = self.start;
        for &byte in input {
            if state == DEAD {
                return false;
            }
            state = self.next(state, byte);
        }
        self.accept[state as usize]
    }

    fn next(&self, state: StateId, byte: u8) -> StateId {
        self.trans[state as usize * self.stride + self.classes[byte as usize] as usize]
    }

    /// Language union
    pub fn union(&self, other: &Automaton) -> AuthzResult<Automaton> {
        product(self, other, |a, b| a || b)
    }

    /// Language intersection
    pub fn intersection(&self, other: &Automaton) -> AuthzResult<Automaton> {
        product(self, other, |a, b| a && b)
    }

    /// Names accepted by `self` but not by `other`
    pub fn minus(&self, other: &Automaton) -> AuthzResult<Automaton> {
        product(self, other, |a, b| a && !b)
    }

    /// Whether every name accepted by `self` is accepted by `other`
    pub fn subset_of(&self, other: &Automaton) -> bool {
        if self.is_empty() {
            return true;
        }
        let (_, reps) = joint_classes(self, other);
        let mut seen: HashSet<(StateId, StateId)> = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert((self.start, other.start));
        queue.push_back((self.start, other.start));
        while let Some((a, b)) = queue.pop_front() {
            if self.accept[a as usize] && !other.accept[b as usize] {
                return false;
            }
            for &byte in &reps {
                let pair = (self.next(a, byte), other.next(b, byte));
                if pair.0 == DEAD {
                    continue;
                }
                if seen.insert(pair) {
                    queue.push_back(pair);
                }
            }
        }
        true
    }

    /// Minimize a raw DFA into canonical form
    pub(crate) fn from_raw(raw: RawDfa) -> Automaton {
        minimize(raw)
    }
}

impl fmt::Debug for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Automaton")
            .field("states", &self.state_count())
            .field("classes", &self.stride)
            .field("empty", &self.is_empty())
            .field("total", &self.is_total())
            .finish()
    }
}

static UNIVERSE: Lazy<Automaton> = Lazy::new(utf8_universe);

/// Well-formed UTF-8: no overlong forms, no surrogates, nothing above U+10FFFF
fn utf8_universe() -> Automaton {
    // (first byte, last byte) of each class, in order
    const CLASS_BOUNDS: [(u8, u8); 14] = [
        (0x00, 0x7F),
        (0x80, 0x8F),
        (0x90, 0x9F),
        (0xA0, 0xBF),
        (0xC0, 0xC1),
        (0xC2, 0xDF),
        (0xE0, 0xE0),
        (0xE1, 0xEC),
        (0xED, 0xED),
        (0xEE, 0xEF),
        (0xF0, 0xF0),
        (0xF1, 0xF3),
        (0xF4, 0xF4),
        (0xF5, 0xFF),
    ];
    let mut classes = [0u8; 256];
    for (class, &(lo, hi)) in CLASS_BOUNDS.iter().enumerate() {
        for byte in lo..=hi {
            classes[byte as usize] = class as u8;
        }
    }

    let mut raw = RawDfa::new(classes, CLASS_BOUNDS.len());
    let ready = raw.push_state(true);
    let need1 = raw.push_state(false);
    let need2 = raw.push_state(false);
    let need3 = raw.push_state(false);
    let after_e0 = raw.push_state(false);
    let after_ed = raw.push_state(false);
    let after_f0 = raw.push_state(false);
    let after_f4 = raw.push_state(false);
    raw.start = ready;

    raw.set(ready, 0, ready);
    raw.set(ready, 5, need1);
    raw.set(ready, 6, after_e0);
    raw.set(ready, 7, need2);
    raw.set(ready, 8, after_ed);
    raw.set(ready, 9, need2);
    raw.set(ready, 10, after_f0);
    raw.set(ready, 11, need3);
    raw.set(ready, 12, after_f4);
    for continuation in 1..=3 {
        raw.set(need1, continuation, ready);
        raw.set(need2, continuation, need1);
        raw.set(need3, continuation, need2);
    }
    raw.set(after_e0, 3, need1);
    raw.set(after_ed, 1, need1);
    raw.set(after_ed, 2, need1);
    raw.set(after_f0, 2, need2);
    raw.set(after_f0, 3, need2);
    raw.set(after_f4, 1, need2);

    minimize(raw)
}

/// Refine the class maps of two automata into one joint class map
fn joint_classes(a: &Automaton, b: &Automaton) -> (ByteClasses, Vec<u8>) {
    let mut ids: HashMap<(u8, u8), u8> = HashMap::new();
    let mut classes = [0u8; 256];
    let mut reps = Vec::new();
    for byte in 0..=255u8 {
        let key = (a.classes[byte as usize], b.classes[byte as usize]);
        let next_id = ids.len();
        let id = *ids.entry(key).or_insert_with(|| {
            reps.push(byte);
            next_id as u8
        });
        classes[byte as usize] = id;
    }
    (classes, reps)
}

fn product(
    a: &Automaton,
    b: &Automaton,
    accept: impl Fn(bool, bool) -> bool,
) -> AuthzResult<Automaton> {
    debug_assert!(!accept(false, false));
    let limit = super::max_determinized_states();
    let (classes, reps) = joint_classes(a, b);
    let mut raw = RawDfa::new(classes, reps.len());
    let mut ids: HashMap<(StateId, StateId), StateId> = HashMap::new();
    ids.insert((DEAD, DEAD), DEAD);

    let mut queue = VecDeque::new();
    let start = (a.start, b.start);
    if start != (DEAD, DEAD) {
        let id = raw.push_state(accept(a.accept[a.start as usize], b.accept[b.start as usize]));
        ids.insert(start, id);
        queue.push_back((start, id));
        raw.start = id;
    }

    while let Some(((sa, sb), id)) = queue.pop_front() {
        for (class, &byte) in reps.iter().enumerate() {
            let pair = (a.next(sa, byte), b.next(sb, byte));
            let target = match ids.get(&pair) {
                Some(&existing) => existing,
                None => {
                    if raw.len() >= limit {
                        return Err(AuthzError::TooComplex { states: limit });
                    }
                    let accepting = accept(a.accept[pair.0 as usize], b.accept[pair.1 as usize]);
                    let created = raw.push_state(accepting);
                    ids.insert(pair, created);
                    queue.push_back((pair, created));
                    created
                }
            };
            raw.set(id, class, target);
        }
    }

    Ok(minimize(raw))
}

/// Moore partition refinement followed by canonical renumbering
fn minimize(raw: RawDfa) -> Automaton {
    let n = raw.len();
    let stride = raw.stride;

    let mut block: Vec<u32> = raw.accept.iter().map(|&acc| u32::from(acc)).collect();
    let mut block_count = if raw.accept.iter().any(|&acc| acc) && raw.accept.iter().any(|&acc| !acc) {
        2
    } else {
        // Single block: renumber so that ids start at 0
        block.iter_mut().for_each(|b| *b = 0);
        1
    };

    loop {
        let mut signatures: HashMap<Vec<u32>, u32> = HashMap::with_capacity(block_count);
        let mut next_block = vec![0u32; n];
        for state in 0..n {
            let mut signature = Vec::with_capacity(stride + 1);
            signature.push(block[state]);
            let base = state * stride;
            signature.extend(raw.trans[base..base + stride].iter().map(|&t| block[t as usize]));
            let fresh = signatures.len() as u32;
            next_block[state] = *signatures.entry(signature).or_insert(fresh);
        }
        let refined = signatures.len();
        block = next_block;
        if refined == block_count {
            break;
        }
        block_count = refined;
    }

    let dead_block = block[DEAD as usize];
    let start_block = block[raw.start as usize];
    if start_block == dead_block {
        return Automaton::empty();
    }

    // Quotient automaton, one representative per block
    let mut representative = vec![usize::MAX; block_count];
    for state in 0..n {
        let b = block[state] as usize;
        if representative[b] == usize::MAX {
            representative[b] = state;
        }
    }
    let quotient_target = |b: u32, class: usize| -> u32 {
        let rep = representative[b as usize];
        block[raw.trans[rep * stride + class] as usize]
    };

    // Merge byte classes whose columns coincide
    let mut column_ids: HashMap<Vec<u32>, u8> = HashMap::new();
    let mut old_to_new: Vec<Option<u8>> = vec![None; stride];
    let mut new_reps: Vec<usize> = Vec::new();
    let mut classes = [0u8; 256];
    for byte in 0..256usize {
        let old = raw.classes[byte] as usize;
        let new = match old_to_new[old] {
            Some(id) => id,
            None => {
                let column: Vec<u32> = (0..block_count as u32)
                    .map(|b| quotient_target(b, old))
                    .collect();
                let fresh = column_ids.len() as u8;
                let id = *column_ids.entry(column).or_insert_with(|| {
                    new_reps.push(old);
                    fresh
                });
                old_to_new[old] = Some(id);
                id
            }
        };
        classes[byte] = new;
    }
    let new_stride = new_reps.len();

    // Breadth-first renumbering from the start block
    let mut number: Vec<Option<StateId>> = vec![None; block_count];
    number[dead_block as usize] = Some(DEAD);
    let mut order = vec![dead_block];
    let mut queue = VecDeque::new();
    number[start_block as usize] = Some(1);
    order.push(start_block);
    queue.push_back(start_block);
    while let Some(b) = queue.pop_front() {
        for &old_class in &new_reps {
            let target = quotient_target(b, old_class);
            if number[target as usize].is_none() {
                number[target as usize] = Some(order.len() as StateId);
                order.push(target);
                queue.push_back(target);
            }
        }
    }

    let mut trans = Vec::with_capacity(order.len() * new_stride);
    let mut accept = Vec::with_capacity(order.len());
    for &b in &order {
        accept.push(raw.accept[representative[b as usize]]);
        for &old_class in &new_reps {
            let target = quotient_target(b, old_class);
            trans.push(number[target as usize].unwrap_or(DEAD));
        }
    }

    Automaton {
        classes: Box::new(classes),
        stride: new_stride,
        trans,
        accept,
        start: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(word: &str) -> Automaton {
        let mut classes = [0u8; 256];
        let mut next = 1u8;
        for &b in word.as_bytes() {
            if classes[b as usize] == 0 {
                classes[b as usize] = next;
                next += 1;
            }
        }
        let stride = next as usize;
        let mut raw = RawDfa::new(classes, stride);
        let mut cur = raw.push_state(word.is_empty());
        raw.start = cur;
        for (i, &b) in word.as_bytes().iter().enumerate() {
            let nxt = raw.push_state(i + 1 == word.len());
            raw.set(cur, classes[b as usize] as usize, nxt);
            cur = nxt;
        }
        Automaton::from_raw(raw)
    }

    #[test]
    fn universe_rejects_malformed_utf8() {
        let total = Automaton::total();
        assert!(total.run_bytes("héllo wörld ✓ 𝄞".as_bytes()));
        assert!(!total.run_bytes(&[0xC0, 0x80]));
        assert!(!total.run_bytes(&[0xED, 0xA0, 0x80]));
        assert!(!total.run_bytes(&[0xE2, 0x82]));
        assert!(!total.run_bytes(&[0xF4, 0x90, 0x80, 0x80]));
    }

    #[test]
    fn empty_and_total() {
        assert!(Automaton::empty().is_empty());
        assert!(!Automaton::empty().run(""));
        assert!(Automaton::total().is_total());
        assert!(Automaton::total().run("anything"));
        assert!(Automaton::total().run(""));
    }

    #[test]
    fn literal_runs() {
        let a = literal("abc");
        assert!(a.run("abc"));
        assert!(!a.run("ab"));
        assert!(!a.run("abcd"));
        assert!(!a.is_empty());
        assert!(!a.is_total());
    }

    #[test]
    fn union_intersection_minus() {
        let a = literal("abc");
        let b = literal("xyz");
        let both = a.union(&b).unwrap();
        assert!(both.run("abc"));
        assert!(both.run("xyz"));
        assert!(!both.run("abz"));

        assert!(a.intersection(&b).unwrap().is_empty());
        assert_eq!(both.intersection(&a).unwrap(), a);
        assert_eq!(both.minus(&b).unwrap(), a);
    }

    #[test]
    fn subset() {
        let a = literal("abc");
        let both = a.union(&literal("xyz")).unwrap();
        assert!(a.subset_of(&both));
        assert!(!both.subset_of(&a));
        assert!(Automaton::empty().subset_of(&a));
        assert!(both.subset_of(&Automaton::total()));
    }

    #[test]
    fn canonical_form_is_order_independent() {
        let a = literal("abc");
        let b = literal("abd");
        let c = literal("q");
        let left = a.union(&b).unwrap().union(&c).unwrap();
        let right = c.union(&b).unwrap().union(&a).unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn total_minus_total_is_empty() {
        let t = Automaton::total();
        assert_eq!(t.minus(&t).unwrap(), Automaton::empty());
        assert_eq!(t.union(&Automaton::empty()).unwrap(), t);
    }
}

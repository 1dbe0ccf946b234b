//! Validating SMILES parser.
//!
//! Parses the SMILES organic subset plus bracket atoms, branches, ring
//! closures and explicit bonds into a [`Molecule`] graph. The parser
//! rejects malformed input with [`FarmacoError::InvalidStructure`] instead
//! of degrading to a partial molecule: a silently empty or truncated graph
//! would encode to a near-zero fingerprint and poison downstream training.
//!
//! Hydrogen counts are estimated from standard valences; the estimate only
//! feeds the fingerprint atom invariants and is deterministic for a given
//! input string.

use crate::error::{FarmacoError, Result};
use std::collections::HashMap;

/// Bond order between two heavy atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    /// Numeric code used in fingerprint hashing. Part of the encoding
    /// contract; changing it invalidates existing checkpoints.
    #[must_use]
    pub fn code(self) -> u64 {
        match self {
            BondOrder::Single => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Aromatic => 4,
        }
    }

    /// Contribution to the valence sum used for implicit hydrogen counting.
    fn valence_units(self) -> u8 {
        match self {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
        }
    }
}

/// A heavy atom in the molecular graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    /// Atomic number.
    pub atomic_number: u8,
    /// Whether the atom was written in aromatic (lowercase) form.
    pub aromatic: bool,
    /// Formal charge from a bracket expression.
    pub charge: i8,
    /// Hydrogen count given explicitly in a bracket, if any.
    pub explicit_h: Option<u8>,
}

/// An edge in the molecular graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bond {
    pub a: usize,
    pub b: usize,
    pub order: BondOrder,
}

/// A parsed molecule: heavy atoms plus bonds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Molecule {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
}

impl Molecule {
    /// Atoms in input order.
    #[must_use]
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Bonds in input order.
    #[must_use]
    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    /// Adjacency list: for each atom, its `(neighbor, bond order)` pairs.
    #[must_use]
    pub fn adjacency(&self) -> Vec<Vec<(usize, BondOrder)>> {
        let mut adj = vec![Vec::new(); self.atoms.len()];
        for bond in &self.bonds {
            adj[bond.a].push((bond.b, bond.order));
            adj[bond.b].push((bond.a, bond.order));
        }
        adj
    }

    /// Heavy-atom degree of each atom.
    #[must_use]
    pub fn degrees(&self) -> Vec<u8> {
        let mut deg = vec![0u8; self.atoms.len()];
        for bond in &self.bonds {
            deg[bond.a] = deg[bond.a].saturating_add(1);
            deg[bond.b] = deg[bond.b].saturating_add(1);
        }
        deg
    }

    /// Hydrogen count per atom: the bracket value when present, otherwise
    /// standard valence minus the bonded valence sum (aromatic atoms give
    /// up one additional unit to the ring system).
    #[must_use]
    pub fn hydrogen_counts(&self) -> Vec<u8> {
        let mut bonded = vec![0u8; self.atoms.len()];
        for bond in &self.bonds {
            bonded[bond.a] = bonded[bond.a].saturating_add(bond.order.valence_units());
            bonded[bond.b] = bonded[bond.b].saturating_add(bond.order.valence_units());
        }
        self.atoms
            .iter()
            .enumerate()
            .map(|(i, atom)| {
                if let Some(h) = atom.explicit_h {
                    return h;
                }
                let mut used = bonded[i];
                if atom.aromatic {
                    used = used.saturating_add(1);
                }
                default_valence(atom.atomic_number).saturating_sub(used)
            })
            .collect()
    }
}

/// Standard valence used for implicit hydrogen estimation. Zero for
/// elements outside the organic subset (bracket atoms carry explicit H).
fn default_valence(atomic_number: u8) -> u8 {
    match atomic_number {
        5 => 3,              // B
        6 => 4,              // C
        7 | 15 => 3,         // N, P
        8 | 16 => 2,         // O, S
        9 | 17 | 35 | 53 => 1, // F, Cl, Br, I
        _ => 0,
    }
}

/// Element symbols accepted inside brackets, with atomic numbers.
/// Covers the organic subset plus elements common in drug molecules.
const ELEMENTS: &[(&str, u8)] = &[
    ("H", 1),
    ("He", 2),
    ("Li", 3),
    ("B", 5),
    ("C", 6),
    ("N", 7),
    ("O", 8),
    ("F", 9),
    ("Na", 11),
    ("Mg", 12),
    ("Al", 13),
    ("Si", 14),
    ("P", 15),
    ("S", 16),
    ("Cl", 17),
    ("K", 19),
    ("Ca", 20),
    ("Mn", 25),
    ("Fe", 26),
    ("Co", 27),
    ("Ni", 28),
    ("Cu", 29),
    ("Zn", 30),
    ("As", 33),
    ("Se", 34),
    ("Br", 35),
    ("Sr", 38),
    ("Tc", 43),
    ("Ag", 47),
    ("I", 53),
    ("Ba", 56),
    ("Gd", 64),
    ("Pt", 78),
    ("Au", 79),
    ("Hg", 80),
    ("Bi", 83),
];

fn lookup_element(symbol: &str) -> Option<u8> {
    ELEMENTS
        .iter()
        .find(|(sym, _)| *sym == symbol)
        .map(|(_, z)| *z)
}

/// Parses a SMILES string into a [`Molecule`].
///
/// # Errors
///
/// Returns [`FarmacoError::InvalidStructure`] on empty input, unknown
/// symbols, unbalanced branches, unclosed brackets or ring bonds, and
/// dangling bond symbols.
///
/// # Examples
///
/// ```
/// use farmaco::fingerprint::parse_smiles;
///
/// let aspirin = parse_smiles("CC(=O)OC1=CC=CC=C1C(=O)O").expect("valid SMILES");
/// assert_eq!(aspirin.atoms().len(), 13);
/// assert!(parse_smiles("C(").is_err());
/// ```
pub fn parse_smiles(smiles: &str) -> Result<Molecule> {
    Parser::new(smiles)?.run()
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    prev: Option<usize>,
    branch_stack: Vec<Option<usize>>,
    pending_bond: Option<BondOrder>,
    ring_bonds: HashMap<u16, (usize, Option<BondOrder>)>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid(input, "empty structure"));
        }
        if !trimmed.is_ascii() {
            return Err(invalid(input, "non-ASCII character"));
        }
        Ok(Self {
            input,
            bytes: trimmed.as_bytes(),
            pos: 0,
            atoms: Vec::new(),
            bonds: Vec::new(),
            prev: None,
            branch_stack: Vec::new(),
            pending_bond: None,
            ring_bonds: HashMap::new(),
        })
    }

    fn run(mut self) -> Result<Molecule> {
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            match c {
                b'[' => self.parse_bracket_atom()?,
                b'(' => {
                    if self.prev.is_none() {
                        return Err(invalid(self.input, "branch before any atom"));
                    }
                    self.branch_stack.push(self.prev);
                    self.pos += 1;
                }
                b')' => {
                    let restored = self
                        .branch_stack
                        .pop()
                        .ok_or_else(|| invalid(self.input, "unbalanced ')'"))?;
                    if self.pending_bond.is_some() {
                        return Err(invalid(self.input, "bond symbol before ')'"));
                    }
                    self.prev = restored;
                    self.pos += 1;
                }
                b'-' | b'/' | b'\\' => {
                    self.set_pending(BondOrder::Single)?;
                }
                b'=' => {
                    self.set_pending(BondOrder::Double)?;
                }
                b'#' => {
                    self.set_pending(BondOrder::Triple)?;
                }
                b':' => {
                    self.set_pending(BondOrder::Aromatic)?;
                }
                b'.' => {
                    if self.pending_bond.is_some() {
                        return Err(invalid(self.input, "bond symbol before '.'"));
                    }
                    self.prev = None;
                    self.pos += 1;
                }
                b'0'..=b'9' => {
                    let digit = u16::from(c - b'0');
                    self.pos += 1;
                    self.close_ring(digit)?;
                }
                b'%' => {
                    self.pos += 1;
                    let digits = self.take_digits();
                    if digits.len() != 2 {
                        return Err(invalid(self.input, "'%' ring closure needs two digits"));
                    }
                    let number: u16 = digits
                        .parse()
                        .map_err(|_| invalid(self.input, "bad ring closure number"))?;
                    self.close_ring(number)?;
                }
                _ => self.parse_organic_atom()?,
            }
        }

        if self.pending_bond.is_some() {
            return Err(invalid(self.input, "dangling bond symbol"));
        }
        if !self.branch_stack.is_empty() {
            return Err(invalid(self.input, "unclosed branch"));
        }
        if !self.ring_bonds.is_empty() {
            return Err(invalid(self.input, "unclosed ring bond"));
        }
        if self.atoms.is_empty() {
            return Err(invalid(self.input, "no atoms"));
        }

        Ok(Molecule {
            atoms: self.atoms,
            bonds: self.bonds,
        })
    }

    fn set_pending(&mut self, order: BondOrder) -> Result<()> {
        if self.pending_bond.is_some() {
            return Err(invalid(self.input, "two consecutive bond symbols"));
        }
        if self.prev.is_none() {
            return Err(invalid(self.input, "bond symbol before any atom"));
        }
        self.pending_bond = Some(order);
        self.pos += 1;
        Ok(())
    }

    fn take_digits(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned()
    }

    /// Opens or closes a numbered ring bond on the most recent atom.
    fn close_ring(&mut self, number: u16) -> Result<()> {
        let current = self
            .prev
            .ok_or_else(|| invalid(self.input, "ring closure before any atom"))?;
        let pending = self.pending_bond.take();
        match self.ring_bonds.remove(&number) {
            Some((partner, opening_bond)) => {
                if partner == current {
                    return Err(invalid(self.input, "ring bond to the same atom"));
                }
                let order = pending
                    .or(opening_bond)
                    .unwrap_or_else(|| self.default_bond(partner, current));
                self.bonds.push(Bond {
                    a: partner,
                    b: current,
                    order,
                });
            }
            None => {
                self.ring_bonds.insert(number, (current, pending));
            }
        }
        Ok(())
    }

    /// Aromatic bond when both endpoints are aromatic, single otherwise.
    fn default_bond(&self, a: usize, b: usize) -> BondOrder {
        if self.atoms[a].aromatic && self.atoms[b].aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn push_atom(&mut self, atom: Atom) {
        let idx = self.atoms.len();
        self.atoms.push(atom);
        if let Some(prev) = self.prev {
            let order = self
                .pending_bond
                .take()
                .unwrap_or_else(|| self.default_bond(prev, idx));
            self.bonds.push(Bond {
                a: prev,
                b: idx,
                order,
            });
        } else {
            self.pending_bond = None;
        }
        self.prev = Some(idx);
    }

    fn parse_organic_atom(&mut self) -> Result<()> {
        let c = self.bytes[self.pos];
        // Two-letter organic subset symbols first.
        if c == b'C' && self.peek() == Some(b'l') {
            self.pos += 2;
            self.push_atom(plain_atom(17, false));
            return Ok(());
        }
        if c == b'B' && self.peek() == Some(b'r') {
            self.pos += 2;
            self.push_atom(plain_atom(35, false));
            return Ok(());
        }

        let (atomic_number, aromatic) = match c {
            b'B' => (5, false),
            b'C' => (6, false),
            b'N' => (7, false),
            b'O' => (8, false),
            b'P' => (15, false),
            b'S' => (16, false),
            b'F' => (9, false),
            b'I' => (53, false),
            b'b' => (5, true),
            b'c' => (6, true),
            b'n' => (7, true),
            b'o' => (8, true),
            b'p' => (15, true),
            b's' => (16, true),
            other => {
                return Err(invalid(
                    self.input,
                    format!("unexpected character '{}'", other as char),
                ));
            }
        };
        self.pos += 1;
        self.push_atom(plain_atom(atomic_number, aromatic));
        Ok(())
    }

    fn parse_bracket_atom(&mut self) -> Result<()> {
        self.pos += 1; // consume '['

        // Optional isotope number (ignored beyond validation).
        let _isotope = self.take_digits();

        // Element symbol: uppercase + optional lowercase, or a lowercase
        // aromatic symbol ("c", "n", "o", "s", "p", "se", "as").
        let (symbol, aromatic) = self.take_bracket_symbol()?;
        let atomic_number = lookup_element(&symbol)
            .ok_or_else(|| invalid(self.input, format!("unknown element '{symbol}'")))?;

        // Optional chirality markers.
        while self.pos < self.bytes.len() && self.bytes[self.pos] == b'@' {
            self.pos += 1;
        }

        // Optional explicit hydrogen count.
        let mut explicit_h = 0u8;
        let mut saw_h = false;
        if self.pos < self.bytes.len() && self.bytes[self.pos] == b'H' {
            saw_h = true;
            self.pos += 1;
            explicit_h = 1;
            let digits = self.take_digits();
            if !digits.is_empty() {
                explicit_h = digits
                    .parse()
                    .map_err(|_| invalid(self.input, "bad hydrogen count"))?;
            }
        }

        // Optional charge: '+', '-', possibly repeated or followed by digits.
        let mut charge: i8 = 0;
        if self.pos < self.bytes.len() && matches!(self.bytes[self.pos], b'+' | b'-') {
            let sign: i8 = if self.bytes[self.pos] == b'+' { 1 } else { -1 };
            let symbol = self.bytes[self.pos];
            self.pos += 1;
            let digits = self.take_digits();
            let mut magnitude: i8 = if digits.is_empty() {
                1
            } else {
                digits
                    .parse()
                    .map_err(|_| invalid(self.input, "bad charge"))?
            };
            while self.pos < self.bytes.len() && self.bytes[self.pos] == symbol {
                magnitude = magnitude.saturating_add(1);
                self.pos += 1;
            }
            charge = sign * magnitude;
        }

        // Optional atom class.
        if self.pos < self.bytes.len() && self.bytes[self.pos] == b':' {
            self.pos += 1;
            if self.take_digits().is_empty() {
                return Err(invalid(self.input, "atom class needs digits"));
            }
        }

        if self.pos >= self.bytes.len() || self.bytes[self.pos] != b']' {
            return Err(invalid(self.input, "unclosed bracket atom"));
        }
        self.pos += 1;

        // A lone [H] counts as an explicit hydrogen atom; keep it in the
        // graph like any other atom.
        self.push_atom(Atom {
            atomic_number,
            aromatic,
            charge,
            explicit_h: if saw_h { Some(explicit_h) } else { Some(0) },
        });
        Ok(())
    }

    fn take_bracket_symbol(&mut self) -> Result<(String, bool)> {
        let c = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| invalid(self.input, "unclosed bracket atom"))?;
        if c.is_ascii_uppercase() {
            let mut symbol = String::new();
            symbol.push(c as char);
            self.pos += 1;
            if let Some(next) = self.peek_at(0) {
                if next.is_ascii_lowercase() {
                    let two = format!("{symbol}{}", next as char);
                    // Only extend when the two-letter symbol is a real
                    // element; [CH3] must not swallow the 'H'.
                    if lookup_element(&two).is_some() {
                        symbol = two;
                        self.pos += 1;
                    }
                }
            }
            Ok((symbol, false))
        } else if c.is_ascii_lowercase() {
            let aromatic_symbol = match c {
                b'c' => "C",
                b'n' => "N",
                b'o' => "O",
                b'p' => "P",
                b's' => {
                    if self.peek_at(1) == Some(b'e') {
                        self.pos += 1;
                        "Se"
                    } else {
                        "S"
                    }
                }
                b'a' => {
                    if self.peek_at(1) == Some(b's') {
                        self.pos += 1;
                        "As"
                    } else {
                        return Err(invalid(self.input, "unknown aromatic symbol 'a'"));
                    }
                }
                other => {
                    return Err(invalid(
                        self.input,
                        format!("unknown aromatic symbol '{}'", other as char),
                    ));
                }
            };
            self.pos += 1;
            Ok((aromatic_symbol.to_string(), true))
        } else {
            Err(invalid(self.input, "missing element symbol in bracket"))
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos + 1).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }
}

fn plain_atom(atomic_number: u8, aromatic: bool) -> Atom {
    Atom {
        atomic_number,
        aromatic,
        charge: 0,
        explicit_h: None,
    }
}

fn invalid(smiles: &str, reason: impl Into<String>) -> FarmacoError {
    FarmacoError::InvalidStructure {
        smiles: smiles.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ethanol() {
        let mol = parse_smiles("CCO").expect("ethanol is valid");
        assert_eq!(mol.atoms().len(), 3);
        assert_eq!(mol.bonds().len(), 2);
        assert_eq!(mol.hydrogen_counts(), vec![3, 2, 1]);
    }

    #[test]
    fn test_aspirin_parses() {
        let mol = parse_smiles("CC(=O)OC1=CC=CC=C1C(=O)O").expect("aspirin is valid");
        assert_eq!(mol.atoms().len(), 13);
        // Ring closure adds one bond beyond the chain bonds.
        assert_eq!(mol.bonds().len(), 13);
    }

    #[test]
    fn test_aromatic_benzene() {
        let mol = parse_smiles("c1ccccc1").expect("benzene is valid");
        assert_eq!(mol.atoms().len(), 6);
        assert_eq!(mol.bonds().len(), 6);
        assert!(mol
            .bonds()
            .iter()
            .all(|b| b.order == BondOrder::Aromatic));
        assert_eq!(mol.hydrogen_counts(), vec![1; 6]);
    }

    #[test]
    fn test_bracket_atom_charge_and_h() {
        let mol = parse_smiles("[NH4+]").expect("ammonium is valid");
        assert_eq!(mol.atoms().len(), 1);
        assert_eq!(mol.atoms()[0].charge, 1);
        assert_eq!(mol.atoms()[0].explicit_h, Some(4));
    }

    #[test]
    fn test_two_letter_elements() {
        let mol = parse_smiles("ClCCBr").expect("valid halides");
        assert_eq!(mol.atoms().len(), 4);
        assert_eq!(mol.atoms()[0].atomic_number, 17);
        assert_eq!(mol.atoms()[3].atomic_number, 35);
    }

    #[test]
    fn test_disconnected_components() {
        let mol = parse_smiles("[Na+].[Cl-]").expect("salt is valid");
        assert_eq!(mol.atoms().len(), 2);
        assert!(mol.bonds().is_empty());
    }

    #[test]
    fn test_percent_ring_closure() {
        let mol = parse_smiles("C%12CCCCC%12").expect("valid ring");
        assert_eq!(mol.bonds().len(), 6);
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [
            "",
            "   ",
            "C(",
            "C)",
            "C1CC",
            "C=",
            "=C",
            "C==C",
            "[C",
            "[Xx]",
            "C(C",
            "Cé",
            "?",
        ] {
            assert!(
                parse_smiles(bad).is_err(),
                "expected rejection for {bad:?}"
            );
        }
    }

    #[test]
    fn test_warfarin_parses() {
        let mol = parse_smiles("CC(=O)CC(C1=CC=CC=C1)C2=C(C3=CC=CC=C3OC2=O)O")
            .expect("warfarin is valid");
        assert!(mol.atoms().len() > 20);
    }

    #[test]
    fn test_explicit_bond_overrides_default() {
        let mol = parse_smiles("C=C").expect("ethene is valid");
        assert_eq!(mol.bonds()[0].order, BondOrder::Double);
    }
}

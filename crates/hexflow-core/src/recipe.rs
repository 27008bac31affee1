//! Transformation recipes.
//!
//! Recipes are closed lookup tables keyed by transformer kind. Unary kinds map
//! one input type to one output type (with an optional wildcard), binary kinds
//! map an ordered operand pair to a result. The [`RecipeBook`] is built once
//! and then only read; the engine never mutates it while running.

use crate::fixed::Fixed64;
use crate::id::{ItemType, MAX_TABLED_NUMBER, Material};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Operators and kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 3] = [BinaryOp::Add, BinaryOp::Subtract, BinaryOp::Multiply];

    pub fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Subtract => '-',
            BinaryOp::Multiply => '*',
        }
    }

    /// Arithmetic on two numbers. `None` if the result is not a positive
    /// integer.
    pub fn apply(self, a: u32, b: u32) -> Option<u32> {
        match self {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Subtract => a.checked_sub(b).filter(|r| *r > 0),
            BinaryOp::Multiply => a.checked_mul(b),
        }
    }
}

/// The closed set of transformer kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    /// Ores to plates.
    Smelter,
    /// Plates to parts.
    Assembler,
    /// Anything to stone.
    Crusher,
    Adder,
    Subtractor,
    Multiplier,
}

impl TransformKind {
    pub const ALL: [TransformKind; 6] = [
        TransformKind::Smelter,
        TransformKind::Assembler,
        TransformKind::Crusher,
        TransformKind::Adder,
        TransformKind::Subtractor,
        TransformKind::Multiplier,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TransformKind::Smelter => "smelter",
            TransformKind::Assembler => "assembler",
            TransformKind::Crusher => "crusher",
            TransformKind::Adder => "adder",
            TransformKind::Subtractor => "subtractor",
            TransformKind::Multiplier => "multiplier",
        }
    }

    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            TransformKind::Adder => Some(BinaryOp::Add),
            TransformKind::Subtractor => Some(BinaryOp::Subtract),
            TransformKind::Multiplier => Some(BinaryOp::Multiply),
            _ => None,
        }
    }

    pub fn is_binary(self) -> bool {
        self.binary_op().is_some()
    }

    /// Value multiplier applied on unary transformation.
    pub fn type_multiplier(self) -> Fixed64 {
        match self {
            TransformKind::Smelter => Fixed64::from_num(2),
            TransformKind::Assembler => Fixed64::from_num(3),
            _ => Fixed64::from_num(1),
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transformer kind '{0}'")]
pub struct UnknownTransformKind(pub String);

impl FromStr for TransformKind {
    type Err = UnknownTransformKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| UnknownTransformKind(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// An ordered operand pair for a binary recipe, displayed as `"2+3"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BinaryKey {
    pub lhs: ItemType,
    pub op: BinaryOp,
    pub rhs: ItemType,
}

impl fmt::Display for BinaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.lhs, self.op.symbol(), self.rhs)
    }
}

/// What a unary recipe matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryInput {
    Exact(ItemType),
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecipeError {
    #[error("{kind} is a binary transformer; unary recipes do not apply")]
    NotUnary { kind: TransformKind },
}

// ---------------------------------------------------------------------------
// Recipe book
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeBook {
    unary: BTreeMap<TransformKind, BTreeMap<ItemType, ItemType>>,
    wildcard: BTreeMap<TransformKind, ItemType>,
    binary: BTreeMap<BinaryKey, ItemType>,
    /// Every item type that appears on either side of a binary recipe.
    operands: BTreeMap<BinaryOp, BTreeSet<ItemType>>,
}

impl RecipeBook {
    /// A book with no recipes at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in material chains and number arithmetic over `1..=10`.
    ///
    /// Addition and multiplication are stored with `lhs <= rhs`, subtraction
    /// only with `lhs > rhs`; lookups try both operand orders.
    pub fn standard() -> Self {
        use Material::*;
        let mut book = Self::empty();
        let unary = [
            (TransformKind::Smelter, IronOre, IronPlate),
            (TransformKind::Smelter, CopperOre, CopperPlate),
            (TransformKind::Assembler, IronPlate, Gear),
            (TransformKind::Assembler, CopperPlate, Wire),
            (TransformKind::Assembler, Gear, Circuit),
        ];
        for (kind, input, output) in unary {
            // Kinds above are all unary.
            let _ = book.insert_unary(kind, UnaryInput::Exact(input.into()), output.into());
        }
        let _ = book.insert_unary(
            TransformKind::Crusher,
            UnaryInput::Any,
            ItemType::Material(Stone),
        );

        for a in 1..=MAX_TABLED_NUMBER {
            for b in 1..=MAX_TABLED_NUMBER {
                for op in BinaryOp::ALL {
                    let canonical = match op {
                        BinaryOp::Add => a <= b,
                        BinaryOp::Multiply => a <= b && a > 1,
                        BinaryOp::Subtract => a > b,
                    };
                    if !canonical {
                        continue;
                    }
                    if let Some(r) = op.apply(a, b).filter(|r| *r <= MAX_TABLED_NUMBER) {
                        book.insert_binary(
                            op,
                            ItemType::Number(a),
                            ItemType::Number(b),
                            ItemType::Number(r),
                        );
                    }
                }
            }
        }
        book
    }

    pub fn insert_unary(
        &mut self,
        kind: TransformKind,
        input: UnaryInput,
        output: ItemType,
    ) -> Result<(), RecipeError> {
        if kind.is_binary() {
            return Err(RecipeError::NotUnary { kind });
        }
        match input {
            UnaryInput::Exact(t) => {
                self.unary.entry(kind).or_default().insert(t, output);
            }
            UnaryInput::Any => {
                self.wildcard.insert(kind, output);
            }
        }
        Ok(())
    }

    pub fn insert_binary(&mut self, op: BinaryOp, lhs: ItemType, rhs: ItemType, output: ItemType) {
        self.binary.insert(BinaryKey { lhs, op, rhs }, output);
        let operands = self.operands.entry(op).or_default();
        operands.insert(lhs);
        operands.insert(rhs);
    }

    /// Output of a unary kind for one input. Exact entries win over the
    /// wildcard.
    pub fn unary_output(&self, kind: TransformKind, input: ItemType) -> Option<ItemType> {
        self.unary
            .get(&kind)
            .and_then(|table| table.get(&input).copied())
            .or_else(|| self.wildcard.get(&kind).copied())
    }

    /// Output of a binary op, trying `a op b` then `b op a`.
    pub fn binary_output(&self, op: BinaryOp, a: ItemType, b: ItemType) -> Option<ItemType> {
        self.binary
            .get(&BinaryKey { lhs: a, op, rhs: b })
            .or_else(|| self.binary.get(&BinaryKey { lhs: b, op, rhs: a }))
            .copied()
    }

    /// Whether a transformer of `kind` has any use for an item of this type.
    pub fn accepts(&self, kind: TransformKind, item_type: ItemType) -> bool {
        match kind.binary_op() {
            Some(op) => self
                .operands
                .get(&op)
                .is_some_and(|set| set.contains(&item_type)),
            None => self.unary_output(kind, item_type).is_some(),
        }
    }

    /// Whether `candidates` form a complete recipe for `kind`.
    pub fn has_recipe(&self, kind: TransformKind, candidates: &[ItemType]) -> bool {
        self.apply(kind, candidates).is_some()
    }

    /// The output for a candidate list, or `None` when nothing matches.
    pub fn apply(&self, kind: TransformKind, candidates: &[ItemType]) -> Option<ItemType> {
        match (kind.binary_op(), candidates) {
            (None, [single]) => self.unary_output(kind, *single),
            (Some(op), [a, b]) => self.binary_output(op, *a, *b),
            _ => None,
        }
    }

    /// First `(i, j)` with `i < j` such that `types[i] op types[j]` matches.
    ///
    /// Scans by lowest `i` first, then lowest `j`, so the pick is
    /// deterministic for a given queue order.
    pub fn find_pair(
        &self,
        op: BinaryOp,
        types: &[ItemType],
    ) -> Option<(usize, usize, ItemType)> {
        for i in 0..types.len() {
            for j in (i + 1)..types.len() {
                if let Some(out) = self.binary_output(op, types[i], types[j]) {
                    return Some((i, j, out));
                }
            }
        }
        None
    }

    /// All binary recipes in key order.
    pub fn binary_recipes(&self) -> impl Iterator<Item = (&BinaryKey, &ItemType)> {
        self.binary.iter()
    }

    /// Exact unary recipes for one kind, in input order.
    pub fn unary_recipes(&self, kind: TransformKind) -> impl Iterator<Item = (&ItemType, &ItemType)> {
        self.unary.get(&kind).into_iter().flat_map(|t| t.iter())
    }

    pub fn wildcard_output(&self, kind: TransformKind) -> Option<ItemType> {
        self.wildcard.get(&kind).copied()
    }

    pub fn binary_len(&self) -> usize {
        self.binary.len()
    }
}

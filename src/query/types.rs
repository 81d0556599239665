use bson::{Bson, Document};
use std::collections::{BTreeMap, BTreeSet};

use super::expr::Expression;
use super::path::Path;
use super::pattern::CompiledRegex;
use crate::document::TypeCode;

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 100;
pub(crate) const MAX_FILTER_DEPTH: usize = 100;

/// Outcome of comparing two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult {
    Less,
    Equal,
    Greater,
    /// NaN against a non-NaN number, or two values with no defined order.
    Incomparable,
}

/// Ordering operators. Equality lives in [`Predicate::Eq`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
        }
    }
}

/// Parsed query filter.
#[derive(Debug, Clone)]
pub enum Filter {
    /// The empty filter.
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
    Field { path: Path, pred: Predicate },
    Expr(Expression),
    /// `$comment`; always true.
    Comment,
}

/// A test applied to the values found at one path.
#[derive(Debug, Clone)]
pub enum Predicate {
    Eq(Bson),
    Ne(Bson),
    Cmp { op: CmpOp, value: Bson },
    In(Vec<InItem>),
    Nin(Vec<InItem>),
    Not(Vec<Predicate>),
    Exists(bool),
    /// `$exists` with a non-boolean operand matches everything.
    ExistsAny,
    Type(Vec<TypeCode>),
    Size(i64),
    All(Vec<Bson>),
    ElemMatch(ElemMatch),
    Regex(CompiledRegex),
    Mod { divisor: i64, remainder: i64 },
    /// `mask` holds the bit positions under test.
    Bits { test: BitsTest, mask: Vec<u64> },
}

#[derive(Debug, Clone)]
pub enum InItem {
    Value(Bson),
    Regex(CompiledRegex),
}

#[derive(Debug, Clone)]
pub enum ElemMatch {
    /// `{$elemMatch: {$gt: 1}}`: predicates over each element value.
    Value(Vec<Predicate>),
    /// `{$elemMatch: {a: 1}}`: a filter over each document element.
    Document(Box<Filter>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitsTest {
    AllClear,
    AllSet,
    AnyClear,
    AnySet,
}

/// Update modifiers. Variant order is the order they are applied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UpdateOp {
    CurrentDate,
    Inc,
    Min,
    Max,
    Mul,
    Rename,
    Set,
    SetOnInsert,
    Unset,
    Pop,
    Push,
    AddToSet,
    PullAll,
    Pull,
    Bit,
}

impl UpdateOp {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "$currentDate" => Self::CurrentDate,
            "$inc" => Self::Inc,
            "$min" => Self::Min,
            "$max" => Self::Max,
            "$mul" => Self::Mul,
            "$rename" => Self::Rename,
            "$set" => Self::Set,
            "$setOnInsert" => Self::SetOnInsert,
            "$unset" => Self::Unset,
            "$pop" => Self::Pop,
            "$push" => Self::Push,
            "$addToSet" => Self::AddToSet,
            "$pullAll" => Self::PullAll,
            "$pull" => Self::Pull,
            "$bit" => Self::Bit,
            _ => return None,
        })
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CurrentDate => "$currentDate",
            Self::Inc => "$inc",
            Self::Min => "$min",
            Self::Max => "$max",
            Self::Mul => "$mul",
            Self::Rename => "$rename",
            Self::Set => "$set",
            Self::SetOnInsert => "$setOnInsert",
            Self::Unset => "$unset",
            Self::Pop => "$pop",
            Self::Push => "$push",
            Self::AddToSet => "$addToSet",
            Self::PullAll => "$pullAll",
            Self::Pull => "$pull",
            Self::Bit => "$bit",
        }
    }
}

/// One `path: operand` pair of an update modifier.
#[derive(Debug, Clone)]
pub struct UpdateField {
    pub path: Path,
    pub operand: Bson,
}

/// Parsed update document.
#[derive(Debug, Clone)]
pub enum UpdateSpec {
    /// Modifiers in application order, each with its fields sorted by path.
    Operators(BTreeMap<UpdateOp, Vec<UpdateField>>),
    /// A document without modifiers; replaces everything but `_id`.
    Replacement(Document),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// The update runs as the insert half of an upsert; enables `$setOnInsert`.
    pub is_insert: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub modified: bool,
    /// Paths whose stored value changed.
    pub touched: BTreeSet<String>,
}

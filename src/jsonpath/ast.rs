//! Abstract syntax tree types for JSONPath expressions.

use serde_json::Value as Json;

/// Where a path starts evaluating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRoot {
    /// Document root ($)
    Root,
    /// Current node inside a filter (@)
    Current,
    /// Extra filter context (_)
    Extra,
}

/// A segment in a JSONPath expression.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// Named child (.property or ['property'])
    Child(String),
    /// Array index ([0], [-1])
    Index(isize),
    /// Wildcard (* or [*]) - all children
    Wildcard,
    /// Recursive descent (..property, ..* or ..[selector])
    RecursiveDescent(Box<PathSegment>),
    /// Array slice ([start:end:step])
    Slice(Option<isize>, Option<isize>, Option<isize>),
    /// Several selectors in one bracket (['a','b'], [1,2])
    Union(Vec<PathSegment>),
    /// Filter selector ([?expr])
    Filter(Box<FilterExpr>),
}

/// Comparison and membership operators usable in filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Contains,
}

/// A filter expression, the body of `[?...]`.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Literal(Json),
    Path(JsonPath),
    Function { name: String, args: Vec<FilterExpr> },
    Not(Box<FilterExpr>),
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
    Compare {
        left: Box<FilterExpr>,
        op: CompareOp,
        right: Box<FilterExpr>,
    },
}

/// A complete JSONPath expression.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    /// Node the first segment applies to.
    pub root: PathRoot,
    /// Segments that make up the path.
    pub segments: Vec<PathSegment>,
}

impl JsonPath {
    /// Creates a new JSONPath with the given root and segments.
    pub fn new(root: PathRoot, segments: Vec<PathSegment>) -> Self {
        Self { root, segments }
    }

    /// True when every segment selects at most one node.
    pub fn is_singular(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, PathSegment::Child(_) | PathSegment::Index(_)))
    }
}

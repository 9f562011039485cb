use std::borrow::Cow;

use serde_json::Value as Json;

use super::ast::{CompareOp, FilterExpr, JsonPath, PathRoot, PathSegment};
use super::error::JsonPathError;
use super::functions::{FunctionRegistry, Operand};

/// Walks a JSON value, selecting the nodes a path describes.
pub struct Evaluator<'a> {
    root: &'a Json,
    extra: &'a Json,
    functions: &'a FunctionRegistry,
}

impl<'a> Evaluator<'a> {
    /// `extra` is what `_` refers to inside filters.
    pub fn new(root: &'a Json, extra: &'a Json, functions: &'a FunctionRegistry) -> Self {
        Evaluator {
            root,
            extra,
            functions,
        }
    }

    /// Evaluates a JSONPath query and returns matching nodes in document order.
    pub fn evaluate(&self, path: &'a JsonPath) -> Result<Vec<&'a Json>, JsonPathError> {
        self.evaluate_from(self.root, path)
    }

    fn evaluate_from(
        &self,
        current: &'a Json,
        path: &'a JsonPath,
    ) -> Result<Vec<&'a Json>, JsonPathError> {
        let start = match path.root {
            PathRoot::Root => self.root,
            PathRoot::Current => current,
            PathRoot::Extra => self.extra,
        };

        let mut nodes: Vec<&'a Json> = vec![start];
        for segment in &path.segments {
            let mut next = Vec::new();
            for node in &nodes {
                next.extend(self.evaluate_segment(node, segment)?);
            }
            nodes = next;
        }
        Ok(nodes)
    }

    fn evaluate_segment(
        &self,
        node: &'a Json,
        segment: &'a PathSegment,
    ) -> Result<Vec<&'a Json>, JsonPathError> {
        Ok(match segment {
            PathSegment::Child(name) => self.find_child(node, name),
            PathSegment::Index(idx) => self.get_array_element(node, *idx),
            PathSegment::Wildcard => self.get_all_children(node),
            PathSegment::RecursiveDescent(selector) => {
                let mut results = Vec::new();
                for descendant in self.descendants(node) {
                    results.extend(self.evaluate_segment(descendant, selector)?);
                }
                results
            }
            PathSegment::Slice(start, end, step) => self.get_slice(node, *start, *end, *step),
            PathSegment::Union(selectors) => {
                let mut results = Vec::new();
                for selector in selectors {
                    results.extend(self.evaluate_segment(node, selector)?);
                }
                results
            }
            PathSegment::Filter(expr) => {
                let mut results = Vec::new();
                for child in self.get_all_children(node) {
                    if self.eval_expr(expr, child)?.is_truthy() {
                        results.push(child);
                    }
                }
                results
            }
        })
    }

    fn find_child(&self, node: &'a Json, name: &str) -> Vec<&'a Json> {
        match node {
            Json::Object(props) => props.get(name).into_iter().collect(),
            _ => vec![],
        }
    }

    fn get_array_element(&self, node: &'a Json, idx: isize) -> Vec<&'a Json> {
        if let Json::Array(items) = node {
            let len = items.len() as isize;
            let normalized_idx = if idx < 0 { len + idx } else { idx };

            if normalized_idx >= 0 && normalized_idx < len {
                return vec![&items[normalized_idx as usize]];
            }
        }
        vec![]
    }

    fn get_all_children(&self, node: &'a Json) -> Vec<&'a Json> {
        match node {
            Json::Object(props) => props.values().collect(),
            Json::Array(items) => items.iter().collect(),
            _ => vec![],
        }
    }

    fn get_slice(
        &self,
        node: &'a Json,
        start: Option<isize>,
        end: Option<isize>,
        step: Option<isize>,
    ) -> Vec<&'a Json> {
        let Json::Array(items) = node else {
            return vec![];
        };
        let len = items.len() as isize;
        let step = step.unwrap_or(1);
        let normalize = |i: isize| if i < 0 { len + i } else { i };

        let mut results = Vec::new();
        if step > 0 {
            let lower = start.map(normalize).unwrap_or(0).clamp(0, len);
            let upper = end.map(normalize).unwrap_or(len).clamp(0, len);
            let mut i = lower;
            while i < upper {
                results.push(&items[i as usize]);
                let Some(next) = i.checked_add(step) else {
                    break;
                };
                i = next;
            }
        } else if step < 0 {
            let upper = start.map(normalize).unwrap_or(len - 1).clamp(-1, len - 1);
            let lower = end.map(normalize).unwrap_or(-1).clamp(-1, len - 1);
            let mut i = upper;
            while i > lower {
                results.push(&items[i as usize]);
                let Some(next) = i.checked_add(step) else {
                    break;
                };
                i = next;
            }
        }
        results
    }

    /// The node itself followed by every node below it, depth first.
    fn descendants(&self, node: &'a Json) -> Vec<&'a Json> {
        fn walk<'a>(node: &'a Json, results: &mut Vec<&'a Json>) {
            results.push(node);
            match node {
                Json::Object(props) => props.values().for_each(|child| walk(child, results)),
                Json::Array(items) => items.iter().for_each(|child| walk(child, results)),
                _ => {}
            }
        }

        let mut results = Vec::new();
        walk(node, &mut results);
        results
    }

    fn eval_expr(
        &self,
        expr: &'a FilterExpr,
        current: &'a Json,
    ) -> Result<Operand<'a>, JsonPathError> {
        Ok(match expr {
            FilterExpr::Literal(value) => Operand::Value(Cow::Borrowed(value)),
            FilterExpr::Path(path) => {
                let nodes = self.evaluate_from(current, path)?;
                if path.is_singular() && nodes.is_empty() {
                    Operand::Nothing
                } else {
                    Operand::Nodes(nodes)
                }
            }
            FilterExpr::Function { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval_expr(arg, current))
                    .collect::<Result<Vec<_>, _>>()?;
                self.functions.call(name, &args)?.into()
            }
            FilterExpr::Not(inner) => Operand::Logical(!self.eval_expr(inner, current)?.is_truthy()),
            FilterExpr::And(left, right) => Operand::Logical(
                self.eval_expr(left, current)?.is_truthy()
                    && self.eval_expr(right, current)?.is_truthy(),
            ),
            FilterExpr::Or(left, right) => Operand::Logical(
                self.eval_expr(left, current)?.is_truthy()
                    || self.eval_expr(right, current)?.is_truthy(),
            ),
            FilterExpr::Compare { left, op, right } => {
                let left = comparable(self.eval_expr(left, current)?);
                let right = comparable(self.eval_expr(right, current)?);
                Operand::Logical(compare(left.as_deref(), *op, right.as_deref()))
            }
        })
    }
}

/// Reduces an operand to the single value a comparison sees.
fn comparable(operand: Operand<'_>) -> Option<Cow<'_, Json>> {
    match operand {
        Operand::Nothing => None,
        Operand::Value(v) => Some(v),
        Operand::Logical(b) => Some(Cow::Owned(Json::Bool(b))),
        Operand::Nodes(nodes) => match nodes.len() {
            0 => None,
            1 => Some(Cow::Borrowed(nodes[0])),
            _ => Some(Cow::Owned(Json::Array(nodes.into_iter().cloned().collect()))),
        },
    }
}

fn compare(left: Option<&Json>, op: CompareOp, right: Option<&Json>) -> bool {
    match op {
        CompareOp::Eq => equal(left, right),
        CompareOp::Ne => !equal(left, right),
        CompareOp::Lt => less_than(left, right),
        CompareOp::Le => less_than(left, right) || equal(left, right),
        CompareOp::Gt => less_than(right, left),
        CompareOp::Ge => less_than(right, left) || equal(left, right),
        CompareOp::In => contains(right, left),
        CompareOp::Contains => contains(left, right),
    }
}

fn equal(left: Option<&Json>, right: Option<&Json>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(a), Some(b)) => json_eq(a, b),
        _ => false,
    }
}

/// Structural equality that treats `1` and `1.0` as the same number.
fn json_eq(a: &Json, b: &Json) -> bool {
    match (a, b) {
        (Json::Number(x), Json::Number(y)) => x.as_f64() == y.as_f64(),
        (Json::Array(xs), Json::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_eq(x, y))
        }
        (Json::Object(xs), Json::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| json_eq(x, y)))
        }
        _ => a == b,
    }
}

fn less_than(left: Option<&Json>, right: Option<&Json>) -> bool {
    match (left, right) {
        (Some(Json::Number(x)), Some(Json::Number(y))) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x < y,
            _ => false,
        },
        (Some(Json::String(x)), Some(Json::String(y))) => x < y,
        _ => false,
    }
}

fn contains(container: Option<&Json>, item: Option<&Json>) -> bool {
    match (container, item) {
        (Some(Json::Array(items)), Some(item)) => items.iter().any(|x| json_eq(x, item)),
        (Some(Json::Object(props)), Some(Json::String(key))) => props.contains_key(key),
        (Some(Json::String(haystack)), Some(Json::String(needle))) => haystack.contains(needle.as_str()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonpath::parser::Parser;
    use crate::jsonpath::functions::FunctionValue;
    use serde_json::json;

    fn make_test_tree() -> Json {
        json!({
            "name": "test",
            "age": 42,
            "items": ["a", "b", "c"],
            "users": [
                {"name": "Sue", "score": 100, "tags": ["x", "y"]},
                {"name": "John", "score": 86, "tags": []},
                {"name": "Sally", "score": 84, "tags": ["z"]}
            ]
        })
    }

    fn find(tree: &Json, extra: &Json, query: &str) -> Vec<Json> {
        let functions = FunctionRegistry::standard();
        let path = Parser::parse(query, &functions).unwrap();
        let evaluator = Evaluator::new(tree, extra, &functions);
        evaluator
            .evaluate(&path)
            .unwrap()
            .into_iter()
            .cloned()
            .collect()
    }

    #[test]
    fn test_evaluate_root() {
        let tree = make_test_tree();
        assert_eq!(find(&tree, &json!({}), "$"), vec![tree.clone()]);
    }

    #[test]
    fn test_evaluate_child_and_negative_index() {
        let tree = make_test_tree();
        assert_eq!(find(&tree, &json!({}), "$.name"), vec![json!("test")]);
        assert_eq!(find(&tree, &json!({}), "$.items[-1]"), vec![json!("c")]);
        assert!(find(&tree, &json!({}), "$.items[3]").is_empty());
    }

    #[test]
    fn test_evaluate_wildcard_keeps_document_order() {
        let tree = make_test_tree();
        assert_eq!(
            find(&tree, &json!({}), "$.users.*.name"),
            vec![json!("Sue"), json!("John"), json!("Sally")]
        );
    }

    #[test]
    fn test_evaluate_recursive_descent_with_name() {
        let tree = make_test_tree();
        assert_eq!(
            find(&tree, &json!({}), "$..name"),
            vec![json!("test"), json!("Sue"), json!("John"), json!("Sally")]
        );
    }

    #[test]
    fn test_evaluate_slice() {
        let tree = make_test_tree();
        assert_eq!(
            find(&tree, &json!({}), "$.items[0:2]"),
            vec![json!("a"), json!("b")]
        );
        assert_eq!(
            find(&tree, &json!({}), "$.items[::-1]"),
            vec![json!("c"), json!("b"), json!("a")]
        );
        assert!(find(&tree, &json!({}), "$.items[::0]").is_empty());
    }

    #[test]
    fn test_evaluate_slice_with_huge_step() {
        let tree = make_test_tree();
        assert_eq!(
            find(&tree, &json!({}), "$.items[1::9223372036854775807]"),
            vec![json!("b")]
        );
        assert_eq!(
            find(&tree, &json!({}), "$.items[::-9223372036854775808]"),
            vec![json!("c")]
        );
        assert_eq!(
            find(&tree, &json!({}), "$.items[-9223372036854775808:]"),
            vec![json!("a"), json!("b"), json!("c")]
        );
    }

    #[test]
    fn test_evaluate_union_preserves_duplicates() {
        let tree = make_test_tree();
        assert_eq!(
            find(&tree, &json!({}), "$.items[2,0,2]"),
            vec![json!("c"), json!("a"), json!("c")]
        );
    }

    #[test]
    fn test_evaluate_filter_comparison() {
        let tree = make_test_tree();
        assert_eq!(
            find(&tree, &json!({}), "$.users[?@.score < 90].name"),
            vec![json!("John"), json!("Sally")]
        );
        assert_eq!(
            find(&tree, &json!({}), "$.users[?@.score == 100.0].name"),
            vec![json!("Sue")]
        );
    }

    #[test]
    fn test_evaluate_filter_extra_context() {
        let tree = make_test_tree();
        let extra = json!({"names": ["Sue", "Sally"]});
        assert_eq!(
            find(&tree, &extra, "$.users[?@.name in _.names].name"),
            vec![json!("Sue"), json!("Sally")]
        );
    }

    #[test]
    fn test_evaluate_filter_existence_and_functions() {
        let tree = make_test_tree();
        assert_eq!(
            find(&tree, &json!({}), "$.users[?length(@.tags) > 0].name"),
            vec![json!("Sue"), json!("Sally")]
        );
        assert_eq!(
            find(&tree, &json!({}), "$.users[?match(@.name, 'S.*')].score"),
            vec![json!(100), json!(84)]
        );
        assert_eq!(find(&tree, &json!({}), "$[?@.nope]"), Vec::<Json>::new());
    }

    #[test]
    fn test_evaluate_function_error_propagates() {
        let tree = make_test_tree();
        let mut functions = FunctionRegistry::standard();
        functions.register("mock", |_| -> Result<FunctionValue, JsonPathError> {
            Err(JsonPathError::type_error(":("))
        });
        let path = Parser::parse("$.users[?mock(@)]", &functions).unwrap();
        let extra = json!({});
        let evaluator = Evaluator::new(&tree, &extra, &functions);
        let err = evaluator.evaluate(&path).unwrap_err();
        assert_eq!(err, JsonPathError::type_error(":("));
    }
}

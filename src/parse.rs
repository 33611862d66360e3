//! Text interfaces: JSON architecture descriptions, group serialization
//! strings and task allocation batches.
//!
//! Cycle alphabets in all string forms are 1-indexed (the GAP convention)
//! and converted to the crate's 0-indexed points on entry.

use serde_json::Value;
use thiserror::Error;

use crate::arch::{ArchGraphCluster, ArchGraphSystem, ArchUniformSuperGraph};
use crate::group::{GroupError, PermGroup};
use crate::mapping::TaskMapping;
use crate::perm::Permutation;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed description: {0}")]
    MalformedDescription(String),

    #[error("task allocations must all have the same length")]
    InconsistentAllocations,

    #[error(transparent)]
    Group(#[from] GroupError),
}

fn malformed(detail: impl Into<String>) -> ParseError {
    ParseError::MalformedDescription(detail.into())
}

// --------------------------------------------------------------------------------------------
// GAP-style Permutations
// --------------------------------------------------------------------------------------------

/// Parses a cycle expression like `(1,3,5)(2,4)` or `()` over the alphabet
/// `1..=degree`.
pub fn parse_perm(input: &str, degree: usize) -> Result<Permutation, ParseError> {
    let input = input.trim();
    if input == "()" {
        return Ok(Permutation::id(degree));
    }

    let mut cycles = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        rest = rest
            .strip_prefix('(')
            .ok_or_else(|| malformed(format!("expected '(' in permutation {input:?}")))?;
        let end = rest
            .find(')')
            .ok_or_else(|| malformed(format!("unbalanced parentheses in {input:?}")))?;

        let mut cycle = Vec::new();
        for token in rest[..end].split(',') {
            let point: usize = token
                .trim()
                .parse()
                .map_err(|_| malformed(format!("invalid point {token:?} in {input:?}")))?;
            if point == 0 || point > degree {
                return Err(malformed(format!(
                    "point {point} outside the alphabet 1..={degree}"
                )));
            }
            cycle.push(point - 1);
        }
        cycles.push(cycle);
        rest = &rest[end + 1..];
    }

    Permutation::from_cycles(&cycles, degree)
        .map_err(|e| malformed(format!("invalid cycles in {input:?}: {e}")))
}

/// Splits a bracketed generator list `[(1,2)(3,4),(1,3),()]` at the
/// top-level commas.
fn split_generators(input: &str) -> Result<Vec<&str>, ParseError> {
    let inner = input
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| malformed("generator list must be bracketed"))?;

    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| malformed("unbalanced parentheses in generator list"))?;
            }
            ',' if depth == 0 => {
                parts.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(malformed("unbalanced parentheses in generator list"));
    }
    let last = inner[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    Ok(parts.into_iter().filter(|p| !p.is_empty()).collect())
}

// --------------------------------------------------------------------------------------------
// Group Serialization
// --------------------------------------------------------------------------------------------

/// Parses `degree:<d>,order:<o>,gens:[<gen>,...]`, the format emitted by
/// [`PermGroup`]'s `Display`. The declared order is checked against the
/// constructed group; a mismatch aborts the parse.
pub fn parse_group(input: &str) -> Result<PermGroup, ParseError> {
    let input = input.trim();
    let rest = input
        .strip_prefix("degree:")
        .ok_or_else(|| malformed("expected 'degree:'"))?;
    let comma = rest
        .find(',')
        .ok_or_else(|| malformed("expected ',' after the degree"))?;
    let degree: usize = rest[..comma]
        .parse()
        .map_err(|_| malformed("invalid degree"))?;

    let rest = rest[comma + 1..]
        .strip_prefix("order:")
        .ok_or_else(|| malformed("expected 'order:'"))?;
    let comma = rest
        .find(',')
        .ok_or_else(|| malformed("expected ',' after the order"))?;
    let order: num::BigUint = rest[..comma]
        .parse()
        .map_err(|_| malformed("invalid order"))?;

    let gens_str = rest[comma + 1..]
        .strip_prefix("gens:")
        .ok_or_else(|| malformed("expected 'gens:'"))?;

    let mut generators = Vec::new();
    for gen_str in split_generators(gens_str)? {
        generators.push(parse_perm(gen_str, degree)?);
    }

    let group = PermGroup::new(degree, generators)?;
    if group.order() != &order {
        return Err(malformed(format!(
            "declared order {order} does not match the computed order {}",
            group.order()
        )));
    }
    Ok(group)
}

// --------------------------------------------------------------------------------------------
// Architecture Descriptions
// --------------------------------------------------------------------------------------------

/// Parses a JSON architecture description tree.
///
/// Recognized node shapes: `{"component": [degree, "gen", ...]}`,
/// `{"cluster": [node, ...]}` and `{"super_graph": [outer, proto]}`.
pub fn parse_arch_description(input: &str) -> Result<ArchGraphSystem, ParseError> {
    let value: Value =
        serde_json::from_str(input).map_err(|e| malformed(format!("invalid json: {e}")))?;
    build_system(&value)
}

fn build_system(value: &Value) -> Result<ArchGraphSystem, ParseError> {
    let object = value
        .as_object()
        .filter(|o| o.len() == 1)
        .ok_or_else(|| malformed("expected an object with exactly one key"))?;
    let (key, child) = object.iter().next().expect("single key checked above");

    match key.as_str() {
        "component" => {
            let entries = child
                .as_array()
                .filter(|a| !a.is_empty())
                .ok_or_else(|| malformed("component must be a non-empty array"))?;
            let degree = entries[0]
                .as_u64()
                .ok_or_else(|| malformed("component degree must be a number"))?
                as usize;

            let mut generators = Vec::new();
            for entry in &entries[1..] {
                let gen_str = entry
                    .as_str()
                    .ok_or_else(|| malformed("component generators must be strings"))?;
                generators.push(parse_perm(gen_str, degree)?);
            }
            Ok(PermGroup::new(degree, generators)?.into())
        }
        "cluster" => {
            let entries = child
                .as_array()
                .ok_or_else(|| malformed("cluster must be an array"))?;
            let mut cluster = ArchGraphCluster::new();
            for entry in entries {
                cluster.add_subsystem(build_system(entry)?);
            }
            Ok(cluster.into())
        }
        "super_graph" => {
            let entries = child
                .as_array()
                .filter(|a| a.len() == 2)
                .ok_or_else(|| malformed("super_graph must be composed of two components"))?;
            let outer = build_system(&entries[0])?;
            let proto = build_system(&entries[1])?;
            Ok(ArchUniformSuperGraph::new(outer, proto).into())
        }
        other => Err(malformed(format!("unknown node kind {other:?}"))),
    }
}

// --------------------------------------------------------------------------------------------
// Task Allocations
// --------------------------------------------------------------------------------------------

/// Parses one task allocation per line, either whitespace-separated
/// (`3 1 4 1`) or bracketed (`[ 3, 1, 4, 1 ]`). All allocations in a batch
/// must have the same length.
pub fn parse_task_allocations(input: &str) -> Result<Vec<TaskMapping>, ParseError> {
    let mut mappings = Vec::new();
    let mut num_tasks = None;

    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let tokens: Vec<&str> = match line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            Some(inner) => inner.split(',').map(str::trim).collect(),
            None => line.split_whitespace().collect(),
        };

        let mut tasks = Vec::with_capacity(tokens.len());
        for token in tokens {
            tasks.push(
                token
                    .parse::<usize>()
                    .map_err(|_| malformed(format!("invalid task index {token:?}")))?,
            );
        }

        match num_tasks {
            None => num_tasks = Some(tasks.len()),
            Some(expected) if expected != tasks.len() => {
                return Err(ParseError::InconsistentAllocations);
            }
            Some(_) => {}
        }
        mappings.push(TaskMapping::new(tasks));
    }

    Ok(mappings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsgs::BsgsOptions;
    use crate::mapping::ReprOptions;
    use num::BigUint;

    #[test]
    fn test_parse_perm() {
        let p = parse_perm("(1,3,5)(2,4)", 5).unwrap();
        assert_eq!(p.map(), &[2, 3, 4, 1, 0]);

        assert!(parse_perm("()", 3).unwrap().is_identity());
        assert!(parse_perm("(0,1)", 3).is_err());
        assert!(parse_perm("(1,4)", 3).is_err());
        assert!(parse_perm("(1,2", 3).is_err());
        assert!(parse_perm("(1,1)", 3).is_err());
    }

    #[test]
    fn test_group_round_trip() {
        let group = PermGroup::new(
            3,
            vec![
                parse_perm("(1,2)", 3).unwrap(),
                parse_perm("(1,2,3)", 3).unwrap(),
            ],
        )
        .unwrap();

        let serialized = group.to_string();
        let parsed = parse_group(&serialized).unwrap();
        assert_eq!(parsed, group);
        assert_eq!(parsed.to_string(), serialized);
    }

    #[test]
    fn test_parse_group_checks_order() {
        assert!(parse_group("degree:3,order:6,gens:[(1,2),(1,2,3)]").is_ok());
        assert!(parse_group("degree:3,order:5,gens:[(1,2),(1,2,3)]").is_err());
        assert!(parse_group("degree:3,gens:[(1,2)]").is_err());
        assert!(parse_group("order:6,degree:3,gens:[(1,2)]").is_err());
    }

    #[test]
    fn test_parse_trivial_group() {
        let group = parse_group("degree:4,order:1,gens:[]").unwrap();
        assert!(group.is_trivial());

        let identity_only = parse_group("degree:4,order:1,gens:[()]").unwrap();
        assert_eq!(identity_only, group);
    }

    #[test]
    fn test_parse_component() {
        let mut system =
            parse_arch_description(r#"{"component": [4, "(1,2)", "(1,2,3,4)"]}"#).unwrap();
        assert_eq!(system.num_processors(), 4);
        let group = system.automorphisms(&BsgsOptions::default()).unwrap();
        assert_eq!(group.order(), &BigUint::from(24u32));
    }

    #[test]
    fn test_parse_cluster_and_super_graph() {
        let description = r#"
            {"cluster": [
                {"component": [3, "(1,2,3)"]},
                {"super_graph": [
                    {"component": [2, "(1,2)"]},
                    {"component": [2, "(1,2)"]}
                ]}
            ]}
        "#;
        let mut system = parse_arch_description(description).unwrap();
        assert_eq!(system.num_processors(), 7);

        // C3 x (S2 wr S2): 3 * (2^2 * 2) = 24
        let group = system.automorphisms(&BsgsOptions::default()).unwrap();
        assert_eq!(group.order(), &BigUint::from(24u32));
    }

    #[test]
    fn test_malformed_descriptions() {
        assert!(parse_arch_description("not json").is_err());
        assert!(parse_arch_description(r#"{"unknown": []}"#).is_err());
        assert!(parse_arch_description(r#"{"component": []}"#).is_err());
        assert!(parse_arch_description(r#"{"super_graph": [{"component": [1]}]}"#).is_err());
        assert!(
            parse_arch_description(r#"{"cluster": [], "component": [1]}"#).is_err(),
            "two keys in one node"
        );
    }

    #[test]
    fn test_parse_task_allocations() {
        let batch = "3 1 4 1\n[ 2, 0, 1, 3 ]\n\n0 0 0 0\n";
        let allocations = parse_task_allocations(batch).unwrap();
        assert_eq!(allocations.len(), 3);
        assert_eq!(allocations[0].tasks(), &[3, 1, 4, 1]);
        assert_eq!(allocations[1].tasks(), &[2, 0, 1, 3]);

        assert!(matches!(
            parse_task_allocations("1 2 3\n1 2"),
            Err(ParseError::InconsistentAllocations)
        ));
        assert!(parse_task_allocations("1 x 3").is_err());
    }

    #[test]
    fn test_parsed_component_canonicalizes() {
        // parse an S4 component, then canonicalize an allocation against it
        let mut system = parse_arch_description(
            r#"{"component": [4, "(1,2)", "(1,2,3,4)"]}"#,
        )
        .unwrap();
        let repr = system
            .repr(
                &TaskMapping::new(vec![2, 0, 1, 3]),
                &ReprOptions::default(),
                None,
            )
            .unwrap();
        assert_eq!(repr.tasks(), &[0, 1, 2, 3]);
    }
}

//! Structural validation of a recipe's prerequisite graph.

use crate::error::{FabforgeError, FabforgeResult};
use fabforge_schemas::{recipe::ProcessRecipe, step::ProcessStep};
use std::collections::{HashMap, HashSet};

/// Checks a recipe before any step runs.
///
/// Always rejects an empty recipe, empty ids or process types, non-positive
/// estimated times and cyclic prerequisites. With `strict_prerequisites`
/// it also rejects duplicate step ids and prerequisites that name no declared
/// step; in lenient mode such a prerequisite can never be satisfied and the
/// step is skipped at run time.
pub fn validate_recipe(recipe: &ProcessRecipe, strict_prerequisites: bool) -> FabforgeResult<()> {
    if recipe.steps.is_empty() {
        return Err(FabforgeError::EmptyRecipe(recipe.id.clone()));
    }

    for step in &recipe.steps {
        if step.id.trim().is_empty() {
            return Err(FabforgeError::EmptyStepId(recipe.id.clone()));
        }
        if step.process_type.trim().is_empty() {
            return Err(FabforgeError::MissingProcessType(step.id.clone()));
        }
        if !(step.estimated_time > 0.0) {
            return Err(FabforgeError::NonPositiveEstimatedTime {
                step_id: step.id.clone(),
                estimated_time: step.estimated_time,
            });
        }
    }

    if strict_prerequisites {
        let mut declared = HashSet::new();
        for step in &recipe.steps {
            if !declared.insert(step.id.as_str()) {
                return Err(FabforgeError::DuplicateStepId(step.id.clone()));
            }
        }
        for step in &recipe.steps {
            if let Some(missing) = step.prerequisites.iter().find(|p| !declared.contains(p.as_str())) {
                return Err(FabforgeError::UnknownPrerequisite {
                    step_id: step.id.clone(),
                    prerequisite: missing.clone(),
                });
            }
        }
    }

    detect_cycle(recipe)
}

/// Depth-first search over prerequisite edges; an edge back into the
/// current path is a cycle. Runs on an explicit frame stack so chain length
/// is bounded by the heap, not the thread stack. Duplicate ids share one
/// node carrying the union of their prerequisites.
fn detect_cycle(recipe: &ProcessRecipe) -> FabforgeResult<()> {
    let mut graph: HashMap<&str, Vec<&str>> = HashMap::new();
    for step in &recipe.steps {
        graph
            .entry(step.id.as_str())
            .or_default()
            .extend(step.prerequisites.iter().map(String::as_str));
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut on_path: HashSet<&str> = HashSet::new();
    for step in &recipe.steps {
        let root = step.id.as_str();
        if !visited.insert(root) {
            continue;
        }
        on_path.insert(root);
        let mut frames: Vec<(&str, usize)> = vec![(root, 0)];

        while let Some(frame) = frames.last_mut() {
            let (id, next) = *frame;
            let edges = graph.get(id).map(Vec::as_slice).unwrap_or(&[]);
            match edges.get(next) {
                Some(&prerequisite) => {
                    frame.1 += 1;
                    if on_path.contains(prerequisite) {
                        return Err(FabforgeError::CyclicDependency(prerequisite.to_string()));
                    }
                    if graph.contains_key(prerequisite) && visited.insert(prerequisite) {
                        on_path.insert(prerequisite);
                        frames.push((prerequisite, 0));
                    }
                }
                None => {
                    on_path.remove(id);
                    frames.pop();
                }
            }
        }
    }
    Ok(())
}

/// Exact string match of every prerequisite against the completed list.
pub fn prerequisites_met(step: &ProcessStep, completed_steps: &[String]) -> bool {
    step.prerequisites
        .iter()
        .all(|p| completed_steps.iter().any(|c| c == p))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, prerequisites: &[&str]) -> ProcessStep {
        prerequisites
            .iter()
            .fold(ProcessStep::new(id, "anneal", 60.0), |s, p| s.with_prerequisite(*p))
    }

    fn recipe(steps: Vec<ProcessStep>) -> ProcessRecipe {
        steps
            .into_iter()
            .fold(ProcessRecipe::new("r", "r", 1.0e6), |r, s| r.with_step(s))
    }

    #[test]
    fn accepts_acyclic_graph() {
        let r = recipe(vec![
            step("clean", &[]),
            step("oxide", &["clean"]),
            step("poly", &["oxide"]),
            step("implant", &["oxide", "clean"]),
        ]);
        assert!(validate_recipe(&r, true).is_ok());
    }

    #[test]
    fn rejects_two_step_cycle() {
        let r = recipe(vec![step("a", &["b"]), step("b", &["a"])]);
        let err = validate_recipe(&r, true).unwrap_err();
        assert!(matches!(err, FabforgeError::CyclicDependency(_)));
        assert_eq!(err.code(), "CYCLIC_DEPENDENCY");
    }

    #[test]
    fn rejects_self_dependency_and_long_cycle() {
        assert!(validate_recipe(&recipe(vec![step("a", &["a"])]), true).is_err());
        let r = recipe(vec![step("a", &["c"]), step("b", &["a"]), step("c", &["b"])]);
        assert!(matches!(
            validate_recipe(&r, false),
            Err(FabforgeError::CyclicDependency(_))
        ));
    }

    #[test]
    fn rejects_malformed_steps() {
        assert!(matches!(
            validate_recipe(&recipe(vec![]), true),
            Err(FabforgeError::EmptyRecipe(_))
        ));
        assert!(matches!(
            validate_recipe(&recipe(vec![step("", &[])]), true),
            Err(FabforgeError::EmptyStepId(_))
        ));
        assert!(matches!(
            validate_recipe(&recipe(vec![ProcessStep::new("a", "", 60.0)]), true),
            Err(FabforgeError::MissingProcessType(_))
        ));
        assert!(matches!(
            validate_recipe(&recipe(vec![ProcessStep::new("a", "etch", 0.0)]), true),
            Err(FabforgeError::NonPositiveEstimatedTime { .. })
        ));
    }

    #[test]
    fn unknown_prerequisite_depends_on_mode() {
        let r = recipe(vec![step("a", &["ghost"])]);
        assert!(matches!(
            validate_recipe(&r, true),
            Err(FabforgeError::UnknownPrerequisite { .. })
        ));
        assert!(validate_recipe(&r, false).is_ok());
    }

    #[test]
    fn duplicate_ids_rejected_only_when_strict() {
        let r = recipe(vec![step("a", &[]), step("a", &[])]);
        assert!(matches!(
            validate_recipe(&r, true),
            Err(FabforgeError::DuplicateStepId(_))
        ));
        assert!(validate_recipe(&r, false).is_ok());
    }

    #[test]
    fn lenient_mode_sees_cycles_through_duplicate_ids() {
        let r = recipe(vec![step("a", &[]), step("b", &["a"]), step("a", &["b"])]);
        assert!(matches!(
            validate_recipe(&r, false),
            Err(FabforgeError::CyclicDependency(_))
        ));
    }

    #[test]
    fn long_reversed_chain_validates() {
        let n = 20_000;
        let steps = (0..n)
            .map(|i| {
                let s = ProcessStep::new(format!("s{}", i), "anneal", 1.0);
                if i + 1 < n {
                    s.with_prerequisite(format!("s{}", i + 1))
                } else {
                    s
                }
            })
            .collect();
        assert!(validate_recipe(&recipe(steps), true).is_ok());
    }

    #[test]
    fn long_chain_closed_into_a_loop_is_rejected() {
        let n = 20_000;
        let steps = (0..n)
            .map(|i| ProcessStep::new(format!("s{}", i), "anneal", 1.0).with_prerequisite(format!("s{}", (i + 1) % n)))
            .collect();
        assert!(matches!(
            validate_recipe(&recipe(steps), true),
            Err(FabforgeError::CyclicDependency(_))
        ));
    }

    #[test]
    fn prerequisites_use_exact_match() {
        let s = step("b", &["a"]);
        assert!(!prerequisites_met(&s, &["A".to_string()]));
        assert!(prerequisites_met(&s, &["a".to_string()]));
        assert!(prerequisites_met(&step("c", &[]), &[]));
    }
}

//! engine::fanout
//!
//! Per-submodule task fan-out.
//!
//! Sibling submodules share no mutable state, so independent per-submodule
//! steps (fetch, dry-run, checkout, replay) run as one blocking task each
//! on a [`JoinSet`], bounded by the number of affected submodules. git2
//! handles are never shared across tasks; each worker opens its own store.
//!
//! Dry runs need every problem, not the first one, so collection never
//! short-circuits: all tasks run to completion before results are
//! inspected.

use tokio::task::JoinSet;

use super::{EngineError, UserError};

/// Run `task` once per item, all items concurrently, and return every
/// result. Result order is unspecified; tasks must carry their own
/// identity in their return value when it matters.
pub async fn run_all<T, R, F>(items: Vec<T>, task: F) -> Vec<Result<R, EngineError>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Result<R, EngineError> + Clone + Send + 'static,
{
    let mut set = JoinSet::new();
    for item in items {
        let task = task.clone();
        set.spawn_blocking(move || task(item));
    }

    let mut results = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(err) => results.push(Err(EngineError::Internal(format!(
                "submodule worker failed: {err}"
            )))),
        }
    }
    results
}

/// Collect dry-run outputs: each task yields its own problem list, and the
/// lists are concatenated. Hard failures propagate.
pub fn collect_problems(
    results: Vec<Result<Vec<String>, EngineError>>,
) -> Result<Vec<String>, EngineError> {
    let mut problems = Vec::new();
    for result in results {
        problems.extend(result?);
    }
    Ok(problems)
}

/// Collect execution outputs. User-level failures from every task are
/// aggregated into one report; the first hard failure propagates.
pub fn collect_results<R>(results: Vec<Result<R, EngineError>>) -> Result<Vec<R>, EngineError> {
    let mut ok = Vec::new();
    let mut problems = Vec::new();
    for result in results {
        match result {
            Ok(value) => ok.push(value),
            Err(EngineError::User(user)) => problems.extend(user.into_problems()),
            Err(other) => return Err(other),
        }
    }
    if problems.is_empty() {
        Ok(ok)
    } else {
        Err(UserError::from_problems(problems).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_every_item() {
        let results = run_all(vec![1, 2, 3], |n: i32| Ok(n * 2)).await;
        let mut values: Vec<i32> = results.into_iter().map(|r| r.unwrap()).collect();
        values.sort();
        assert_eq!(values, vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn failures_do_not_cancel_siblings() {
        let results = run_all(vec![1, 2, 3, 4], |n: i32| {
            if n % 2 == 0 {
                Err(EngineError::user(format!("problem {n}")))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(results.len(), 4);

        let err = collect_results(results).unwrap_err();
        let EngineError::User(user) = err else {
            panic!("expected aggregated user error");
        };
        assert_eq!(user.problems().len(), 2);
    }

    #[test]
    fn collect_problems_concatenates() {
        let problems = collect_problems(vec![
            Ok(vec!["a".to_string()]),
            Ok(vec![]),
            Ok(vec!["b".to_string(), "c".to_string()]),
        ])
        .unwrap();
        assert_eq!(problems, vec!["a", "b", "c"]);
    }

    #[test]
    fn collect_problems_propagates_hard_failures() {
        let result = collect_problems(vec![
            Ok(vec!["a".to_string()]),
            Err(EngineError::Internal("boom".into())),
        ]);
        assert!(matches!(result, Err(EngineError::Internal(_))));
    }

    #[test]
    fn collect_results_propagates_hard_failures() {
        let result: Result<Vec<i32>, _> = collect_results(vec![
            Ok(1),
            Err(EngineError::Internal("boom".into())),
            Err(EngineError::user("later user problem")),
        ]);
        assert!(matches!(result, Err(EngineError::Internal(_))));
    }
}

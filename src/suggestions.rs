//! # Error Suggestions
//!
//! Helpers that turn failures into messages telling the user what went wrong
//! and how to fix it, each fix on its own `hint:` line.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tryton_tasks::suggestions;
//!
//! let workspace = Workspace::open(&settings, &executor).map_err(suggestions::explain)?;
//! ```

use crate::error::Error;

/// Converts a library error into a user-facing one, adding hints where the
/// fix is known.
pub fn explain(error: Error) -> anyhow::Error {
    match error {
        Error::UnsupportedOperation { kind, operation } => unsupported_operation(&kind, &operation),
        Error::PatchConflict { patch, message } => patch_conflict(&patch, &message),
        Error::ManifestParse { path, message } => manifest_invalid(&path, &message),
        Error::ManifestNotFound { searched, .. } => manifest_not_found(&searched),
        other => anyhow::Error::new(other),
    }
}

/// Generate an error for a workspace without any manifest.
///
/// `searched` lists the locations that were tried.
pub fn manifest_not_found(searched: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Repository manifest not found (searched: {searched})\n\n\
         hint: List the repositories in config/*.cfg or local.cfg under the workspace root\n\
         hint: Use -c/--config to name manifest files explicitly\n\
         hint: Use --root or TRYTON_TASKS_ROOT to point at another workspace"
    )
}

/// Generate an error for a malformed manifest.
pub fn manifest_invalid(path: &str, message: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Invalid manifest {path}: {message}\n\n\
         hint: Every section needs 'repo' (hg or git), 'url' and 'path' keys\n\
         hint: Sections with a 'patch' key only need that key"
    )
}

/// Generate an error for an operation a repository kind cannot perform.
pub fn unsupported_operation(kind: &str, operation: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Operation '{operation}' is not supported for {kind} repositories\n\n\
         hint: Nothing was run; the whole batch is refused\n\
         hint: Use -c/--config to select manifests without {kind} repositories"
    )
}

/// Generate an error for a patch that no longer applies.
pub fn patch_conflict(patch: &str, message: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Patch '{patch}' does not apply: {message}\n\n\
         hint: Run 'tryton-tasks quilt push --force' to apply it with rejects\n\
         hint: Fix the rejected hunks, then run 'quilt refresh'"
    )
}

/// Generate an error for a patch name that is not in the series.
///
/// Suggests the closest patch name when there is one.
pub fn unknown_patch(patch: &str, series: &[String]) -> anyhow::Error {
    let candidates: Vec<&str> = series.iter().map(String::as_str).collect();
    let did_you_mean = find_similar(patch, &candidates)
        .map(|s| format!("\nhint: Did you mean '{s}'?"))
        .unwrap_or_default();

    anyhow::anyhow!(
        "Unknown patch: {patch}{did_you_mean}\n\n\
         hint: Run 'tryton-tasks quilt unapplied' to list the patches that can be pushed"
    )
}

/// Generate the error reported when some repositories of a batch failed.
pub fn batch_failed(operation: &str, aggregate: i32, failed: &[&str]) -> anyhow::Error {
    anyhow::anyhow!(
        "{operation} failed on {count} repositories ({names}), aggregate exit code {aggregate}\n\n\
         hint: Re-run with --log-level debug to see every command\n\
         hint: Use --ignore-missing to skip repositories that are not cloned yet",
        count = failed.len(),
        names = failed.join(", ")
    )
}

/// Generate the error reported when the patch gate could not restore the
/// stack.
pub fn patches_not_restored() -> anyhow::Error {
    anyhow::anyhow!(
        "The patch stack could not be restored\n\n\
         hint: Run 'tryton-tasks quilt applied' to see where the stack stopped\n\
         hint: Run 'tryton-tasks quilt push' once the conflict is fixed"
    )
}

/// Find a similar string from a list of candidates using edit distance.
///
/// Returns Some(candidate) if a close match is found (edit distance <= 2).
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Levenshtein distance, keeping a single row.
fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b_chars.len()).collect();

    for (i, a_char) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(a_char != *b_char);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = above;
        }
    }

    row[b_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_not_found_includes_hints() {
        let message = manifest_not_found("/srv/customer/config/*.cfg").to_string();

        assert!(message.contains("Repository manifest not found"));
        assert!(message.contains("/srv/customer/config/*.cfg"));
        assert!(message.contains("-c/--config"));
        assert!(message.contains("TRYTON_TASKS_ROOT"));
    }

    #[test]
    fn test_explain_adds_hints_to_unsupported_operation() {
        let error = explain(Error::UnsupportedOperation {
            kind: "git".to_string(),
            operation: "push".to_string(),
        });
        let message = error.to_string();

        assert!(message.contains("Operation 'push' is not supported for git repositories"));
        assert!(message.contains("hint: Nothing was run"));
    }

    #[test]
    fn test_explain_keeps_other_errors() {
        let error = explain(Error::NotImplemented {
            feature: "clean for git".to_string(),
        });
        assert_eq!(error.to_string(), "Feature not implemented: clean for git");
        assert!(error.downcast_ref::<Error>().is_some());
    }

    #[test]
    fn test_unknown_patch_suggests_similar() {
        let series = vec!["issue1234.diff".to_string(), "sale_fix.diff".to_string()];
        let message = unknown_patch("issue1243.diff", &series).to_string();

        assert!(message.contains("Unknown patch: issue1243.diff"));
        assert!(message.contains("Did you mean 'issue1234.diff'?"));
    }

    #[test]
    fn test_unknown_patch_no_suggestion_for_very_different() {
        let series = vec!["issue1234.diff".to_string()];
        let message = unknown_patch("account.patch", &series).to_string();

        assert!(!message.contains("Did you mean"));
        assert!(message.contains("quilt unapplied"));
    }

    #[test]
    fn test_batch_failed_lists_repositories() {
        let message = batch_failed("pull", -2, &["sao", "proteus"]).to_string();

        assert!(message.contains("pull failed on 2 repositories (sao, proteus)"));
        assert!(message.contains("aggregate exit code -2"));
        assert!(message.contains("--log-level debug"));
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("trytond", "trytond"), 0);
        assert_eq!(edit_distance("tryton", "trytond"), 1);
        assert_eq!(edit_distance("trytnod", "trytond"), 2);
        assert_eq!(edit_distance("", "sao"), 3);
        assert_eq!(edit_distance("sao", ""), 3);
    }

    #[test]
    fn test_find_similar() {
        let candidates = ["a.diff", "sale.diff", "stock.diff"];

        assert_eq!(find_similar("sal.diff", &candidates), Some("sale.diff"));
        assert_eq!(find_similar("stok.diff", &candidates), Some("stock.diff"));
        assert_eq!(find_similar("account.diff", &candidates), None);
    }
}

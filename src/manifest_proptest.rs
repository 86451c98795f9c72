//! Property-based tests for manifest parsing.
//!
//! These tests generate manifests with arbitrary repository sets and check
//! that the reader keeps every section, in order, with unique names.

#[cfg(test)]
mod proptest_tests {
    use crate::manifest::{Manifest, ManifestOptions, RepoKind};
    use proptest::collection::btree_set;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::path::Path;

    fn render(names: &[String], kinds: &[bool]) -> String {
        let mut content = String::new();
        for (name, is_git) in names.iter().zip(kinds) {
            let kind = if *is_git { "git" } else { "hg" };
            content.push_str(&format!(
                "[{name}]\nrepo = {kind}\nurl = https://scm.example.com/{name}\npath = ./modules\n\n"
            ));
        }
        content
    }

    proptest! {
        /// Property: N well-formed sections produce exactly N descriptors
        #[test]
        fn every_section_becomes_one_descriptor(
            names in btree_set("[a-z][a-z0-9_]{0,15}", 0..20),
            kinds in proptest::collection::vec(any::<bool>(), 20),
        ) {
            let names: Vec<String> = names.into_iter().collect();
            let content = render(&names, &kinds);
            let manifest = Manifest::parse(&content, Path::new("."), ManifestOptions::default()).unwrap();

            prop_assert_eq!(manifest.len(), names.len());
            let unique: HashSet<_> = manifest.repositories().iter().map(|r| r.name.clone()).collect();
            prop_assert_eq!(unique.len(), names.len());
        }

        /// Property: descriptors keep manifest order and the declared kind
        #[test]
        fn order_and_kind_are_preserved(
            names in btree_set("[a-z][a-z0-9_]{0,15}", 1..20),
            kinds in proptest::collection::vec(any::<bool>(), 20),
        ) {
            let names: Vec<String> = names.into_iter().collect();
            let content = render(&names, &kinds);
            let manifest = Manifest::parse(&content, Path::new("."), ManifestOptions::default()).unwrap();

            for ((repo, name), is_git) in manifest.repositories().iter().zip(&names).zip(&kinds) {
                prop_assert_eq!(&repo.name, name);
                let expected = if *is_git { RepoKind::Git } else { RepoKind::Mercurial };
                prop_assert_eq!(repo.kind, expected);
                prop_assert_eq!(repo.branch.as_str(), expected.default_branch());
            }
        }

        /// Property: development mode never leaves a pinned revision behind
        #[test]
        fn development_mode_clears_revisions(revision in "[0-9a-f]{12}") {
            let content = format!(
                "[trytond]\nrepo = hg\nurl = https://hg.tryton.org/trytond\npath = ./tryton\nrevision = {revision}\n"
            );
            let options = ManifestOptions { unstable: false, development: true };
            let manifest = Manifest::parse(&content, Path::new("."), options).unwrap();
            prop_assert!(manifest.repositories()[0].revision.is_none());
        }
    }
}

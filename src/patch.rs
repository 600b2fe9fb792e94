// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Patch files and their headers.
//!
//! Patch files are mailbox formatted, exactly as `git format-patch` writes
//! them. Repatch only cares about two things in a patch header:
//!
//! - The `Subject:` line, which must exist. A leading `[PATCH]` tag is
//!   dropped, and folded continuation lines are joined back together.
//! - An optional `Feature:` line in the commit message, used to group
//!   patches in the feature index.
//!
//! ```text
//! From 0000000000000000000000000000000000000000 Mon Sep 17 00:00:00 2001
//! From: John Doe <john@doe.com>
//! Date: Tue, 4 Mar 2025 10:00:00 +0000
//! Subject: [PATCH] Allow unlocking the bootloader from settings
//!
//! Feature: bootloader
//! ---
//! diff --git a/...
//! ```

use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;

static SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Subject:[ \t]*(?:\[[^\]]*\][ \t]*)?(.*(?:\r?\n[ \t]+.*)*)")
        .expect("subject pattern is valid")
});

static FEATURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Feature:[ \t]*(.*?)[ \t]*\r?$").expect("feature pattern is valid"));

/// Header information of a patch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchHeader {
    /// One line summary of the patch.
    pub subject: String,

    /// Feature the patch belongs to, if tagged.
    pub feature: Option<String>,
}

impl PatchHeader {
    /// Parse header information out of patch text.
    ///
    /// # Errors
    ///
    /// - Return [`PatchError::MissingSubject`] if there is no usable subject.
    pub fn parse(text: &str) -> Result<Self, PatchError> {
        let message = commit_message(text);

        let subject = SUBJECT
            .captures(message)
            .and_then(|caps| caps.get(1))
            .map(|subject| unfold(subject.as_str()))
            .filter(|subject| !subject.is_empty())
            .ok_or(PatchError::MissingSubject)?;

        let feature = FEATURE
            .captures(message)
            .and_then(|caps| caps.get(1))
            .map(|feature| feature.as_str().to_string())
            .filter(|feature| !feature.is_empty());

        Ok(Self { subject, feature })
    }
}

/// Patch file of a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Name of project the patch belongs to.
    pub project: String,

    /// File name of the patch inside project's patch directory.
    pub file_name: String,

    /// Parsed header of the patch.
    pub header: PatchHeader,
}

impl Patch {
    /// Read and parse patch file at `path` belonging to `project`.
    ///
    /// # Errors
    ///
    /// - Return [`PatchError::Read`] if patch file cannot be read.
    /// - Return [`PatchError::Header`] if header is unusable.
    pub fn load(project: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = read_to_string(path).map_err(|err| PatchError::Read {
            source: err,
            path: path.to_path_buf(),
        })?;

        let header = PatchHeader::parse(&text).map_err(|err| PatchError::Header {
            source: Box::new(err),
            path: path.to_path_buf(),
        })?;

        Ok(Self {
            project: project.into(),
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            header,
        })
    }
}

/// List patch files in `dir` in file name order.
///
/// File name order matches commit order, because extraction numbers patch
/// files. Only `*.patch` files count, so placeholders and stray files are
/// never mistaken for patches. A missing directory has no patches.
///
/// # Errors
///
/// - Return [`PatchError::Glob`] if directory cannot be listed.
pub fn list_patches(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    // INVARIANT: Escape directory part, so only the file name is a pattern.
    let dir = glob::Pattern::escape(dir.as_ref().to_string_lossy().as_ref());
    let pattern = Path::new(&dir).join(format!("*.{PATCH_EXTENSION}"));

    let mut patches = Vec::new();
    for entry in glob::glob(pattern.to_string_lossy().as_ref())? {
        let path = entry?;
        if path.is_file() {
            patches.push(path);
        }
    }
    patches.sort();

    Ok(patches)
}

/// Extension of patch files.
pub const PATCH_EXTENSION: &str = "patch";

// INVARIANT: Only the commit message part is searched, never the diff.
fn commit_message(text: &str) -> &str {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return &text[..offset];
        }
        offset += line.len();
    }

    text
}

fn unfold(subject: &str) -> String {
    subject.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Patch file error types.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// Patch header has no subject line.
    #[error("patch has no subject line")]
    MissingSubject,

    /// Patch file cannot be read.
    #[error("failed to read patch file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Patch file header is unusable.
    #[error("invalid patch file at {:?}", path.display())]
    Header {
        #[source]
        source: Box<PatchError>,
        path: PathBuf,
    },

    /// Listing pattern is malformed.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    /// Patch directory cannot be listed.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
}

/// Friendly result alias :3
pub type Result<T, E = PatchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use simple_test_case::test_case;
    use std::fs::{create_dir_all, write};

    const PATCH: &str = indoc! {"
        From 0000000000000000000000000000000000000000 Mon Sep 17 00:00:00 2001
        From: John Doe <john@doe.com>
        Date: Tue, 4 Mar 2025 10:00:00 +0000
        Subject: [PATCH] Allow unlocking the bootloader from settings

        Feature: bootloader
        ---
        diff --git a/Feature.txt b/Feature.txt
        --- a/Feature.txt
        +++ b/Feature.txt
        @@ -1 +1 @@
        -Feature: old
        +Feature: new
    "};

    #[test]
    fn parse_subject_and_feature() -> anyhow::Result<()> {
        let result = PatchHeader::parse(PATCH)?;
        let expect = PatchHeader {
            subject: "Allow unlocking the bootloader from settings".into(),
            feature: Some("bootloader".into()),
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test_case("Subject: [PATCH] Fix crash\n", "Fix crash"; "patch tag")]
    #[test_case("Subject: [PATCH 2/7] Fix crash\n", "Fix crash"; "numbered tag")]
    #[test_case("Subject: Fix crash\n", "Fix crash"; "no tag")]
    #[test_case(
        "Subject: [PATCH] Make a very long subject line\n that got folded\n\tby format-patch\nFrom: x\n",
        "Make a very long subject line that got folded by format-patch";
        "folded subject"
    )]
    #[test]
    fn parse_subject_variants(text: &str, expect: &str) {
        let result = PatchHeader::parse(text).unwrap();
        assert_eq!(result.subject, expect);
        assert_eq!(result.feature, None);
    }

    #[test_case("From: x\n\nno subject here\n"; "no subject header")]
    #[test_case("Subject: [PATCH]   \n"; "blank subject")]
    #[test_case("From: x\n---\nSubject: [PATCH] in diff\n"; "subject only in diff")]
    #[test]
    fn reject_missing_subject(text: &str) {
        let result = PatchHeader::parse(text);
        assert!(matches!(result, Err(PatchError::MissingSubject)));
    }

    #[test]
    fn ignore_feature_lines_in_diff() -> anyhow::Result<()> {
        let text = indoc! {"
            Subject: [PATCH] Untagged change

            ---
            diff --git a/x b/x
            Feature: not a tag
        "};
        let result = PatchHeader::parse(text)?;
        assert_eq!(result.feature, None);

        Ok(())
    }

    #[test]
    fn list_patches_in_order() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let patches = dir.path().join("a [b]");
        create_dir_all(&patches)?;
        write(patches.join("0002-second.patch"), PATCH)?;
        write(patches.join("0001-first.patch"), PATCH)?;
        write(patches.join(".keep"), "")?;
        write(patches.join("notes.txt"), "")?;

        let result = list_patches(&patches)?;
        let expect = vec![
            patches.join("0001-first.patch"),
            patches.join("0002-second.patch"),
        ];
        assert_eq!(result, expect);
        assert!(list_patches(dir.path().join("missing"))?.is_empty());

        Ok(())
    }

    #[test]
    fn load_reports_path_of_broken_patch() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("0001-broken.patch");
        write(&path, "From: x\n")?;

        let result = Patch::load("a/b", &path);
        assert!(matches!(result, Err(PatchError::Header { .. })));

        write(&path, PATCH)?;
        let result = Patch::load("a/b", &path)?;
        assert_eq!(result.project, "a/b");
        assert_eq!(result.file_name, "0001-broken.patch");

        Ok(())
    }
}

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Console highlighting.

use owo_colors::{OwoColorize, Stream};

/// Highlight project names, revisions, and file names in diagnostics.
///
/// Only colors output when standard error supports it, so piped logs stay
/// plain text.
pub fn highlight(text: &str) -> String {
    text.if_supports_color(Stream::Stderr, |text| text.cyan())
        .to_string()
}

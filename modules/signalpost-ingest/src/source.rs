//! Post input: newline-delimited JSON, one post per line, from a file or
//! stdin. A malformed line loses that line only.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use signalpost_common::RawPost;

pub fn read_posts(reader: impl BufRead) -> Result<Vec<RawPost>> {
    let mut posts = Vec::new();
    for (line_number, line) in reader.lines().enumerate() {
        let line = line.context("reading input line")?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RawPost>(&line) {
            Ok(post) => posts.push(post),
            Err(e) => {
                warn!(line = line_number + 1, error = %e, "Skipping malformed input line");
            }
        }
    }
    Ok(posts)
}

pub fn posts_from_file(path: &Path) -> Result<Vec<RawPost>> {
    let file =
        File::open(path).with_context(|| format!("opening input file {}", path.display()))?;
    read_posts(BufReader::new(file))
}

pub fn posts_from_stdin() -> Result<Vec<RawPost>> {
    read_posts(io::stdin().lock())
}

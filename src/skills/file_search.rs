//! Search the user's common folders for a file by name

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::launch::open_path;
use super::{Intent, Skill};

const TRIGGERS: [&str; 2] = ["search file ", "find file "];
const MAX_RESULTS: usize = 15;

/// Spoken location hints and the folder each selects
const HINTS: [(&str, Folder); 3] = [
    (" in downloads", Folder::Downloads),
    (" in documents", Folder::Documents),
    (" in desktop", Folder::Desktop),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Folder {
    Documents,
    Downloads,
    Desktop,
}

impl Folder {
    fn path(self) -> Option<PathBuf> {
        match self {
            Folder::Documents => dirs::document_dir(),
            Folder::Downloads => dirs::download_dir(),
            Folder::Desktop => dirs::desktop_dir(),
        }
    }
}

pub fn skill() -> Skill {
    Skill::new(
        "file_search",
        vec![Intent::new(["search file", "find file"], |text, speak| {
            let Some(keyword) = extract_keyword(text) else {
                speak.say(
                    "Please tell me the file name to search. For example: search file report.",
                );
                return Ok(());
            };

            let roots: Vec<PathBuf> = detect_folders(text)
                .iter()
                .filter_map(|folder| folder.path())
                .collect();
            let hits = search_files(&roots, &keyword, MAX_RESULTS);

            let Some(first) = hits.first() else {
                speak.say(&format!("I could not find files matching {keyword}."));
                return Ok(());
            };

            for hit in &hits {
                info!(path = %hit.display(), "file search result");
            }

            let count = hits.len();
            match open_path(first) {
                Ok(()) => speak.say(&format!(
                    "I found {count} file{}. Opening the first match.",
                    if count == 1 { "" } else { "s" }
                )),
                Err(e) => {
                    warn!(path = %first.display(), error = %e, "failed to open file");
                    speak.say(&format!(
                        "I found {count} files, but I couldn't open the first one."
                    ));
                }
            }
            Ok(())
        })
        .named("file_search")],
    )
}

/// Keyword after the trigger phrase, minus any location hint
///
/// A quoted keyword is taken verbatim between its quotes.
fn extract_keyword(text: &str) -> Option<String> {
    let text = text.to_lowercase();
    let tail = TRIGGERS
        .iter()
        .find_map(|trigger| text.split_once(*trigger).map(|(_, tail)| tail.trim()))?;

    let tail = HINTS
        .iter()
        .find_map(|(hint, _)| tail.strip_suffix(*hint))
        .unwrap_or(tail)
        .trim();

    for quote in ['"', '\''] {
        if let Some(rest) = tail.strip_prefix(quote) {
            if let Some((quoted, _)) = rest.split_once(quote) {
                return non_empty(quoted);
            }
        }
    }
    non_empty(tail)
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Folders to search, narrowed by an "in <folder>" hint
fn detect_folders(text: &str) -> Vec<Folder> {
    let text = text.to_lowercase();
    HINTS
        .iter()
        .find(|(hint, _)| text.contains(*hint))
        .map(|(_, folder)| vec![*folder])
        .unwrap_or_else(|| vec![Folder::Documents, Folder::Downloads, Folder::Desktop])
}

/// Walk `roots` depth-first collecting files whose name contains `keyword`
///
/// Unreadable directories are skipped.
fn search_files(roots: &[PathBuf], keyword: &str, max_results: usize) -> Vec<PathBuf> {
    let keyword = keyword.trim().to_lowercase();
    let mut results = Vec::new();

    for root in roots {
        let mut pending = vec![root.clone()];
        while let Some(dir) = pending.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(dir = %dir.display(), error = %e, "skipping directory");
                    continue;
                }
            };

            for entry in entries.flatten() {
                let path = entry.path();
                let Ok(file_type) = entry.file_type() else {
                    continue;
                };
                if file_type.is_dir() {
                    pending.push(path);
                } else if name_matches(&path, &keyword) {
                    results.push(path);
                    if results.len() >= max_results {
                        return results;
                    }
                }
            }
        }
    }
    results
}

fn name_matches(path: &Path, keyword: &str) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase().contains(keyword))
        .unwrap_or(false)
}

//! `str_replace_based_edit_tool`: view, create, str_replace,
//! insert against a path resolved through [`super::resolve_in_workspace`].

use super::resolve_in_workspace;
use std::path::Path;

pub struct EditArgs<'a> {
    pub command: &'a str,
    pub path: &'a str,
    pub file_text: Option<&'a str>,
    pub old_str: Option<&'a str>,
    pub new_str: Option<&'a str>,
    pub insert_line: Option<i64>,
}

pub fn run(args: EditArgs, workspace_root: &Path, shared_workspace: &Path) -> Result<String, String> {
    let resolved = resolve_in_workspace(args.path, workspace_root, shared_workspace)?;

    match args.command {
        "view" => {
            let content = std::fs::read_to_string(&resolved).map_err(|e| format!("cannot read {}: {e}", args.path))?;
            let numbered: String = content
                .lines()
                .enumerate()
                .map(|(i, line)| format!("{:>6}\t{line}\n", i + 1))
                .collect();
            Ok(numbered)
        }
        "create" => {
            let text = args.file_text.ok_or("create requires file_text")?;
            if let Some(parent) = resolved.parent() {
                std::fs::create_dir_all(parent).map_err(|e| format!("cannot create directory: {e}"))?;
            }
            std::fs::write(&resolved, text).map_err(|e| format!("cannot write {}: {e}", args.path))?;
            Ok(format!("created {}", args.path))
        }
        "str_replace" => {
            let old = args.old_str.ok_or("str_replace requires old_str")?;
            let new = args.new_str.unwrap_or("");
            let content = std::fs::read_to_string(&resolved).map_err(|e| format!("cannot read {}: {e}", args.path))?;
            let occurrences = content.matches(old).count();
            if occurrences == 0 {
                return Err(format!("search string not found in {}", args.path));
            }
            if occurrences > 1 {
                return Err(format!("search string is not unique in {} ({occurrences} occurrences)", args.path));
            }
            let replaced = content.replacen(old, new, 1);
            std::fs::write(&resolved, replaced).map_err(|e| format!("cannot write {}: {e}", args.path))?;
            Ok(format!("replaced one occurrence in {}", args.path))
        }
        "insert" => {
            let new = args.new_str.ok_or("insert requires new_str")?;
            let line = args.insert_line.ok_or("insert requires insert_line")?;
            let content = std::fs::read_to_string(&resolved).map_err(|e| format!("cannot read {}: {e}", args.path))?;
            let mut lines: Vec<&str> = content.lines().collect();
            let index = (line.max(0) as usize).min(lines.len());
            lines.insert(index, new);
            let joined = lines.join("\n") + "\n";
            std::fs::write(&resolved, joined).map_err(|e| format!("cannot write {}: {e}", args.path))?;
            Ok(format!("inserted at line {line} in {}", args.path))
        }
        other => Err(format!("unknown edit command: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_replace_requires_unique_match() {
        let dir = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "a\na\n").unwrap();
        let args = EditArgs { command: "str_replace", path: "f.txt", file_text: None, old_str: Some("a"), new_str: Some("b"), insert_line: None };
        let err = run(args, dir.path(), shared.path()).unwrap_err();
        assert!(err.contains("not unique"));
        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "a\na\n");
    }

    #[test]
    fn create_then_view_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        let create = EditArgs { command: "create", path: "new.txt", file_text: Some("hello\nworld"), old_str: None, new_str: None, insert_line: None };
        run(create, dir.path(), shared.path()).unwrap();
        let view = EditArgs { command: "view", path: "new.txt", file_text: None, old_str: None, new_str: None, insert_line: None };
        let output = run(view, dir.path(), shared.path()).unwrap();
        assert!(output.contains("1\thello"));
        assert!(output.contains("2\tworld"));
    }

    #[test]
    fn insert_places_line_at_index() {
        let dir = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "a\nb\n").unwrap();
        let args = EditArgs { command: "insert", path: "f.txt", file_text: None, old_str: None, new_str: Some("x"), insert_line: Some(1) };
        run(args, dir.path(), shared.path()).unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "a\nx\nb\n");
    }
}

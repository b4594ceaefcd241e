use super::adapter::{quoted_entry_points, LanguageAdapter, SourceFile};
use super::Language;

const HARNESS: &str = r#"import ast
import json
import sys

import solution

ENTRY_POINTS = (__ENTRY_POINTS__,)


def find_entry_point():
    for name in ENTRY_POINTS:
        fn = getattr(solution, name, None)
        if callable(fn):
            return fn
    cls = getattr(solution, "Solution", None)
    if isinstance(cls, type):
        instance = cls()
        for name in ENTRY_POINTS:
            fn = getattr(instance, name, None)
            if callable(fn):
                return fn
    return None


def read_arguments():
    raw = sys.stdin.read().strip()
    if not raw:
        return ()
    try:
        return tuple(json.loads("[" + raw + "]"))
    except ValueError:
        return ast.literal_eval("(" + raw + ",)")


args = read_arguments()
entry = find_entry_point()
result = entry(*args) if entry is not None else None
print(json.dumps(result, separators=(",", ":")))
"#;

#[derive(Debug, Clone, Default)]
pub struct PythonAdapter;

impl LanguageAdapter for PythonAdapter {
    fn language(&self) -> Language {
        Language::Python
    }

    fn files(&self, source_code: &str) -> Vec<SourceFile> {
        vec![
            SourceFile::new(
                "main.py",
                HARNESS.replace("__ENTRY_POINTS__", &quoted_entry_points()),
            ),
            SourceFile::new("solution.py", source_code),
        ]
    }
}

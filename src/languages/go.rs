use super::adapter::{LanguageAdapter, SourceFile, ENTRY_POINTS};
use super::Language;

// Arguments are decoded with encoding/json into the entry point's parameter
// types, so the input is data even for the compiled language.
const HARNESS: &str = r#"package main

import (
	"encoding/json"
	"fmt"
	"io"
	"os"
	"reflect"
)

func fail(format string, args ...interface{}) {
	fmt.Fprintf(os.Stderr, format+"\n", args...)
	os.Exit(1)
}

func main() {
	raw, err := io.ReadAll(os.Stdin)
	if err != nil {
		fail("failed to read input: %v", err)
	}

	fn := reflect.ValueOf(__ENTRY__)
	fnType := fn.Type()

	var parts []json.RawMessage
	list := append(append([]byte("["), raw...), ']')
	if err := json.Unmarshal(list, &parts); err != nil {
		fail("invalid input: %v", err)
	}
	if len(parts) != fnType.NumIn() {
		fail("expected %d arguments, got %d", fnType.NumIn(), len(parts))
	}

	args := make([]reflect.Value, len(parts))
	for i, part := range parts {
		value := reflect.New(fnType.In(i))
		if err := json.Unmarshal(part, value.Interface()); err != nil {
			fail("invalid argument %d: %v", i, err)
		}
		args[i] = value.Elem()
	}

	var result interface{}
	if out := fn.Call(args); len(out) > 0 {
		result = out[0].Interface()
	}

	encoded, err := json.Marshal(result)
	if err != nil {
		fail("failed to encode result: %v", err)
	}
	fmt.Println(string(encoded))
}
"#;

// Used when the submission declares none of the canonical entry points.
const STUB_HARNESS: &str = r#"package main

import (
	"fmt"
	"io"
	"os"
)

func main() {
	_, _ = io.ReadAll(os.Stdin)
	fmt.Println("[]")
}
"#;

#[derive(Debug, Clone, Default)]
pub struct GoAdapter;

impl LanguageAdapter for GoAdapter {
    fn language(&self) -> Language {
        Language::Go
    }

    fn files(&self, source_code: &str) -> Vec<SourceFile> {
        let harness = match find_entry_point(source_code) {
            Some(entry) => HARNESS.replace("__ENTRY__", entry),
            None => STUB_HARNESS.to_string(),
        };

        let solution = if declares_package(source_code) {
            source_code.to_string()
        } else {
            format!("package main\n\n{}", source_code)
        };

        vec![
            SourceFile::new("main.go", harness),
            SourceFile::new("solution.go", solution),
        ]
    }
}

/// First canonical entry point declared as a top-level `func`
fn find_entry_point(source: &str) -> Option<&'static str> {
    ENTRY_POINTS.iter().copied().find(|name| {
        source.lines().any(|line| {
            line.strip_prefix("func ")
                .map(str::trim_start)
                .and_then(|rest| rest.strip_prefix(name))
                .map(|rest| rest.trim_start().starts_with('('))
                .unwrap_or(false)
        })
    })
}

fn declares_package(source: &str) -> bool {
    source
        .lines()
        .map(str::trim)
        .any(|line| line.starts_with("package "))
}

use super::adapter::{quoted_entry_points, LanguageAdapter, SourceFile};
use super::Language;

// The submission is evaluated in its own function scope; the lookups pick up
// canonical functions declared with `function`, `const` or `let`.
const HARNESS: &str = r##"const fs = require("fs");
const path = require("path");

const ENTRY_POINTS = [__ENTRY_POINTS__];

const source = fs.readFileSync(path.join(__dirname, "solution.js"), "utf8");
const lookups = ENTRY_POINTS.map(
  (name) => `typeof ${name} === "function" ? ${name} : undefined`
);
const classLookup = `typeof Solution === "function" ? Solution : undefined`;
const load = new Function(
  "require",
  "module",
  "exports",
  `${source}\n;return [[${lookups.join(", ")}], ${classLookup}];`
);
const exported = { exports: {} };
const [entries, SolutionClass] = load(require, exported, exported.exports);

function findEntryPoint() {
  const fn = entries.find((f) => typeof f === "function");
  if (fn) {
    return fn;
  }
  for (const name of ENTRY_POINTS) {
    if (typeof exported.exports[name] === "function") {
      return exported.exports[name];
    }
  }
  if (SolutionClass) {
    const instance = new SolutionClass();
    for (const name of ENTRY_POINTS) {
      if (typeof instance[name] === "function") {
        return instance[name].bind(instance);
      }
    }
  }
  return null;
}

const CONSTANTS = {
  true: "true",
  false: "false",
  null: "null",
  undefined: "null",
  True: "true",
  False: "false",
  None: "null",
};

function decodeQuoted(raw, start) {
  const quote = raw[start];
  let value = "";
  let i = start + 1;
  while (i < raw.length && raw[i] !== quote) {
    if (raw[i] === "\\" && i + 1 < raw.length) {
      const escaped = raw[i + 1];
      value += { n: "\n", t: "\t", r: "\r" }[escaped] ?? escaped;
      i += 2;
    } else {
      value += raw[i];
      i += 1;
    }
  }
  if (i >= raw.length) {
    throw new SyntaxError("unterminated string literal");
  }
  return [value, i + 1];
}

// Rewrites literal spellings JSON lacks (quoted with ', True/None/undefined,
// tuples, trailing commas, bare object keys) without evaluating anything
function literalToJson(raw) {
  let out = "";
  let i = 0;
  while (i < raw.length) {
    const c = raw[i];
    if (c === '"' || c === "'") {
      const [value, next] = decodeQuoted(raw, i);
      out += JSON.stringify(value);
      i = next;
    } else if (/[A-Za-z_$]/.test(c) && !/[\d.]/.test(raw[i - 1] ?? "")) {
      let j = i;
      while (j < raw.length && /[\w$]/.test(raw[j])) {
        j += 1;
      }
      const word = raw.slice(i, j);
      if (/^\s*:/.test(raw.slice(j))) {
        out += JSON.stringify(word);
      } else if (Object.prototype.hasOwnProperty.call(CONSTANTS, word)) {
        out += CONSTANTS[word];
      } else {
        throw new SyntaxError(`unexpected identifier ${word}`);
      }
      i = j;
    } else if (c === ",") {
      if (!/^\s*[\]})]/.test(raw.slice(i + 1))) {
        out += c;
      }
      i += 1;
    } else {
      out += c === "(" ? "[" : c === ")" ? "]" : c;
      i += 1;
    }
  }
  return out;
}

// JSON first, then the wider literal syntax
function readArguments() {
  const raw = fs.readFileSync(0, "utf8").trim();
  if (!raw) {
    return [];
  }
  try {
    return JSON.parse(`[${raw}]`);
  } catch (jsonError) {
    try {
      return JSON.parse(`[${literalToJson(raw)}]`);
    } catch (literalError) {
      throw jsonError;
    }
  }
}

const args = readArguments();
const entry = findEntryPoint();
const result = entry ? entry(...args) : null;
console.log(JSON.stringify(result === undefined ? null : result));
"##;

#[derive(Debug, Clone, Default)]
pub struct JavaScriptAdapter;

impl LanguageAdapter for JavaScriptAdapter {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn files(&self, source_code: &str) -> Vec<SourceFile> {
        vec![
            SourceFile::new(
                "main.js",
                HARNESS.replace("__ENTRY_POINTS__", &quoted_entry_points()),
            ),
            SourceFile::new("solution.js", source_code),
        ]
    }
}

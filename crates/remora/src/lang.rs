//! Code-language detection for fenced fallback blocks.
//!
//! An ordered list of signatures is probed first-match-wins, so the order
//! below is significant: the broad C-family checks sit after the
//! languages whose keywords they would shadow. Anything under ten
//! characters, or matching nothing, gets an empty language tag.

use regex::Regex;
use std::sync::OnceLock;

const MIN_DETECTABLE_LEN: usize = 10;

struct Probe<'a> {
    code: &'a str,
    first_line: &'a str,
}

type SignatureFn = fn(&Probe<'_>) -> Option<&'static str>;

/// Signature order is significant; first match wins.
const SIGNATURES: &[SignatureFn] = &[
    sig_javascript_family,
    sig_python,
    sig_java,
    sig_csharp,
    sig_c_family,
    sig_go,
    sig_rust,
    sig_php,
    sig_ruby,
    sig_bash,
    sig_sql,
    sig_css,
    sig_html,
    sig_xml,
    sig_json,
    sig_yaml,
    sig_markdown,
    sig_dockerfile,
];

/// Best-effort language tag for a code block, empty when unsure.
pub fn detect(code_text: &str) -> &'static str {
    let code = code_text.trim();
    if code.len() < MIN_DETECTABLE_LEN {
        return "";
    }
    let probe = Probe {
        code,
        first_line: code.lines().next().unwrap_or("").trim(),
    };
    for signature in SIGNATURES {
        if let Some(lang) = signature(&probe) {
            return lang;
        }
    }
    ""
}

fn sig_javascript_family(p: &Probe<'_>) -> Option<&'static str> {
    let code = p.code;
    let looks_js = code.contains("function ")
        || code.contains("const ")
        || code.contains("let ")
        || code.contains("var ")
        || code.contains("=>")
        || code.contains("console.log")
        || code.contains("require(")
        || code.contains("import ")
        || code.contains("export ");
    if !looks_js {
        return None;
    }
    let looks_typed = code.contains(": ")
        && (code.contains("interface ")
            || code.contains("type ")
            || code.contains("enum ")
            || code.contains("implements "));
    Some(if looks_typed { "typescript" } else { "javascript" })
}

fn sig_python(p: &Probe<'_>) -> Option<&'static str> {
    let code = p.code;
    let matched = code.contains("def ")
        || code.contains("import ")
        || code.contains("from ")
        || code.contains("print(")
        || code.contains("if __name__")
        || code.contains("class ")
        || (p.first_line.starts_with("#!") && p.first_line.contains("python"));
    matched.then_some("python")
}

fn sig_java(p: &Probe<'_>) -> Option<&'static str> {
    let code = p.code;
    let matched = code.contains("public class ")
        || code.contains("private ")
        || code.contains("public static void main")
        || code.contains("System.out.println")
        || code.contains("import java.");
    matched.then_some("java")
}

fn sig_csharp(p: &Probe<'_>) -> Option<&'static str> {
    let code = p.code;
    let matched = code.contains("using System")
        || code.contains("namespace ")
        || code.contains("public class ")
        || code.contains("Console.WriteLine")
        || code.contains("[Attribute]");
    matched.then_some("csharp")
}

fn sig_c_family(p: &Probe<'_>) -> Option<&'static str> {
    let code = p.code;
    let matched = code.contains("#include")
        || code.contains("int main")
        || code.contains("printf(")
        || code.contains("cout <<")
        || code.contains("std::");
    if !matched {
        return None;
    }
    Some(if code.contains("std::") || code.contains("cout") {
        "cpp"
    } else {
        "c"
    })
}

fn sig_go(p: &Probe<'_>) -> Option<&'static str> {
    let code = p.code;
    let matched = code.contains("package ")
        || code.contains("func ")
        || code.contains("import (")
        || code.contains("fmt.Printf")
        || code.contains("go ");
    matched.then_some("go")
}

fn sig_rust(p: &Probe<'_>) -> Option<&'static str> {
    let code = p.code;
    let matched = code.contains("fn ")
        || code.contains("let mut")
        || code.contains("println!")
        || code.contains("use std::")
        || code.contains("impl ");
    matched.then_some("rust")
}

fn sig_php(p: &Probe<'_>) -> Option<&'static str> {
    let code = p.code;
    let matched = code.contains("<?php")
        || (code.contains('$') && (code.contains("echo ") || code.contains("print ")));
    matched.then_some("php")
}

fn sig_ruby(p: &Probe<'_>) -> Option<&'static str> {
    let code = p.code;
    let matched = code.contains("def ")
        && (code.contains("end") || code.contains("puts ") || code.contains("require "));
    matched.then_some("ruby")
}

fn sig_bash(p: &Probe<'_>) -> Option<&'static str> {
    let code = p.code;
    let matched = (p.first_line.starts_with("#!")
        && (p.first_line.contains("bash") || p.first_line.contains("sh")))
        || code.contains("#!/bin/")
        || (code.contains("echo ") && code.contains('$'));
    matched.then_some("bash")
}

fn sql_keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(SELECT|INSERT|UPDATE|DELETE|CREATE|ALTER|DROP)\b")
            .expect("valid regex")
    })
}

fn sig_sql(p: &Probe<'_>) -> Option<&'static str> {
    sql_keyword_regex().is_match(p.code).then_some("sql")
}

fn sig_css(p: &Probe<'_>) -> Option<&'static str> {
    let code = p.code;
    let matched = code.contains('{')
        && code.contains('}')
        && code.contains(':')
        && (code.contains("color:")
            || code.contains("margin:")
            || code.contains("padding:")
            || code.contains('#'));
    matched.then_some("css")
}

fn sig_html(p: &Probe<'_>) -> Option<&'static str> {
    let code = p.code;
    let matched = code.contains('<')
        && code.contains('>')
        && (code.contains("<!DOCTYPE")
            || code.contains("<html")
            || code.contains("<div")
            || code.contains("<p"));
    matched.then_some("html")
}

fn sig_xml(p: &Probe<'_>) -> Option<&'static str> {
    let code = p.code;
    let matched =
        code.contains("<?xml") || (code.contains('<') && code.contains('>') && code.contains("</"));
    matched.then_some("xml")
}

fn sig_json(p: &Probe<'_>) -> Option<&'static str> {
    let code = p.code;
    let delimited = (code.starts_with('{') && code.ends_with('}'))
        || (code.starts_with('[') && code.ends_with(']'));
    if !delimited {
        return None;
    }
    serde_json::from_str::<serde_json::Value>(code)
        .is_ok()
        .then_some("json")
}

fn yaml_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\w+:\s*").expect("valid regex"))
}

fn sig_yaml(p: &Probe<'_>) -> Option<&'static str> {
    p.code
        .lines()
        .any(|line| yaml_key_regex().is_match(line) && !line.contains('{') && !line.contains(';'))
        .then_some("yaml")
}

fn sig_markdown(p: &Probe<'_>) -> Option<&'static str> {
    let code = p.code;
    let matched = code.contains("# ")
        || code.contains("## ")
        || code.contains("```")
        || (code.contains('[') && code.contains("]("));
    matched.then_some("markdown")
}

fn sig_dockerfile(p: &Probe<'_>) -> Option<&'static str> {
    let code = p.code;
    let matched = p.first_line.starts_with("FROM ")
        || code.contains("RUN ")
        || code.contains("COPY ")
        || code.contains("WORKDIR ");
    matched.then_some("dockerfile")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_snippets_are_untagged() {
        assert_eq!(detect("x = 1"), "");
        assert_eq!(detect("        "), "");
    }

    #[test]
    fn detects_the_usual_suspects() {
        assert_eq!(detect("const x = 1;\nconsole.log(x);"), "javascript");
        assert_eq!(
            detect("interface Foo { bar: string }\nconst x: Foo = y;"),
            "typescript"
        );
        assert_eq!(detect("def main():\n    print('hi')"), "python");
        assert_eq!(
            detect("public static void main(String[] args) {}"),
            "java"
        );
        assert_eq!(detect("#include <stdio.h>\nint main() {}"), "c");
        assert_eq!(detect("#include <iostream>\nstd::cout << 1;"), "cpp");
        assert_eq!(detect("SELECT id FROM users WHERE id = 1;"), "sql");
        assert_eq!(detect("FROM alpine:3.20\nRUN apk add curl"), "dockerfile");
    }

    #[test]
    fn rust_wins_over_later_signatures() {
        assert_eq!(detect("fn main() {\n    println!(\"hi\");\n}"), "rust");
    }

    #[test]
    fn json_requires_valid_json() {
        assert_eq!(detect(r#"{"a": 1, "b": [2, 3]}"#), "json");
        // Curly braces with invalid contents fall through to YAML's
        // key-probe failing too, ending untagged.
        assert_eq!(detect("{this is not json}"), "");
    }

    #[test]
    fn yaml_key_lines() {
        assert_eq!(detect("name: remora\nversion: 1"), "yaml");
    }

    #[test]
    fn first_match_wins_across_families() {
        // `import ` matches the JS family before Python ever runs.
        assert_eq!(detect("import os\nimport sys"), "javascript");
    }
}

//! File-driven grammar tests.
//!
//! Each `.gram` file has three sections separated by `----` lines: the rule
//! names (first is the start rule), the grammar text, and the input. The
//! matching `.gram.expected` file holds the rendered parse tree.

use std::path::Path;

use parsekit::{lang, value, Ast, Grammar};

/// Compact s-expression rendering for comparison against expected files.
fn render(ast: &Ast) -> String {
    if ast.is_leaf() {
        format!("[{} {:?}]", ast.tag, ast.contents)
    } else {
        let children: Vec<String> = ast.children.iter().map(render).collect();
        format!("({} {})", ast.tag, children.join(" "))
    }
}

fn run_case(path: &Path) -> datatest_stable::Result<()> {
    let case = std::fs::read_to_string(path)?;
    let expected_path = format!("{}.expected", path.display());
    let expected = std::fs::read_to_string(&expected_path)?.trim().to_string();

    let mut sections = case.split("----\n");
    let names: Vec<&str> = sections
        .next()
        .ok_or("missing rule name section")?
        .split_whitespace()
        .collect();
    let grammar_src = sections.next().ok_or("missing grammar section")?;
    let input = sections.next().ok_or("missing input section")?.trim_end();

    let mut g = Grammar::new();
    let refs: Vec<parsekit::ParserId> = names.iter().map(|n| g.declare(n)).collect();
    g.language(lang::DEFAULT, grammar_src, &refs)
        .map_err(|e| e.to_string())?;

    let v = g
        .parse("case", input, refs[0])
        .map_err(|e| e.to_string())?;
    let actual = render(&value::take::<Ast>(v));

    if actual != expected {
        return Err(format!(
            "mismatch for {:?}\n\nExpected:\n{}\n\nActual:\n{}",
            path, expected, actual
        )
        .into());
    }

    g.cleanup(&refs);
    assert!(g.is_empty());
    Ok(())
}

datatest_stable::harness!(run_case, "tests/lang_cases", r"\.gram$");
